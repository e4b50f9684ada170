pub mod database;
pub mod toml_config;

#[cfg(feature = "cli")]
use crate::config::toml_config::{IngestConfig, SOURCE_EXTENSIONS};
#[cfg(feature = "cli")]
use crate::core::etl::IngestJob;
#[cfg(feature = "cli")]
use crate::utils::error::{EtlError, Result};
#[cfg(feature = "cli")]
use crate::utils::validation::{
    parse_delimiter, validate_file_extensions, validate_identifier, validate_positive_number,
    validate_required_field, Validate,
};
#[cfg(feature = "cli")]
use clap::Parser;
#[cfg(feature = "cli")]
use std::path::PathBuf;

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "csv-ingest")]
#[command(about = "Stream delimited files into a SQL table in bounded chunks")]
pub struct CliConfig {
    /// Path to the CSV/TSV (or .zip) file to load
    #[arg(long)]
    pub file: Option<String>,

    /// Target table name
    #[arg(long)]
    pub table: Option<String>,

    /// Rows per chunk
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Database path, overrides [database].database
    #[arg(long)]
    pub database: Option<String>,

    /// Field delimiter (single character, or \t)
    #[arg(long)]
    pub delimiter: Option<String>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Log process CPU and memory around each job")]
    pub monitor: bool,

    #[arg(long, help = "Emit logs as JSON")]
    pub json_logs: bool,

    #[arg(long, help = "Print final metrics as JSON on stdout")]
    pub metrics_json: bool,
}

#[cfg(feature = "cli")]
impl CliConfig {
    /// 載入 TOML（若有指定）並套用命令列覆蓋
    pub fn load_file_config(&self) -> Result<IngestConfig> {
        let mut config = match &self.config {
            Some(path) => IngestConfig::from_file(path)?,
            None => IngestConfig::default(),
        };

        if let Some(database) = &self.database {
            config.database.database = database.clone();
        }
        if let Some(chunk_size) = self.chunk_size {
            config.ingest.chunk_size = Some(chunk_size);
        }
        if let Some(delimiter) = &self.delimiter {
            config.ingest.delimiter = Some(delimiter.clone());
        }
        Ok(config)
    }

    /// --file/--table 優先；否則使用設定檔中的 [[jobs]]
    pub fn resolve_jobs(&self, config: &IngestConfig) -> Result<Vec<IngestJob>> {
        if self.file.is_none() && self.table.is_none() {
            let jobs = config.jobs()?;
            if jobs.is_empty() {
                return Err(EtlError::MissingConfigError {
                    field: "--file/--table or [[jobs]]".to_string(),
                });
            }
            return Ok(jobs);
        }

        let file = validate_required_field("file", &self.file)?;
        let table = validate_required_field("table", &self.table)?;
        Ok(vec![IngestJob {
            source: PathBuf::from(file),
            table: table.clone(),
            chunk_size: config.chunk_size(),
            delimiter: config.delimiter()?,
        }])
    }
}

#[cfg(feature = "cli")]
impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        if let Some(chunk_size) = self.chunk_size {
            validate_positive_number("chunk_size", chunk_size, 1)?;
        }
        if let Some(table) = &self.table {
            validate_identifier("table", table)?;
        }
        if let Some(file) = &self.file {
            validate_file_extensions("file", std::slice::from_ref(file), SOURCE_EXTENSIONS)?;
        }
        if let Some(delimiter) = &self.delimiter {
            parse_delimiter("delimiter", delimiter)?;
        }
        Ok(())
    }
}
