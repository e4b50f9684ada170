use crate::config::database::DatabaseConfig;
use crate::core::etl::IngestJob;
use crate::core::reader::DEFAULT_CHUNK_SIZE;
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{
    parse_delimiter, validate_file_extensions, validate_identifier, validate_path,
    validate_positive_number, Validate,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

pub const SOURCE_EXTENSIONS: &[&str] = &["csv", "tsv", "tab", "txt", "zip"];
const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub ingest: IngestSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub jobs: Vec<JobConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestSettings {
    pub chunk_size: Option<usize>,
    pub delimiter: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: Option<String>,
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    pub source: String,
    pub table: String,
    pub chunk_size: Option<usize>,
    pub delimiter: Option<String>,
}

impl IngestConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(EtlError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| EtlError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${DB_PATH})；未設定的變數保持原樣
    fn substitute_env_vars(content: &str) -> String {
        static ENV_VAR: OnceLock<Regex> = OnceLock::new();
        let re = ENV_VAR.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("env var regex is valid"));

        re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        })
        .into_owned()
    }

    pub fn chunk_size(&self) -> usize {
        self.ingest.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE)
    }

    pub fn delimiter(&self) -> Result<Option<u8>> {
        self.ingest
            .delimiter
            .as_deref()
            .map(|d| parse_delimiter("ingest.delimiter", d))
            .transpose()
    }

    /// 將 [[jobs]] 轉為可執行的匯入工作，未設定的值沿用 [ingest]
    pub fn jobs(&self) -> Result<Vec<IngestJob>> {
        let default_delimiter = self.delimiter()?;
        self.jobs
            .iter()
            .enumerate()
            .map(|(i, job)| -> Result<IngestJob> {
                let field = format!("jobs[{}].delimiter", i);
                let delimiter = match job.delimiter.as_deref() {
                    Some(d) => Some(parse_delimiter(&field, d)?),
                    None => default_delimiter,
                };
                Ok(IngestJob {
                    source: PathBuf::from(&job.source),
                    table: job.table.clone(),
                    chunk_size: job.chunk_size.unwrap_or_else(|| self.chunk_size()),
                    delimiter,
                })
            })
            .collect()
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        self.database.validate()?;

        if let Some(chunk_size) = self.ingest.chunk_size {
            validate_positive_number("ingest.chunk_size", chunk_size, 1)?;
        }
        self.delimiter()?;

        if let Some(level) = &self.logging.level {
            if !LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str()) {
                return Err(EtlError::InvalidConfigValueError {
                    field: "logging.level".to_string(),
                    value: level.clone(),
                    reason: format!("Valid levels: {}", LOG_LEVELS.join(", ")),
                });
            }
        }

        for (i, job) in self.jobs.iter().enumerate() {
            validate_path(&format!("jobs[{}].source", i), &job.source)?;
            validate_file_extensions(
                &format!("jobs[{}].source", i),
                std::slice::from_ref(&job.source),
                SOURCE_EXTENSIONS,
            )?;
            validate_identifier(&format!("jobs[{}].table", i), &job.table)?;
            if let Some(chunk_size) = job.chunk_size {
                validate_positive_number(&format!("jobs[{}].chunk_size", i), chunk_size, 1)?;
            }
        }
        self.jobs()?;

        Ok(())
    }
}

impl Validate for IngestConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_full_config() {
        let toml_content = r#"
[database]
database = "./warehouse.db"
host = "localhost"
port = 5432
busy_timeout_ms = 250

[ingest]
chunk_size = 500
delimiter = ";"

[logging]
level = "debug"
format = "json"

[[jobs]]
source = "data/employees.csv"
table = "employees"

[[jobs]]
source = "data/orders.tsv"
table = "orders"
chunk_size = 50
delimiter = "\\t"
"#;

        let config = IngestConfig::from_toml_str(toml_content).unwrap();
        config.validate().unwrap();

        assert_eq!(config.database.database, "./warehouse.db");
        assert_eq!(config.database.busy_timeout_ms, 250);
        assert_eq!(config.chunk_size(), 500);
        assert_eq!(config.logging.format, LogFormat::Json);

        let jobs = config.jobs().unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].chunk_size, 500);
        assert_eq!(jobs[0].delimiter, Some(b';'));
        assert_eq!(jobs[1].chunk_size, 50);
        assert_eq!(jobs[1].delimiter, Some(b'\t'));
    }

    #[test]
    fn test_defaults_for_empty_config() {
        let config = IngestConfig::from_toml_str("").unwrap();

        assert_eq!(config.chunk_size(), 1000);
        assert_eq!(config.database, DatabaseConfig::default());
        assert_eq!(config.logging.format, LogFormat::Compact);
        assert!(config.jobs().unwrap().is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("CSV_INGEST_TEST_DB", "/tmp/from-env.db");

        let toml_content = r#"
[database]
database = "${CSV_INGEST_TEST_DB}"
"#;

        let config = IngestConfig::from_toml_str(toml_content).unwrap();
        assert_eq!(config.database.database, "/tmp/from-env.db");

        std::env::remove_var("CSV_INGEST_TEST_DB");
    }

    #[test]
    fn test_unknown_env_var_left_in_place() {
        let config = IngestConfig::from_toml_str(
            "[database]\ndatabase = \"${CSV_INGEST_SURELY_UNSET_VAR}\"\n",
        )
        .unwrap();
        assert_eq!(config.database.database, "${CSV_INGEST_SURELY_UNSET_VAR}");
    }

    #[test]
    fn test_config_validation() {
        let bad_table = r#"
[[jobs]]
source = "data.csv"
table = "bad table"
"#;
        let config = IngestConfig::from_toml_str(bad_table).unwrap();
        assert!(config.validate().is_err());

        let bad_extension = r#"
[[jobs]]
source = "data.xlsx"
table = "good"
"#;
        let config = IngestConfig::from_toml_str(bad_extension).unwrap();
        assert!(config.validate().is_err());

        let zero_chunk = "[ingest]\nchunk_size = 0\n";
        let config = IngestConfig::from_toml_str(zero_chunk).unwrap();
        assert!(config.validate().is_err());

        let bad_level = "[logging]\nlevel = \"loud\"\n";
        let config = IngestConfig::from_toml_str(bad_level).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_toml() {
        let err = IngestConfig::from_toml_str("[ingest\nchunk_size = 1").unwrap_err();
        assert!(matches!(err, EtlError::ConfigValidationError { .. }));
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();

        let toml_content = r#"
[database]
database = ":memory:"

[[jobs]]
source = "people.csv"
table = "people"
"#;

        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = IngestConfig::from_file(temp_file.path()).unwrap();
        assert!(config.database.is_in_memory());
        assert_eq!(config.jobs().unwrap()[0].table, "people");
    }
}
