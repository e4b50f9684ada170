pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use adapters::sqlite::SqliteGateway;
pub use config::database::DatabaseConfig;
pub use config::toml_config::IngestConfig;
pub use core::{
    etl::{IngestEngine, IngestJob},
    pipeline::{IngestOptions, IngestionPipeline, PipelineState},
    validator::{DefaultValidator, RowValidator},
};
pub use domain::model::{Chunk, ColumnType, ColumnTypes, Metrics, Row, Value};
pub use domain::ports::StorageGateway;
pub use utils::error::{EtlError, Result};
pub use utils::monitor::PerformanceMonitor;
