use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("Store connection failed: {message}")]
    Connection { message: String },

    #[error("Schema error on table '{table}': {message}")]
    Schema { table: String, message: String },

    #[error("Write to table '{table}' failed ({rows} rows rolled back): {message}")]
    Write {
        table: String,
        rows: usize,
        message: String,
    },

    #[error("Query failed: {message}")]
    Query { message: String },

    #[error("Error processing chunk {chunk}: {source}")]
    Pipeline {
        chunk: usize,
        #[source]
        source: Box<EtlError>,
    },

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Source file not found: {path}")]
    SourceNotFound { path: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Connection,
    Schema,
    Storage,
    Input,
    Validation,
    Configuration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Medium,
    High,
    Critical,
}

impl EtlError {
    /// 以區塊序號包裝錯誤，已包裝的錯誤保持原樣
    pub fn in_chunk(chunk: usize, error: EtlError) -> Self {
        match error {
            EtlError::Pipeline { .. } => error,
            other => EtlError::Pipeline {
                chunk,
                source: Box::new(other),
            },
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        EtlError::ValidationError {
            message: message.into(),
        }
    }

    /// 取得最內層的錯誤（略過 Pipeline 包裝）
    pub fn root_cause(&self) -> &EtlError {
        match self {
            EtlError::Pipeline { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// 失敗區塊的序號（從 1 開始）
    pub fn chunk(&self) -> Option<usize> {
        match self {
            EtlError::Pipeline { chunk, .. } => Some(*chunk),
            _ => None,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self.root_cause() {
            EtlError::Connection { .. } => ErrorCategory::Connection,
            EtlError::Schema { .. } => ErrorCategory::Schema,
            EtlError::Write { .. } | EtlError::Query { .. } => ErrorCategory::Storage,
            EtlError::CsvError(_)
            | EtlError::IoError(_)
            | EtlError::ZipError(_)
            | EtlError::SourceNotFound { .. } => ErrorCategory::Input,
            EtlError::ValidationError { .. } | EtlError::SerializationError(_) => {
                ErrorCategory::Validation
            }
            EtlError::ConfigError { .. }
            | EtlError::ConfigValidationError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::MissingConfigError { .. } => ErrorCategory::Configuration,
            // root_cause never returns a Pipeline variant
            EtlError::Pipeline { .. } => ErrorCategory::Storage,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Connection => ErrorSeverity::Critical,
            ErrorCategory::Storage => ErrorSeverity::Medium,
            ErrorCategory::Schema | ErrorCategory::Input | ErrorCategory::Validation => {
                ErrorSeverity::High
            }
            ErrorCategory::Configuration => ErrorSeverity::High,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.root_cause() {
            EtlError::Connection { .. } => {
                "Check the [database] settings and that the database path is reachable and writable"
            }
            EtlError::Schema { .. } => {
                "The target table already exists with a different shape; drop it or load into a new table"
            }
            EtlError::Write { .. } => {
                "The failed chunk was rolled back; fix the offending rows and rerun, the table is reused"
            }
            EtlError::Query { .. } => "Check the SQL statement and its parameters",
            EtlError::CsvError(_) => {
                "Check that every row has the same number of fields as the header and the delimiter is right"
            }
            EtlError::SourceNotFound { .. } | EtlError::IoError(_) => {
                "Check the source path and file permissions"
            }
            EtlError::ZipError(_) => "Check that the archive is a valid zip containing a CSV/TSV file",
            EtlError::ValidationError { .. } | EtlError::SerializationError(_) => {
                "Inspect the rejected chunk and adjust the validator or the input data"
            }
            _ => "Review the configuration file and command line flags",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            EtlError::Pipeline { chunk, source } => {
                format!("Ingestion stopped at chunk {}: {}", chunk, source.user_friendly_message())
            }
            EtlError::Connection { .. } => "Could not connect to the database".to_string(),
            EtlError::SourceNotFound { path } => format!("File not found: {}", path),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_chunk_wraps_once() {
        let write = EtlError::Write {
            table: "t".to_string(),
            rows: 3,
            message: "constraint failed".to_string(),
        };
        let wrapped = EtlError::in_chunk(2, write);
        let rewrapped = EtlError::in_chunk(5, wrapped);

        assert_eq!(rewrapped.chunk(), Some(2));
        assert!(matches!(rewrapped.root_cause(), EtlError::Write { rows: 3, .. }));
        assert_eq!(rewrapped.category(), ErrorCategory::Storage);
    }

    #[test]
    fn test_severity_follows_root_cause() {
        let err = EtlError::in_chunk(
            1,
            EtlError::Connection {
                message: "gone".to_string(),
            },
        );
        assert_eq!(err.severity(), ErrorSeverity::Critical);
        assert!(err.user_friendly_message().contains("chunk 1"));
    }
}
