use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{validate_non_empty_string, validate_path, Validate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

fn default_database() -> String {
    "ingest.db".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_true() -> bool {
    true
}

/// 資料庫連線參數
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// 資料庫檔案路徑，或 `:memory:`
    #[serde(default = "default_database")]
    pub database: String,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    #[serde(default = "default_true")]
    pub create_if_missing: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            database: default_database(),
            host: None,
            port: None,
            user: None,
            password: None,
            busy_timeout_ms: default_busy_timeout_ms(),
            create_if_missing: true,
        }
    }
}

impl DatabaseConfig {
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            ..Self::default()
        }
    }

    pub fn in_memory() -> Self {
        Self::new(":memory:")
    }

    /// 從扁平的 key/value 對應建立（host, port, database, user, password, ...）
    pub fn from_map(params: &HashMap<String, String>) -> Result<Self> {
        let mut config = Self::default();
        for (key, value) in params {
            match key.as_str() {
                "database" | "dbname" => config.database = value.clone(),
                "host" => config.host = Some(value.clone()),
                "port" => {
                    config.port = Some(value.parse().map_err(|_| {
                        EtlError::InvalidConfigValueError {
                            field: "port".to_string(),
                            value: value.clone(),
                            reason: "Port must be a number between 0 and 65535".to_string(),
                        }
                    })?)
                }
                "user" => config.user = Some(value.clone()),
                "password" => config.password = Some(value.clone()),
                "busy_timeout_ms" => {
                    config.busy_timeout_ms =
                        value.parse().map_err(|_| EtlError::InvalidConfigValueError {
                            field: "busy_timeout_ms".to_string(),
                            value: value.clone(),
                            reason: "Timeout must be a whole number of milliseconds".to_string(),
                        })?
                }
                "create_if_missing" => {
                    config.create_if_missing =
                        value.parse().map_err(|_| EtlError::InvalidConfigValueError {
                            field: "create_if_missing".to_string(),
                            value: value.clone(),
                            reason: "Expected true or false".to_string(),
                        })?
                }
                other => tracing::warn!("Ignoring unknown connection parameter '{}'", other),
            }
        }
        config.validate()?;
        Ok(config)
    }

    pub fn is_in_memory(&self) -> bool {
        self.database == ":memory:"
    }

    /// 伺服器型參數（嵌入式後端不使用）
    pub fn server_parameters(&self) -> Vec<&'static str> {
        let mut set = Vec::new();
        if self.host.is_some() {
            set.push("host");
        }
        if self.port.is_some() {
            set.push("port");
        }
        if self.user.is_some() {
            set.push("user");
        }
        if self.password.is_some() {
            set.push("password");
        }
        set
    }
}

impl Validate for DatabaseConfig {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("database.database", &self.database)?;
        if !self.is_in_memory() {
            validate_path("database.database", &self.database)?;
        }
        Ok(())
    }
}
