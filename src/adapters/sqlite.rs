use crate::config::database::DatabaseConfig;
use crate::domain::model::{ColumnType, ColumnTypes, Row, Value};
use crate::domain::ports::StorageGateway;
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{is_valid_identifier, Validate};
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection, OpenFlags};
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// 自動產生的主鍵欄位
pub const PRIMARY_KEY: &str = "id";

/// SQLite 儲存閘道。連線由互斥鎖保護，每個操作只在自身期間持有。
pub struct SqliteGateway {
    conn: Mutex<Connection>,
    database: String,
}

impl SqliteGateway {
    /// 開啟資料庫並執行存活檢查（SELECT 1）
    pub fn connect(config: &DatabaseConfig) -> Result<Self> {
        config.validate()?;

        let ignored = config.server_parameters();
        if !ignored.is_empty() {
            tracing::warn!(
                "Connection parameters not used by the embedded SQLite backend: {}",
                ignored.join(", ")
            );
        }

        let conn = open_connection(config).map_err(|e| {
            tracing::error!("Database connection failed: {}", e);
            EtlError::Connection {
                message: format!("cannot open '{}': {}", config.database, e),
            }
        })?;

        let gateway = Self {
            conn: Mutex::new(conn),
            database: config.database.clone(),
        };
        gateway.ping()?;
        tracing::info!("🔌 Database connection successful ({})", gateway.database);
        Ok(gateway)
    }

    pub fn in_memory() -> Result<Self> {
        Self::connect(&DatabaseConfig::in_memory())
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn ping(&self) -> Result<()> {
        let conn = self.acquire()?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .map_err(|e| {
                tracing::error!("Database connection failed: {}", e);
                EtlError::Connection {
                    message: format!("liveness probe failed: {}", e),
                }
            })?;
        Ok(())
    }

    pub fn row_count(&self, table: &str) -> Result<u64> {
        check_identifier(table).map_err(query_error)?;
        let conn = self.acquire()?;
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(table));
        let count: i64 = conn
            .query_row(&sql, [], |row| row.get(0))
            .map_err(query_error)?;
        Ok(count.max(0) as u64)
    }

    /// 資料表欄位（名稱、宣告型別），不含主鍵；資料表不存在時為空
    pub fn table_columns(&self, table: &str) -> Result<Vec<(String, String)>> {
        check_identifier(table).map_err(query_error)?;
        let conn = self.acquire()?;
        let columns = read_table_columns(&conn, table).map_err(query_error)?;
        Ok(columns)
    }

    /// 執行查詢並取回所有列（檢查匯入結果用）
    pub fn query_rows(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        let conn = self.acquire()?;
        let mut stmt = conn.prepare(sql).map_err(query_error)?;
        let width = stmt.column_count();
        let rows = stmt
            .query_map(params_from_iter(params.iter().map(to_sql_value)), |row| {
                (0..width)
                    .map(|i| row.get_ref(i).map(from_sql_value))
                    .collect::<rusqlite::Result<Row>>()
            })
            .map_err(query_error)?
            .collect::<rusqlite::Result<Vec<Row>>>()
            .map_err(query_error)?;
        Ok(rows)
    }

    fn acquire(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| EtlError::Connection {
            message: "connection lock poisoned by a panicked operation".to_string(),
        })
    }
}

impl StorageGateway for SqliteGateway {
    fn create_table(&self, table: &str, columns: &ColumnTypes) -> Result<()> {
        let schema_error = |message: String| EtlError::Schema {
            table: table.to_string(),
            message,
        };

        check_schema(table, columns).map_err(schema_error)?;

        let conn = self.acquire()?;
        let existing = read_table_columns(&conn, table).map_err(|e| schema_error(e.to_string()))?;

        if !existing.is_empty() {
            for (name, column_type) in columns.iter() {
                match existing.iter().find(|(n, _)| n.eq_ignore_ascii_case(name)) {
                    None => {
                        return Err(schema_error(format!(
                            "existing table has no column '{}'",
                            name
                        )))
                    }
                    Some((_, declared))
                        if !columns.is_unconstrained(name) && !declared_accepts(declared, column_type) =>
                    {
                        return Err(schema_error(format!(
                            "column '{}' is {} in the existing table but {} was inferred",
                            name, declared, column_type
                        )))
                    }
                    Some(_) => {}
                }
            }
            tracing::info!("📋 Table '{}' created or already exists", table);
            return Ok(());
        }

        let definitions = columns
            .iter()
            .map(|(name, column_type)| format!("{} {}", quote_ident(name), column_type.sql_name()))
            .collect::<Vec<_>>()
            .join(", ");
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {} ({} INTEGER PRIMARY KEY AUTOINCREMENT, {})",
            quote_ident(table),
            PRIMARY_KEY,
            definitions
        );
        tracing::debug!("{}", ddl);

        conn.execute_batch(&ddl).map_err(|e| {
            tracing::error!("Error creating table: {}", e);
            schema_error(e.to_string())
        })?;
        tracing::info!("📋 Table '{}' created or already exists", table);
        Ok(())
    }

    fn bulk_insert(&self, table: &str, rows: &[Row], columns: &[String]) -> Result<()> {
        if rows.is_empty() {
            tracing::warn!("No data to insert into '{}'", table);
            return Ok(());
        }

        let write_error = |message: String| EtlError::Write {
            table: table.to_string(),
            rows: rows.len(),
            message,
        };

        check_identifier(table).map_err(write_error)?;
        for column in columns {
            check_identifier(column).map_err(write_error)?;
        }

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(table),
            columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", "),
            (1..=columns.len())
                .map(|i| format!("?{}", i))
                .collect::<Vec<_>>()
                .join(", ")
        );

        let mut conn = self.acquire()?;
        match insert_rows(&mut conn, &sql, rows, columns.len()) {
            Ok(()) => {
                tracing::info!("💾 Inserted {} rows into '{}'", rows.len(), table);
                Ok(())
            }
            Err(e) => {
                tracing::error!("Error inserting data, transaction rolled back: {}", e);
                Err(write_error(e.to_string()))
            }
        }
    }

    fn execute_query(&self, sql: &str, params: &[Value]) -> Result<()> {
        let conn = self.acquire()?;
        run_statement(&conn, sql, params).map_err(|e| {
            tracing::error!("Error executing query: {}", e);
            query_error(e)
        })?;
        tracing::info!("Query executed successfully");
        Ok(())
    }
}

fn open_connection(config: &DatabaseConfig) -> rusqlite::Result<Connection> {
    let conn = if config.is_in_memory() {
        Connection::open_in_memory()?
    } else {
        let mut flags = OpenFlags::default();
        if !config.create_if_missing {
            flags.remove(OpenFlags::SQLITE_OPEN_CREATE);
        }
        Connection::open_with_flags(&config.database, flags)?
    };
    conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
    Ok(conn)
}

/// 執行單一語句並讀完結果列（SELECT、PRAGMA 也可執行）；自動提交
fn run_statement(conn: &Connection, sql: &str, params: &[Value]) -> rusqlite::Result<()> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params_from_iter(params.iter().map(to_sql_value)))?;
    while rows.next()?.is_some() {}
    Ok(())
}

/// 單一交易內插入；提前返回時交易在 drop 時回滾
fn insert_rows(conn: &mut Connection, sql: &str, rows: &[Row], width: usize) -> rusqlite::Result<()> {
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare(sql)?;
        for row in rows {
            if row.len() != width {
                return Err(rusqlite::Error::InvalidParameterCount(row.len(), width));
            }
            stmt.execute(params_from_iter(row.iter().map(to_sql_value)))?;
        }
    }
    tx.commit()
}

fn read_table_columns(conn: &Connection, table: &str) -> rusqlite::Result<Vec<(String, String)>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote_ident(table)))?;
    let columns = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(5)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(columns
        .into_iter()
        .filter(|(_, _, pk)| *pk == 0)
        .map(|(name, declared, _)| (name, declared))
        .collect())
}

fn declared_accepts(declared: &str, inferred: ColumnType) -> bool {
    ColumnType::from_sql_name(declared)
        .map(|declared| declared.accepts(inferred))
        .unwrap_or(false)
}

fn check_identifier(name: &str) -> std::result::Result<(), String> {
    if is_valid_identifier(name) {
        Ok(())
    } else {
        Err(format!("'{}' is not a valid SQL identifier", name))
    }
}

fn check_schema(table: &str, columns: &ColumnTypes) -> std::result::Result<(), String> {
    check_identifier(table)?;
    if columns.is_empty() {
        return Err("no columns to create".to_string());
    }
    let mut seen = HashSet::new();
    for name in columns.names() {
        check_identifier(name)?;
        if name.eq_ignore_ascii_case(PRIMARY_KEY) {
            return Err(format!(
                "column '{}' collides with the generated primary key",
                name
            ));
        }
        if !seen.insert(name.to_ascii_lowercase()) {
            return Err(format!("duplicate column '{}'", name));
        }
    }
    Ok(())
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn query_error(e: impl std::fmt::Display) -> EtlError {
    EtlError::Query {
        message: e.to_string(),
    }
}

fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Text(s) => SqlValue::Text(s.clone()),
        Value::Integer(i) => SqlValue::Integer(*i),
        Value::Float(f) => SqlValue::Real(*f),
        Value::Timestamp(ts) => SqlValue::Text(ts.format("%Y-%m-%d %H:%M:%S%.f").to_string()),
        Value::Boolean(b) => SqlValue::Integer(i64::from(*b)),
    }
}

fn from_sql_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Value::Text(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}
