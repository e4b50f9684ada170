use crate::core::inference::Representation;
use crate::domain::model::{Chunk, Value, ValueKind};
use crate::utils::error::Result;
use chrono::{DateTime, NaiveDate, NaiveDateTime};

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

/// 可插拔的區塊驗證策略。提供自訂驗證器時完全取代預設驗證。
pub trait RowValidator {
    fn validate(&self, chunk: Chunk) -> Result<Chunk>;
}

impl<F> RowValidator for F
where
    F: Fn(Chunk) -> Result<Chunk>,
{
    fn validate(&self, chunk: Chunk) -> Result<Chunk> {
        self(chunk)
    }
}

/// 預設驗證：移除全空列，並盡力將文字欄位轉為時間戳
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultValidator;

impl RowValidator for DefaultValidator {
    fn validate(&self, chunk: Chunk) -> Result<Chunk> {
        let before = chunk.len();
        let chunk = drop_empty_rows(chunk);
        if chunk.len() < before {
            tracing::debug!("🧹 Dropped {} all-empty rows", before - chunk.len());
        }
        Ok(coerce_timestamps(chunk))
    }
}

pub fn drop_empty_rows(chunk: Chunk) -> Chunk {
    chunk.filter_rows(|row| !row.values().iter().all(Value::is_missing))
}

/// 對每個純文字欄位嘗試解析日期時間；任何一個值解析失敗則整欄保持原樣
pub fn coerce_timestamps(mut chunk: Chunk) -> Chunk {
    let columns = chunk.columns().to_vec();
    for (index, name) in columns.iter().enumerate() {
        let repr = Representation::of(chunk.rows().iter().map(|row| &row[index]));
        if repr != Representation::Uniform(ValueKind::Text) {
            continue;
        }

        let parseable = chunk.rows().iter().all(|row| match &row[index] {
            Value::Text(s) if !s.trim().is_empty() => parse_datetime(s).is_some(),
            _ => true,
        });
        if !parseable {
            continue;
        }

        tracing::debug!("🕒 Coercing column '{}' to timestamps", name);
        chunk = chunk.map_column(name, |value| match value {
            Value::Text(s) if s.trim().is_empty() => Value::Null,
            Value::Text(s) => parse_datetime(&s).map(Value::Timestamp).unwrap_or(Value::Text(s)),
            other => other,
        });
    }
    chunk
}

pub fn parse_datetime(input: &str) -> Option<NaiveDateTime> {
    let input = input.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.naive_utc());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(input, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(input, fmt).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

/// "Employee ID" -> "employee_id"
pub fn normalize_column_name(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "_")
}

/// 空白表頭依位置命名為 `unnamed_<index>`（從 0 起算）
pub fn normalize_columns(chunk: Chunk) -> Chunk {
    let mut position = 0;
    chunk.rename_columns(|name| {
        let index = position;
        position += 1;
        match normalize_column_name(name) {
            normalized if normalized.is_empty() => format!("unnamed_{}", index),
            normalized => normalized,
        }
    })
}
