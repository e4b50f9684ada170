use crate::utils::error::{EtlError, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// 單一欄位值
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Text(String),
    Integer(i64),
    Float(f64),
    Timestamp(NaiveDateTime),
    Boolean(bool),
}

/// 值的執行期表示
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Null,
    Text,
    Integer,
    Float,
    Timestamp,
    Boolean,
}

impl Value {
    pub fn text(value: impl Into<String>) -> Self {
        Value::Text(value.into())
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Text(_) => ValueKind::Text,
            Value::Integer(_) => ValueKind::Integer,
            Value::Float(_) => ValueKind::Float,
            Value::Timestamp(_) => ValueKind::Timestamp,
            Value::Boolean(_) => ValueKind::Boolean,
        }
    }

    /// Null 或空白字串
    pub fn is_missing(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Text(s) => write!(f, "{}", s),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S%.f")),
            Value::Boolean(b) => write!(f, "{}", b),
        }
    }
}

pub type Row = Vec<Value>;

/// 以欄位名稱讀取單列的檢視
#[derive(Debug, Clone, Copy)]
pub struct RowView<'a> {
    columns: &'a [String],
    values: &'a [Value],
}

impl<'a> RowView<'a> {
    pub fn get(&self, column: &str) -> Option<&'a Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| &self.values[i])
    }

    pub fn values(&self) -> &'a [Value] {
        self.values
    }
}

/// 一個有界大小的資料區塊：共用欄位順序的多列資料
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Chunk {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Chunk {
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Result<Self> {
        if let Some((index, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != columns.len())
        {
            return Err(EtlError::validation(format!(
                "row {} has {} values but the chunk has {} columns",
                index,
                row.len(),
                columns.len()
            )));
        }
        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let index = self.column_index(column)?;
        self.rows.get(row).map(|r| &r[index])
    }

    pub fn rename_columns<F: FnMut(&str) -> String>(mut self, mut rename: F) -> Self {
        self.columns = self.columns.iter().map(|c| rename(c.as_str())).collect();
        self
    }

    pub fn filter_rows<F: FnMut(RowView<'_>) -> bool>(self, mut keep: F) -> Self {
        let Chunk { columns, rows } = self;
        let rows = rows
            .into_iter()
            .filter(|row| {
                keep(RowView {
                    columns: &columns,
                    values: row,
                })
            })
            .collect();
        Chunk { columns, rows }
    }

    /// 對指定欄位的每個值套用轉換；欄位不存在時原樣返回
    pub fn map_column<F: FnMut(Value) -> Value>(mut self, name: &str, mut f: F) -> Self {
        if let Some(index) = self.column_index(name) {
            for row in &mut self.rows {
                let value = std::mem::replace(&mut row[index], Value::Null);
                row[index] = f(value);
            }
        }
        self
    }
}

/// 目標儲存型別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ColumnType {
    Text,
    Integer,
    Float,
    Timestamp,
    Boolean,
}

impl ColumnType {
    pub fn sql_name(&self) -> &'static str {
        match self {
            ColumnType::Text => "TEXT",
            ColumnType::Integer => "INTEGER",
            ColumnType::Float => "FLOAT",
            ColumnType::Timestamp => "TIMESTAMP",
            ColumnType::Boolean => "BOOLEAN",
        }
    }

    pub fn from_sql_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_uppercase().as_str() {
            "TEXT" => Some(ColumnType::Text),
            "INTEGER" => Some(ColumnType::Integer),
            "FLOAT" => Some(ColumnType::Float),
            "TIMESTAMP" => Some(ColumnType::Timestamp),
            "BOOLEAN" => Some(ColumnType::Boolean),
            _ => None,
        }
    }

    /// 宣告為 `self` 的既有欄位能否存放推斷為 `inferred` 的值
    pub fn accepts(self, inferred: ColumnType) -> bool {
        self == inferred || (self == ColumnType::Float && inferred == ColumnType::Integer)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql_name())
    }
}

/// 欄位名稱到儲存型別的有序對應（保留表頭順序）
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ColumnTypes {
    entries: Vec<(String, ColumnType)>,
    /// 樣本中沒有任何值的欄位
    unconstrained: Vec<String>,
}

impl ColumnTypes {
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入或覆寫欄位型別
    pub fn insert(&mut self, name: impl Into<String>, column_type: ColumnType) {
        let name = name.into();
        self.unconstrained.retain(|n| *n != name);
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = column_type,
            None => self.entries.push((name, column_type)),
        }
    }

    /// 插入沒有樣本值的欄位：新建時為 TEXT，但不與既有資料表的宣告衝突
    pub fn insert_unconstrained(&mut self, name: impl Into<String>) {
        let name = name.into();
        self.insert(name.clone(), ColumnType::Text);
        self.unconstrained.push(name);
    }

    pub fn is_unconstrained(&self, name: &str) -> bool {
        self.unconstrained.iter().any(|n| n == name)
    }

    pub fn get(&self, name: &str) -> Option<ColumnType> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, t)| *t)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, ColumnType)> {
        self.entries.iter().map(|(n, t)| (n.as_str(), *t))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, ColumnType)> for ColumnTypes {
    fn from_iter<I: IntoIterator<Item = (S, ColumnType)>>(iter: I) -> Self {
        let mut types = ColumnTypes::new();
        for (name, column_type) in iter {
            types.insert(name, column_type);
        }
        types
    }
}

/// 執行結果的效能快照；衍生值在讀取時計算
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub elapsed_seconds: f64,
    pub records_processed: u64,
    pub chunks_processed: u64,
    pub records_per_second: f64,
}

impl Metrics {
    pub fn from_counts(elapsed: Duration, records_processed: u64, chunks_processed: u64) -> Self {
        let elapsed_seconds = elapsed.as_secs_f64();
        let records_per_second = if elapsed_seconds > 0.0 {
            records_processed as f64 / elapsed_seconds
        } else {
            0.0
        };
        Self {
            elapsed_seconds,
            records_processed,
            chunks_processed,
            records_per_second,
        }
    }
}

impl fmt::Display for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} records in {} chunks, {:.2}s ({:.2} records/second)",
            self.records_processed,
            self.chunks_processed,
            self.elapsed_seconds,
            self.records_per_second
        )
    }
}
