use crate::domain::model::{Chunk, Row, Value};
use crate::utils::error::{EtlError, Result};
use csv::{ReaderBuilder, StringRecord};
use std::io::Read;
use std::path::Path;

pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// 視為缺值的字串（與常見 CSV 工具一致）
const MISSING_MARKERS: &[&str] = &[
    "", "NA", "N/A", "n/a", "NULL", "null", "NaN", "nan", "-NaN", "None", "#N/A",
];

/// 依副檔名決定分隔符號：.tsv/.tab 為 tab，其餘為逗號
pub fn delimiter_for(path: &Path) -> u8 {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .as_deref()
    {
        Some("tsv") | Some("tab") => b'\t',
        _ => b',',
    }
}

/// 以固定列數分批讀取分隔檔，每批各自依欄位解析型別
pub struct ChunkReader<R: Read> {
    reader: csv::Reader<R>,
    columns: Vec<String>,
    chunk_size: usize,
    record: StringRecord,
    finished: bool,
}

impl<R: Read> ChunkReader<R> {
    pub fn new(source: R, delimiter: u8, chunk_size: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(EtlError::InvalidConfigValueError {
                field: "chunk_size".to_string(),
                value: chunk_size.to_string(),
                reason: "Chunk size must be at least 1".to_string(),
            });
        }

        let mut reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(false)
            .from_reader(source);

        let columns: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
        if columns.is_empty() {
            return Err(EtlError::validation("source has no header row"));
        }

        Ok(Self {
            reader,
            columns,
            chunk_size,
            record: StringRecord::new(),
            finished: false,
        })
    }

    fn read_chunk(&mut self) -> Result<Option<Chunk>> {
        let mut raw: Vec<StringRecord> = Vec::with_capacity(self.chunk_size.min(4096));
        while raw.len() < self.chunk_size {
            if !self.reader.read_record(&mut self.record)? {
                self.finished = true;
                break;
            }
            raw.push(self.record.clone());
        }

        if raw.is_empty() {
            return Ok(None);
        }

        let rows = type_columns(self.columns.len(), &raw);
        Chunk::new(self.columns.clone(), rows).map(Some)
    }
}

impl<R: Read> Iterator for ChunkReader<R> {
    type Item = Result<Chunk>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.read_chunk() {
            Ok(Some(chunk)) => Some(Ok(chunk)),
            Ok(None) => None,
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellType {
    Boolean,
    Integer,
    Float,
    Text,
}

fn is_missing(cell: &str) -> bool {
    MISSING_MARKERS.contains(&cell)
}

fn parse_bool(cell: &str) -> Option<bool> {
    if cell.eq_ignore_ascii_case("true") {
        Some(true)
    } else if cell.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// 找出能容納欄位內所有非缺值的最窄型別
fn column_type(raw: &[StringRecord], index: usize) -> CellType {
    let cells = || {
        raw.iter()
            .filter_map(move |record| record.get(index))
            .map(str::trim)
            .filter(|cell| !is_missing(cell))
    };

    if cells().next().is_none() {
        return CellType::Text;
    }
    if cells().all(|c| parse_bool(c).is_some()) {
        CellType::Boolean
    } else if cells().all(|c| c.parse::<i64>().is_ok()) {
        CellType::Integer
    } else if cells().all(|c| c.parse::<f64>().is_ok()) {
        CellType::Float
    } else {
        CellType::Text
    }
}

/// 只在判斷缺值與解析型別時去除空白；文字值原樣保留
fn convert(cell: &str, cell_type: CellType) -> Value {
    let trimmed = cell.trim();
    if is_missing(trimmed) {
        return Value::Null;
    }
    let typed = match cell_type {
        CellType::Boolean => parse_bool(trimmed).map(Value::Boolean),
        CellType::Integer => trimmed.parse().ok().map(Value::Integer),
        CellType::Float => trimmed.parse().ok().map(Value::Float),
        CellType::Text => None,
    };
    typed.unwrap_or_else(|| Value::text(cell))
}

fn type_columns(width: usize, raw: &[StringRecord]) -> Vec<Row> {
    let types: Vec<CellType> = (0..width).map(|index| column_type(raw, index)).collect();
    raw.iter()
        .map(|record| {
            types
                .iter()
                .enumerate()
                .map(|(index, cell_type)| convert(record.get(index).unwrap_or(""), *cell_type))
                .collect()
        })
        .collect()
}
