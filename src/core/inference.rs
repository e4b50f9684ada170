use crate::domain::model::{Chunk, ColumnType, ColumnTypes, Value, ValueKind};

/// 欄位的執行期表示（只看非缺值）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Representation {
    /// 全部都是缺值
    Empty,
    Uniform(ValueKind),
    /// 整數與浮點數混合
    Numeric,
    Mixed,
}

impl Representation {
    pub fn of<'a, I: IntoIterator<Item = &'a Value>>(values: I) -> Self {
        values
            .into_iter()
            .filter(|v| !v.is_missing())
            .fold(Representation::Empty, |repr, value| repr.merge(value.kind()))
    }

    fn merge(self, kind: ValueKind) -> Self {
        use Representation::*;
        match (self, kind) {
            (Empty, k) => Uniform(k),
            (Uniform(a), b) if a == b => Uniform(a),
            (Uniform(ValueKind::Integer), ValueKind::Float)
            | (Uniform(ValueKind::Float), ValueKind::Integer)
            | (Numeric, ValueKind::Integer)
            | (Numeric, ValueKind::Float) => Numeric,
            _ => Mixed,
        }
    }
}

/// 固定且完整的對照表，無法辨識的表示一律對應 TEXT
pub fn storage_type(repr: Representation) -> ColumnType {
    match repr {
        Representation::Uniform(ValueKind::Text) => ColumnType::Text,
        Representation::Uniform(ValueKind::Integer) => ColumnType::Integer,
        Representation::Uniform(ValueKind::Float) | Representation::Numeric => ColumnType::Float,
        Representation::Uniform(ValueKind::Timestamp) => ColumnType::Timestamp,
        Representation::Uniform(ValueKind::Boolean) => ColumnType::Boolean,
        Representation::Uniform(ValueKind::Null) | Representation::Empty | Representation::Mixed => {
            ColumnType::Text
        }
    }
}

/// Derives the column → storage type mapping from a single chunk.
///
/// Only the chunk handed in is inspected (the pipeline passes the first one), so a
/// column that changes shape further down the file keeps the type chosen here and
/// it is up to the store to coerce or reject later values. Columns with no values
/// at all are marked unconstrained: they default to TEXT on a new table but never
/// conflict with an existing one.
pub fn infer_types(chunk: &Chunk) -> ColumnTypes {
    let mut types = ColumnTypes::new();
    for (index, name) in chunk.columns().iter().enumerate() {
        match Representation::of(chunk.rows().iter().map(|row| &row[index])) {
            Representation::Empty => types.insert_unconstrained(name.clone()),
            repr => types.insert(name.clone(), storage_type(repr)),
        }
    }
    types
}
