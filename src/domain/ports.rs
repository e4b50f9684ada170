use crate::domain::model::{ColumnTypes, Row, Value};
use crate::utils::error::Result;
use std::sync::Arc;

/// 目標資料庫的閘道。每個操作都是獨立的原子操作，失敗時先回滾再回傳錯誤。
pub trait StorageGateway: Send + Sync {
    /// 建立資料表（已存在時略過），自動產生主鍵 `id`
    fn create_table(&self, table: &str, columns: &ColumnTypes) -> Result<()>;

    /// 在單一交易中插入所有列；空列表為不報錯的 no-op
    fn bulk_insert(&self, table: &str, rows: &[Row], columns: &[String]) -> Result<()>;

    /// 執行並提交單一 SQL 語句
    fn execute_query(&self, sql: &str, params: &[Value]) -> Result<()>;
}

impl<G: StorageGateway + ?Sized> StorageGateway for Arc<G> {
    fn create_table(&self, table: &str, columns: &ColumnTypes) -> Result<()> {
        (**self).create_table(table, columns)
    }

    fn bulk_insert(&self, table: &str, rows: &[Row], columns: &[String]) -> Result<()> {
        (**self).bulk_insert(table, rows, columns)
    }

    fn execute_query(&self, sql: &str, params: &[Value]) -> Result<()> {
        (**self).execute_query(sql, params)
    }
}

impl<G: StorageGateway + ?Sized> StorageGateway for &G {
    fn create_table(&self, table: &str, columns: &ColumnTypes) -> Result<()> {
        (**self).create_table(table, columns)
    }

    fn bulk_insert(&self, table: &str, rows: &[Row], columns: &[String]) -> Result<()> {
        (**self).bulk_insert(table, rows, columns)
    }

    fn execute_query(&self, sql: &str, params: &[Value]) -> Result<()> {
        (**self).execute_query(sql, params)
    }
}
