pub mod etl;
pub mod inference;
pub mod pipeline;
pub mod reader;
pub mod validator;

pub use crate::domain::model::{Chunk, ColumnTypes, Metrics, Row, Value};
pub use crate::domain::ports::StorageGateway;
pub use crate::utils::error::Result;
