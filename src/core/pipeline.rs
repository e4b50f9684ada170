use crate::core::inference::infer_types;
use crate::core::reader::{delimiter_for, ChunkReader, DEFAULT_CHUNK_SIZE};
use crate::core::validator::{normalize_columns, DefaultValidator, RowValidator};
use crate::domain::model::{Chunk, Metrics};
use crate::domain::ports::StorageGateway;
use crate::utils::error::{EtlError, Result};
use crate::utils::monitor::PerformanceMonitor;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

const ARCHIVE_ENTRY_EXTENSIONS: &[&str] = &["csv", "tsv", "tab", "txt"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    SchemaPending,
    Streaming,
    Completed,
    Failed,
}

/// 單次匯入的選項
pub struct IngestOptions<'a> {
    pub chunk_size: usize,
    /// 未指定時依副檔名決定
    pub delimiter: Option<u8>,
    pub validator: Option<&'a dyn RowValidator>,
    pub monitor: Option<&'a mut PerformanceMonitor>,
}

impl<'a> IngestOptions<'a> {
    pub fn new() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            delimiter: None,
            validator: None,
            monitor: None,
        }
    }

    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = Some(delimiter);
        self
    }

    pub fn validator(mut self, validator: &'a dyn RowValidator) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn monitor(mut self, monitor: &'a mut PerformanceMonitor) -> Self {
        self.monitor = Some(monitor);
        self
    }
}

impl Default for IngestOptions<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// Streams a delimited source into one table through a [`StorageGateway`].
///
/// The table is created from the types inferred on the first chunk, exactly once
/// per run; every chunk is then validated and inserted in its own transaction.
/// Any failure aborts the run. Chunks inserted before the failure stay committed.
pub struct IngestionPipeline<G: StorageGateway> {
    gateway: G,
    table_created: bool,
    state: PipelineState,
}

impl<G: StorageGateway> IngestionPipeline<G> {
    pub fn new(gateway: G) -> Self {
        Self {
            gateway,
            table_created: false,
            state: PipelineState::Idle,
        }
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn table_created(&self) -> bool {
        self.table_created
    }

    /// 從檔案匯入；.zip 會串流讀取其中第一個表格檔
    pub fn process_source<P: AsRef<Path>>(
        &mut self,
        path: P,
        table: &str,
        options: IngestOptions<'_>,
    ) -> Result<Metrics> {
        let path = path.as_ref();
        self.table_created = false;
        self.state = PipelineState::SchemaPending;
        tracing::info!(
            "🚀 Starting import from {} to table '{}'",
            path.display(),
            table
        );

        let file = File::open(path).map_err(|e| self.fail(EtlError::IoError(e)))?;
        let is_zip = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("zip"))
            .unwrap_or(false);

        if !is_zip {
            let options = IngestOptions {
                delimiter: Some(options.delimiter.unwrap_or_else(|| delimiter_for(path))),
                ..options
            };
            return self.process_reader(BufReader::new(file), table, options);
        }

        let mut archive =
            zip::ZipArchive::new(BufReader::new(file)).map_err(|e| self.fail(e.into()))?;
        let (index, entry_name) = match find_tabular_entry(&mut archive) {
            Ok(found) => found,
            Err(e) => return Err(self.fail(e)),
        };
        tracing::info!("📦 Reading '{}' from archive", entry_name);

        let entry = archive.by_index(index).map_err(|e| self.fail(e.into()))?;
        let options = IngestOptions {
            delimiter: Some(
                options
                    .delimiter
                    .unwrap_or_else(|| delimiter_for(Path::new(&entry_name))),
            ),
            ..options
        };
        self.process_reader(entry, table, options)
    }

    /// 從任意 reader 匯入（需含表頭列）
    pub fn process_reader<R: Read>(
        &mut self,
        source: R,
        table: &str,
        options: IngestOptions<'_>,
    ) -> Result<Metrics> {
        self.table_created = false;
        self.state = PipelineState::SchemaPending;

        let IngestOptions {
            chunk_size,
            delimiter,
            validator,
            monitor,
        } = options;

        let mut own_monitor;
        let monitor = match monitor {
            Some(monitor) => monitor,
            None => {
                own_monitor = PerformanceMonitor::new();
                &mut own_monitor
            }
        };
        let validator: &dyn RowValidator = validator.unwrap_or(&DefaultValidator);

        let reader = ChunkReader::new(source, delimiter.unwrap_or(b','), chunk_size)
            .map_err(|e| self.fail(e))?;

        for (i, chunk) in reader.enumerate() {
            let number = i + 1;
            tracing::info!("📥 Processing chunk {}...", number);

            let outcome = match chunk {
                Ok(chunk) => self.process_chunk(chunk, table, validator, monitor),
                Err(e) => Err(e),
            };
            if let Err(e) = outcome {
                let e = EtlError::in_chunk(number, e);
                tracing::error!("❌ Error processing source: {}", e);
                return Err(self.fail(e));
            }
        }

        self.state = PipelineState::Completed;
        let metrics = monitor.metrics();
        if metrics.chunks_processed == 0 {
            tracing::warn!("⚠️ Source had no data rows, table '{}' was not created", table);
        }
        tracing::info!(
            "✅ Import completed in {:.2} seconds. Processed {} records at {:.2} records/second.",
            metrics.elapsed_seconds,
            metrics.records_processed,
            metrics.records_per_second
        );
        Ok(metrics)
    }

    fn process_chunk(
        &mut self,
        chunk: Chunk,
        table: &str,
        validator: &dyn RowValidator,
        monitor: &mut PerformanceMonitor,
    ) -> Result<()> {
        let chunk = normalize_columns(chunk);

        if !self.table_created {
            let column_types = infer_types(&chunk);
            tracing::debug!("🔎 Inferred column types: {:?}", column_types);
            self.gateway.create_table(table, &column_types)?;
            self.table_created = true;
            self.state = PipelineState::Streaming;
        }

        let chunk = validator.validate(chunk)?;
        self.gateway.bulk_insert(table, chunk.rows(), chunk.columns())?;
        monitor.update(chunk.len());
        Ok(())
    }

    fn fail(&mut self, error: EtlError) -> EtlError {
        self.state = PipelineState::Failed;
        error
    }
}

fn find_tabular_entry<R: Read + std::io::Seek>(
    archive: &mut zip::ZipArchive<R>,
) -> Result<(usize, String)> {
    for index in 0..archive.len() {
        let entry = archive.by_index(index)?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        let tabular = Path::new(&name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                ARCHIVE_ENTRY_EXTENSIONS
                    .iter()
                    .any(|allowed| ext.eq_ignore_ascii_case(allowed))
            })
            .unwrap_or(false);
        if tabular {
            return Ok((index, name));
        }
    }
    Err(EtlError::validation(
        "archive contains no .csv, .tsv, .tab or .txt entry",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{ColumnType, ColumnTypes, Row, Value};
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        CreateTable(String, ColumnTypes),
        BulkInsert(String, Vec<String>, usize),
    }

    /// 記錄呼叫的閘道；可設定在第 N 次插入時失敗
    #[derive(Default)]
    struct RecordingGateway {
        calls: Mutex<Vec<Call>>,
        fail_on_insert: Option<usize>,
    }

    impl RecordingGateway {
        fn failing_on(insert: usize) -> Self {
            Self {
                fail_on_insert: Some(insert),
                ..Self::default()
            }
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn create_calls(&self) -> usize {
            self.calls()
                .iter()
                .filter(|c| matches!(c, Call::CreateTable(..)))
                .count()
        }

        fn insert_calls(&self) -> usize {
            self.calls()
                .iter()
                .filter(|c| matches!(c, Call::BulkInsert(..)))
                .count()
        }
    }

    impl StorageGateway for RecordingGateway {
        fn create_table(&self, table: &str, columns: &ColumnTypes) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::CreateTable(table.to_string(), columns.clone()));
            Ok(())
        }

        fn bulk_insert(&self, table: &str, rows: &[Row], columns: &[String]) -> Result<()> {
            let inserts = self.insert_calls();
            if self.fail_on_insert == Some(inserts + 1) {
                return Err(EtlError::Write {
                    table: table.to_string(),
                    rows: rows.len(),
                    message: "connection lost".to_string(),
                });
            }
            self.calls.lock().unwrap().push(Call::BulkInsert(
                table.to_string(),
                columns.to_vec(),
                rows.len(),
            ));
            Ok(())
        }

        fn execute_query(&self, _sql: &str, _params: &[Value]) -> Result<()> {
            Ok(())
        }
    }

    const THREE_CHUNKS: &str = "Name,Age\nJohn,30\nJane,25\nJim,41\nJoan,38\nJack,52\n";

    #[test]
    fn test_create_table_called_once_per_run() {
        let mut pipeline = IngestionPipeline::new(RecordingGateway::default());

        let metrics = pipeline
            .process_reader(
                THREE_CHUNKS.as_bytes(),
                "people",
                IngestOptions::new().chunk_size(2),
            )
            .unwrap();

        assert_eq!(pipeline.gateway().create_calls(), 1);
        assert_eq!(pipeline.gateway().insert_calls(), 3);
        assert_eq!(metrics.records_processed, 5);
        assert_eq!(metrics.chunks_processed, 3);
        assert!(pipeline.table_created());
        assert_eq!(pipeline.state(), PipelineState::Completed);
    }

    #[test]
    fn test_columns_normalized_before_inference_and_insert() {
        let mut pipeline = IngestionPipeline::new(RecordingGateway::default());
        let data = "Employee ID,First Name\n1,Ann\n";

        pipeline
            .process_reader(data.as_bytes(), "employees", IngestOptions::new())
            .unwrap();

        let calls = pipeline.gateway().calls();
        let expected: ColumnTypes = vec![
            ("employee_id", ColumnType::Integer),
            ("first_name", ColumnType::Text),
        ]
        .into_iter()
        .collect();
        assert_eq!(calls[0], Call::CreateTable("employees".to_string(), expected));
        assert_eq!(
            calls[1],
            Call::BulkInsert(
                "employees".to_string(),
                vec!["employee_id".to_string(), "first_name".to_string()],
                1
            )
        );
    }

    #[test]
    fn test_schema_comes_from_first_chunk_only() {
        let mut pipeline = IngestionPipeline::new(RecordingGateway::default());
        let data = "v\n1\n2\nx\n";

        pipeline
            .process_reader(data.as_bytes(), "t", IngestOptions::new().chunk_size(2))
            .unwrap();

        match &pipeline.gateway().calls()[0] {
            Call::CreateTable(_, types) => assert_eq!(types.get("v"), Some(ColumnType::Integer)),
            other => panic!("unexpected first call: {:?}", other),
        }
    }

    #[test]
    fn test_failure_on_chunk_is_wrapped_with_context() {
        let mut pipeline = IngestionPipeline::new(RecordingGateway::failing_on(2));

        let err = pipeline
            .process_reader(
                THREE_CHUNKS.as_bytes(),
                "people",
                IngestOptions::new().chunk_size(2),
            )
            .unwrap_err();

        assert_eq!(err.chunk(), Some(2));
        assert!(matches!(err.root_cause(), EtlError::Write { .. }));
        assert_eq!(pipeline.gateway().insert_calls(), 1);
        assert_eq!(pipeline.state(), PipelineState::Failed);
    }

    #[test]
    fn test_custom_validator_replaces_default() {
        let mut pipeline = IngestionPipeline::new(RecordingGateway::default());
        let adults_only = |chunk: Chunk| -> Result<Chunk> {
            Ok(chunk.filter_rows(|row| row.get("age").and_then(Value::as_i64).unwrap_or(0) >= 40))
        };
        let mut monitor = PerformanceMonitor::new();

        pipeline
            .process_reader(
                THREE_CHUNKS.as_bytes(),
                "people",
                IngestOptions::new()
                    .chunk_size(2)
                    .validator(&adults_only)
                    .monitor(&mut monitor),
            )
            .unwrap();

        assert_eq!(monitor.records_processed(), 2);
        assert_eq!(monitor.chunks_processed(), 3);
    }

    #[test]
    fn test_validator_rejection_aborts_run() {
        let mut pipeline = IngestionPipeline::new(RecordingGateway::default());
        let reject = |_chunk: Chunk| -> Result<Chunk> { Err(EtlError::validation("no thanks")) };

        let err = pipeline
            .process_reader(
                THREE_CHUNKS.as_bytes(),
                "people",
                IngestOptions::new().validator(&reject),
            )
            .unwrap_err();

        assert_eq!(err.chunk(), Some(1));
        assert!(matches!(err.root_cause(), EtlError::ValidationError { .. }));
        // 表在驗證前已建立
        assert_eq!(pipeline.gateway().create_calls(), 1);
        assert_eq!(pipeline.gateway().insert_calls(), 0);
    }

    #[test]
    fn test_reused_pipeline_creates_table_again() {
        let mut pipeline = IngestionPipeline::new(RecordingGateway::default());

        for _ in 0..2 {
            pipeline
                .process_reader(THREE_CHUNKS.as_bytes(), "people", IngestOptions::new())
                .unwrap();
        }

        assert_eq!(pipeline.gateway().create_calls(), 2);
    }

    #[test]
    fn test_empty_source_creates_nothing() {
        let mut pipeline = IngestionPipeline::new(RecordingGateway::default());

        let metrics = pipeline
            .process_reader("a,b\n".as_bytes(), "t", IngestOptions::new())
            .unwrap();

        assert_eq!(metrics.chunks_processed, 0);
        assert_eq!(metrics.records_per_second, 0.0);
        assert!(pipeline.gateway().calls().is_empty());
        assert!(!pipeline.table_created());
    }

    #[test]
    fn test_missing_file_fails_unwrapped() {
        let mut pipeline = IngestionPipeline::new(RecordingGateway::default());

        let err = pipeline
            .process_source("/definitely/not/here.csv", "t", IngestOptions::new())
            .unwrap_err();

        assert!(matches!(err, EtlError::IoError(_)));
        assert_eq!(pipeline.state(), PipelineState::Failed);
    }
}
