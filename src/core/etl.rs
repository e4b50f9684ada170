use crate::core::pipeline::{IngestOptions, IngestionPipeline};
use crate::domain::model::Metrics;
use crate::domain::ports::StorageGateway;
use crate::utils::error::{EtlError, Result};
use crate::utils::monitor::{PerformanceMonitor, SystemMonitor};
use std::path::PathBuf;

/// 一個待匯入的來源檔與目標資料表
#[derive(Debug, Clone, PartialEq)]
pub struct IngestJob {
    pub source: PathBuf,
    pub table: String,
    pub chunk_size: usize,
    pub delimiter: Option<u8>,
}

#[derive(Debug, Clone)]
pub struct JobReport {
    pub job: IngestJob,
    pub metrics: Metrics,
}

/// 依序執行匯入工作，所有工作共用同一個 pipeline 與閘道
pub struct IngestEngine<G: StorageGateway> {
    pipeline: IngestionPipeline<G>,
    system_monitor: SystemMonitor,
}

impl<G: StorageGateway> IngestEngine<G> {
    pub fn new(pipeline: IngestionPipeline<G>) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: IngestionPipeline<G>, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            system_monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    pub fn pipeline(&self) -> &IngestionPipeline<G> {
        &self.pipeline
    }

    pub fn run(&mut self, job: &IngestJob) -> Result<Metrics> {
        if !job.source.is_file() {
            tracing::error!("File not found: {}", job.source.display());
            return Err(EtlError::SourceNotFound {
                path: job.source.display().to_string(),
            });
        }

        self.system_monitor.log_stats(&format!("Before '{}'", job.table));

        let mut options = IngestOptions::new().chunk_size(job.chunk_size);
        if let Some(delimiter) = job.delimiter {
            options = options.delimiter(delimiter);
        }
        // 緊接在執行前建立，讓經過時間只涵蓋這次匯入
        let mut monitor = PerformanceMonitor::new();
        let result = self
            .pipeline
            .process_source(&job.source, &job.table, options.monitor(&mut monitor));

        self.system_monitor.log_stats(&format!("After '{}'", job.table));
        result
    }

    /// 遇到第一個失敗即停止；不回傳部分結果
    pub fn run_all(&mut self, jobs: &[IngestJob]) -> Result<Vec<JobReport>> {
        let mut reports = Vec::with_capacity(jobs.len());
        for (i, job) in jobs.iter().enumerate() {
            tracing::info!(
                "▶️ Job {}/{}: {} -> {}",
                i + 1,
                jobs.len(),
                job.source.display(),
                job.table
            );
            let metrics = self.run(job)?;
            reports.push(JobReport {
                job: job.clone(),
                metrics,
            });
        }
        Ok(reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::SqliteGateway;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    fn job(source: PathBuf, table: &str) -> IngestJob {
        IngestJob {
            source,
            table: table.to_string(),
            chunk_size: 2,
            delimiter: None,
        }
    }

    #[test]
    fn test_run_all_loads_every_job() {
        let dir = TempDir::new().unwrap();
        let people = write_file(&dir, "people.csv", "name,age\nJohn,30\nJane,25\nJim,41\n");
        let orders = write_file(&dir, "orders.tsv", "order id\tamount\n1\t9.5\n");

        let pipeline = IngestionPipeline::new(SqliteGateway::in_memory().unwrap());
        let mut engine = IngestEngine::new(pipeline);

        let reports = engine
            .run_all(&[job(people, "people"), job(orders, "orders")])
            .unwrap();

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].metrics.records_processed, 3);
        assert_eq!(reports[0].metrics.chunks_processed, 2);
        let gateway = engine.pipeline().gateway();
        assert_eq!(gateway.row_count("orders").unwrap(), 1);
        assert_eq!(
            gateway.table_columns("orders").unwrap(),
            vec![
                ("order_id".to_string(), "INTEGER".to_string()),
                ("amount".to_string(), "FLOAT".to_string())
            ]
        );
    }

    #[test]
    fn test_missing_source_is_reported() {
        let dir = TempDir::new().unwrap();
        let present = write_file(&dir, "a.csv", "x\n1\n");
        let pipeline = IngestionPipeline::new(SqliteGateway::in_memory().unwrap());
        let mut engine = IngestEngine::new(pipeline);

        let err = engine
            .run_all(&[job(dir.path().join("missing.csv"), "m"), job(present, "a")])
            .unwrap_err();

        assert!(matches!(err, EtlError::SourceNotFound { .. }));
        assert_eq!(engine.pipeline().gateway().table_columns("a").unwrap().len(), 0);
    }
}
