use clap::Parser;
use csv_ingest::config::toml_config::LogFormat;
use csv_ingest::utils::error::ErrorSeverity;
use csv_ingest::utils::{logger, validation::Validate};
use csv_ingest::{CliConfig, IngestEngine, IngestionPipeline, SqliteGateway};

fn main() {
    let cli = CliConfig::parse();

    // 先載入設定檔，日誌格式與等級取決於它
    let config = match cli.load_file_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load configuration: {}", e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };

    let level = config.logging.level.as_deref();
    if cli.json_logs || config.logging.format == LogFormat::Json {
        logger::init_json_logger(cli.verbose, level);
    } else {
        logger::init_cli_logger(cli.verbose, level);
    }

    tracing::info!("🚀 Starting csv-ingest");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    // 驗證配置
    let validation = cli.validate().and_then(|_| config.validate());
    let jobs = match validation.and_then(|_| cli.resolve_jobs(&config)) {
        Ok(jobs) => jobs,
        Err(e) => {
            tracing::error!("❌ Configuration validation failed: {}", e);
            tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
            eprintln!("❌ {}", e.user_friendly_message());
            std::process::exit(1);
        }
    };

    let gateway = match SqliteGateway::connect(&config.database) {
        Ok(gateway) => gateway,
        Err(e) => {
            tracing::error!("❌ {}", e);
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());
            std::process::exit(3);
        }
    };

    if cli.monitor {
        tracing::info!("🔍 System monitoring enabled");
    }
    let mut engine =
        IngestEngine::new_with_monitoring(IngestionPipeline::new(gateway), cli.monitor);

    match engine.run_all(&jobs) {
        Ok(reports) => {
            for report in &reports {
                let rows = engine
                    .pipeline()
                    .gateway()
                    .row_count(&report.job.table)
                    .unwrap_or_default();
                tracing::info!("Import summary for '{}':", report.job.table);
                tracing::info!("- Total records: {}", report.metrics.records_processed);
                tracing::info!("- Total chunks: {}", report.metrics.chunks_processed);
                tracing::info!("- Total time: {:.2} seconds", report.metrics.elapsed_seconds);
                tracing::info!(
                    "- Processing speed: {:.2} records/second",
                    report.metrics.records_per_second
                );
                tracing::info!("- Rows now in table: {}", rows);
            }

            if cli.metrics_json {
                let summary: Vec<_> = reports
                    .iter()
                    .map(|r| {
                        serde_json::json!({
                            "source": r.job.source.display().to_string(),
                            "table": r.job.table,
                            "metrics": r.metrics,
                        })
                    })
                    .collect();
                match serde_json::to_string_pretty(&summary) {
                    Ok(json) => println!("{}", json),
                    Err(e) => tracing::error!("Failed to serialize metrics: {}", e),
                }
            } else {
                println!(
                    "✅ Imported {} source(s) into {}",
                    reports.len(),
                    engine.pipeline().gateway().database()
                );
            }
        }
        Err(e) => {
            // 記錄詳細錯誤信息
            tracing::error!(
                "❌ Import failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());

            let exit_code = match e.severity() {
                ErrorSeverity::Medium => 2,   // 部分區塊已寫入
                ErrorSeverity::High => 1,
                ErrorSeverity::Critical => 3, // 無法連線
            };
            std::process::exit(exit_code);
        }
    }
}
