use crate::domain::model::Metrics;
use std::time::Instant;

#[cfg(feature = "cli")]
use std::time::Duration;
#[cfg(feature = "cli")]
use sysinfo::{Pid, System};

/// 累計單次執行的處理量；經過時間從建構時開始計算
#[derive(Debug, Clone)]
pub struct PerformanceMonitor {
    started: Instant,
    records_processed: u64,
    chunks_processed: u64,
}

impl PerformanceMonitor {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            records_processed: 0,
            chunks_processed: 0,
        }
    }

    /// 處理完一個區塊後呼叫
    pub fn update(&mut self, row_count: usize) {
        self.records_processed = self.records_processed.saturating_add(row_count as u64);
        self.chunks_processed = self.chunks_processed.saturating_add(1);
    }

    pub fn records_processed(&self) -> u64 {
        self.records_processed
    }

    pub fn chunks_processed(&self) -> u64 {
        self.chunks_processed
    }

    pub fn metrics(&self) -> Metrics {
        Metrics::from_counts(
            self.started.elapsed(),
            self.records_processed,
            self.chunks_processed,
        )
    }
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone)]
pub struct SystemStats {
    pub cpu_usage: f32,
    pub memory_usage_mb: u64,
    pub peak_memory_mb: u64,
    pub elapsed_time: Duration,
}

/// 行程層級的 CPU / 記憶體取樣（僅 CLI）
#[cfg(feature = "cli")]
pub struct SystemMonitor {
    system: System,
    pid: Option<Pid>,
    started: Instant,
    peak_memory_mb: u64,
    enabled: bool,
}

#[cfg(feature = "cli")]
impl SystemMonitor {
    pub fn new(enabled: bool) -> Self {
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(e) => {
                tracing::warn!("System monitoring unavailable: {}", e);
                None
            }
        };
        let mut system = System::new();
        if enabled {
            system.refresh_all();
        }

        Self {
            system,
            pid,
            started: Instant::now(),
            peak_memory_mb: 0,
            enabled,
        }
    }

    pub fn sample(&mut self) -> Option<SystemStats> {
        if !self.enabled {
            return None;
        }
        let pid = self.pid?;
        self.system.refresh_all();

        let process = self.system.process(pid)?;
        let memory_mb = process.memory() / 1024 / 1024;
        self.peak_memory_mb = self.peak_memory_mb.max(memory_mb);

        Some(SystemStats {
            cpu_usage: process.cpu_usage(),
            memory_usage_mb: memory_mb,
            peak_memory_mb: self.peak_memory_mb,
            elapsed_time: self.started.elapsed(),
        })
    }

    pub fn log_stats(&mut self, phase: &str) {
        if let Some(stats) = self.sample() {
            tracing::info!(
                "📊 {} - CPU: {:.1}%, Memory: {}MB, Peak: {}MB, Time: {:?}",
                phase,
                stats.cpu_usage,
                stats.memory_usage_mb,
                stats.peak_memory_mb,
                stats.elapsed_time
            );
        }
    }
}

#[cfg(not(feature = "cli"))]
pub struct SystemMonitor;

#[cfg(not(feature = "cli"))]
impl SystemMonitor {
    pub fn new(_enabled: bool) -> Self {
        Self
    }

    pub fn log_stats(&mut self, _phase: &str) {}
}
