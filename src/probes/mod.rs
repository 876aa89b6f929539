//! Probe library: per-service collectors over external tools and syscalls.
//!
//! Probes are pure functions of the host. They tolerate missing tools,
//! timeouts and parse failures by returning conservative empty values; the
//! controller never sees a probe error, only a possibly-empty record.

pub mod actions;
pub mod docker;
pub mod inject;
pub mod logs;
pub mod mysql;
pub mod ports;
pub mod postgres;
pub mod redis;
pub mod runner;
pub mod runtimes;
pub mod stats;
pub mod system;

use stats::ProcessStats;

/// Liveness summary shared by the database probes.
#[derive(Debug, Clone, Default)]
pub struct ServiceStatus {
    pub running: bool,
    pub port: Option<String>,
    pub uptime: Option<String>,
    pub stats: ProcessStats,
}

impl ServiceStatus {
    pub fn stopped() -> Self {
        Self::default()
    }
}

/// Lightweight "is the process alive?" check used by the 1 Hz status sweep.
pub async fn service_alive(process_name: &str) -> bool {
    runner::succeeds("pgrep", &[process_name]).await
}
