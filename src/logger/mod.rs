//! Append-only product logs under `~/.devmon/logs/`.
//!
//! Three daily files: `system_YYYY-MM-DD.log` (resource samples),
//! `services_YYYY-MM-DD.log` (status transitions), `issues_YYYY-MM-DD.log`
//! (one-line diagnostics). Logging is best-effort; failures are swallowed so
//! the dashboard never stalls on a full disk.

use std::io::Write;
use std::path::PathBuf;

use chrono::Local;

fn log_dir() -> Option<PathBuf> {
    let dir = dirs::home_dir()?.join(".devmon").join("logs");
    std::fs::create_dir_all(&dir).ok()?;
    Some(dir)
}

fn append(prefix: &str, line: &str) {
    let Some(dir) = log_dir() else { return };
    let file = dir.join(format!("{}_{}.log", prefix, Local::now().format("%Y-%m-%d")));
    let Ok(mut f) = std::fs::OpenOptions::new().append(true).create(true).open(file) else {
        return;
    };
    let _ = writeln!(f, "[{}] {}", Local::now().format("%H:%M:%S"), line);
}

pub fn log_system_resources(cpu: f64, mem_used: i64, mem_total: i64) {
    append(
        "system",
        &format!("CPU: {:.1}% | Memory: {}MB/{}MB", cpu, mem_used, mem_total),
    );
}

pub fn log_service_status(service: &str, status: &str) {
    append("services", &format!("{}: {}", service, status));
}

pub fn log_issue(kind: &str, description: &str) {
    append("issues", &format!("[{}] {}", kind, description));
}
