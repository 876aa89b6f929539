//! Embedded metrics store.
//!
//! One SQLite file under `~/.devmon/`, opened in WAL mode so the single
//! ingestion writer and the UI's graph queries coexist without stalls.
//! Connections are opened per operation; WAL journaling plus NORMAL
//! synchronous keeps that cheap.

#![allow(dead_code)]

pub mod archive;
pub mod writer;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection};

use crate::probes::system::{ProcessInfo, SystemResources};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS system_metrics (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp DATETIME DEFAULT CURRENT_TIMESTAMP,
    cpu_usage REAL,
    memory_used INTEGER,
    memory_total INTEGER,
    disk_usage REAL
);

CREATE TABLE IF NOT EXISTS process_snapshots (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    metric_id INTEGER,
    process_name TEXT,
    pid TEXT,
    cpu_usage REAL,
    memory_usage INTEGER,
    is_dev_tool BOOLEAN,
    FOREIGN KEY(metric_id) REFERENCES system_metrics(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_metrics_timestamp ON system_metrics(timestamp);
CREATE INDEX IF NOT EXISTS idx_snapshots_metric_id ON process_snapshots(metric_id);
";

/// Handle to the metrics database. Cloning is cheap; every operation opens
/// its own connection.
#[derive(Clone)]
pub struct MetricsStore {
    path: PathBuf,
}

impl MetricsStore {
    /// Open (and migrate) the store at `~/.devmon/metrics.db`.
    pub fn open_default() -> Result<Self> {
        let home = dirs::home_dir().context("home directory not found")?;
        let dir = home.join(".devmon");
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("creating {}", dir.display()))?;
        Self::open_at(dir.join("metrics.db"))
    }

    /// Open (and migrate) a store at an explicit path.
    pub fn open_at(path: impl Into<PathBuf>) -> Result<Self> {
        let store = Self { path: path.into() };
        let conn = store.connection()?;
        conn.execute_batch(SCHEMA).context("migrating schema")?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory that receives archive files, next to the database.
    pub fn archive_dir(&self) -> PathBuf {
        self.path
            .parent()
            .map(|p| p.join("archive"))
            .unwrap_or_else(|| PathBuf::from("archive"))
    }

    fn connection(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path)
            .with_context(|| format!("opening {}", self.path.display()))?;
        // WAL so UI reads coexist with writer commits; NORMAL trades a little
        // durability for latency, which is the right call for metrics. The
        // journal_mode pragma reports the resulting mode as a row.
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |_row| Ok(()))?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(conn)
    }

    /// Persist one `(SystemMetric, ProcessSnapshot*)` pair atomically. A
    /// failure on any row rolls the whole snapshot back; partial snapshots
    /// are never observable.
    pub fn save_snapshot(
        &self,
        resources: &SystemResources,
        processes: &[ProcessInfo],
    ) -> Result<()> {
        let mut conn = self.connection()?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO system_metrics (timestamp, cpu_usage, memory_used, memory_total, disk_usage)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
                resources.cpu_usage,
                resources.memory_used,
                resources.memory_total,
                resources.disk_perc,
            ],
        )?;
        let metric_id = tx.last_insert_rowid();

        if !processes.is_empty() {
            let mut stmt = tx.prepare(
                "INSERT INTO process_snapshots
                     (metric_id, process_name, pid, cpu_usage, memory_usage, is_dev_tool)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for p in processes {
                stmt.execute(params![
                    metric_id,
                    p.name,
                    p.pid,
                    p.cpu,
                    p.memory_mb,
                    p.is_dev_tool,
                ])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    /// Last `limit` CPU samples, oldest first, for the realtime plot.
    pub fn recent_metrics(&self, limit: usize) -> Result<Vec<f64>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(
            "SELECT cpu_usage FROM (
                 SELECT cpu_usage, timestamp FROM system_metrics
                 ORDER BY timestamp DESC LIMIT ?1
             ) ORDER BY timestamp ASC",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            row.get::<_, Option<f64>>(0)
        })?;
        collect_floats(rows)
    }

    /// Hourly CPU averages over the last `days` days, for the history plot.
    /// Hours with no samples are simply absent.
    pub fn long_term_metrics(&self, days: u32) -> Result<Vec<f64>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(
            "SELECT AVG(cpu_usage)
             FROM system_metrics
             WHERE timestamp > datetime('now', '-' || ?1 || ' days')
             GROUP BY strftime('%Y-%m-%d %H', timestamp)
             ORDER BY timestamp ASC",
        )?;
        let rows = stmt.query_map(params![days as i64], |row| {
            row.get::<_, Option<f64>>(0)
        })?;
        collect_floats(rows)
    }

    /// Startup safety net: delete everything older than the retention window.
    /// Idempotent; the cascade removes child snapshots in the same statement.
    pub fn cleanup_old_data(&self, retention: Duration) -> Result<usize> {
        let conn = self.connection()?;
        let hours = format!("-{} hours", retention.as_secs() / 3600);
        let deleted = conn.execute(
            "DELETE FROM system_metrics WHERE timestamp < datetime('now', ?1)",
            params![hours],
        )?;
        Ok(deleted)
    }

    /// Number of metric rows, for tests and diagnostics.
    pub fn metric_count(&self) -> Result<i64> {
        let conn = self.connection()?;
        Ok(conn.query_row("SELECT COUNT(*) FROM system_metrics", [], |r| r.get(0))?)
    }

    /// Number of process rows attached to a metric.
    pub fn snapshot_count(&self, metric_id: i64) -> Result<i64> {
        let conn = self.connection()?;
        Ok(conn.query_row(
            "SELECT COUNT(*) FROM process_snapshots WHERE metric_id = ?1",
            params![metric_id],
            |r| r.get(0),
        )?)
    }
}

fn collect_floats(
    rows: impl Iterator<Item = rusqlite::Result<Option<f64>>>,
) -> Result<Vec<f64>> {
    let mut data = Vec::new();
    for row in rows {
        data.push(row?.unwrap_or(0.0));
    }
    Ok(data)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Insert a metric row with an explicit timestamp offset into the past,
    /// returning its id.
    pub fn insert_aged_metric(store: &MetricsStore, hours_ago: i64, cpu: f64) -> i64 {
        let conn = store.connection().unwrap();
        let ts = (Utc::now() - chrono::Duration::hours(hours_ago))
            .format("%Y-%m-%d %H:%M:%S")
            .to_string();
        conn.execute(
            "INSERT INTO system_metrics (timestamp, cpu_usage, memory_used, memory_total, disk_usage)
             VALUES (?1, ?2, 1024, 16384, 50.0)",
            params![ts, cpu],
        )
        .unwrap();
        conn.last_insert_rowid()
    }

    pub fn insert_child(store: &MetricsStore, metric_id: i64) {
        let conn = store.connection().unwrap();
        conn.execute(
            "INSERT INTO process_snapshots
                 (metric_id, process_name, pid, cpu_usage, memory_usage, is_dev_tool)
             VALUES (?1, 'node', '123', 1.0, 100, 1)",
            params![metric_id],
        )
        .unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    fn test_store() -> (tempfile::TempDir, MetricsStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = MetricsStore::open_at(dir.path().join("metrics.db")).unwrap();
        (dir, store)
    }

    fn sample_resources(cpu: f64) -> SystemResources {
        SystemResources {
            cpu_usage: cpu,
            memory_used: 4096,
            memory_total: 16384,
            disk_perc: 42.0,
            ..Default::default()
        }
    }

    fn sample_processes(n: usize) -> Vec<ProcessInfo> {
        (0..n)
            .map(|i| ProcessInfo {
                name: format!("proc{}", i),
                pid: format!("{}", 1000 + i),
                cpu: i as f64,
                memory_mb: 10,
                is_dev_tool: i % 2 == 0,
            })
            .collect()
    }

    #[test]
    fn snapshot_persists_parent_and_children() {
        let (_dir, store) = test_store();
        store
            .save_snapshot(&sample_resources(10.0), &sample_processes(5))
            .unwrap();

        assert_eq!(store.metric_count().unwrap(), 1);
        assert_eq!(store.snapshot_count(1).unwrap(), 5);
    }

    #[test]
    fn deleting_parent_cascades_to_children() {
        let (_dir, store) = test_store();
        let id = insert_aged_metric(&store, 100, 5.0);
        insert_child(&store, id);
        insert_child(&store, id);
        assert_eq!(store.snapshot_count(id).unwrap(), 2);

        store.cleanup_old_data(Duration::from_secs(72 * 3600)).unwrap();

        assert_eq!(store.metric_count().unwrap(), 0);
        assert_eq!(store.snapshot_count(id).unwrap(), 0);
    }

    #[test]
    fn cleanup_is_idempotent() {
        let (_dir, store) = test_store();
        insert_aged_metric(&store, 100, 5.0);

        let first = store.cleanup_old_data(Duration::from_secs(72 * 3600)).unwrap();
        let second = store.cleanup_old_data(Duration::from_secs(72 * 3600)).unwrap();
        assert_eq!(first, 1);
        assert_eq!(second, 0);
    }

    #[test]
    fn cleanup_keeps_fresh_rows() {
        let (_dir, store) = test_store();
        insert_aged_metric(&store, 100, 5.0);
        insert_aged_metric(&store, 1, 6.0);

        store.cleanup_old_data(Duration::from_secs(72 * 3600)).unwrap();
        assert_eq!(store.metric_count().unwrap(), 1);
    }

    #[test]
    fn recent_metrics_ascending_tail() {
        let (_dir, store) = test_store();
        for (hours_ago, cpu) in [(5, 10.0), (4, 20.0), (3, 30.0), (2, 40.0), (1, 50.0)] {
            insert_aged_metric(&store, hours_ago, cpu);
        }

        let data = store.recent_metrics(3).unwrap();
        assert_eq!(data, vec![30.0, 40.0, 50.0]);
    }

    #[test]
    fn long_term_metrics_buckets_by_hour() {
        let (_dir, store) = test_store();
        // Two samples in one hour bucket, one in another; a 100h-old row
        // falls outside the 3-day window.
        insert_aged_metric(&store, 2, 10.0);
        insert_aged_metric(&store, 2, 30.0);
        insert_aged_metric(&store, 5, 50.0);
        insert_aged_metric(&store, 100, 99.0);

        let data = store.long_term_metrics(3).unwrap();
        assert_eq!(data.len(), 2, "missing buckets must be absent, not zero");
        assert!(data.contains(&20.0), "same-hour samples must average");
        assert!(data.contains(&50.0));
        assert!(!data.contains(&99.0));
    }

    #[test]
    fn rollback_leaves_no_partial_snapshot() {
        let (_dir, store) = test_store();
        // A process row with a pid longer than SQLite accepts cannot easily
        // be forced to fail, so exercise the rollback path directly: open a
        // transaction, insert, drop without commit.
        {
            let mut conn = store.connection().unwrap();
            let tx = conn.transaction().unwrap();
            tx.execute(
                "INSERT INTO system_metrics (cpu_usage, memory_used, memory_total, disk_usage)
                 VALUES (1.0, 1, 1, 1.0)",
                [],
            )
            .unwrap();
            // dropped here: implicit rollback
        }
        assert_eq!(store.metric_count().unwrap(), 0);
    }
}
