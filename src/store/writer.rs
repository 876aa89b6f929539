//! Single-writer ingestion queue between the controller and the store.

use tokio::sync::mpsc;

use crate::logger;
use crate::probes::system::{ProcessInfo, SystemResources};

use super::MetricsStore;

/// One paired metric + process list, persisted in a single transaction.
#[derive(Debug, Clone)]
pub struct FullSnapshot {
    pub resources: SystemResources,
    pub processes: Vec<ProcessInfo>,
}

/// Queue capacity. When the writer falls behind, new snapshots are dropped:
/// observability is best-effort, UI responsiveness is not.
pub const QUEUE_CAPACITY: usize = 50;

/// Spawn the writer task and hand back the producer side of the queue.
///
/// The task owns all database writes; writes therefore serialize through one
/// place regardless of how many workers sample snapshots.
pub fn spawn(store: MetricsStore) -> mpsc::Sender<FullSnapshot> {
    let (tx, mut rx) = mpsc::channel::<FullSnapshot>(QUEUE_CAPACITY);

    tokio::spawn(async move {
        while let Some(snapshot) = rx.recv().await {
            let store = store.clone();
            let result = tokio::task::spawn_blocking(move || {
                store.save_snapshot(&snapshot.resources, &snapshot.processes)
            })
            .await;

            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    logger::log_issue("DB_WRITE_ERROR", &e.to_string());
                    tracing::warn!(error = %e, "snapshot write failed, dropped");
                }
                Err(e) => tracing::warn!(error = %e, "snapshot writer task panicked"),
            }
        }
    });

    tx
}

/// Enqueue without waiting; a full queue drops the snapshot.
pub fn offer(tx: &mpsc::Sender<FullSnapshot>, snapshot: FullSnapshot) {
    if tx.try_send(snapshot).is_err() {
        tracing::debug!("snapshot queue full, dropping sample");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(cpu: f64) -> FullSnapshot {
        FullSnapshot {
            resources: SystemResources {
                cpu_usage: cpu,
                memory_used: 1,
                memory_total: 2,
                disk_perc: 3.0,
                ..Default::default()
            },
            processes: vec![ProcessInfo {
                name: "node".into(),
                pid: "1".into(),
                cpu: 1.0,
                memory_mb: 1,
                is_dev_tool: true,
            }],
        }
    }

    #[tokio::test]
    async fn writer_persists_enqueued_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        let store = MetricsStore::open_at(dir.path().join("metrics.db")).unwrap();
        let tx = spawn(store.clone());

        for i in 0..5 {
            offer(&tx, snapshot(i as f64));
        }
        drop(tx);

        // Wait for the writer to drain.
        for _ in 0..50 {
            if store.metric_count().unwrap() == 5 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        assert_eq!(store.metric_count().unwrap(), 5);
        assert_eq!(store.snapshot_count(1).unwrap(), 1);
    }

    #[tokio::test]
    async fn full_queue_drops_instead_of_blocking() {
        // A channel that is never drained: try_send must fail fast.
        let (tx, _rx) = mpsc::channel::<FullSnapshot>(2);
        for i in 0..10 {
            offer(&tx, snapshot(i as f64));
        }
        // Reaching this line without awaiting proves no blocking occurred.
        assert_eq!(tx.capacity(), 0);
    }
}
