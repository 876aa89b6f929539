//! Age-based archival of metric rows to compressed CSV.

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{Local, Utc};
use flate2::write::GzEncoder;
use flate2::Compression;
use rusqlite::params;

use super::MetricsStore;

struct ArchivedRow {
    id: i64,
    timestamp: String,
    cpu_usage: f64,
}

impl MetricsStore {
    /// Move rows older than `retention` into a gzip-compressed CSV under the
    /// archive directory, then delete them — all within one transaction, so
    /// the file contains exactly the rows that disappear from the table.
    ///
    /// Returns the archive path, or `None` when there was nothing to archive
    /// (in which case no file is created).
    pub fn archive_old_data(&self, retention: Duration) -> Result<Option<PathBuf>> {
        let threshold = (Utc::now() - chrono::Duration::from_std(retention)?)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string();

        let mut conn = self.connection()?;
        let tx = conn.transaction()?;

        let rows: Vec<ArchivedRow> = {
            let mut stmt = tx.prepare(
                "SELECT id, timestamp, cpu_usage FROM system_metrics WHERE timestamp < ?1",
            )?;
            let mapped = stmt.query_map(params![threshold], |row| {
                Ok(ArchivedRow {
                    id: row.get(0)?,
                    timestamp: row.get(1)?,
                    cpu_usage: row.get::<_, Option<f64>>(2)?.unwrap_or(0.0),
                })
            })?;
            mapped.collect::<rusqlite::Result<_>>()?
        };

        if rows.is_empty() {
            return Ok(None);
        }

        let archive_dir = self.archive_dir();
        std::fs::create_dir_all(&archive_dir)
            .with_context(|| format!("creating {}", archive_dir.display()))?;
        let path = archive_dir.join(format!(
            "metrics_{}.csv.gz",
            Local::now().format("%Y%m%d_%H%M%S")
        ));

        let file = std::fs::File::create(&path)
            .with_context(|| format!("creating {}", path.display()))?;
        let mut encoder = GzEncoder::new(file, Compression::default());
        writeln!(encoder, "id,timestamp,cpu_usage")?;
        for row in &rows {
            writeln!(encoder, "{},{},{:.2}", row.id, row.timestamp, row.cpu_usage)?;
        }
        // Flush the gzip frame completely before the rows disappear.
        encoder.finish().context("finalizing archive")?;

        tx.execute(
            "DELETE FROM system_metrics WHERE timestamp < ?1",
            params![threshold],
        )?;
        tx.commit()?;

        Ok(Some(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support::insert_aged_metric;
    use flate2::read::GzDecoder;
    use std::io::Read;

    fn test_store() -> (tempfile::TempDir, MetricsStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = MetricsStore::open_at(dir.path().join("metrics.db")).unwrap();
        (dir, store)
    }

    fn gunzip(path: &std::path::Path) -> String {
        let mut decoder = GzDecoder::new(std::fs::File::open(path).unwrap());
        let mut out = String::new();
        decoder.read_to_string(&mut out).unwrap();
        out
    }

    const RETENTION_72H: Duration = Duration::from_secs(72 * 3600);

    #[test]
    fn archives_exactly_the_expired_rows() {
        let (_dir, store) = test_store();
        insert_aged_metric(&store, 100, 11.0);
        insert_aged_metric(&store, 90, 22.0);
        insert_aged_metric(&store, 1, 33.0);

        let path = store
            .archive_old_data(RETENTION_72H)
            .unwrap()
            .expect("rows should be archived");

        // Archived rows are gone from the table; fresh row remains.
        assert_eq!(store.metric_count().unwrap(), 1);

        let csv = gunzip(&path);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "id,timestamp,cpu_usage");
        assert_eq!(lines.len(), 3, "header plus one line per archived row");
        assert!(csv.contains("11.00") && csv.contains("22.00"));
        assert!(!csv.contains("33.00"));
    }

    #[test]
    fn no_rows_creates_no_file() {
        let (_dir, store) = test_store();
        insert_aged_metric(&store, 1, 10.0);

        let result = store.archive_old_data(RETENTION_72H).unwrap();
        assert!(result.is_none());
        assert!(!store.archive_dir().exists());
    }

    #[test]
    fn second_archive_produces_nothing() {
        let (_dir, store) = test_store();
        insert_aged_metric(&store, 100, 10.0);

        let first = store.archive_old_data(RETENTION_72H).unwrap();
        assert!(first.is_some());
        let second = store.archive_old_data(RETENTION_72H).unwrap();
        assert!(second.is_none(), "nothing left to archive on the second call");

        let files: Vec<_> = std::fs::read_dir(store.archive_dir()).unwrap().collect();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn archive_file_name_shape() {
        let (_dir, store) = test_store();
        insert_aged_metric(&store, 100, 10.0);
        let path = store.archive_old_data(RETENTION_72H).unwrap().unwrap();
        let name = path.file_name().unwrap().to_string_lossy();
        assert!(name.starts_with("metrics_"));
        assert!(name.ends_with(".csv.gz"));
    }
}
