//! PostgreSQL probe: liveness through process discovery, catalog details
//! through `psql` machine-format queries.

use super::stats;
use super::{ports, runner, ServiceStatus};

#[derive(Debug, Clone)]
pub struct PostgresDatabase {
    pub name: String,
    pub size: String,
    pub encoding: String,
    pub collation: String,
    pub owner: String,
    pub last_access: String,
}

const CATALOG_QUERY: &str = "SELECT d.datname, pg_size_pretty(pg_database_size(d.datname)), \
     pg_encoding_to_char(d.encoding), d.datcollate, pg_get_userbyid(d.datdba) \
     FROM pg_database d WHERE d.datistemplate = false ORDER BY d.datname;";

const ACCESS_QUERY: &str = "SELECT datname, stats_reset FROM pg_stat_database \
     WHERE datname NOT IN ('template0', 'template1');";

/// Liveness plus the summary figures shown in the menu and the overview.
pub async fn check() -> ServiceStatus {
    if !runner::succeeds("pgrep", &["postgres"]).await {
        return ServiceStatus::stopped();
    }

    let port = ports::port_for_process("postgres").await;
    let uptime = process_uptime().await;
    let stats = stats::multi_process_stats("postgres").await;

    ServiceStatus {
        running: true,
        port,
        uptime,
        stats,
    }
}

/// Database rows for the right panel. A dead or unreachable server yields an
/// empty list, never an error.
pub async fn databases() -> Vec<PostgresDatabase> {
    let rows = match runner::run(
        "psql",
        &["-d", "postgres", "-c", CATALOG_QUERY, "-t", "-A", "-F", "|"],
    )
    .await
    {
        Ok(out) => out,
        Err(_) => return Vec::new(),
    };

    let access = runner::run(
        "psql",
        &["-d", "postgres", "-c", ACCESS_QUERY, "-t", "-A", "-F", "|"],
    )
    .await
    .map(|out| String::from_utf8_lossy(&out).into_owned())
    .unwrap_or_default();

    parse_databases(&String::from_utf8_lossy(&rows), &access)
}

async fn process_uptime() -> Option<String> {
    let pids = runner::run("pgrep", &["postgres"]).await.ok()?;
    let first = String::from_utf8_lossy(&pids)
        .lines()
        .next()?
        .trim()
        .to_string();
    if !runner::is_valid_pid(&first) {
        return None;
    }
    let out = runner::run("ps", &["-o", "etime=", "-p", &first]).await.ok()?;
    let etime = String::from_utf8_lossy(&out).trim().to_string();
    (!etime.is_empty()).then_some(etime)
}

fn parse_databases(rows: &str, access: &str) -> Vec<PostgresDatabase> {
    let access_map: std::collections::HashMap<&str, &str> = access
        .lines()
        .filter_map(|line| {
            let mut parts = line.trim().splitn(2, '|');
            Some((parts.next()?.trim(), parts.next()?.trim()))
        })
        .collect();

    rows.lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() {
                return None;
            }
            let parts: Vec<&str> = line.split('|').collect();
            if parts.len() < 5 {
                return None;
            }
            let name = parts[0].trim().to_string();
            Some(PostgresDatabase {
                last_access: access_map
                    .get(name.as_str())
                    .map(|s| s.to_string())
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| "unknown".to_string()),
                name,
                size: parts[1].trim().to_string(),
                encoding: parts[2].trim().to_string(),
                collation: parts[3].trim().to_string(),
                owner: parts[4].trim().to_string(),
            })
        })
        .collect()
}

/// Detail text for the PostgreSQL panel.
pub fn format_overview(status: &ServiceStatus, databases: &[PostgresDatabase]) -> String {
    if !status.running {
        return "PostgreSQL: stopped".to_string();
    }

    let mut out = String::from("PostgreSQL: running");
    if let Some(port) = &status.port {
        out.push_str(&format!(" [:{}]", port));
    }
    if let Some(uptime) = &status.uptime {
        out.push_str(&format!(" | up {}", uptime));
    }
    let stats_line = stats::format_stats(status.stats);
    if !stats_line.is_empty() {
        out.push_str(&format!(" | {}", stats_line));
    }
    out.push('\n');

    if databases.is_empty() {
        out.push_str("  no databases visible\n");
    } else {
        out.push_str("\nDatabases:\n");
        for db in databases {
            out.push_str(&format!(
                "  - {} ({}) | {} | owner {} | last access {}\n",
                db.name, db.size, db.encoding, db.owner, db.last_access
            ));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probes::stats::ProcessStats;

    #[test]
    fn parses_catalog_rows() {
        let rows = "app_main_db|125 MB|UTF8|en_US.UTF-8|dev\n\
                    app_test_db|45 MB|UTF8|en_US.UTF-8|dev\n";
        let access = "app_main_db|2026-08-01 10:00:00+00\napp_test_db|\n";
        let dbs = parse_databases(rows, access);
        assert_eq!(dbs.len(), 2);
        assert_eq!(dbs[0].name, "app_main_db");
        assert_eq!(dbs[0].size, "125 MB");
        assert_eq!(dbs[0].owner, "dev");
        assert_eq!(dbs[0].last_access, "2026-08-01 10:00:00+00");
        assert_eq!(dbs[1].last_access, "unknown");
    }

    #[test]
    fn skips_short_rows() {
        let dbs = parse_databases("only|two\n\n", "");
        assert!(dbs.is_empty());
    }

    #[test]
    fn stopped_overview() {
        let text = format_overview(&ServiceStatus::stopped(), &[]);
        assert!(text.contains("stopped"));
    }

    #[test]
    fn running_overview_lists_databases() {
        let status = ServiceStatus {
            running: true,
            port: Some("5432".into()),
            uptime: Some("3-12:45:00".into()),
            stats: ProcessStats { cpu: 1.2, memory_kb: 262144 },
        };
        let dbs = vec![PostgresDatabase {
            name: "metabase".into(),
            size: "89 MB".into(),
            encoding: "UTF8".into(),
            collation: "C".into(),
            owner: "dev".into(),
            last_access: "unknown".into(),
        }];
        let text = format_overview(&status, &dbs);
        assert!(text.contains("[:5432]"));
        assert!(text.contains("metabase"));
        assert!(text.contains("CPU: 1.2%"));
    }
}
