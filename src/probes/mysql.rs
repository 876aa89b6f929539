//! MySQL probe.

use super::stats;
use super::{ports, runner, ServiceStatus};

#[derive(Debug, Clone)]
pub struct MySqlDatabase {
    pub name: String,
    pub size: String,
}

const SYSTEM_SCHEMAS: &[&str] = &["information_schema", "performance_schema", "mysql", "sys"];

const SIZE_QUERY: &str = "SELECT table_schema, \
     ROUND(SUM(data_length + index_length) / 1024 / 1024, 2) \
     FROM information_schema.TABLES GROUP BY table_schema;";

pub async fn check() -> ServiceStatus {
    if !runner::succeeds("pgrep", &["mysqld"]).await {
        return ServiceStatus::stopped();
    }

    ServiceStatus {
        running: true,
        port: ports::port_for_process("mysqld").await,
        uptime: None,
        stats: stats::multi_process_stats("mysqld").await,
    }
}

pub async fn databases() -> Vec<MySqlDatabase> {
    let output = match runner::run("mysql", &["-N", "-e", SIZE_QUERY]).await {
        Ok(out) => out,
        Err(_) => return Vec::new(),
    };
    parse_databases(&String::from_utf8_lossy(&output))
}

fn parse_databases(output: &str) -> Vec<MySqlDatabase> {
    output
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let name = fields.next()?;
            let size = fields.next()?;
            if SYSTEM_SCHEMAS.contains(&name) {
                return None;
            }
            Some(MySqlDatabase {
                name: name.to_string(),
                size: format!("{} MB", size),
            })
        })
        .collect()
}

pub fn format_overview(status: &ServiceStatus, databases: &[MySqlDatabase]) -> String {
    if !status.running {
        return "MySQL: stopped".to_string();
    }

    let mut out = String::from("MySQL: running");
    if let Some(port) = &status.port {
        out.push_str(&format!(" [:{}]", port));
    }
    let stats_line = stats::format_stats(status.stats);
    if !stats_line.is_empty() {
        out.push_str(&format!(" | {}", stats_line));
    }
    out.push('\n');

    if !databases.is_empty() {
        out.push_str("\nDatabases:\n");
        for db in databases {
            out.push_str(&format!("  - {} ({})\n", db.name, db.size));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_skips_system_schemas() {
        let out = "information_schema\t0.16\napp_db\t12.50\nmysql\t2.40\nshop\t4.00\n";
        let dbs = parse_databases(out);
        assert_eq!(dbs.len(), 2);
        assert_eq!(dbs[0].name, "app_db");
        assert_eq!(dbs[0].size, "12.50 MB");
        assert_eq!(dbs[1].name, "shop");
    }

    #[test]
    fn empty_output_yields_empty_list() {
        assert!(parse_databases("").is_empty());
    }
}
