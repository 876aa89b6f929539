//! Redis probe.

use super::stats;
use super::{ports, runner, ServiceStatus};

#[derive(Debug, Clone)]
pub struct RedisDatabase {
    /// Keyspace index, e.g. `db0`.
    pub index: String,
    pub keys: String,
}

pub async fn check() -> ServiceStatus {
    if !runner::succeeds("pgrep", &["redis-server"]).await {
        return ServiceStatus::stopped();
    }

    ServiceStatus {
        running: true,
        port: ports::port_for_process("redis-server").await,
        uptime: None,
        stats: stats::multi_process_stats("redis-server").await,
    }
}

pub async fn databases() -> Vec<RedisDatabase> {
    let output = match runner::run("redis-cli", &["INFO", "keyspace"]).await {
        Ok(out) => out,
        Err(_) => return Vec::new(),
    };
    parse_keyspace(&String::from_utf8_lossy(&output))
}

/// Parse `INFO keyspace` lines of the form `db0:keys=100,expires=0,avg_ttl=0`.
fn parse_keyspace(output: &str) -> Vec<RedisDatabase> {
    output
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            if !line.starts_with("db") {
                return None;
            }
            let (index, info) = line.split_once(':')?;
            let keys = info
                .split(',')
                .find_map(|part| part.strip_prefix("keys="))
                .unwrap_or("0");
            Some(RedisDatabase {
                index: index.to_string(),
                keys: format!("{} keys", keys),
            })
        })
        .collect()
}

pub fn format_overview(status: &ServiceStatus, databases: &[RedisDatabase]) -> String {
    if !status.running {
        return "Redis: stopped".to_string();
    }

    let mut out = String::from("Redis: running");
    if let Some(port) = &status.port {
        out.push_str(&format!(" [:{}]", port));
    }
    let stats_line = stats::format_stats(status.stats);
    if !stats_line.is_empty() {
        out.push_str(&format!(" | {}", stats_line));
    }
    out.push('\n');

    if !databases.is_empty() {
        out.push_str("\nKeyspaces:\n");
        for db in databases {
            out.push_str(&format!("  - {} ({})\n", db.index, db.keys));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_keyspace_info() {
        let out = "# Keyspace\r\ndb0:keys=100,expires=0,avg_ttl=0\r\ndb3:keys=7,expires=1,avg_ttl=0\r\n";
        let dbs = parse_keyspace(out);
        assert_eq!(dbs.len(), 2);
        assert_eq!(dbs[0].index, "db0");
        assert_eq!(dbs[0].keys, "100 keys");
        assert_eq!(dbs[1].index, "db3");
        assert_eq!(dbs[1].keys, "7 keys");
    }

    #[test]
    fn ignores_non_keyspace_lines() {
        assert!(parse_keyspace("# Keyspace\r\nsomething:else\r\n").is_empty());
    }
}
