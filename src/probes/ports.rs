//! Listening socket discovery via `lsof`.

use std::collections::HashSet;

use super::runner;

/// A listening TCP socket.
#[derive(Debug, Clone)]
pub struct PortInfo {
    pub port: u16,
    pub process: String,
    pub pid: String,
    pub bind_address: String,
    /// Synthesized browse URL for wildcard/loopback binds.
    pub url: Option<String>,
}

/// Enumerate listening TCP ports, deduplicated and sorted ascending.
pub async fn listening_ports() -> Vec<PortInfo> {
    let output = match runner::run("lsof", &["-iTCP", "-sTCP:LISTEN", "-n", "-P"]).await {
        Ok(out) => out,
        Err(_) => return Vec::new(),
    };
    parse_lsof(&String::from_utf8_lossy(&output))
}

/// Find the first listening port owned by a process whose command name
/// contains `process_name`.
pub async fn port_for_process(process_name: &str) -> Option<String> {
    listening_ports()
        .await
        .into_iter()
        .find(|p| p.process.to_lowercase().contains(&process_name.to_lowercase()))
        .map(|p| p.port.to_string())
}

/// Find the first listening port owned by `pid`.
pub async fn port_for_pid(pid: &str) -> Option<String> {
    listening_ports()
        .await
        .into_iter()
        .find(|p| p.pid == pid)
        .map(|p| p.port.to_string())
}

fn parse_lsof(output: &str) -> Vec<PortInfo> {
    let mut seen = HashSet::new();
    let mut ports = Vec::new();

    for line in output.lines().skip(1) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 9 {
            continue;
        }

        let name = fields[8];
        let Some(colon) = name.rfind(':') else {
            continue;
        };
        let Ok(port) = name[colon + 1..].parse::<u16>() else {
            continue;
        };
        if !seen.insert(port) {
            continue;
        }

        let bind_address = name[..colon].to_string();
        ports.push(PortInfo {
            url: synthesize_url(&bind_address, port),
            port,
            process: fields[0].to_string(),
            pid: fields[1].to_string(),
            bind_address,
        });
    }

    ports.sort_by_key(|p| p.port);
    ports
}

fn synthesize_url(bind: &str, port: u16) -> Option<String> {
    match bind {
        "*" | "0.0.0.0" | "127.0.0.1" | "localhost" | "[::]" | "[::1]" | "::" | "::1" => {
            Some(format!("http://localhost:{}", port))
        }
        _ => None,
    }
}

/// Detail text for the Ports panel.
pub fn format_ports(ports: &[PortInfo]) -> String {
    if ports.is_empty() {
        return "No listening ports detected".to_string();
    }
    let mut out = String::from("LISTEN ports:\n");
    for p in ports {
        out.push_str(&format!(
            "  :{:<6} | {:<14} | PID {:<7}{}\n",
            p.port,
            p.process,
            p.pid,
            p.url.as_deref().map(|u| format!(" | {}", u)).unwrap_or_default(),
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
COMMAND    PID USER   FD   TYPE DEVICE SIZE/OFF NODE NAME
node     12345 dev   23u  IPv4 0xdead      0t0  TCP *:3000 (LISTEN)
postgres 34567 dev    7u  IPv6 0xbeef      0t0  TCP 127.0.0.1:5432 (LISTEN)
python   23456 dev    5u  IPv4 0xcafe      0t0  TCP 192.168.1.5:8000 (LISTEN)
node     12345 dev   24u  IPv6 0xfeed      0t0  TCP *:3000 (LISTEN)
";

    #[test]
    fn parses_sorts_and_dedupes() {
        let ports = parse_lsof(SAMPLE);
        assert_eq!(ports.len(), 3);
        assert_eq!(ports[0].port, 3000);
        assert_eq!(ports[1].port, 5432);
        assert_eq!(ports[2].port, 8000);
        assert_eq!(ports[1].process, "postgres");
        assert_eq!(ports[1].pid, "34567");
    }

    #[test]
    fn url_only_for_local_binds() {
        let ports = parse_lsof(SAMPLE);
        assert_eq!(ports[0].url.as_deref(), Some("http://localhost:3000"));
        assert_eq!(ports[1].url.as_deref(), Some("http://localhost:5432"));
        assert_eq!(ports[2].url, None, "external bind must not get a URL");
    }

    #[test]
    fn skips_malformed_lines() {
        let ports = parse_lsof("HEADER\nshort line\nx y z\n");
        assert!(ports.is_empty());
    }
}
