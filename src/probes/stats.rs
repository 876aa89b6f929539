//! Per-process CPU and memory readings via `ps`.

use super::runner;

/// CPU percent and resident memory for one or more processes.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProcessStats {
    pub cpu: f64,
    pub memory_kb: i64,
}

/// Stats for a single pid. Invalid pids and `ps` failures yield zeros.
pub async fn process_stats(pid: &str) -> ProcessStats {
    if !runner::is_valid_pid(pid) {
        return ProcessStats::default();
    }

    let output = match runner::run("ps", &["-o", "%cpu,rss", "-p", pid]).await {
        Ok(out) => out,
        Err(_) => return ProcessStats::default(),
    };

    parse_ps_stats(&String::from_utf8_lossy(&output))
}

/// Combined stats for every process matching `process_name` (via pgrep).
pub async fn multi_process_stats(process_name: &str) -> ProcessStats {
    if !runner::is_valid_identifier(process_name) {
        return ProcessStats::default();
    }

    let pids = match runner::run("pgrep", &[process_name]).await {
        Ok(out) => out,
        Err(_) => return ProcessStats::default(),
    };

    let valid: Vec<String> = String::from_utf8_lossy(&pids)
        .lines()
        .map(str::trim)
        .filter(|p| runner::is_valid_pid(p))
        .map(str::to_string)
        .collect();
    if valid.is_empty() {
        return ProcessStats::default();
    }

    let pid_list = valid.join(",");
    let output = match runner::run("ps", &["-o", "%cpu,rss", "-p", &pid_list]).await {
        Ok(out) => out,
        Err(_) => return ProcessStats::default(),
    };

    parse_ps_stats(&String::from_utf8_lossy(&output))
}

fn parse_ps_stats(output: &str) -> ProcessStats {
    let mut total = ProcessStats::default();
    for line in output.lines().skip(1) {
        let mut fields = line.split_whitespace();
        let (Some(cpu), Some(rss)) = (fields.next(), fields.next()) else {
            continue;
        };
        total.cpu += cpu.parse::<f64>().unwrap_or(0.0);
        total.memory_kb += rss.parse::<i64>().unwrap_or(0);
    }
    total
}

/// Human-readable memory from a KB count.
pub fn format_memory(kb: i64) -> String {
    if kb < 1024 {
        return format!("{} KB", kb);
    }
    let mb = kb as f64 / 1024.0;
    if mb < 1024.0 {
        return format!("{:.1} MB", mb);
    }
    format!("{:.2} GB", mb / 1024.0)
}

/// `CPU: x% | Mem: y` summary, empty when there is nothing to report.
pub fn format_stats(stats: ProcessStats) -> String {
    if stats.cpu == 0.0 && stats.memory_kb == 0 {
        return String::new();
    }
    format!("CPU: {:.1}% | Mem: {}", stats.cpu, format_memory(stats.memory_kb))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ps_output_with_header() {
        let out = " %CPU    RSS\n  1.5  20480\n  0.5  10240\n";
        let stats = parse_ps_stats(out);
        assert_eq!(stats.cpu, 2.0);
        assert_eq!(stats.memory_kb, 30720);
    }

    #[test]
    fn tolerates_malformed_lines() {
        let out = " %CPU    RSS\ngarbage\n  1.0  1024\n";
        let stats = parse_ps_stats(out);
        assert_eq!(stats.cpu, 1.0);
        assert_eq!(stats.memory_kb, 1024);
    }

    #[test]
    fn memory_formatting() {
        assert_eq!(format_memory(512), "512 KB");
        assert_eq!(format_memory(2048), "2.0 MB");
        assert_eq!(format_memory(2 * 1024 * 1024), "2.00 GB");
    }

    #[test]
    fn stats_summary_empty_when_idle() {
        assert_eq!(format_stats(ProcessStats::default()), "");
        assert!(format_stats(ProcessStats { cpu: 1.0, memory_kb: 2048 }).contains("CPU: 1.0%"));
    }
}
