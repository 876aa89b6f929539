//! Host resource sampling built on a reusable `sysinfo` instance.

use once_cell::sync::OnceCell;
use sysinfo::{CpuRefreshKind, Disks, MemoryRefreshKind, ProcessesToUpdate, RefreshKind, System};

#[cfg(target_os = "macos")]
use super::runner;

/// One sample of host state. Only the `{cpu, mem_used, mem_total, disk%}`
/// subset is ever persisted; the rest feeds the dashboard and the LLM
/// context report.
#[derive(Debug, Clone, Default)]
pub struct SystemResources {
    pub cpu_usage: f64,
    pub cpu_cores: usize,

    // All memory figures in MB.
    pub memory_total: i64,
    pub memory_used: i64,
    pub memory_app: i64,
    pub memory_wired: i64,
    pub memory_compressed: i64,
    pub memory_cached: i64,
    pub memory_available: i64,
    pub memory_perc: f64,

    // Disk figures in GB.
    pub disk_total: i64,
    pub disk_used: i64,
    pub disk_free: i64,
    pub disk_perc: f64,

    pub process_count: usize,
    pub uptime: String,
}

/// A single process row of a collection cycle.
#[derive(Debug, Clone)]
pub struct ProcessInfo {
    pub name: String,
    pub pid: String,
    pub cpu: f64,
    pub memory_mb: i64,
    pub is_dev_tool: bool,
}

const DEV_KEYWORDS: &[&str] = &[
    "docker", "node", "python", "postgres", "mysql", "redis", "nginx", "code", "vscode",
];

// Physical memory never changes within a process.
static MEMORY_TOTAL_MB: OnceCell<i64> = OnceCell::new();

/// Maintains a reusable `sysinfo::System` so every tick does not reallocate
/// process tables. CPU usage needs two refreshes to produce a stable delta,
/// which is why the constructor primes it.
pub struct SystemProbe {
    sys: System,
    disks: Disks,
}

impl SystemProbe {
    pub fn new() -> Self {
        let mut sys = System::new_with_specifics(
            RefreshKind::new()
                .with_cpu(CpuRefreshKind::everything())
                .with_memory(MemoryRefreshKind::everything()),
        );
        sys.refresh_cpu_usage();
        sys.refresh_memory();

        let mut disks = Disks::new_with_refreshed_list();
        disks.refresh();

        Self { sys, disks }
    }

    /// Sample everything sysinfo can answer without shelling out.
    pub fn sample(&mut self) -> SystemResources {
        self.sys.refresh_cpu_usage();
        self.sys.refresh_memory();
        self.sys.refresh_processes(ProcessesToUpdate::All);
        self.disks.refresh();
        if self.disks.list().is_empty() {
            self.disks.refresh_list();
        }

        let memory_total = *MEMORY_TOTAL_MB
            .get_or_init(|| (self.sys.total_memory() / 1024 / 1024) as i64);
        let memory_used = (self.sys.used_memory() / 1024 / 1024) as i64;
        let memory_available = (self.sys.available_memory() / 1024 / 1024) as i64;
        let memory_perc = if memory_total > 0 {
            memory_used as f64 / memory_total as f64 * 100.0
        } else {
            0.0
        };

        let (used_bytes, total_bytes) =
            self.disks
                .list()
                .iter()
                .fold((0u128, 0u128), |(used, total), disk| {
                    let space = disk.total_space() as u128;
                    let avail = disk.available_space() as u128;
                    (used + space.saturating_sub(avail), total + space)
                });
        const GB: u128 = 1024 * 1024 * 1024;
        let disk_total = (total_bytes / GB) as i64;
        let disk_used = (used_bytes / GB) as i64;
        let disk_perc = if total_bytes > 0 {
            (used_bytes as f64 / total_bytes as f64) * 100.0
        } else {
            0.0
        };

        SystemResources {
            cpu_usage: self.sys.global_cpu_usage() as f64,
            cpu_cores: self.sys.cpus().len(),
            memory_total,
            memory_used,
            // App memory defaults to the used figure; the vm_stat supplement
            // below refines the class breakdown where the kernel exposes it.
            memory_app: memory_used,
            memory_wired: 0,
            memory_compressed: 0,
            memory_cached: 0,
            memory_available,
            memory_perc,
            disk_total,
            disk_used,
            disk_free: disk_total.saturating_sub(disk_used),
            disk_perc,
            process_count: self.sys.processes().len(),
            uptime: format_uptime(System::uptime()),
        }
    }

    /// Enumerate all processes sorted by CPU descending, truncated to `n`.
    pub fn top_processes(&mut self, n: usize) -> Vec<ProcessInfo> {
        self.sys.refresh_processes(ProcessesToUpdate::All);

        let mut processes: Vec<ProcessInfo> = self
            .sys
            .processes()
            .iter()
            .map(|(pid, proc)| {
                let name = short_process_name(&proc.name().to_string_lossy());
                ProcessInfo {
                    is_dev_tool: is_dev_process(&name),
                    pid: pid.as_u32().to_string(),
                    cpu: proc.cpu_usage() as f64,
                    memory_mb: (proc.memory() / 1024 / 1024) as i64,
                    name,
                }
            })
            .collect();

        processes.sort_by(|a, b| b.cpu.partial_cmp(&a.cpu).unwrap_or(std::cmp::Ordering::Equal));
        processes.truncate(n);
        processes
    }
}

impl Default for SystemProbe {
    fn default() -> Self {
        Self::new()
    }
}

/// Collect a full resource snapshot, refining the memory class breakdown on
/// macOS through `vm_stat` page counts.
pub async fn collect_resources(probe: &parking_lot::Mutex<SystemProbe>) -> SystemResources {
    let mut resources = probe.lock().sample();

    #[cfg(target_os = "macos")]
    if let Ok(out) = runner::run("vm_stat", &[]).await {
        apply_vm_stat(&mut resources, &String::from_utf8_lossy(&out));
    }

    resources
}

/// Parse `vm_stat` page classes into the Activity-Monitor style breakdown:
/// used = active + wired + compressed, available = free + inactive.
#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
fn apply_vm_stat(resources: &mut SystemResources, output: &str) {
    const PAGE_SIZE: i64 = 4096;
    let page_mb = |pages: i64| pages * PAGE_SIZE / (1024 * 1024);

    let mut active = 0i64;
    let mut wired = 0i64;
    let mut compressed = 0i64;
    let mut cached = 0i64;
    let mut free = 0i64;
    let mut inactive = 0i64;

    for line in output.lines() {
        let Some(value) = line
            .split_whitespace()
            .last()
            .map(|v| v.trim_end_matches('.'))
            .and_then(|v| v.parse::<i64>().ok())
        else {
            continue;
        };

        if line.starts_with("Pages active") {
            active = value;
        } else if line.starts_with("Pages wired down") {
            wired = value;
        } else if line.starts_with("Pages occupied by compressor") {
            compressed = value;
        } else if line.starts_with("File-backed pages") {
            cached = value;
        } else if line.starts_with("Pages free") {
            free = value;
        } else if line.starts_with("Pages inactive") {
            inactive = value;
        }
    }

    if active == 0 && wired == 0 && compressed == 0 {
        return;
    }

    resources.memory_app = page_mb(active);
    resources.memory_wired = page_mb(wired);
    resources.memory_compressed = page_mb(compressed);
    resources.memory_cached = page_mb(cached);
    resources.memory_used = page_mb(active + wired + compressed);
    resources.memory_available = page_mb(free + inactive);
    if resources.memory_total > 0 {
        resources.memory_perc =
            resources.memory_used as f64 / resources.memory_total as f64 * 100.0;
    }
}

fn format_uptime(seconds: u64) -> String {
    let days = seconds / 86_400;
    let hours = (seconds % 86_400) / 3_600;
    let minutes = (seconds % 3_600) / 60;
    if days > 0 {
        format!("{}d {}h {}m", days, hours, minutes)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}

/// Strip path and arguments, and collapse well-known tool names.
fn short_process_name(full: &str) -> String {
    let base = full.rsplit('/').next().unwrap_or(full);
    let name = base.split_whitespace().next().unwrap_or(base);

    let lower = name.to_lowercase();
    if lower.contains("docker") {
        return "Docker".to_string();
    }
    if lower.contains("chrome") {
        return "Chrome".to_string();
    }
    if lower.contains("node") {
        return "Node.js".to_string();
    }
    if lower.contains("python") {
        return "Python".to_string();
    }
    if lower.contains("postgres") {
        return "PostgreSQL".to_string();
    }
    name.to_string()
}

fn is_dev_process(name: &str) -> bool {
    let lower = name.to_lowercase();
    DEV_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

/// One-line summary used by the header and the system log.
pub fn format_resources(sr: &SystemResources) -> String {
    format!(
        "CPU: {:.1}% | Mem: {:.1}GB/{:.1}GB ({:.0}%) | Disk: {:.0}% ({}GB free)",
        sr.cpu_usage,
        sr.memory_used as f64 / 1024.0,
        sr.memory_total as f64 / 1024.0,
        sr.memory_perc,
        sr.disk_perc,
        sr.disk_free,
    )
}

/// Multi-line detail text for the System panel.
pub fn format_resources_detail(sr: &SystemResources, top: &[ProcessInfo]) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "CPU: {:.1}% ({} cores)\n",
        sr.cpu_usage, sr.cpu_cores
    ));
    out.push_str(&format!(
        "Memory: {:.1}GB / {:.1}GB ({:.0}%)\n",
        sr.memory_used as f64 / 1024.0,
        sr.memory_total as f64 / 1024.0,
        sr.memory_perc,
    ));
    out.push_str(&format!(
        "  app {:.1}GB | wired {:.1}GB | compressed {:.1}GB | cached {:.1}GB\n",
        sr.memory_app as f64 / 1024.0,
        sr.memory_wired as f64 / 1024.0,
        sr.memory_compressed as f64 / 1024.0,
        sr.memory_cached as f64 / 1024.0,
    ));
    out.push_str(&format!(
        "Disk: {}GB / {}GB ({:.0}%), {}GB free\n",
        sr.disk_used, sr.disk_total, sr.disk_perc, sr.disk_free
    ));
    out.push_str(&format!(
        "Processes: {} | Uptime: {}\n",
        sr.process_count, sr.uptime
    ));
    if !top.is_empty() {
        out.push('\n');
        out.push_str("Top resource usage:\n");
        for (i, p) in top.iter().enumerate() {
            out.push_str(&format!(
                "  {:>2}. {:<24} {:>5.1}% CPU | {}MB{}\n",
                i + 1,
                p.name,
                p.cpu,
                p.memory_mb,
                if p.is_dev_tool { "  [dev]" } else { "" },
            ));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn samples_finite_metrics() {
        let mut probe = SystemProbe::new();
        let sr = probe.sample();
        assert!(sr.cpu_usage.is_finite());
        assert!(sr.disk_perc.is_finite());
        assert!(sr.memory_total >= sr.memory_used || sr.memory_total == 0);
    }

    #[test]
    fn top_processes_sorted_and_truncated() {
        let mut probe = SystemProbe::new();
        let top = probe.top_processes(5);
        assert!(top.len() <= 5);
        for pair in top.windows(2) {
            assert!(pair[0].cpu >= pair[1].cpu);
        }
    }

    #[test]
    fn memory_total_is_memoized() {
        let mut probe = SystemProbe::new();
        let a = probe.sample().memory_total;
        let b = probe.sample().memory_total;
        assert_eq!(a, b);
    }

    #[test]
    fn dev_tool_tagging() {
        assert!(is_dev_process("PostgreSQL"));
        assert!(is_dev_process("Docker"));
        assert!(is_dev_process("redis-server"));
        assert!(!is_dev_process("Finder"));
    }

    #[test]
    fn short_names_collapse_paths_and_args() {
        assert_eq!(short_process_name("/usr/bin/postgres -D /data"), "PostgreSQL");
        assert_eq!(short_process_name("/opt/homebrew/bin/node server.js"), "Node.js");
        assert_eq!(short_process_name("nginx"), "nginx");
    }

    #[test]
    fn vm_stat_breakdown() {
        let mut sr = SystemResources {
            memory_total: 16384,
            ..Default::default()
        };
        let out = "Mach Virtual Memory Statistics: (page size of 4096 bytes)\n\
                   Pages free:                              100000.\n\
                   Pages active:                            200000.\n\
                   Pages inactive:                          150000.\n\
                   Pages wired down:                         50000.\n\
                   File-backed pages:                        80000.\n\
                   Pages occupied by compressor:             25000.\n";
        apply_vm_stat(&mut sr, out);
        assert_eq!(sr.memory_app, 200000 * 4096 / 1024 / 1024);
        assert_eq!(sr.memory_used, 275000 * 4096 / 1024 / 1024);
        assert_eq!(sr.memory_available, 250000 * 4096 / 1024 / 1024);
        assert!(sr.memory_perc > 0.0);
    }

    #[test]
    fn uptime_formatting() {
        assert_eq!(format_uptime(59), "0m");
        assert_eq!(format_uptime(3 * 3600 + 120), "3h 2m");
        assert_eq!(format_uptime(2 * 86400 + 3600), "2d 1h 0m");
    }
}
