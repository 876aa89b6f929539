//! Container engine probe.
//!
//! The typed Docker API (bollard) is the primary path; when the socket is not
//! reachable at startup the probe degrades to parsing `docker ps` machine
//! format through the command runner, so a CLI-only environment still gets a
//! container list.

use std::collections::HashMap;

use anyhow::{Context, Result};
use bollard::container::{ListContainersOptions, LogsOptions, RemoveContainerOptions, Stats, StatsOptions};
use bollard::image::ListImagesOptions;
use bollard::Docker;
use chrono::{DateTime, Utc};
use futures::StreamExt;

use super::runner;

const COMPOSE_PROJECT_LABEL: &str = "com.docker.compose.project";
const COMPOSE_SERVICE_LABEL: &str = "com.docker.compose.service";
const COMPOSE_WORKDIR_LABEL: &str = "com.docker.compose.project.working_dir";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerStatus {
    Running,
    Exited,
    Other,
}

impl std::fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Exited => write!(f, "exited"),
            Self::Other => write!(f, "other"),
        }
    }
}

impl From<&str> for ContainerStatus {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "running" | "up" => Self::Running,
            "exited" | "dead" => Self::Exited,
            _ => Self::Other,
        }
    }
}

/// One container as shown in the Docker panel. Derived fresh each refresh,
/// never persisted.
#[derive(Debug, Clone)]
pub struct ContainerInfo {
    pub id: String,
    pub name: String,
    pub status: ContainerStatus,
    pub status_text: String,
    pub image: String,
    pub ports: String,
    pub compose_project: Option<String>,
    pub compose_service: Option<String>,
    pub project_dir: Option<String>,
    // Failure metadata from inspect, filled for exited containers only.
    pub exit_code: Option<i64>,
    pub oom_killed: bool,
    pub error: Option<String>,
}

/// Display-ready stats cached per container id.
#[derive(Debug, Clone)]
pub struct ContainerStatsInfo {
    pub cpu_display: String,
    pub mem_display: String,
    pub image_size: String,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct DockerProbe {
    client: Option<Docker>,
}

impl DockerProbe {
    /// Connect to the local engine; a missing socket leaves the probe in
    /// CLI-fallback mode rather than failing.
    pub fn new() -> Self {
        let client = Docker::connect_with_local_defaults().ok();
        if client.is_none() {
            tracing::info!("docker socket unavailable, falling back to CLI probing");
        }
        Self { client }
    }

    pub async fn available(&self) -> bool {
        match &self.client {
            Some(docker) => docker.ping().await.is_ok(),
            None => runner::succeeds("docker", &["ps", "-q"]).await,
        }
    }

    /// List all containers, including stopped ones, with compose metadata
    /// and failure metadata for exited containers.
    pub async fn containers(&self) -> Vec<ContainerInfo> {
        match &self.client {
            Some(docker) => self.containers_api(docker).await.unwrap_or_default(),
            None => self.containers_cli().await,
        }
    }

    async fn containers_api(&self, docker: &Docker) -> Result<Vec<ContainerInfo>> {
        let options = ListContainersOptions::<String> {
            all: true,
            ..Default::default()
        };
        let summaries = docker
            .list_containers(Some(options))
            .await
            .context("list containers")?;

        let mut result = Vec::with_capacity(summaries.len());
        for summary in summaries {
            let id = summary.id.unwrap_or_default();
            let name = summary
                .names
                .and_then(|n| n.first().cloned())
                .unwrap_or_default()
                .trim_start_matches('/')
                .to_string();
            let state = summary.state.unwrap_or_default();
            let status = ContainerStatus::from(state.as_str());
            let labels = summary.labels.unwrap_or_default();

            let ports = summary
                .ports
                .unwrap_or_default()
                .iter()
                .filter_map(|p| p.public_port.map(|pub_p| format!("{}:{}", pub_p, p.private_port)))
                .collect::<Vec<_>>()
                .join(", ");

            let mut info = ContainerInfo {
                name,
                status,
                status_text: summary.status.unwrap_or(state),
                image: summary.image.unwrap_or_default(),
                ports,
                compose_project: labels.get(COMPOSE_PROJECT_LABEL).cloned(),
                compose_service: labels.get(COMPOSE_SERVICE_LABEL).cloned(),
                project_dir: labels.get(COMPOSE_WORKDIR_LABEL).cloned(),
                exit_code: None,
                oom_killed: false,
                error: None,
                id,
            };

            if info.status == ContainerStatus::Exited {
                if let Ok(inspect) = docker.inspect_container(&info.id, None).await {
                    if let Some(state) = inspect.state {
                        info.exit_code = state.exit_code;
                        info.oom_killed = state.oom_killed.unwrap_or(false);
                        info.error = state.error.filter(|e| !e.is_empty());
                    }
                }
            }

            result.push(info);
        }
        Ok(result)
    }

    async fn containers_cli(&self) -> Vec<ContainerInfo> {
        let output = match runner::run(
            "docker",
            &[
                "ps",
                "-a",
                "--format",
                "{{.ID}}|{{.Image}}|{{.Status}}|{{.Names}}|{{.Ports}}",
            ],
        )
        .await
        {
            Ok(out) => out,
            Err(_) => return Vec::new(),
        };

        String::from_utf8_lossy(&output)
            .lines()
            .filter_map(parse_cli_line)
            .collect()
    }

    /// One-shot stats plus the image size, for a running container only.
    pub async fn container_stats(&self, info: &ContainerInfo) -> Option<ContainerStatsInfo> {
        if info.status != ContainerStatus::Running {
            return None;
        }

        let (cpu_display, mem_display) = match &self.client {
            Some(docker) => {
                let options = StatsOptions {
                    stream: false,
                    one_shot: true,
                };
                let mut stream = docker.stats(&info.id, Some(options));
                match stream.next().await {
                    Some(Ok(stats)) => format_api_stats(&stats),
                    _ => return None,
                }
            }
            None => self.stats_cli(&info.id).await?,
        };

        Some(ContainerStatsInfo {
            cpu_display,
            mem_display,
            image_size: self.image_size(&info.image).await.unwrap_or_default(),
            fetched_at: Utc::now(),
        })
    }

    async fn stats_cli(&self, id: &str) -> Option<(String, String)> {
        if !runner::is_valid_container_id(id) {
            return None;
        }
        let output = runner::run(
            "docker",
            &["stats", "--no-stream", "--format", "{{.CPUPerc}}|{{.MemUsage}}", id],
        )
        .await
        .ok()?;
        let text = String::from_utf8_lossy(&output);
        let mut parts = text.trim().split('|');
        Some((parts.next()?.to_string(), parts.next()?.to_string()))
    }

    /// Human-readable size of an image, from the image listing.
    pub async fn image_size(&self, image: &str) -> Option<String> {
        match &self.client {
            Some(docker) => {
                let images = docker
                    .list_images(Some(ListImagesOptions::<String>::default()))
                    .await
                    .ok()?;
                images
                    .iter()
                    .find(|img| img.repo_tags.iter().any(|t| t == image))
                    .map(|img| format_bytes(img.size.max(0) as u64))
            }
            None => {
                let output = runner::run(
                    "docker",
                    &["images", "--format", "{{.Repository}}:{{.Tag}}|{{.Size}}", image],
                )
                .await
                .ok()?;
                String::from_utf8_lossy(&output)
                    .lines()
                    .next()
                    .and_then(|l| l.split('|').nth(1))
                    .map(str::to_string)
            }
        }
    }

    /// Last `tail` lines of a container's logs, capped to the last hour.
    pub async fn logs(&self, id: &str, tail: usize) -> Result<String> {
        if !runner::is_valid_container_id(id) {
            anyhow::bail!("invalid container id");
        }
        match &self.client {
            Some(docker) => {
                let options = LogsOptions::<String> {
                    stdout: true,
                    stderr: true,
                    tail: tail.to_string(),
                    ..Default::default()
                };
                let mut stream = docker.logs(id, Some(options));
                let mut lines = Vec::new();
                while let Some(Ok(log)) = stream.next().await {
                    lines.push(log.to_string());
                }
                Ok(lines.join(""))
            }
            None => {
                let tail_arg = tail.to_string();
                let (_, text) = runner::run_combined(
                    "docker",
                    &["logs", id, "--tail", &tail_arg, "--since", "1h"],
                    runner::DEFAULT_TIMEOUT,
                )
                .await?;
                Ok(text)
            }
        }
    }

    pub async fn start_container(&self, id: &str) -> Result<()> {
        match &self.client {
            Some(docker) => Ok(docker.start_container::<String>(id, None).await?),
            None => {
                runner::run("docker", &["start", id]).await?;
                Ok(())
            }
        }
    }

    pub async fn stop_container(&self, id: &str) -> Result<()> {
        match &self.client {
            Some(docker) => Ok(docker.stop_container(id, None).await?),
            None => {
                runner::run_with_timeout("docker", &["stop", id], std::time::Duration::from_secs(15))
                    .await?;
                Ok(())
            }
        }
    }

    pub async fn restart_container(&self, id: &str) -> Result<()> {
        match &self.client {
            Some(docker) => Ok(docker.restart_container(id, None).await?),
            None => {
                runner::run_with_timeout(
                    "docker",
                    &["restart", id],
                    std::time::Duration::from_secs(15),
                )
                .await?;
                Ok(())
            }
        }
    }

    /// Remove a container together with its anonymous volumes.
    pub async fn remove_container(&self, id: &str) -> Result<()> {
        match &self.client {
            Some(docker) => {
                let options = RemoveContainerOptions {
                    force: true,
                    v: true,
                    ..Default::default()
                };
                Ok(docker.remove_container(id, Some(options)).await?)
            }
            None => {
                runner::run("docker", &["rm", "-f", id]).await?;
                Ok(())
            }
        }
    }

    pub async fn prune_images(&self) -> Result<String> {
        // The CLI reports reclaimed space, which is what the banner shows.
        let (ok, text) =
            runner::run_combined("docker", &["image", "prune", "-f"], runner::DEFAULT_TIMEOUT)
                .await?;
        if !ok {
            anyhow::bail!("image prune failed: {}", text.trim());
        }
        Ok(text)
    }
}

impl Default for DockerProbe {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse one `docker ps --format '{{.ID}}|{{.Image}}|{{.Status}}|{{.Names}}|{{.Ports}}'` line.
fn parse_cli_line(line: &str) -> Option<ContainerInfo> {
    let parts: Vec<&str> = line.split('|').collect();
    if parts.len() < 5 {
        return None;
    }

    let status_text = parts[2].to_string();
    let status = if status_text.starts_with("Up") {
        ContainerStatus::Running
    } else if status_text.starts_with("Exited") || status_text.starts_with("Dead") {
        ContainerStatus::Exited
    } else {
        ContainerStatus::Other
    };

    Some(ContainerInfo {
        id: parts[0].to_string(),
        image: parts[1].to_string(),
        status,
        status_text,
        name: parts[3].to_string(),
        ports: parts[4].to_string(),
        compose_project: None,
        compose_service: None,
        project_dir: None,
        exit_code: None,
        oom_killed: false,
        error: None,
    })
}

fn format_api_stats(stats: &Stats) -> (String, String) {
    let cpu_delta = stats.cpu_stats.cpu_usage.total_usage as f64
        - stats.precpu_stats.cpu_usage.total_usage as f64;
    let system_delta = stats.cpu_stats.system_cpu_usage.unwrap_or(0) as f64
        - stats.precpu_stats.system_cpu_usage.unwrap_or(0) as f64;
    let num_cpus = stats.cpu_stats.online_cpus.unwrap_or(1).max(1);

    let cpu_percent = if system_delta > 0.0 && cpu_delta > 0.0 {
        let pct = (cpu_delta / system_delta) * num_cpus as f64 * 100.0;
        if pct.is_finite() {
            pct
        } else {
            0.0
        }
    } else {
        0.0
    };

    let usage = stats.memory_stats.usage.unwrap_or(0);
    let limit = stats.memory_stats.limit.unwrap_or(0);

    (
        format!("{:.1}%", cpu_percent),
        format!("{} / {}", format_bytes(usage), format_bytes(limit)),
    )
}

fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    if bytes >= GB {
        format!("{:.2}GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1}MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.0}KB", bytes as f64 / KB as f64)
    } else {
        format!("{}B", bytes)
    }
}

/// Group containers by compose project; containers without a project label
/// come last under `None`.
pub fn group_by_project(
    containers: &[ContainerInfo],
) -> Vec<(Option<String>, Vec<&ContainerInfo>)> {
    let mut groups: Vec<(Option<String>, Vec<&ContainerInfo>)> = Vec::new();
    for c in containers {
        match groups.iter_mut().find(|(p, _)| *p == c.compose_project) {
            Some((_, list)) => list.push(c),
            None => groups.push((c.compose_project.clone(), vec![c])),
        }
    }
    groups.sort_by(|(a, _), (b, _)| match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
    groups
}

/// Detail text for the Docker panel.
pub fn format_containers(
    containers: &[ContainerInfo],
    stats: &HashMap<String, ContainerStatsInfo>,
) -> String {
    if containers.is_empty() {
        return "No containers".to_string();
    }

    let running = containers
        .iter()
        .filter(|c| c.status == ContainerStatus::Running)
        .count();
    let mut out = format!("Containers: {} ({} running)\n", containers.len(), running);

    for (project, members) in group_by_project(containers) {
        if let Some(project) = project {
            out.push_str(&format!("\nproject: {}\n", project));
        } else if containers.iter().any(|c| c.compose_project.is_some()) {
            out.push_str("\nstandalone:\n");
        } else {
            out.push('\n');
        }
        for c in members {
            let mut line = format!("  {} [{}] {}", c.name, c.status_text, c.image);
            if let Some(s) = stats.get(&c.id) {
                line.push_str(&format!(
                    " | CPU {} | MEM {}",
                    s.cpu_display, s.mem_display
                ));
            }
            out.push_str(&line);
            out.push('\n');
            if c.oom_killed {
                out.push_str("    ! OOM killed\n");
            } else if let Some(code) = c.exit_code {
                if code != 0 {
                    out.push_str(&format!("    ! exit code {}\n", code));
                    if let Some(err) = &c.error {
                        out.push_str(&format!("    ! {}\n", err));
                    }
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(ContainerStatus::from("running"), ContainerStatus::Running);
        assert_eq!(ContainerStatus::from("RUNNING"), ContainerStatus::Running);
        assert_eq!(ContainerStatus::from("exited"), ContainerStatus::Exited);
        assert_eq!(ContainerStatus::from("dead"), ContainerStatus::Exited);
        assert_eq!(ContainerStatus::from("paused"), ContainerStatus::Other);
    }

    #[test]
    fn parses_cli_format_line() {
        let line = "3fa9c1|nginx:latest|Up 2 hours|web-frontend|0.0.0.0:3000->80/tcp";
        let info = parse_cli_line(line).expect("line should parse");
        assert_eq!(info.id, "3fa9c1");
        assert_eq!(info.image, "nginx:latest");
        assert_eq!(info.status, ContainerStatus::Running);
        assert_eq!(info.name, "web-frontend");

        let exited = parse_cli_line("ab12|pg:16|Exited (137) 5 seconds ago|db|").unwrap();
        assert_eq!(exited.status, ContainerStatus::Exited);

        assert!(parse_cli_line("not|enough|fields").is_none());
    }

    #[test]
    fn byte_formatting() {
        assert_eq!(format_bytes(512), "512B");
        assert_eq!(format_bytes(2048), "2KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0MB");
        assert_eq!(format_bytes(5 * 1024 * 1024 * 1024), "5.00GB");
    }

    #[test]
    fn groups_compose_projects() {
        let mk = |name: &str, project: Option<&str>| ContainerInfo {
            id: name.to_string(),
            name: name.to_string(),
            status: ContainerStatus::Running,
            status_text: "Up".into(),
            image: "img".into(),
            ports: String::new(),
            compose_project: project.map(str::to_string),
            compose_service: None,
            project_dir: None,
            exit_code: None,
            oom_killed: false,
            error: None,
        };
        let containers = vec![
            mk("a", Some("app")),
            mk("b", None),
            mk("c", Some("app")),
            mk("d", Some("zeta")),
        ];
        let groups = group_by_project(&containers);
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].0.as_deref(), Some("app"));
        assert_eq!(groups[0].1.len(), 2);
        assert_eq!(groups[2].0, None, "standalone containers come last");
    }

    #[test]
    fn empty_list_formats_without_panic() {
        let text = format_containers(&[], &HashMap::new());
        assert_eq!(text, "No containers");
    }
}
