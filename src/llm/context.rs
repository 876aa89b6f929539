//! System-state report assembled for the LLM (JSON) and for humans
//! (Markdown). Every section tolerates probe failure: absent services show
//! up as `running: false` or empty lists, never as errors.

#![allow(dead_code)]

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::probes::docker::{ContainerInfo, DockerProbe};
use crate::probes::system::{ProcessInfo, SystemProbe, SystemResources};
use crate::probes::{mysql, ports, postgres, redis, runtimes, system};

#[derive(Debug, Serialize)]
pub struct SystemContext {
    pub cpu_usage: f64,
    pub memory_used_mb: i64,
    pub memory_total_mb: i64,
    pub memory_usage_percent: f64,
    pub disk_usage_percent: f64,
    pub disk_free_gb: i64,
    pub top_processes: Vec<TopProcess>,
}

#[derive(Debug, Serialize)]
pub struct TopProcess {
    pub name: String,
    pub pid: String,
    pub cpu: f64,
    pub memory_mb: i64,
    pub is_dev_tool: bool,
}

#[derive(Debug, Serialize)]
pub struct DockerContainerContext {
    pub id: String,
    pub image: String,
    pub status: String,
    pub name: String,
    pub ports: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i64>,
    pub oom_killed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DockerContext {
    pub is_running: bool,
    pub container_count: usize,
    pub containers: Vec<DockerContainerContext>,
}

#[derive(Debug, Serialize, Default)]
pub struct RuntimeDetail {
    pub detected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_dir: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PortContext {
    pub port: u16,
    pub process: String,
    pub pid: String,
}

#[derive(Debug, Serialize)]
pub struct ProcessContext {
    pub node: RuntimeDetail,
    pub python: RuntimeDetail,
    pub listening_ports: Vec<PortContext>,
}

#[derive(Debug, Serialize)]
pub struct DbStatusContext {
    pub is_running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DatabaseContext {
    pub postgres: DbStatusContext,
    pub mysql: DbStatusContext,
    pub redis: DbStatusContext,
}

#[derive(Debug, Serialize)]
pub struct ProjectInfo {
    pub name: String,
    pub kind: String,
    pub path: String,
    pub dependencies: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ProjectContext {
    pub collected_at: DateTime<Utc>,
    pub current_dir: String,
    pub projects: Vec<ProjectInfo>,
}

#[derive(Debug, Serialize)]
pub struct FullContext {
    pub system: SystemContext,
    pub docker: DockerContext,
    pub process: ProcessContext,
    pub database: DatabaseContext,
    pub project: ProjectContext,
}

const MAX_DEPENDENCIES: usize = 10;

/// Collect a snapshot of everything the assistant should see.
pub async fn collect(
    docker: &DockerProbe,
    probe: &parking_lot::Mutex<SystemProbe>,
) -> FullContext {
    let resources = system::collect_resources(probe).await;
    let top = probe.lock().top_processes(5);

    let docker_available = docker.available().await;
    let containers = if docker_available {
        docker.containers().await
    } else {
        Vec::new()
    };

    let node = runtimes::node_processes().await;
    let python = runtimes::python_processes().await;
    let listening = ports::listening_ports().await;

    let pg = postgres::check().await;
    let my = mysql::check().await;
    let rd = redis::check().await;

    let cwd = std::env::current_dir()
        .map(|p| p.display().to_string())
        .unwrap_or_default();

    FullContext {
        system: system_context(&resources, &top),
        docker: docker_context(docker_available, &containers),
        process: ProcessContext {
            node: node
                .first()
                .map(|p| RuntimeDetail {
                    detected: true,
                    pid: Some(p.pid.clone()),
                    project_dir: Some(p.project_dir.clone()),
                    kind: p.project_name.clone(),
                })
                .unwrap_or_default(),
            python: python
                .first()
                .map(|p| RuntimeDetail {
                    detected: true,
                    pid: Some(p.pid.clone()),
                    project_dir: Some(p.project_dir.clone()),
                    kind: Some(p.kind.clone()),
                })
                .unwrap_or_default(),
            listening_ports: listening
                .iter()
                .map(|p| PortContext {
                    port: p.port,
                    process: p.process.clone(),
                    pid: p.pid.clone(),
                })
                .collect(),
        },
        database: DatabaseContext {
            postgres: DbStatusContext { is_running: pg.running, port: pg.port },
            mysql: DbStatusContext { is_running: my.running, port: my.port },
            redis: DbStatusContext { is_running: rd.running, port: rd.port },
        },
        project: ProjectContext {
            collected_at: Utc::now(),
            projects: detect_projects(&cwd),
            current_dir: cwd,
        },
    }
}

fn system_context(resources: &SystemResources, top: &[ProcessInfo]) -> SystemContext {
    SystemContext {
        cpu_usage: resources.cpu_usage,
        memory_used_mb: resources.memory_used,
        memory_total_mb: resources.memory_total,
        memory_usage_percent: resources.memory_perc,
        disk_usage_percent: resources.disk_perc,
        disk_free_gb: resources.disk_free,
        top_processes: top
            .iter()
            .map(|p| TopProcess {
                name: p.name.clone(),
                pid: p.pid.clone(),
                cpu: p.cpu,
                memory_mb: p.memory_mb,
                is_dev_tool: p.is_dev_tool,
            })
            .collect(),
    }
}

fn docker_context(is_running: bool, containers: &[ContainerInfo]) -> DockerContext {
    DockerContext {
        is_running,
        container_count: containers.len(),
        containers: containers
            .iter()
            .map(|c| DockerContainerContext {
                id: c.id.clone(),
                image: c.image.clone(),
                status: c.status_text.clone(),
                name: c.name.clone(),
                ports: c.ports.clone(),
                exit_code: c.exit_code,
                oom_killed: c.oom_killed,
                error: c.error.clone(),
            })
            .collect(),
    }
}

/// Sniff standard manifest files in the working directory.
fn detect_projects(dir: &str) -> Vec<ProjectInfo> {
    let dir_path = std::path::Path::new(dir);
    let base_name = || {
        dir_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| dir.to_string())
    };
    let mut projects = Vec::new();

    if let Ok(content) = std::fs::read_to_string(dir_path.join("package.json")) {
        if let Ok(pkg) = serde_json::from_str::<serde_json::Value>(&content) {
            let name = pkg
                .get("name")
                .and_then(|n| n.as_str())
                .map(str::to_string)
                .unwrap_or_else(base_name);
            let deps = pkg
                .get("dependencies")
                .and_then(|d| d.as_object())
                .map(|d| d.keys().take(MAX_DEPENDENCIES).cloned().collect())
                .unwrap_or_default();
            projects.push(ProjectInfo {
                name,
                kind: "Node.js".into(),
                path: dir.to_string(),
                dependencies: deps,
            });
        }
    }

    if let Ok(content) = std::fs::read_to_string(dir_path.join("Cargo.toml")) {
        if let Ok(manifest) = content.parse::<toml::Table>() {
            let name = manifest
                .get("package")
                .and_then(|p| p.get("name"))
                .and_then(|n| n.as_str())
                .map(str::to_string)
                .unwrap_or_else(base_name);
            let deps = manifest
                .get("dependencies")
                .and_then(|d| d.as_table())
                .map(|d| d.keys().take(MAX_DEPENDENCIES).cloned().collect())
                .unwrap_or_default();
            projects.push(ProjectInfo {
                name,
                kind: "Rust".into(),
                path: dir.to_string(),
                dependencies: deps,
            });
        }
    }

    if let Ok(content) = std::fs::read_to_string(dir_path.join("go.mod")) {
        let deps = content
            .lines()
            .map(str::trim)
            .filter(|l| {
                !l.is_empty()
                    && !l.starts_with("module")
                    && !l.starts_with("go ")
                    && !l.starts_with("require")
                    && !l.starts_with("//")
                    && !l.starts_with(')')
            })
            .filter_map(|l| l.split_whitespace().next())
            .map(str::to_string)
            .take(MAX_DEPENDENCIES)
            .collect();
        projects.push(ProjectInfo {
            name: base_name(),
            kind: "Go".into(),
            path: dir.to_string(),
            dependencies: deps,
        });
    }

    for manifest in ["pyproject.toml", "requirements.txt"] {
        if dir_path.join(manifest).exists() {
            projects.push(ProjectInfo {
                name: base_name(),
                kind: "Python".into(),
                path: dir.to_string(),
                dependencies: vec![format!("{} detected", manifest)],
            });
            break;
        }
    }

    projects
}

impl FullContext {
    /// Indented JSON: the preferred LLM input, structured data extracts
    /// better than prose.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// Markdown report for human diagnostics.
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();
        md.push_str("# System Environment Report\n\n");
        md.push_str(&format!(
            "**Generated At:** {}\n**Current Dir:** {}\n\n",
            self.project.collected_at.to_rfc3339(),
            self.project.current_dir
        ));

        md.push_str("## 1. System Resources\n");
        md.push_str(&format!("- **CPU Usage:** {:.1}%\n", self.system.cpu_usage));
        md.push_str(&format!(
            "- **Memory:** {}MB / {}MB ({:.1}%)\n",
            self.system.memory_used_mb, self.system.memory_total_mb, self.system.memory_usage_percent
        ));
        md.push_str(&format!(
            "- **Disk Usage:** {:.1}% ({}GB free)\n",
            self.system.disk_usage_percent, self.system.disk_free_gb
        ));
        if !self.system.top_processes.is_empty() {
            md.push_str("\n**Top Processes:**\n");
            for p in &self.system.top_processes {
                md.push_str(&format!(
                    "- `{}` (PID: {}): CPU {:.1}%, Mem {}MB\n",
                    p.name, p.pid, p.cpu, p.memory_mb
                ));
            }
        }
        md.push('\n');

        md.push_str("## 2. Project Context\n");
        if self.project.projects.is_empty() {
            md.push_str("No project files detected in current directory.\n");
        } else {
            for p in &self.project.projects {
                md.push_str(&format!("### {} ({})\n- Path: `{}`\n", p.name, p.kind, p.path));
                if !p.dependencies.is_empty() {
                    md.push_str("- Dependencies:\n");
                    for d in &p.dependencies {
                        md.push_str(&format!("  - {}\n", d));
                    }
                }
            }
        }
        md.push('\n');

        md.push_str("## 3. Docker Status\n");
        if !self.docker.is_running {
            md.push_str("Docker is not running.\n");
        } else {
            md.push_str(&format!("Containers: {}\n", self.docker.container_count));
            if !self.docker.containers.is_empty() {
                md.push_str("| ID | Image | Status | Ports | Info |\n|---|---|---|---|---|\n");
                for c in &self.docker.containers {
                    let info = if c.oom_killed {
                        "**OOM KILLED**".to_string()
                    } else if let Some(code) = c.exit_code.filter(|&code| code != 0) {
                        match &c.error {
                            Some(err) => format!("Exit: {} ({})", code, err),
                            None => format!("Exit: {}", code),
                        }
                    } else {
                        String::new()
                    };
                    let short_id: String = c.id.chars().take(4).collect();
                    md.push_str(&format!(
                        "| {} | {} | {} | {} | {} |\n",
                        short_id, c.image, c.status, c.ports, info
                    ));
                }
            }
        }
        md.push('\n');

        md.push_str("## 4. Databases\n");
        let fmt_db = |name: &str, s: &DbStatusContext| {
            if s.is_running {
                format!(
                    "- **{}**: RUNNING{}\n",
                    name,
                    s.port.as_deref().map(|p| format!(" (Port: {})", p)).unwrap_or_default()
                )
            } else {
                format!("- **{}**: STOPPED\n", name)
            }
        };
        md.push_str(&fmt_db("PostgreSQL", &self.database.postgres));
        md.push_str(&fmt_db("MySQL", &self.database.mysql));
        md.push_str(&fmt_db("Redis", &self.database.redis));

        md
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_context() -> FullContext {
        FullContext {
            system: SystemContext {
                cpu_usage: 12.5,
                memory_used_mb: 4300,
                memory_total_mb: 16384,
                memory_usage_percent: 26.2,
                disk_usage_percent: 61.0,
                disk_free_gb: 180,
                top_processes: vec![TopProcess {
                    name: "Node.js".into(),
                    pid: "12346".into(),
                    cpu: 5.3,
                    memory_mb: 256,
                    is_dev_tool: true,
                }],
            },
            docker: DockerContext {
                is_running: true,
                container_count: 1,
                containers: vec![DockerContainerContext {
                    id: "3fa9c1deadbeef".into(),
                    image: "postgres:16".into(),
                    status: "Exited (137) 5 seconds ago".into(),
                    name: "postgres-db".into(),
                    ports: "5432:5432".into(),
                    exit_code: Some(137),
                    oom_killed: true,
                    error: None,
                }],
            },
            process: ProcessContext {
                node: RuntimeDetail {
                    detected: true,
                    pid: Some("12346".into()),
                    project_dir: Some("/app/api".into()),
                    kind: Some("api".into()),
                },
                python: RuntimeDetail::default(),
                listening_ports: vec![PortContext {
                    port: 3000,
                    process: "node".into(),
                    pid: "12346".into(),
                }],
            },
            database: DatabaseContext {
                postgres: DbStatusContext { is_running: false, port: None },
                mysql: DbStatusContext { is_running: false, port: None },
                redis: DbStatusContext { is_running: true, port: Some("6379".into()) },
            },
            project: ProjectContext {
                collected_at: Utc::now(),
                current_dir: "/home/dev/app".into(),
                projects: vec![],
            },
        }
    }

    #[test]
    fn json_is_structured_and_parseable() {
        let ctx = sample_context();
        let json = ctx.to_json();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["system"]["cpu_usage"], 12.5);
        assert_eq!(value["docker"]["containers"][0]["oom_killed"], true);
        assert_eq!(value["database"]["redis"]["is_running"], true);
        assert_eq!(value["database"]["postgres"]["is_running"], false);
    }

    #[test]
    fn markdown_carries_all_sections() {
        let ctx = sample_context();
        let md = ctx.to_markdown();
        assert!(md.contains("# System Environment Report"));
        assert!(md.contains("## 1. System Resources"));
        assert!(md.contains("## 3. Docker Status"));
        assert!(md.contains("**OOM KILLED**"));
        assert!(md.contains("**PostgreSQL**: STOPPED"));
        assert!(md.contains("**Redis**: RUNNING (Port: 6379)"));
        assert!(md.contains("3fa9 |"), "container ids are shortened");
    }

    #[test]
    fn detects_node_and_rust_manifests() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("package.json"),
            r#"{"name":"webapp","dependencies":{"react":"^18","express":"^4"}}"#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("Cargo.toml"),
            "[package]\nname = \"svc\"\n\n[dependencies]\nserde = \"1\"\n",
        )
        .unwrap();

        let projects = detect_projects(dir.path().to_str().unwrap());
        assert_eq!(projects.len(), 2);
        assert_eq!(projects[0].name, "webapp");
        assert!(projects[0].dependencies.contains(&"react".to_string()));
        assert_eq!(projects[1].name, "svc");
        assert_eq!(projects[1].dependencies, vec!["serde".to_string()]);
    }

    #[test]
    fn empty_dir_detects_nothing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(detect_projects(dir.path().to_str().unwrap()).is_empty());
    }
}
