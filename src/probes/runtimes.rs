//! Node.js and Python runtime discovery.
//!
//! Both collectors walk pgrep matches, resolve the working directory from
//! `lsof -p`, and read uptime and resource usage per pid. Node processes get
//! their project name from `package.json`; Python processes are classified
//! by command-line substring.

use serde::Deserialize;

use super::stats::{self, ProcessStats};
use super::{ports, runner};

#[derive(Debug, Clone)]
pub struct NodeProcess {
    pub pid: String,
    pub project_dir: String,
    pub project_name: Option<String>,
    pub uptime: String,
    pub stats: ProcessStats,
    pub port: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PythonProcess {
    pub pid: String,
    pub project_dir: String,
    /// Framework label: Jupyter Notebook, Flask, Django, FastAPI, Streamlit
    /// or plain Python.
    pub kind: String,
    pub uptime: String,
    pub stats: ProcessStats,
    pub port: Option<String>,
}

#[derive(Deserialize)]
struct PackageJson {
    name: Option<String>,
}

pub async fn node_processes() -> Vec<NodeProcess> {
    let mut result = Vec::new();
    for pid in discover_pids("node").await {
        let Some(project_dir) = process_cwd(&pid).await else {
            continue;
        };
        result.push(NodeProcess {
            project_name: package_name(&project_dir),
            uptime: process_uptime(&pid).await,
            stats: stats::process_stats(&pid).await,
            port: ports::port_for_pid(&pid).await,
            pid,
            project_dir,
        });
    }
    result
}

pub async fn python_processes() -> Vec<PythonProcess> {
    let mut result = Vec::new();
    for pid in discover_pids("python").await {
        let Some(project_dir) = process_cwd(&pid).await else {
            continue;
        };
        let cmdline = process_command(&pid).await;
        result.push(PythonProcess {
            kind: classify_python(&cmdline).to_string(),
            uptime: process_uptime(&pid).await,
            stats: stats::process_stats(&pid).await,
            port: ports::port_for_pid(&pid).await,
            pid,
            project_dir,
        });
    }
    result
}

async fn discover_pids(process_name: &str) -> Vec<String> {
    let output = match runner::run("pgrep", &[process_name]).await {
        Ok(out) => out,
        Err(_) => return Vec::new(),
    };
    String::from_utf8_lossy(&output)
        .lines()
        .map(str::trim)
        .filter(|p| runner::is_valid_pid(p))
        .map(str::to_string)
        .collect()
}

/// Working directory of a pid, from the `cwd` row of `lsof -p`.
async fn process_cwd(pid: &str) -> Option<String> {
    let output = runner::run("lsof", &["-p", pid]).await.ok()?;
    let text = String::from_utf8_lossy(&output);
    parse_cwd(&text)
}

fn parse_cwd(lsof_output: &str) -> Option<String> {
    lsof_output
        .lines()
        .find(|line| line.contains(" cwd "))
        .and_then(|line| line.split_whitespace().last())
        .map(str::to_string)
}

async fn process_uptime(pid: &str) -> String {
    runner::run("ps", &["-o", "etime=", "-p", pid])
        .await
        .map(|out| String::from_utf8_lossy(&out).trim().to_string())
        .unwrap_or_default()
}

async fn process_command(pid: &str) -> String {
    runner::run("ps", &["-o", "command=", "-p", pid])
        .await
        .map(|out| String::from_utf8_lossy(&out).trim().to_string())
        .unwrap_or_default()
}

fn package_name(dir: &str) -> Option<String> {
    let content = std::fs::read_to_string(std::path::Path::new(dir).join("package.json")).ok()?;
    serde_json::from_str::<PackageJson>(&content).ok()?.name
}

fn classify_python(cmdline: &str) -> &'static str {
    let lower = cmdline.to_lowercase();
    if lower.contains("jupyter") {
        "Jupyter Notebook"
    } else if lower.contains("flask") {
        "Flask"
    } else if lower.contains("django") {
        "Django"
    } else if lower.contains("uvicorn") || lower.contains("fastapi") {
        "FastAPI"
    } else if lower.contains("streamlit") {
        "Streamlit"
    } else {
        "Python"
    }
}

pub fn format_node_overview(processes: &[NodeProcess]) -> String {
    if processes.is_empty() {
        return "Node.js: not detected".to_string();
    }
    let mut out = String::from("Node.js: running\n");
    for p in processes {
        out.push_str(&format!("  - PID {} | {}\n", p.pid, p.project_dir));
        let mut info = String::from("    ");
        if let Some(name) = &p.project_name {
            info.push_str(&format!("(package.json: {}) | ", name));
        }
        if !p.uptime.is_empty() {
            info.push_str(&format!("up {} | ", p.uptime));
        }
        if let Some(port) = &p.port {
            info.push_str(&format!("[:{}] | ", port));
        }
        let stats_line = stats::format_stats(p.stats);
        if !stats_line.is_empty() {
            info.push_str(&stats_line);
        }
        out.push_str(info.trim_end_matches(" | "));
        out.push('\n');
    }
    out
}

pub fn format_python_overview(processes: &[PythonProcess]) -> String {
    if processes.is_empty() {
        return "Python: not detected".to_string();
    }
    let mut out = String::from("Python: running\n");
    for p in processes {
        out.push_str(&format!("  - PID {} | {} ({})\n", p.pid, p.project_dir, p.kind));
        let mut info = String::from("    ");
        if !p.uptime.is_empty() {
            info.push_str(&format!("up {} | ", p.uptime));
        }
        if let Some(port) = &p.port {
            info.push_str(&format!("[:{}] | ", port));
        }
        let stats_line = stats::format_stats(p.stats);
        if !stats_line.is_empty() {
            info.push_str(&stats_line);
        }
        out.push_str(info.trim_end_matches(" | "));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_python_frameworks() {
        assert_eq!(classify_python("python -m flask run"), "Flask");
        assert_eq!(classify_python("python manage.py runserver"), "Python");
        assert_eq!(classify_python("python -m django runserver"), "Django");
        assert_eq!(classify_python("uvicorn app:api --reload"), "FastAPI");
        assert_eq!(classify_python("jupyter-notebook --port 8888"), "Jupyter Notebook");
        assert_eq!(classify_python("streamlit run app.py"), "Streamlit");
        assert_eq!(classify_python("python script.py"), "Python");
    }

    #[test]
    fn extracts_cwd_from_lsof() {
        let out = "COMMAND  PID USER  FD   TYPE DEVICE SIZE/OFF NODE NAME\n\
                   node    1234 dev  cwd    DIR  1,4      576  123 /home/dev/app\n\
                   node    1234 dev  txt    REG  1,4    12345  456 /usr/bin/node\n";
        assert_eq!(parse_cwd(out).as_deref(), Some("/home/dev/app"));
        assert_eq!(parse_cwd("no cwd row here\n"), None);
    }

    #[test]
    fn empty_process_lists_format() {
        assert!(format_node_overview(&[]).contains("not detected"));
        assert!(format_python_overview(&[]).contains("not detected"));
    }

    #[test]
    fn node_overview_lists_project() {
        let procs = vec![NodeProcess {
            pid: "12345".into(),
            project_dir: "/app/frontend".into(),
            project_name: Some("frontend".into()),
            uptime: "2:01:30".into(),
            stats: ProcessStats { cpu: 2.1, memory_kb: 153600 },
            port: Some("3000".into()),
        }];
        let text = format_node_overview(&procs);
        assert!(text.contains("PID 12345"));
        assert!(text.contains("package.json: frontend"));
        assert!(text.contains("[:3000]"));
    }
}
