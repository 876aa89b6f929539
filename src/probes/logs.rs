//! Log fetchers for the `L` overlay: container logs through the engine,
//! process logs from conventional files in the project directory.

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};

use super::docker::DockerProbe;

pub const DEFAULT_TAIL: usize = 200;

pub async fn container_logs(docker: &DockerProbe, id: &str, lines: usize) -> Result<String> {
    let text = docker.logs(id, lines).await?;
    if text.trim().is_empty() {
        Ok("(no log output in the last hour)".to_string())
    } else {
        Ok(text)
    }
}

/// Last `lines` of the newest log file under conventional project locations.
pub fn process_logs(project_dir: &str, lines: usize) -> Result<String> {
    if project_dir.is_empty() {
        bail!("project directory unknown");
    }
    // Paths come out of lsof; refuse anything that smells like shell metatext.
    if project_dir.contains(|c| ";|&$`".contains(c)) {
        bail!("unsafe project directory path");
    }

    let dir = Path::new(project_dir);
    let candidates = find_log_files(dir);
    let Some(newest) = newest_file(&candidates) else {
        bail!("no log files found under {}", project_dir);
    };

    let content = std::fs::read_to_string(&newest)?;
    Ok(last_lines(&content, lines))
}

fn find_log_files(dir: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    for sub in ["logs", "log", ".log", ""] {
        let scan_dir = if sub.is_empty() { dir.to_path_buf() } else { dir.join(sub) };
        let Ok(entries) = std::fs::read_dir(&scan_dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_some_and(|e| e == "log") {
                found.push(path);
            }
        }
    }
    for fixed in ["npm-debug.log", "yarn-error.log"] {
        let path = dir.join(fixed);
        if path.exists() && !found.contains(&path) {
            found.push(path);
        }
    }
    found
}

fn newest_file(files: &[PathBuf]) -> Option<PathBuf> {
    files
        .iter()
        .filter_map(|p| {
            let modified = std::fs::metadata(p).ok()?.modified().ok()?;
            Some((modified, p.clone()))
        })
        .max_by_key(|(modified, _)| *modified)
        .map(|(_, p)| p)
}

fn last_lines(content: &str, n: usize) -> String {
    let lines: Vec<&str> = content.lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn tails_last_lines() {
        let content = (1..=10).map(|i| format!("line{}", i)).collect::<Vec<_>>().join("\n");
        let tail = last_lines(&content, 3);
        assert_eq!(tail, "line8\nline9\nline10");
        assert_eq!(last_lines("one", 5), "one");
    }

    #[test]
    fn rejects_unsafe_paths() {
        assert!(process_logs("/tmp; rm -rf /", 10).is_err());
        assert!(process_logs("", 10).is_err());
    }

    #[test]
    fn finds_newest_log_in_logs_dir() {
        let dir = tempfile::tempdir().unwrap();
        let logs = dir.path().join("logs");
        std::fs::create_dir(&logs).unwrap();

        let mut old = std::fs::File::create(logs.join("old.log")).unwrap();
        writeln!(old, "old entry").unwrap();
        // Ensure a strictly newer mtime for the second file.
        std::thread::sleep(std::time::Duration::from_millis(20));
        let mut new = std::fs::File::create(logs.join("new.log")).unwrap();
        writeln!(new, "a\nb\nnew entry").unwrap();

        let text = process_logs(dir.path().to_str().unwrap(), 2).unwrap();
        assert!(text.contains("new entry"));
        assert!(!text.contains("old entry"));
    }

    #[test]
    fn missing_logs_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(process_logs(dir.path().to_str().unwrap(), 10).is_err());
    }
}
