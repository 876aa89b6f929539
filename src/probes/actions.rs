//! Dispatch of user-confirmed destructive actions.
//!
//! Every entry point validates probe-derived identifiers before anything
//! reaches the OS; a validation failure refuses the dispatch and logs a
//! diagnostic instead of invoking the tool.

#![allow(dead_code)]

use std::time::Duration;

use once_cell::sync::OnceCell;

use crate::logger;

use super::docker::DockerProbe;
use super::runner;

// Compose operations rebuild images; give them room.
const COMPOSE_TIMEOUT: Duration = Duration::from_secs(120);
const DB_TIMEOUT: Duration = Duration::from_secs(30);

/// Actions reachable from the confirmation dialog. The variants enumerate
/// every destructive transition the controller can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmAction {
    ContainerStart,
    ContainerStop,
    ContainerRestart,
    ContainerRebuild,
    ContainerRemove,
    ProjectStart,
    ProjectStop,
    ProjectDown,
    ProjectRestart,
    ProjectRebuild,
    PostgresDrop,
    PostgresVacuum,
    PostgresAnalyze,
    MySqlDrop,
    MySqlOptimize,
    RedisFlush,
    Kill,
    ForceKill,
    CleanImages,
    /// Execute the command the AI proposed (shell path).
    RunAiCommand,
}

impl ConfirmAction {
    /// Verb used in dialog messages and result banners.
    pub fn verb(&self) -> &'static str {
        match self {
            Self::ContainerStart | Self::ProjectStart => "start",
            Self::ContainerStop | Self::ProjectStop => "stop",
            Self::ContainerRestart | Self::ProjectRestart => "restart",
            Self::ContainerRebuild | Self::ProjectRebuild => "rebuild",
            Self::ContainerRemove | Self::ProjectDown => "remove",
            Self::PostgresDrop | Self::MySqlDrop => "drop",
            Self::PostgresVacuum => "vacuum",
            Self::PostgresAnalyze => "analyze",
            Self::MySqlOptimize => "optimize",
            Self::RedisFlush => "flush",
            Self::Kill => "kill",
            Self::ForceKill => "force-kill",
            Self::CleanImages => "prune dangling images from",
            Self::RunAiCommand => "run",
        }
    }
}

/// What the target string of a confirmed action denotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Container,
    ComposeProject,
    PostgresDatabase,
    MySqlDatabase,
    RedisDatabase,
    Process,
    DockerSystem,
    AiCommand,
}

/// A fully specified confirmed action.
#[derive(Debug, Clone)]
pub struct ActionRequest {
    pub action: ConfirmAction,
    pub kind: TargetKind,
    /// Container id, project name, database name, pid, or shell command.
    pub target: String,
    /// Compose working directory, when known from container labels.
    pub project_dir: Option<String>,
    /// Compose service name, for service-scoped rebuilds.
    pub service: Option<String>,
}

/// Result surfaced as the command banner.
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    pub success: bool,
    pub message: String,
}

impl CommandOutcome {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }

    fn refused(reason: &str, target: &str) -> Self {
        logger::log_issue("VALIDATION", &format!("{}: {:?}", reason, target));
        Self::failed(format!("refused: {}", reason))
    }
}

/// Execute a confirmed action. Never panics; every failure becomes a banner.
pub async fn execute(docker: &DockerProbe, request: &ActionRequest) -> CommandOutcome {
    match request.kind {
        TargetKind::Container => execute_container(docker, request).await,
        TargetKind::ComposeProject => execute_project(docker, request).await,
        TargetKind::PostgresDatabase => execute_postgres(request).await,
        TargetKind::MySqlDatabase => execute_mysql(request).await,
        TargetKind::RedisDatabase => execute_redis(request).await,
        TargetKind::Process => execute_kill(request).await,
        TargetKind::DockerSystem => execute_docker_system(docker, request).await,
        TargetKind::AiCommand => execute_ai_command(&request.target).await,
    }
}

async fn execute_container(docker: &DockerProbe, request: &ActionRequest) -> CommandOutcome {
    let id = &request.target;
    if !runner::is_valid_container_id(id) {
        return CommandOutcome::refused("invalid container id", id);
    }

    let result = match request.action {
        ConfirmAction::ContainerStart => docker.start_container(id).await,
        ConfirmAction::ContainerStop => docker.stop_container(id).await,
        ConfirmAction::ContainerRestart => docker.restart_container(id).await,
        ConfirmAction::ContainerRemove => docker.remove_container(id).await,
        ConfirmAction::ContainerRebuild => {
            return rebuild_service(request).await;
        }
        other => return CommandOutcome::failed(format!("unsupported container action {other:?}")),
    };

    match result {
        Ok(()) => CommandOutcome::ok(format!("container {}ed", request.action.verb())),
        Err(e) => CommandOutcome::failed(format!("container {} failed: {}", request.action.verb(), e)),
    }
}

/// Rebuild one compose service in place (`up -d --build <service>`).
async fn rebuild_service(request: &ActionRequest) -> CommandOutcome {
    let (Some(dir), Some(service)) = (&request.project_dir, &request.service) else {
        return CommandOutcome::failed("not a compose-managed container");
    };
    if !runner::is_valid_identifier(service) {
        return CommandOutcome::refused("invalid compose service name", service);
    }

    match compose_command(dir, &["up", "-d", "--build", service]).await {
        Ok(_) => CommandOutcome::ok(format!("service {} rebuilt", service)),
        Err(e) => CommandOutcome::failed(format!("rebuild failed: {}", e)),
    }
}

async fn execute_project(docker: &DockerProbe, request: &ActionRequest) -> CommandOutcome {
    let project = &request.target;
    let Some(dir) = resolve_project_dir(docker, request).await else {
        return CommandOutcome::failed(format!("working directory for project {} not found", project));
    };

    let args: &[&str] = match request.action {
        ConfirmAction::ProjectStart | ConfirmAction::ProjectRestart => &["up", "-d"],
        ConfirmAction::ProjectStop => &["stop"],
        ConfirmAction::ProjectDown => &["down"],
        ConfirmAction::ProjectRebuild => &["up", "-d", "--build"],
        other => return CommandOutcome::failed(format!("unsupported project action {other:?}")),
    };

    match compose_command(&dir, args).await {
        Ok(_) => CommandOutcome::ok(format!("project {} {}ed", project, request.action.verb())),
        Err(e) => {
            CommandOutcome::failed(format!("project {} failed: {}", request.action.verb(), e))
        }
    }
}

async fn resolve_project_dir(docker: &DockerProbe, request: &ActionRequest) -> Option<String> {
    if let Some(dir) = &request.project_dir {
        return Some(dir.clone());
    }
    docker
        .containers()
        .await
        .into_iter()
        .find(|c| c.compose_project.as_deref() == Some(request.target.as_str()))
        .and_then(|c| c.project_dir)
}

async fn execute_postgres(request: &ActionRequest) -> CommandOutcome {
    let name = &request.target;
    if !runner::is_valid_identifier(name) {
        return CommandOutcome::refused("invalid database name", name);
    }

    let result = match request.action {
        ConfirmAction::PostgresDrop => runner::run_with_timeout("dropdb", &[name], DB_TIMEOUT).await,
        ConfirmAction::PostgresVacuum => {
            runner::run_with_timeout("psql", &["-d", name, "-c", "VACUUM;"], DB_TIMEOUT).await
        }
        ConfirmAction::PostgresAnalyze => {
            runner::run_with_timeout("psql", &["-d", name, "-c", "ANALYZE;"], DB_TIMEOUT).await
        }
        other => return CommandOutcome::failed(format!("unsupported postgres action {other:?}")),
    };

    match result {
        Ok(_) => CommandOutcome::ok(format!("database {} {}ed", name, request.action.verb())),
        Err(e) => CommandOutcome::failed(format!("database {} failed: {}", request.action.verb(), e)),
    }
}

async fn execute_mysql(request: &ActionRequest) -> CommandOutcome {
    let name = &request.target;
    if !runner::is_valid_identifier(name) {
        return CommandOutcome::refused("invalid database name", name);
    }

    // The identifier validator guarantees the name is safe to interpolate
    // into the statement.
    let statement = match request.action {
        ConfirmAction::MySqlDrop => format!("DROP DATABASE IF EXISTS {};", name),
        ConfirmAction::MySqlOptimize => format!("OPTIMIZE TABLE {}.*;", name),
        other => return CommandOutcome::failed(format!("unsupported mysql action {other:?}")),
    };

    match runner::run_with_timeout("mysql", &["-e", &statement], DB_TIMEOUT).await {
        Ok(_) => CommandOutcome::ok(format!("database {} {}ed", name, request.action.verb())),
        Err(e) => CommandOutcome::failed(format!("database {} failed: {}", request.action.verb(), e)),
    }
}

async fn execute_redis(request: &ActionRequest) -> CommandOutcome {
    let index = request.target.trim_start_matches("db");
    if !runner::is_valid_pid(index) {
        // keyspace indexes are plain digits
        return CommandOutcome::refused("invalid keyspace index", &request.target);
    }
    if request.action != ConfirmAction::RedisFlush {
        return CommandOutcome::failed("unsupported redis action");
    }

    match runner::run("redis-cli", &["-n", index, "FLUSHDB"]).await {
        Ok(_) => CommandOutcome::ok(format!("keyspace db{} flushed", index)),
        Err(e) => CommandOutcome::failed(format!("flush failed: {}", e)),
    }
}

async fn execute_kill(request: &ActionRequest) -> CommandOutcome {
    let pid = &request.target;
    if !runner::is_valid_pid(pid) {
        return CommandOutcome::refused("invalid pid", pid);
    }

    let result = match request.action {
        ConfirmAction::Kill => runner::run("kill", &[pid]).await,
        ConfirmAction::ForceKill => runner::run("kill", &["-9", pid]).await,
        other => return CommandOutcome::failed(format!("unsupported process action {other:?}")),
    };

    match result {
        Ok(_) => CommandOutcome::ok(format!("process {} {}ed", pid, request.action.verb())),
        Err(e) => CommandOutcome::failed(format!("kill failed: {}", e)),
    }
}

async fn execute_docker_system(docker: &DockerProbe, request: &ActionRequest) -> CommandOutcome {
    match request.action {
        ConfirmAction::CleanImages => match docker.prune_images().await {
            Ok(output) => {
                let trailer = output.lines().last().unwrap_or("").trim().to_string();
                CommandOutcome::ok(format!("dangling images removed. {}", trailer))
            }
            Err(e) => CommandOutcome::failed(format!("image prune failed: {}", e)),
        },
        other => CommandOutcome::failed(format!("unsupported docker action {other:?}")),
    }
}

/// The one shell path in the program: an AI-proposed command the user
/// explicitly accepted.
pub async fn execute_ai_command(command: &str) -> CommandOutcome {
    match runner::run_shell(command, Duration::from_secs(60)).await {
        Ok((true, output)) => CommandOutcome::ok(format!("command succeeded:\n{}", output.trim())),
        Ok((false, output)) => {
            CommandOutcome::failed(format!("command failed:\n{}", output.trim()))
        }
        Err(e) => CommandOutcome::failed(format!("command error: {}", e)),
    }
}

/// Open the directory in the editor. Not destructive, so no confirmation.
pub async fn open_in_editor(dir: &str) -> CommandOutcome {
    match runner::run("code", &[dir]).await {
        Ok(_) => CommandOutcome::ok(format!("opened {} in editor", dir)),
        Err(e) => CommandOutcome::failed(format!("editor launch failed: {}", e)),
    }
}

static COMPOSE_V1: OnceCell<bool> = OnceCell::new();

/// Run a compose operation in the project directory, using `docker-compose`
/// when only v1 is installed, `docker compose` otherwise.
async fn compose_command(dir: &str, args: &[&str]) -> Result<(), anyhow::Error> {
    let compose_file = format!("{}/docker-compose.yml", dir.trim_end_matches('/'));

    let use_v1 = match COMPOSE_V1.get() {
        Some(v) => *v,
        None => {
            let v1 = runner::succeeds("which", &["docker-compose"]).await
                && !runner::succeeds("docker", &["compose", "version"]).await;
            *COMPOSE_V1.get_or_init(|| v1)
        }
    };

    let mut argv: Vec<&str> = if use_v1 {
        vec!["-f", compose_file.as_str()]
    } else {
        vec!["compose", "-f", compose_file.as_str()]
    };
    argv.extend_from_slice(args);

    let program = if use_v1 { "docker-compose" } else { "docker" };
    let (ok, output) = runner::run_combined(program, &argv, COMPOSE_TIMEOUT).await?;
    if !ok {
        anyhow::bail!("{}", output.trim().lines().last().unwrap_or("compose failed"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(action: ConfirmAction, kind: TargetKind, target: &str) -> ActionRequest {
        ActionRequest {
            action,
            kind,
            target: target.to_string(),
            project_dir: None,
            service: None,
        }
    }

    #[tokio::test]
    async fn refuses_invalid_pid_without_invoking() {
        let req = request(ConfirmAction::Kill, TargetKind::Process, "12; rm -rf /");
        let outcome = execute_kill(&req).await;
        assert!(!outcome.success);
        assert!(outcome.message.contains("refused"));
    }

    #[tokio::test]
    async fn refuses_invalid_database_name() {
        let req = request(
            ConfirmAction::PostgresDrop,
            TargetKind::PostgresDatabase,
            "db'; DROP TABLE users; --",
        );
        let outcome = execute_postgres(&req).await;
        assert!(!outcome.success);
        assert!(outcome.message.contains("refused"));
    }

    #[tokio::test]
    async fn refuses_invalid_container_id() {
        let docker = DockerProbe::new();
        let req = request(ConfirmAction::ContainerStop, TargetKind::Container, "UPPER");
        let outcome = execute_container(&docker, &req).await;
        assert!(!outcome.success);
        assert!(outcome.message.contains("refused"));
    }

    #[tokio::test]
    async fn ai_command_reports_combined_output() {
        let outcome = execute_ai_command("echo fixed-it").await;
        assert!(outcome.success);
        assert!(outcome.message.contains("fixed-it"));

        let outcome = execute_ai_command("echo broke >&2; exit 1").await;
        assert!(!outcome.success);
        assert!(outcome.message.contains("broke"));
    }

    #[test]
    fn verbs_cover_dialog_text() {
        assert_eq!(ConfirmAction::ProjectRebuild.verb(), "rebuild");
        assert_eq!(ConfirmAction::RedisFlush.verb(), "flush");
        assert_eq!(ConfirmAction::ForceKill.verb(), "force-kill");
    }
}
