//! Controller-owned state.
//!
//! All mutation happens on the event loop; workers only ever hand back
//! immutable result objects. The transition helpers here are plain functions
//! of the state so the interesting machines (confirmation, pending command,
//! proactive latch) stay unit-testable without a terminal.

use std::collections::HashMap;

use crate::core::cache::{RefreshKind, ServiceCache};
use crate::probes::actions::{ActionRequest, CommandOutcome};
use crate::probes::docker::{ContainerInfo, ContainerStatsInfo, ContainerStatus};
use crate::probes::inject::DemoPhase;
use crate::probes::mysql::MySqlDatabase;
use crate::probes::ports::PortInfo;
use crate::probes::postgres::PostgresDatabase;
use crate::probes::redis::RedisDatabase;
use crate::probes::runtimes::{NodeProcess, PythonProcess};
use crate::probes::system::{ProcessInfo, SystemResources};

pub const MENU_AI: &str = "AI Assist";
pub const MENU_POSTGRES: &str = "PostgreSQL";
pub const MENU_MYSQL: &str = "MySQL";
pub const MENU_REDIS: &str = "Redis";
pub const MENU_DOCKER: &str = "Docker";
pub const MENU_NODE: &str = "Node.js";
pub const MENU_PYTHON: &str = "Python";
pub const MENU_PORTS: &str = "Ports";
pub const MENU_TOP: &str = "Top Processes";
pub const MENU_SYSTEM: &str = "System";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuKind {
    Ai,
    Separator,
    Service,
    Info,
}

#[derive(Debug, Clone)]
pub struct MenuItem {
    pub name: &'static str,
    pub kind: MenuKind,
    /// Liveness from the 1 Hz sweep; `None` until first checked.
    pub up: Option<bool>,
}

impl MenuItem {
    fn new(name: &'static str, kind: MenuKind) -> Self {
        Self { name, kind, up: None }
    }

    /// Process name for the liveness sweep, where one applies.
    pub fn probe_process(&self) -> Option<&'static str> {
        match self.name {
            MENU_POSTGRES => Some("postgres"),
            MENU_MYSQL => Some("mysqld"),
            MENU_REDIS => Some("redis-server"),
            MENU_NODE => Some("node"),
            MENU_PYTHON => Some("python"),
            _ => None,
        }
    }

    pub fn refresh_kind(&self) -> Option<RefreshKind> {
        match self.kind {
            MenuKind::Service => Some(RefreshKind::Service),
            MenuKind::Info if self.name == MENU_PORTS || self.name == MENU_TOP => {
                Some(RefreshKind::FastInfo)
            }
            MenuKind::Info => Some(RefreshKind::Info),
            _ => None,
        }
    }
}

fn default_menu() -> Vec<MenuItem> {
    vec![
        MenuItem::new(MENU_AI, MenuKind::Ai),
        MenuItem::new("────────────", MenuKind::Separator),
        MenuItem::new(MENU_POSTGRES, MenuKind::Service),
        MenuItem::new(MENU_MYSQL, MenuKind::Service),
        MenuItem::new(MENU_REDIS, MenuKind::Service),
        MenuItem::new(MENU_DOCKER, MenuKind::Service),
        MenuItem::new(MENU_NODE, MenuKind::Service),
        MenuItem::new(MENU_PYTHON, MenuKind::Service),
        MenuItem::new("────────────", MenuKind::Separator),
        MenuItem::new(MENU_PORTS, MenuKind::Info),
        MenuItem::new(MENU_TOP, MenuKind::Info),
        MenuItem::new(MENU_SYSTEM, MenuKind::Info),
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PanelFocus {
    #[default]
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewMode {
    #[default]
    Monitor,
    GraphRealtime,
    GraphHistory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RightItemKind {
    /// Compose project header row, expandable.
    Project,
    Container,
    Database,
    Process,
    Port,
    ProcessItem,
}

#[derive(Debug, Clone)]
pub struct RightPanelItem {
    pub kind: RightItemKind,
    pub name: String,
    pub project: Option<String>,
    pub container_id: Option<String>,
    pub pid: Option<String>,
    pub expanded: bool,
}

impl RightPanelItem {
    fn project_header(name: &str, expanded: bool) -> Self {
        Self {
            kind: RightItemKind::Project,
            name: name.to_string(),
            project: Some(name.to_string()),
            container_id: None,
            pid: None,
            expanded,
        }
    }
}

/// Confirmation dialog payload: the request to run if the user says yes.
#[derive(Debug, Clone)]
pub struct ConfirmState {
    pub request: ActionRequest,
    pub message: String,
    /// Set for the dialog the proactive flow opens around an AI command.
    pub ai_proactive: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AiPhase {
    #[default]
    Idle,
    Loading,
    Streaming,
    Success,
    Error,
}

#[derive(Debug, Default)]
pub struct AiState {
    pub phase: AiPhase,
    pub response: String,
    pub pending_command: Option<String>,
    pub last_exec_result: Option<String>,
    pub available: bool,
    pub models: Vec<String>,
    pub selected_model: usize,
    /// The running stream was started by the proactive monitor.
    pub proactive: bool,
    /// One-shot latch: a proactive analysis fired and has not been reset.
    pub proactive_latched: bool,
}

impl AiState {
    pub fn busy(&self) -> bool {
        matches!(self.phase, AiPhase::Loading | AiPhase::Streaming)
    }

    /// Fold one stream delta into the accumulated response. On the final
    /// chunk the `<cmd>` payload, if any, becomes the pending command that
    /// gates all further input until resolved.
    pub fn apply_chunk(&mut self, delta: &str, done: bool) {
        self.phase = AiPhase::Streaming;
        self.response.push_str(delta);
        if done {
            self.phase = AiPhase::Success;
            self.pending_command = crate::llm::service::extract_command(&self.response);
        }
    }

    /// Resolve the pending command without executing anything.
    pub fn cancel_pending(&mut self) {
        self.pending_command = None;
        self.last_exec_result = Some("cancelled".to_string());
    }

    pub fn current_model(&self) -> Option<&str> {
        self.models.get(self.selected_model).map(String::as_str)
    }

    pub fn cycle_model(&mut self) {
        if !self.models.is_empty() {
            self.selected_model = (self.selected_model + 1) % self.models.len();
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogOverlay {
    pub target: String,
    pub content: String,
    pub scroll: usize,
}

#[derive(Debug, Clone)]
pub struct Banner {
    pub message: String,
    pub success: bool,
}

pub struct AppState {
    pub menu: Vec<MenuItem>,
    pub selected: usize,
    pub focus: PanelFocus,
    pub right_cursor: usize,
    pub right_items: Vec<RightPanelItem>,
    pub detail_scroll: usize,

    pub cache: ServiceCache,

    // Typed record lists behind the right panel.
    pub resources: Option<SystemResources>,
    pub containers: Vec<ContainerInfo>,
    pub container_stats: HashMap<String, ContainerStatsInfo>,
    pub postgres_dbs: Vec<PostgresDatabase>,
    pub mysql_dbs: Vec<MySqlDatabase>,
    pub redis_dbs: Vec<RedisDatabase>,
    pub node_procs: Vec<NodeProcess>,
    pub python_procs: Vec<PythonProcess>,
    pub ports: Vec<PortInfo>,
    pub top_processes: Vec<ProcessInfo>,

    pub view: ViewMode,
    pub graph_data: Vec<f64>,
    pub status_line: String,

    pub confirm: Option<ConfirmState>,
    pub banner: Option<Banner>,
    pub log_overlay: Option<LogOverlay>,

    pub ai: AiState,
    pub demo: DemoPhase,

    /// Consecutive 1 Hz ticks PostgreSQL has been observed down.
    pub postgres_down_ticks: u32,
    pub tick_count: u64,
    pub terminal_size: (u16, u16),
}

impl AppState {
    pub fn new() -> Self {
        Self {
            menu: default_menu(),
            selected: 0,
            focus: PanelFocus::Left,
            right_cursor: 0,
            right_items: Vec::new(),
            detail_scroll: 0,
            cache: ServiceCache::new(),
            resources: None,
            containers: Vec::new(),
            container_stats: HashMap::new(),
            postgres_dbs: Vec::new(),
            mysql_dbs: Vec::new(),
            redis_dbs: Vec::new(),
            node_procs: Vec::new(),
            python_procs: Vec::new(),
            ports: Vec::new(),
            top_processes: Vec::new(),
            view: ViewMode::Monitor,
            graph_data: Vec::new(),
            status_line: String::new(),
            confirm: None,
            banner: None,
            log_overlay: None,
            ai: AiState::default(),
            demo: DemoPhase::Normal,
            postgres_down_ticks: 0,
            tick_count: 0,
            terminal_size: (80, 24),
        }
    }

    pub fn selected_menu(&self) -> &MenuItem {
        &self.menu[self.selected]
    }

    /// Move the left cursor, skipping separators and wrapping.
    pub fn move_menu(&mut self, delta: i32) {
        let len = self.menu.len() as i32;
        let mut idx = self.selected as i32;
        loop {
            idx = (idx + delta).rem_euclid(len);
            if self.menu[idx as usize].kind != MenuKind::Separator {
                break;
            }
        }
        self.selected = idx as usize;
        self.detail_scroll = 0;
    }

    /// Is the right-panel row visible given project expansion?
    pub fn is_item_visible(&self, index: usize) -> bool {
        let Some(item) = self.right_items.get(index) else {
            return false;
        };
        if item.kind == RightItemKind::Project {
            return true;
        }
        match &item.project {
            None => true,
            Some(project) => self
                .right_items
                .iter()
                .find(|i| i.kind == RightItemKind::Project && &i.name == project)
                .map(|p| p.expanded)
                // No header row means the container is standalone.
                .unwrap_or(true),
        }
    }

    /// Move the right cursor to the next visible row in `delta` direction.
    pub fn move_right_cursor(&mut self, delta: i32) {
        if self.right_items.is_empty() {
            return;
        }
        let mut idx = self.right_cursor as i32;
        loop {
            idx += delta;
            if idx < 0 || idx >= self.right_items.len() as i32 {
                return; // stay put at the edges
            }
            if self.is_item_visible(idx as usize) {
                self.right_cursor = idx as usize;
                self.detail_scroll = 0;
                return;
            }
        }
    }

    pub fn selected_right_item(&self) -> Option<&RightPanelItem> {
        self.right_items.get(self.right_cursor)
    }

    /// Toggle expansion of the project header under the cursor.
    pub fn toggle_expand(&mut self) {
        let Some(item) = self.right_items.get_mut(self.right_cursor) else {
            return;
        };
        if item.kind == RightItemKind::Project {
            item.expanded = !item.expanded;
        }
    }

    /// Rebuild the selectable right-panel rows from the cached record lists,
    /// preserving project expansion across rebuilds.
    pub fn rebuild_right_items(&mut self) {
        let expanded: HashMap<String, bool> = self
            .right_items
            .iter()
            .filter(|i| i.kind == RightItemKind::Project)
            .map(|i| (i.name.clone(), i.expanded))
            .collect();

        let mut items = Vec::new();
        match self.selected_menu().name {
            MENU_DOCKER => {
                for (project, members) in crate::probes::docker::group_by_project(&self.containers)
                {
                    if let Some(project) = &project {
                        let is_expanded = expanded.get(project).copied().unwrap_or(true);
                        items.push(RightPanelItem::project_header(project, is_expanded));
                    }
                    for c in members {
                        items.push(RightPanelItem {
                            kind: RightItemKind::Container,
                            name: c.name.clone(),
                            project: project.clone(),
                            container_id: Some(c.id.clone()),
                            pid: None,
                            expanded: false,
                        });
                    }
                }
            }
            MENU_POSTGRES => {
                for db in &self.postgres_dbs {
                    items.push(RightPanelItem {
                        kind: RightItemKind::Database,
                        name: db.name.clone(),
                        project: None,
                        container_id: None,
                        pid: None,
                        expanded: false,
                    });
                }
            }
            MENU_MYSQL => {
                for db in &self.mysql_dbs {
                    items.push(RightPanelItem {
                        kind: RightItemKind::Database,
                        name: db.name.clone(),
                        project: None,
                        container_id: None,
                        pid: None,
                        expanded: false,
                    });
                }
            }
            MENU_REDIS => {
                for db in &self.redis_dbs {
                    items.push(RightPanelItem {
                        kind: RightItemKind::Database,
                        name: db.index.clone(),
                        project: None,
                        container_id: None,
                        pid: None,
                        expanded: false,
                    });
                }
            }
            MENU_NODE => {
                for p in &self.node_procs {
                    items.push(RightPanelItem {
                        kind: RightItemKind::Process,
                        name: p.pid.clone(),
                        project: None,
                        container_id: None,
                        pid: Some(p.pid.clone()),
                        expanded: false,
                    });
                }
            }
            MENU_PYTHON => {
                for p in &self.python_procs {
                    items.push(RightPanelItem {
                        kind: RightItemKind::Process,
                        name: p.pid.clone(),
                        project: None,
                        container_id: None,
                        pid: Some(p.pid.clone()),
                        expanded: false,
                    });
                }
            }
            MENU_PORTS => {
                for p in &self.ports {
                    items.push(RightPanelItem {
                        kind: RightItemKind::Port,
                        name: p.port.to_string(),
                        project: None,
                        container_id: None,
                        pid: Some(p.pid.clone()),
                        expanded: false,
                    });
                }
            }
            MENU_TOP => {
                for p in &self.top_processes {
                    items.push(RightPanelItem {
                        kind: RightItemKind::ProcessItem,
                        name: p.name.clone(),
                        project: None,
                        container_id: None,
                        pid: Some(p.pid.clone()),
                        expanded: false,
                    });
                }
            }
            _ => {}
        }

        self.right_items = items;
        if self.right_cursor >= self.right_items.len() {
            self.right_cursor = self.right_items.len().saturating_sub(1);
        }
    }

    /// Container record for the row under the cursor, if any.
    pub fn selected_container(&self) -> Option<&ContainerInfo> {
        let item = self.selected_right_item()?;
        let id = item.container_id.as_deref()?;
        self.containers.iter().find(|c| c.id == id)
    }

    /// Whether every container of `project` is currently running. Drives the
    /// start/stop toggle direction for compose projects.
    pub fn project_fully_running(&self, project: &str) -> bool {
        let members: Vec<_> = self
            .containers
            .iter()
            .filter(|c| c.compose_project.as_deref() == Some(project))
            .collect();
        !members.is_empty() && members.iter().all(|c| c.status == ContainerStatus::Running)
    }

    pub fn project_dir_of(&self, project: &str) -> Option<String> {
        self.containers
            .iter()
            .find(|c| c.compose_project.as_deref() == Some(project))
            .and_then(|c| c.project_dir.clone())
    }

    // --- Confirmation state machine -----------------------------------
    //
    // idle -> confirming -> executing -> (success|failure banner) -> idle
    // The only edge from confirming to executing is the `y` key.

    pub fn open_confirm(&mut self, request: ActionRequest, message: String) {
        self.confirm = Some(ConfirmState { request, message, ai_proactive: false });
    }

    pub fn open_proactive_confirm(&mut self, command: &str) {
        let request = ActionRequest {
            action: crate::probes::actions::ConfirmAction::RunAiCommand,
            kind: crate::probes::actions::TargetKind::AiCommand,
            target: command.to_string(),
            project_dir: None,
            service: None,
        };
        let message = format!(
            "Analysis complete. The assistant proposed a recovery command:\n\n{}\n\nRun it now?",
            command
        );
        self.confirm = Some(ConfirmState { request, message, ai_proactive: true });
    }

    /// `n`/esc: back to idle with no side effect.
    pub fn cancel_confirm(&mut self) {
        self.confirm = None;
    }

    /// `y`: hand the request over for execution.
    pub fn take_confirm(&mut self) -> Option<ConfirmState> {
        self.confirm.take()
    }

    pub fn set_banner(&mut self, outcome: &CommandOutcome) {
        self.banner = Some(Banner {
            message: outcome.message.clone(),
            success: outcome.success,
        });
    }

    // --- Proactive monitor --------------------------------------------

    pub fn record_postgres_status(&mut self, up: bool) {
        if up {
            self.postgres_down_ticks = 0;
        } else {
            self.postgres_down_ticks = self.postgres_down_ticks.saturating_add(1);
        }
    }

    /// The proactive analysis fires when the critical service has been down
    /// for three consecutive ticks, the LLM is reachable, no stream is
    /// running, and the latch has not fired before.
    pub fn should_trigger_proactive(&self) -> bool {
        self.postgres_down_ticks >= 3
            && !self.ai.proactive_latched
            && !self.ai.busy()
            && self.ai.available
    }

    pub fn latch_proactive(&mut self) {
        self.ai.proactive_latched = true;
        self.ai.proactive = true;
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probes::actions::{ActionRequest, ConfirmAction, TargetKind};

    fn kill_request() -> ActionRequest {
        ActionRequest {
            action: ConfirmAction::Kill,
            kind: TargetKind::Process,
            target: "123".into(),
            project_dir: None,
            service: None,
        }
    }

    fn container(id: &str, name: &str, project: Option<&str>, running: bool) -> ContainerInfo {
        ContainerInfo {
            id: id.into(),
            name: name.into(),
            status: if running { ContainerStatus::Running } else { ContainerStatus::Exited },
            status_text: if running { "Up 2 hours" } else { "Exited (1)" }.into(),
            image: "img".into(),
            ports: String::new(),
            compose_project: project.map(str::to_string),
            compose_service: None,
            project_dir: project.map(|_| "/srv/app".to_string()),
            exit_code: None,
            oom_killed: false,
            error: None,
        }
    }

    fn select(state: &mut AppState, name: &str) {
        state.selected = state.menu.iter().position(|m| m.name == name).unwrap();
    }

    #[test]
    fn menu_navigation_skips_separators_and_wraps() {
        let mut state = AppState::new();
        assert_eq!(state.selected_menu().name, MENU_AI);

        state.move_menu(1);
        assert_eq!(state.selected_menu().name, MENU_POSTGRES, "separator skipped");

        state.move_menu(-1);
        assert_eq!(state.selected_menu().name, MENU_AI);

        state.move_menu(-1);
        assert_eq!(state.selected_menu().name, MENU_SYSTEM, "wraps to the end");
    }

    #[test]
    fn confirm_machine_yes_path() {
        let mut state = AppState::new();
        assert!(state.confirm.is_none());

        state.open_confirm(kill_request(), "kill process 123?".into());
        assert!(state.confirm.is_some());

        let taken = state.take_confirm().expect("y hands over the request");
        assert_eq!(taken.request.target, "123");
        assert!(state.confirm.is_none(), "executing leaves confirming state");
    }

    #[test]
    fn confirm_machine_no_path_has_no_side_effect() {
        let mut state = AppState::new();
        state.open_confirm(kill_request(), "kill?".into());
        state.cancel_confirm();
        assert!(state.confirm.is_none());
        assert!(state.take_confirm().is_none(), "nothing left to execute");
    }

    #[test]
    fn right_items_group_docker_by_project() {
        let mut state = AppState::new();
        select(&mut state, MENU_DOCKER);
        state.containers = vec![
            container("aaa1", "web", Some("shop"), true),
            container("bbb2", "db", Some("shop"), true),
            container("ccc3", "scratch", None, false),
        ];
        state.rebuild_right_items();

        assert_eq!(state.right_items.len(), 4, "header plus three containers");
        assert_eq!(state.right_items[0].kind, RightItemKind::Project);
        assert_eq!(state.right_items[0].name, "shop");
        assert!(state.right_items[0].expanded, "projects start expanded");
        assert_eq!(state.right_items[3].name, "scratch");
    }

    #[test]
    fn collapsed_project_hides_members() {
        let mut state = AppState::new();
        select(&mut state, MENU_DOCKER);
        state.containers = vec![
            container("aaa1", "web", Some("shop"), true),
            container("bbb2", "db", Some("shop"), true),
        ];
        state.rebuild_right_items();

        assert!(state.is_item_visible(1));
        state.right_cursor = 0;
        state.toggle_expand();
        assert!(!state.is_item_visible(1), "members hidden when collapsed");
        assert!(state.is_item_visible(0), "header itself stays visible");

        // Cursor movement skips hidden rows.
        state.move_right_cursor(1);
        assert_eq!(state.right_cursor, 0, "nothing visible below, cursor stays");
    }

    #[test]
    fn expansion_survives_rebuild() {
        let mut state = AppState::new();
        select(&mut state, MENU_DOCKER);
        state.containers = vec![container("aaa1", "web", Some("shop"), true)];
        state.rebuild_right_items();
        state.right_cursor = 0;
        state.toggle_expand(); // collapse

        state.rebuild_right_items();
        assert!(!state.right_items[0].expanded, "collapse preserved");
    }

    #[test]
    fn project_running_state_drives_toggle() {
        let mut state = AppState::new();
        state.containers = vec![
            container("aaa1", "web", Some("shop"), true),
            container("bbb2", "db", Some("shop"), false),
        ];
        assert!(!state.project_fully_running("shop"));

        state.containers[1].status = ContainerStatus::Running;
        assert!(state.project_fully_running("shop"));
        assert!(!state.project_fully_running("ghost"));
    }

    #[test]
    fn proactive_trigger_needs_three_ticks_and_latches_once() {
        let mut state = AppState::new();
        state.ai.available = true;

        state.record_postgres_status(false);
        state.record_postgres_status(false);
        assert!(!state.should_trigger_proactive(), "two ticks is not enough");

        state.record_postgres_status(false);
        assert!(state.should_trigger_proactive());

        state.latch_proactive();
        state.record_postgres_status(false);
        assert!(
            !state.should_trigger_proactive(),
            "latch prevents a second trigger even though the service is still down"
        );
    }

    #[test]
    fn proactive_requires_llm_and_idle_stream() {
        let mut state = AppState::new();
        for _ in 0..5 {
            state.record_postgres_status(false);
        }
        assert!(!state.should_trigger_proactive(), "LLM unavailable gates the trigger");

        state.ai.available = true;
        state.ai.phase = AiPhase::Streaming;
        assert!(!state.should_trigger_proactive(), "running stream gates the trigger");

        state.ai.phase = AiPhase::Idle;
        assert!(state.should_trigger_proactive());
    }

    #[test]
    fn recovery_resets_down_counter_but_not_latch() {
        let mut state = AppState::new();
        state.ai.available = true;
        for _ in 0..3 {
            state.record_postgres_status(false);
        }
        state.latch_proactive();

        state.record_postgres_status(true);
        assert_eq!(state.postgres_down_ticks, 0);
        for _ in 0..3 {
            state.record_postgres_status(false);
        }
        assert!(!state.should_trigger_proactive(), "latch is explicit-reset only");
    }

    #[test]
    fn stream_chunks_accumulate_and_extract_the_command() {
        let mut ai = AiState::default();
        ai.apply_chunk("Hello ", false);
        assert_eq!(ai.phase, AiPhase::Streaming);
        ai.apply_chunk("<cmd>ls</cmd>", false);
        ai.apply_chunk("", true);

        assert_eq!(ai.phase, AiPhase::Success);
        assert_eq!(ai.response, "Hello <cmd>ls</cmd>");
        assert_eq!(ai.pending_command.as_deref(), Some("ls"));
    }

    #[test]
    fn stream_without_command_leaves_nothing_pending() {
        let mut ai = AiState::default();
        ai.apply_chunk("all services healthy", true);
        assert_eq!(ai.phase, AiPhase::Success);
        assert!(ai.pending_command.is_none());
    }

    #[test]
    fn cancelling_pending_reports_cancelled() {
        let mut ai = AiState::default();
        ai.apply_chunk("try <cmd>rm -rf /tmp/x</cmd>", true);
        assert!(ai.pending_command.is_some());

        ai.cancel_pending();
        assert!(ai.pending_command.is_none());
        assert_eq!(ai.last_exec_result.as_deref(), Some("cancelled"));
    }

    #[test]
    fn model_cycling_wraps() {
        let mut state = AppState::new();
        state.ai.cycle_model(); // no models: no-op
        state.ai.models = vec!["a".into(), "b".into()];
        assert_eq!(state.ai.current_model(), Some("a"));
        state.ai.cycle_model();
        assert_eq!(state.ai.current_model(), Some("b"));
        state.ai.cycle_model();
        assert_eq!(state.ai.current_model(), Some("a"));
    }
}
