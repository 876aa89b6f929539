//! The controller: a single-threaded cooperative event loop.
//!
//! All mutable state lives here and changes only in response to events from
//! one inbox. Probes, database writes, LLM streams and confirmed commands
//! run on workers that report back as typed events; the loop itself never
//! touches the network or the disk.

use std::io::Stdout;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use parking_lot::Mutex;
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::core::events::{Event, EventHandler};
use crate::core::state::{
    AiPhase, AppState, MenuKind, PanelFocus, RightItemKind, ViewMode, MENU_AI, MENU_DOCKER,
    MENU_MYSQL, MENU_NODE, MENU_PORTS, MENU_POSTGRES, MENU_PYTHON, MENU_REDIS, MENU_SYSTEM,
    MENU_TOP,
};
use crate::llm::service::{self, AiService};
use crate::llm::{client::LlmError, context};
use crate::logger;
use crate::probes::actions::{self, ActionRequest, CommandOutcome, ConfirmAction, TargetKind};
use crate::probes::docker::DockerProbe;
use crate::probes::inject::{DemoPhase, FaultInjection};
use crate::probes::system::SystemProbe;
use crate::probes::{self, logs, mysql, ports, postgres, redis, runtimes, system};
use crate::store::writer::{self, FullSnapshot};
use crate::store::MetricsStore;
use crate::ui::renderer::Renderer;
use crate::ui::theme::Theme;

const BANNER_SECS: u64 = 5;
const REALTIME_POINTS: usize = 120;
const HISTORY_DAYS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

pub struct App {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    state: AppState,
    tx: mpsc::UnboundedSender<Event>,
    docker: DockerProbe,
    system: Arc<Mutex<SystemProbe>>,
    store: Option<MetricsStore>,
    writer_tx: mpsc::Sender<FullSnapshot>,
    ai: AiService,
    stream_task: Option<JoinHandle<()>>,
    theme: Theme,
    snapshot_interval: u64,
}

impl App {
    pub fn new(
        config: &Config,
        store: Option<MetricsStore>,
        writer_tx: mpsc::Sender<FullSnapshot>,
        tx: mpsc::UnboundedSender<Event>,
    ) -> Result<Self> {
        let backend = CrosstermBackend::new(std::io::stdout());
        let terminal = Terminal::new(backend)?;

        let ai = AiService::new(
            crate::llm::client::OllamaClient::new(config.llm.endpoint.clone()),
            config.llm.model.clone(),
        );

        Ok(Self {
            terminal,
            state: AppState::new(),
            tx,
            docker: DockerProbe::new(),
            system: Arc::new(Mutex::new(SystemProbe::new())),
            store,
            writer_tx,
            ai,
            stream_task: None,
            theme: Theme::from_name(&config.display.theme),
            snapshot_interval: config.general.snapshot_interval_secs.max(1),
        })
    }

    pub async fn run(&mut self, events: &mut EventHandler) -> Result<()> {
        self.setup_terminal()?;

        // Prime the dashboard before the first tick lands.
        self.spawn_health_check();
        self.spawn_model_fetch();
        self.spawn_status_sweep();
        self.refresh_all_services();
        self.render()?;

        let result = self.event_loop(events).await;

        self.shutdown();
        result
    }

    fn setup_terminal(&mut self) -> Result<()> {
        crossterm::terminal::enable_raw_mode()?;
        crossterm::execute!(
            std::io::stdout(),
            crossterm::terminal::EnterAlternateScreen,
            crossterm::cursor::Hide,
        )?;
        Ok(())
    }

    fn shutdown(&mut self) {
        if let Some(task) = self.stream_task.take() {
            task.abort();
        }
        let _ = crossterm::terminal::disable_raw_mode();
        let _ = crossterm::execute!(
            std::io::stdout(),
            crossterm::terminal::LeaveAlternateScreen,
            crossterm::cursor::Show,
        );
    }

    async fn event_loop(&mut self, events: &mut EventHandler) -> Result<()> {
        while let Some(event) = events.next().await {
            if self.handle_event(event)? == Flow::Quit {
                break;
            }
        }
        Ok(())
    }

    fn handle_event(&mut self, event: Event) -> Result<Flow> {
        match event {
            Event::Key(key) => {
                if key.kind != KeyEventKind::Press {
                    return Ok(Flow::Continue);
                }
                let flow = self.handle_key(key);
                self.render()?;
                return Ok(flow);
            }
            Event::Resize(w, h) => {
                self.state.terminal_size = (w, h);
            }
            Event::Tick => self.on_tick(),
            Event::ServiceStatus { index, up } => self.on_service_status(index, up),
            Event::ServiceData { service, data } => {
                self.state.cache.complete(&service, data);
            }
            Event::ServiceDataFailed { service } => {
                self.state.cache.fail(&service);
            }
            Event::Containers { list, stats } => {
                self.state.containers = list;
                for (id, s) in stats {
                    self.state.container_stats.insert(id, s);
                }
                if self.state.selected_menu().name == MENU_DOCKER {
                    self.state.rebuild_right_items();
                }
            }
            Event::PortsData(ports) => {
                self.state.ports = ports;
                if self.state.selected_menu().name == MENU_PORTS {
                    self.state.rebuild_right_items();
                }
            }
            Event::TopProcesses(list) => {
                self.state.top_processes = list;
                if self.state.selected_menu().name == MENU_TOP {
                    self.state.rebuild_right_items();
                }
            }
            Event::PostgresDatabases(dbs) => {
                self.state.postgres_dbs = dbs;
                if self.state.selected_menu().name == MENU_POSTGRES {
                    self.state.rebuild_right_items();
                }
            }
            Event::MySqlDatabases(dbs) => {
                self.state.mysql_dbs = dbs;
                if self.state.selected_menu().name == MENU_MYSQL {
                    self.state.rebuild_right_items();
                }
            }
            Event::RedisDatabases(dbs) => {
                self.state.redis_dbs = dbs;
                if self.state.selected_menu().name == MENU_REDIS {
                    self.state.rebuild_right_items();
                }
            }
            Event::NodeProcesses(list) => {
                self.state.node_procs = list;
                if self.state.selected_menu().name == MENU_NODE {
                    self.state.rebuild_right_items();
                }
            }
            Event::PythonProcesses(list) => {
                self.state.python_procs = list;
                if self.state.selected_menu().name == MENU_PYTHON {
                    self.state.rebuild_right_items();
                }
            }
            Event::ResourcesSampled(resources) => {
                self.state.resources = Some(resources);
            }
            Event::CommandDone(outcome) => self.on_command_done(outcome),
            Event::ClearBanner => {
                self.state.banner = None;
            }
            Event::LogsFetched { target, result } => match result {
                Ok(content) => {
                    self.state.log_overlay = Some(crate::core::state::LogOverlay {
                        target,
                        scroll: usize::MAX, // clamped to the bottom at render
                        content,
                    });
                }
                Err(message) => {
                    self.state.set_banner(&CommandOutcome {
                        success: false,
                        message: format!("log fetch failed: {}", message),
                    });
                    self.spawn_banner_clear();
                }
            },
            Event::GraphData(data) => {
                self.state.graph_data = data;
                self.state.status_line.clear();
            }
            Event::AiHealth(up) => {
                self.state.ai.available = up;
            }
            Event::AiModels(models) => {
                if !models.is_empty() {
                    let current = self.ai.model().to_string();
                    self.state.ai.selected_model =
                        models.iter().position(|m| *m == current).unwrap_or(0);
                    self.state.ai.models = models;
                }
            }
            Event::AiChunk { delta, done } => self.on_ai_chunk(delta, done),
            Event::AiFailed(message) => {
                self.state.ai.phase = AiPhase::Error;
                if !self.state.ai.response.is_empty() {
                    self.state.ai.response.push_str("\n\n");
                }
                self.state.ai.response.push_str(&message);
                self.state.ai.proactive = false;
                logger::log_issue("LLM", &message);
            }
            Event::AiCommandResult(outcome) => {
                self.state.ai.last_exec_result = Some(outcome.message.clone());
                if outcome.success && self.state.demo == DemoPhase::Broken {
                    self.state.demo = DemoPhase::Fixed;
                }
                self.state.set_banner(&outcome);
                self.spawn_banner_clear();
                self.refresh_all_services();
            }
            Event::Quit => return Ok(Flow::Quit),
        }

        self.render()?;
        Ok(Flow::Continue)
    }

    // --- key handling --------------------------------------------------

    fn handle_key(&mut self, key: KeyEvent) -> Flow {
        // A pending AI command blocks everything until resolved.
        if self.state.ai.pending_command.is_some() && self.state.confirm.is_none() {
            return self.handle_pending_command_key(key);
        }
        if self.state.log_overlay.is_some() {
            self.handle_log_overlay_key(key);
            return Flow::Continue;
        }
        if self.state.confirm.is_some() {
            self.handle_confirm_key(key);
            return Flow::Continue;
        }
        if self.state.view != ViewMode::Monitor {
            return self.handle_graph_key(key);
        }
        self.handle_monitor_key(key)
    }

    fn handle_pending_command_key(&mut self, key: KeyEvent) -> Flow {
        match key.code {
            KeyCode::Enter => {
                if let Some(command) = self.state.ai.pending_command.take() {
                    self.state.ai.last_exec_result = Some(format!("running: {} ...", command));
                    self.spawn_ai_command(command);
                }
            }
            KeyCode::Esc | KeyCode::Char('n') => {
                self.state.ai.cancel_pending();
            }
            KeyCode::Char('q') => return Flow::Quit,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                return Flow::Quit;
            }
            _ => {}
        }
        Flow::Continue
    }

    fn handle_log_overlay_key(&mut self, key: KeyEvent) {
        let Some(overlay) = self.state.log_overlay.as_mut() else {
            return;
        };
        match key.code {
            KeyCode::Esc => self.state.log_overlay = None,
            KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                overlay.scroll = overlay.scroll.saturating_add(5);
            }
            KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                overlay.scroll = overlay.scroll.saturating_sub(5);
            }
            _ => {}
        }
    }

    fn handle_confirm_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => {
                if let Some(confirm) = self.state.take_confirm() {
                    // Proactive dialogs wrap an AI command; everything else
                    // goes through the action dispatcher.
                    if confirm.ai_proactive {
                        self.state.ai.pending_command = None;
                        self.state.ai.last_exec_result =
                            Some(format!("running: {} ...", confirm.request.target));
                        self.spawn_ai_command(confirm.request.target);
                    } else {
                        self.spawn_confirmed_action(confirm.request);
                    }
                }
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                let was_proactive = self
                    .state
                    .confirm
                    .as_ref()
                    .is_some_and(|c| c.ai_proactive);
                self.state.cancel_confirm();
                if was_proactive {
                    self.state.ai.cancel_pending();
                }
            }
            _ => {}
        }
    }

    fn handle_graph_key(&mut self, key: KeyEvent) -> Flow {
        match key.code {
            KeyCode::Esc => {
                self.state.view = ViewMode::Monitor;
                self.state.status_line.clear();
            }
            KeyCode::Char('h') => {
                self.state.view = ViewMode::GraphHistory;
                self.state.status_line = "Loading 3-day history...".into();
                self.spawn_graph_fetch(ViewMode::GraphHistory);
            }
            KeyCode::Char('g') => {
                self.state.view = ViewMode::GraphRealtime;
                self.state.status_line = "Loading realtime graph...".into();
                self.spawn_graph_fetch(ViewMode::GraphRealtime);
            }
            KeyCode::Char('q') => return Flow::Quit,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                return Flow::Quit;
            }
            _ => {}
        }
        Flow::Continue
    }

    fn handle_monitor_key(&mut self, key: KeyEvent) -> Flow {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Flow::Quit;
        }

        // Detail scrolling uses ctrl chords; match them before the plain
        // character bindings below would swallow the key codes.
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                KeyCode::Char('u') => {
                    self.state.detail_scroll = self.state.detail_scroll.saturating_sub(5);
                }
                KeyCode::Char('d') => {
                    self.state.detail_scroll = self.state.detail_scroll.saturating_add(5);
                }
                _ => {}
            }
            return Flow::Continue;
        }

        match key.code {
            KeyCode::Char('q') => return Flow::Quit,

            // Hidden demo trigger: inject the staged failure.
            KeyCode::Char('E') => {
                if self.state.demo == DemoPhase::Normal {
                    self.state.demo = DemoPhase::Broken;
                    self.state.status_line = "demo: injecting service failure".into();
                    self.spawn_status_sweep();
                }
            }

            KeyCode::Char('g') => {
                self.state.view = ViewMode::GraphRealtime;
                self.state.status_line = "Loading realtime graph...".into();
                self.spawn_graph_fetch(ViewMode::GraphRealtime);
            }

            KeyCode::Up | KeyCode::Char('k') => match self.state.focus {
                PanelFocus::Left => {
                    self.state.move_menu(-1);
                    self.state.rebuild_right_items();
                    self.refresh_selected();
                }
                PanelFocus::Right => self.state.move_right_cursor(-1),
            },
            KeyCode::Down | KeyCode::Char('j') => match self.state.focus {
                PanelFocus::Left => {
                    self.state.move_menu(1);
                    self.state.rebuild_right_items();
                    self.refresh_selected();
                }
                PanelFocus::Right => self.state.move_right_cursor(1),
            },
            KeyCode::Left | KeyCode::Char('h') => {
                if self.state.focus == PanelFocus::Right {
                    self.state.focus = PanelFocus::Left;
                } else {
                    // On the left panel `h` opens the history graph.
                    self.state.view = ViewMode::GraphHistory;
                    self.state.status_line = "Loading 3-day history...".into();
                    self.spawn_graph_fetch(ViewMode::GraphHistory);
                }
            }
            KeyCode::Right | KeyCode::Char('l') => {
                if self.state.focus == PanelFocus::Left {
                    self.state.focus = PanelFocus::Right;
                    self.state.rebuild_right_items();
                    self.state.right_cursor = 0;
                    while self.state.right_cursor < self.state.right_items.len()
                        && !self.state.is_item_visible(self.state.right_cursor)
                    {
                        self.state.right_cursor += 1;
                    }
                }
            }
            KeyCode::Char(' ') => {
                if self.state.focus == PanelFocus::Right {
                    self.state.toggle_expand();
                }
            }

            KeyCode::Char('s') => self.action_toggle(),
            KeyCode::Char('r') => self.action_restart(),
            KeyCode::Char('b') => self.action_rebuild(),
            KeyCode::Char('d') => self.action_delete(),
            KeyCode::Char('x') => self.action_kill(false),
            KeyCode::Char('X') => self.action_kill(true),
            KeyCode::Char('o') => self.action_open_or_optimize(),
            KeyCode::Char('f') => self.action_flush(),
            KeyCode::Char('c') => self.action_clean_images(),
            KeyCode::Char('L') => self.action_view_logs(),
            KeyCode::Char('v') => self.action_vacuum(),

            KeyCode::Char('a') => self.start_analysis(None),
            KeyCode::Tab => {
                if self.state.selected_menu().name == MENU_AI {
                    self.state.ai.cycle_model();
                    if let Some(model) = self.state.ai.current_model() {
                        self.ai.set_model(model.to_string());
                    }
                }
            }

            _ => {}
        }
        Flow::Continue
    }

    // --- destructive action keys ---------------------------------------

    fn confirm_request(&mut self, request: ActionRequest, subject: String) {
        let message = format!("{} {}?", request.action.verb(), subject);
        self.state.open_confirm(request, message);
    }

    fn action_toggle(&mut self) {
        if self.state.focus != PanelFocus::Right
            || self.state.selected_menu().name != MENU_DOCKER
        {
            return;
        }
        let Some(item) = self.state.selected_right_item().cloned() else {
            return;
        };

        match item.kind {
            RightItemKind::Project => {
                let action = if self.state.project_fully_running(&item.name) {
                    ConfirmAction::ProjectStop
                } else {
                    ConfirmAction::ProjectStart
                };
                let request = ActionRequest {
                    action,
                    kind: TargetKind::ComposeProject,
                    project_dir: self.state.project_dir_of(&item.name),
                    target: item.name.clone(),
                    service: None,
                };
                self.confirm_request(request, format!("project {}", item.name));
            }
            RightItemKind::Container => {
                let Some(container) = self.state.selected_container().cloned() else {
                    return;
                };
                let action = if container.status
                    == crate::probes::docker::ContainerStatus::Running
                {
                    ConfirmAction::ContainerStop
                } else {
                    ConfirmAction::ContainerStart
                };
                let request = ActionRequest {
                    action,
                    kind: TargetKind::Container,
                    target: container.id.clone(),
                    project_dir: container.project_dir.clone(),
                    service: container.compose_service.clone(),
                };
                self.confirm_request(request, format!("container {}", container.name));
            }
            _ => {}
        }
    }

    fn action_restart(&mut self) {
        if self.state.focus != PanelFocus::Right
            || self.state.selected_menu().name != MENU_DOCKER
        {
            return;
        }
        let Some(item) = self.state.selected_right_item().cloned() else {
            return;
        };

        match item.kind {
            RightItemKind::Project => {
                let request = ActionRequest {
                    action: ConfirmAction::ProjectRestart,
                    kind: TargetKind::ComposeProject,
                    project_dir: self.state.project_dir_of(&item.name),
                    target: item.name.clone(),
                    service: None,
                };
                self.confirm_request(request, format!("project {}", item.name));
            }
            RightItemKind::Container => {
                let Some(container) = self.state.selected_container().cloned() else {
                    return;
                };
                let request = ActionRequest {
                    action: ConfirmAction::ContainerRestart,
                    kind: TargetKind::Container,
                    target: container.id.clone(),
                    project_dir: container.project_dir.clone(),
                    service: container.compose_service.clone(),
                };
                self.confirm_request(request, format!("container {}", container.name));
            }
            _ => {}
        }
    }

    fn action_rebuild(&mut self) {
        if self.state.focus != PanelFocus::Right
            || self.state.selected_menu().name != MENU_DOCKER
        {
            return;
        }
        let Some(item) = self.state.selected_right_item().cloned() else {
            return;
        };

        match item.kind {
            RightItemKind::Project => {
                let request = ActionRequest {
                    action: ConfirmAction::ProjectRebuild,
                    kind: TargetKind::ComposeProject,
                    project_dir: self.state.project_dir_of(&item.name),
                    target: item.name.clone(),
                    service: None,
                };
                self.confirm_request(request, format!("project {}", item.name));
            }
            RightItemKind::Container => {
                let Some(container) = self.state.selected_container().cloned() else {
                    return;
                };
                // Rebuild only makes sense for compose-managed containers.
                if container.compose_service.is_none() {
                    return;
                }
                let request = ActionRequest {
                    action: ConfirmAction::ContainerRebuild,
                    kind: TargetKind::Container,
                    target: container.id.clone(),
                    project_dir: container.project_dir.clone(),
                    service: container.compose_service.clone(),
                };
                self.confirm_request(request, format!("service {}", container.name));
            }
            _ => {}
        }
    }

    fn action_delete(&mut self) {
        if self.state.focus != PanelFocus::Right {
            return;
        }
        let Some(item) = self.state.selected_right_item().cloned() else {
            return;
        };

        match self.state.selected_menu().name {
            MENU_DOCKER => match item.kind {
                RightItemKind::Project => {
                    let request = ActionRequest {
                        action: ConfirmAction::ProjectDown,
                        kind: TargetKind::ComposeProject,
                        project_dir: self.state.project_dir_of(&item.name),
                        target: item.name.clone(),
                        service: None,
                    };
                    self.confirm_request(request, format!("project {}", item.name));
                }
                RightItemKind::Container => {
                    if let Some(container) = self.state.selected_container().cloned() {
                        let request = ActionRequest {
                            action: ConfirmAction::ContainerRemove,
                            kind: TargetKind::Container,
                            target: container.id.clone(),
                            project_dir: None,
                            service: None,
                        };
                        self.confirm_request(request, format!("container {}", container.name));
                    }
                }
                _ => {}
            },
            MENU_POSTGRES => {
                if item.kind == RightItemKind::Database {
                    let request = ActionRequest {
                        action: ConfirmAction::PostgresDrop,
                        kind: TargetKind::PostgresDatabase,
                        target: item.name.clone(),
                        project_dir: None,
                        service: None,
                    };
                    self.confirm_request(request, format!("database {}", item.name));
                }
            }
            MENU_MYSQL => {
                if item.kind == RightItemKind::Database {
                    let request = ActionRequest {
                        action: ConfirmAction::MySqlDrop,
                        kind: TargetKind::MySqlDatabase,
                        target: item.name.clone(),
                        project_dir: None,
                        service: None,
                    };
                    self.confirm_request(request, format!("database {}", item.name));
                }
            }
            _ => {}
        }
    }

    fn action_kill(&mut self, force: bool) {
        if self.state.focus != PanelFocus::Right {
            return;
        }
        let menu = self.state.selected_menu().name;
        if !matches!(menu, MENU_NODE | MENU_PYTHON | MENU_PORTS | MENU_TOP) {
            return;
        }
        let Some(item) = self.state.selected_right_item().cloned() else {
            return;
        };
        let Some(pid) = item.pid.clone() else {
            return;
        };

        let request = ActionRequest {
            action: if force { ConfirmAction::ForceKill } else { ConfirmAction::Kill },
            kind: TargetKind::Process,
            target: pid.clone(),
            project_dir: None,
            service: None,
        };
        self.confirm_request(request, format!("process {}", pid));
    }

    fn action_open_or_optimize(&mut self) {
        if self.state.focus != PanelFocus::Right {
            return;
        }
        let Some(item) = self.state.selected_right_item().cloned() else {
            return;
        };

        match self.state.selected_menu().name {
            MENU_MYSQL => {
                if item.kind == RightItemKind::Database {
                    let request = ActionRequest {
                        action: ConfirmAction::MySqlOptimize,
                        kind: TargetKind::MySqlDatabase,
                        target: item.name.clone(),
                        project_dir: None,
                        service: None,
                    };
                    self.confirm_request(request, format!("database {}", item.name));
                }
            }
            MENU_DOCKER => {
                if let Some(dir) = self.state.selected_container().and_then(|c| c.project_dir.clone()) {
                    self.spawn_editor_open(dir);
                }
            }
            MENU_NODE => {
                if let Some(dir) = item
                    .pid
                    .as_deref()
                    .and_then(|pid| self.state.node_procs.iter().find(|p| p.pid == pid))
                    .map(|p| p.project_dir.clone())
                {
                    self.spawn_editor_open(dir);
                }
            }
            MENU_PYTHON => {
                if let Some(dir) = item
                    .pid
                    .as_deref()
                    .and_then(|pid| self.state.python_procs.iter().find(|p| p.pid == pid))
                    .map(|p| p.project_dir.clone())
                {
                    self.spawn_editor_open(dir);
                }
            }
            _ => {}
        }
    }

    fn action_flush(&mut self) {
        if self.state.focus != PanelFocus::Right
            || self.state.selected_menu().name != MENU_REDIS
        {
            return;
        }
        let Some(item) = self.state.selected_right_item().cloned() else {
            return;
        };
        if item.kind == RightItemKind::Database {
            let request = ActionRequest {
                action: ConfirmAction::RedisFlush,
                kind: TargetKind::RedisDatabase,
                target: item.name.clone(),
                project_dir: None,
                service: None,
            };
            self.confirm_request(request, format!("keyspace {}", item.name));
        }
    }

    fn action_clean_images(&mut self) {
        if self.state.selected_menu().name != MENU_DOCKER {
            return;
        }
        let request = ActionRequest {
            action: ConfirmAction::CleanImages,
            kind: TargetKind::DockerSystem,
            target: "dangling images".into(),
            project_dir: None,
            service: None,
        };
        self.confirm_request(request, "the engine".to_string());
    }

    fn action_vacuum(&mut self) {
        if self.state.focus != PanelFocus::Right
            || self.state.selected_menu().name != MENU_POSTGRES
        {
            return;
        }
        let Some(item) = self.state.selected_right_item().cloned() else {
            return;
        };
        if item.kind == RightItemKind::Database {
            let request = ActionRequest {
                action: ConfirmAction::PostgresVacuum,
                kind: TargetKind::PostgresDatabase,
                target: item.name.clone(),
                project_dir: None,
                service: None,
            };
            self.confirm_request(request, format!("database {}", item.name));
        }
    }

    fn action_view_logs(&mut self) {
        if self.state.focus != PanelFocus::Right {
            return;
        }
        let Some(item) = self.state.selected_right_item().cloned() else {
            return;
        };

        match self.state.selected_menu().name {
            MENU_DOCKER => {
                if let (RightItemKind::Container, Some(id)) = (item.kind, item.container_id) {
                    let docker = self.docker.clone();
                    let tx = self.tx.clone();
                    let name = item.name.clone();
                    tokio::spawn(async move {
                        let result = logs::container_logs(&docker, &id, logs::DEFAULT_TAIL)
                            .await
                            .map_err(|e| e.to_string());
                        let _ = tx.send(Event::LogsFetched { target: name, result });
                    });
                }
            }
            MENU_NODE | MENU_PYTHON => {
                let dir = if self.state.selected_menu().name == MENU_NODE {
                    item.pid
                        .as_deref()
                        .and_then(|pid| self.state.node_procs.iter().find(|p| p.pid == pid))
                        .map(|p| p.project_dir.clone())
                } else {
                    item.pid
                        .as_deref()
                        .and_then(|pid| self.state.python_procs.iter().find(|p| p.pid == pid))
                        .map(|p| p.project_dir.clone())
                };
                let Some(dir) = dir else { return };
                let tx = self.tx.clone();
                tokio::spawn(async move {
                    let result = tokio::task::spawn_blocking(move || {
                        logs::process_logs(&dir, logs::DEFAULT_TAIL)
                    })
                    .await
                    .map_err(|e| e.to_string())
                    .and_then(|r| r.map_err(|e| e.to_string()));
                    let _ = tx.send(Event::LogsFetched { target: "process logs".into(), result });
                });
            }
            _ => {}
        }
    }

    // --- tick scheduler -------------------------------------------------

    fn on_tick(&mut self) {
        self.state.tick_count += 1;
        let tick = self.state.tick_count;

        // Every second: lightweight liveness sweep.
        self.spawn_status_sweep();

        // Proactive monitor. The counter moves once per tick based on the
        // latest sweep result.
        let pg_up = self
            .state
            .menu
            .iter()
            .find(|m| m.name == MENU_POSTGRES)
            .and_then(|m| m.up)
            .unwrap_or(true);
        self.state.record_postgres_status(pg_up);
        if self.state.should_trigger_proactive() {
            self.state.latch_proactive();
            self.state.status_line = "failure detected, starting automatic analysis".into();
            logger::log_issue("PROACTIVE", "PostgreSQL down, triggering analysis");
            self.start_analysis(Some("the PostgreSQL database service stopped".to_string()));
        }

        // Selected view refresh.
        let selected = self.state.selected_menu().clone();
        match selected.kind {
            MenuKind::Service if tick % 3 == 0 => self.refresh_selected(),
            MenuKind::Info => {
                let fast = selected.name == MENU_PORTS || selected.name == MENU_TOP;
                if (fast && tick % 3 == 0) || (!fast && tick % 5 == 0) {
                    self.refresh_selected();
                }
            }
            _ => {}
        }

        // Docker stats ride the container refresh; nudge it when focused.
        if tick % 5 == 0 && selected.name == MENU_DOCKER {
            self.refresh_service(MENU_DOCKER);
        }

        // Background refresh of everything else so switching is instant.
        if tick % 10 == 0 {
            self.refresh_unselected();
        }

        // Periodic snapshot into the writer queue.
        if tick % self.snapshot_interval == 0 {
            self.spawn_snapshot();
        }
    }

    fn on_service_status(&mut self, index: usize, up: bool) {
        let Some(item) = self.state.menu.get_mut(index) else {
            return;
        };
        let previous = item.up;
        item.up = Some(up);
        if previous.is_some() && previous != Some(up) {
            logger::log_service_status(item.name, if up { "started" } else { "stopped" });
        }
    }

    fn on_command_done(&mut self, outcome: CommandOutcome) {
        if outcome.success && self.state.demo == DemoPhase::Broken {
            self.state.demo = DemoPhase::Fixed;
        }
        self.state.set_banner(&outcome);
        self.spawn_banner_clear();
        self.spawn_status_sweep();
        self.refresh_selected_forced();
    }

    fn on_ai_chunk(&mut self, delta: String, done: bool) {
        self.state.ai.apply_chunk(&delta, done);

        if done && self.state.ai.proactive {
            self.state.ai.proactive = false;
            match self.state.ai.pending_command.clone() {
                Some(cmd) => self.state.open_proactive_confirm(&cmd),
                None => {
                    self.state.status_line =
                        "analysis finished without a runnable suggestion".into();
                }
            }
        }
    }

    // --- workers --------------------------------------------------------

    fn spawn_status_sweep(&self) {
        let injection = FaultInjection::for_phase(self.state.demo);
        for (index, item) in self.state.menu.iter().enumerate() {
            if item.kind != MenuKind::Service {
                continue;
            }
            let tx = self.tx.clone();
            let name = item.name;
            let process = item.probe_process();
            let docker = self.docker.clone();
            tokio::spawn(async move {
                let up = if injection.forces_down(name) {
                    false
                } else if name == MENU_DOCKER {
                    docker.available().await
                } else if let Some(process) = process {
                    probes::service_alive(process).await
                } else {
                    false
                };
                let _ = tx.send(Event::ServiceStatus { index, up });
            });
        }
    }

    fn refresh_selected(&mut self) {
        let name = self.state.selected_menu().name;
        self.refresh_service(name);
    }

    /// Refresh the selected service even if its cache entry is fresh, used
    /// right after a confirmed command mutated the world.
    fn refresh_selected_forced(&mut self) {
        let name = self.state.selected_menu().name;
        self.state.cache.invalidate(name);
        self.refresh_service(name);
    }

    fn refresh_all_services(&mut self) {
        let names: Vec<&'static str> = self
            .state
            .menu
            .iter()
            .filter(|m| matches!(m.kind, MenuKind::Service | MenuKind::Info))
            .map(|m| m.name)
            .collect();
        for name in names {
            self.refresh_service(name);
        }
    }

    fn refresh_unselected(&mut self) {
        let selected = self.state.selected_menu().name;
        let names: Vec<&'static str> = self
            .state
            .menu
            .iter()
            .filter(|m| matches!(m.kind, MenuKind::Service | MenuKind::Info))
            .map(|m| m.name)
            .filter(|n| *n != selected)
            .collect();
        for name in names {
            self.refresh_service(name);
        }
    }

    /// TTL- and latch-gated dispatch for one service key.
    fn refresh_service(&mut self, name: &'static str) {
        let Some(item) = self.state.menu.iter().find(|m| m.name == name) else {
            return;
        };
        let Some(kind) = item.refresh_kind() else {
            return;
        };
        if !self.state.cache.try_begin_refresh(name, kind.ttl()) {
            return;
        }
        self.dispatch_fetch(name);
    }

    fn dispatch_fetch(&self, name: &'static str) {
        let tx = self.tx.clone();
        let docker = self.docker.clone();
        let system = Arc::clone(&self.system);
        let injection = FaultInjection::for_phase(self.state.demo);

        tokio::spawn(async move {
            fetch_service_data(name, docker, system, injection, tx).await;
        });
    }

    fn spawn_snapshot(&self) {
        let system = Arc::clone(&self.system);
        let writer_tx = self.writer_tx.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let resources = system::collect_resources(&system).await;
            let processes = system.lock().top_processes(10);
            logger::log_system_resources(
                resources.cpu_usage,
                resources.memory_used,
                resources.memory_total,
            );
            let _ = tx.send(Event::ResourcesSampled(resources.clone()));
            writer::offer(&writer_tx, FullSnapshot { resources, processes });
        });
    }

    fn spawn_graph_fetch(&self, mode: ViewMode) {
        let Some(store) = self.store.clone() else {
            let _ = self.tx.send(Event::GraphData(Vec::new()));
            return;
        };
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let data = tokio::task::spawn_blocking(move || match mode {
                ViewMode::GraphHistory => store.long_term_metrics(HISTORY_DAYS),
                _ => store.recent_metrics(REALTIME_POINTS),
            })
            .await
            .map(|r| r.unwrap_or_default())
            .unwrap_or_default();
            let _ = tx.send(Event::GraphData(data));
        });
    }

    fn spawn_confirmed_action(&self, request: ActionRequest) {
        let docker = self.docker.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let outcome = actions::execute(&docker, &request).await;
            let _ = tx.send(Event::CommandDone(outcome));
        });
    }

    fn spawn_editor_open(&self, dir: String) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let outcome = actions::open_in_editor(&dir).await;
            let _ = tx.send(Event::CommandDone(outcome));
        });
    }

    fn spawn_ai_command(&self, command: String) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let outcome = actions::execute_ai_command(&command).await;
            let _ = tx.send(Event::AiCommandResult(outcome));
        });
    }

    fn spawn_banner_clear(&self) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(BANNER_SECS)).await;
            let _ = tx.send(Event::ClearBanner);
        });
    }

    fn spawn_health_check(&self) {
        let client = self.ai.client.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let up = client.check_health().await.is_ok();
            let _ = tx.send(Event::AiHealth(up));
        });
    }

    fn spawn_model_fetch(&self) {
        let client = self.ai.client.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            if let Ok(models) = client.list_models().await {
                let _ = tx.send(Event::AiModels(models));
            }
        });
    }

    /// Start a streaming analysis. `failure` seeds the proactive prompt;
    /// `None` is the user-initiated path behind the `a` key.
    fn start_analysis(&mut self, failure: Option<String>) {
        let user_initiated = failure.is_none();
        if user_initiated && self.state.selected_menu().name != MENU_AI {
            return;
        }
        if self.state.ai.busy() {
            return;
        }
        if !self.state.ai.available {
            self.state.ai.phase = AiPhase::Error;
            self.state.ai.response =
                "Cannot reach the Ollama server.\nCheck that it is running on the configured endpoint."
                    .to_string();
            return;
        }

        // At most one stream: a new analysis cancels any previous one.
        if let Some(task) = self.stream_task.take() {
            task.abort();
        }

        self.state.ai.phase = AiPhase::Loading;
        self.state.ai.response.clear();
        self.state.ai.pending_command = None;
        self.state.ai.last_exec_result = None;

        let client = self.ai.client.clone();
        let model = self.ai.model().to_string();
        let docker = self.docker.clone();
        let system = Arc::clone(&self.system);
        let tx = self.tx.clone();

        let handle = tokio::spawn(async move {
            let report = context::collect(&docker, &system).await.to_json();
            let messages = match &failure {
                Some(failure) => service::proactive_messages(failure, &report),
                None => service::analysis_messages(&report),
            };

            match client.generate_stream(&messages, &model).await {
                Err(e) => {
                    let _ = tx.send(Event::AiFailed(e.to_string()));
                }
                Ok(mut rx) => {
                    while let Some(chunk) = rx.recv().await {
                        match chunk {
                            Ok(chunk) => {
                                let done = chunk.done;
                                if tx
                                    .send(Event::AiChunk { delta: chunk.delta, done })
                                    .is_err()
                                    || done
                                {
                                    return;
                                }
                            }
                            Err(e) => {
                                let kind = match &e {
                                    LlmError::Stream(_) => "LLM_STREAM",
                                    LlmError::Api(_) => "LLM_API",
                                    LlmError::Http(..) => "LLM_HTTP",
                                    LlmError::Transport(_) => "LLM_TRANSPORT",
                                };
                                logger::log_issue(kind, &e.to_string());
                                let _ = tx.send(Event::AiFailed(e.to_string()));
                                return;
                            }
                        }
                    }
                    // Producer closed without done: treat as completion.
                    let _ = tx.send(Event::AiChunk { delta: String::new(), done: true });
                }
            }
        });
        self.stream_task = Some(handle);
    }

    fn render(&mut self) -> Result<()> {
        let state = &self.state;
        let theme = &self.theme;
        self.terminal.draw(|frame| {
            Renderer::render(frame, state, theme);
        })?;
        Ok(())
    }
}

/// Worker body for one service refresh. Sends the formatted overview plus
/// the typed record list for the right panel.
async fn fetch_service_data(
    name: &'static str,
    docker: DockerProbe,
    system: Arc<Mutex<SystemProbe>>,
    injection: FaultInjection,
    tx: mpsc::UnboundedSender<Event>,
) {
    let data: String = match name {
        MENU_POSTGRES => {
            let status = if injection.forces_down(name) {
                probes::ServiceStatus::stopped()
            } else {
                postgres::check().await
            };
            let dbs = if status.running {
                postgres::databases().await
            } else {
                Vec::new()
            };
            let text = postgres::format_overview(&status, &dbs);
            let _ = tx.send(Event::PostgresDatabases(dbs));
            text
        }
        MENU_MYSQL => {
            let status = mysql::check().await;
            let dbs = if status.running { mysql::databases().await } else { Vec::new() };
            let text = mysql::format_overview(&status, &dbs);
            let _ = tx.send(Event::MySqlDatabases(dbs));
            text
        }
        MENU_REDIS => {
            let status = redis::check().await;
            let dbs = if status.running { redis::databases().await } else { Vec::new() };
            let text = redis::format_overview(&status, &dbs);
            let _ = tx.send(Event::RedisDatabases(dbs));
            text
        }
        MENU_DOCKER => {
            if !docker.available().await {
                let _ = tx.send(Event::Containers {
                    list: Vec::new(),
                    stats: Default::default(),
                });
                "Docker: not running".to_string()
            } else {
                let list = docker.containers().await;
                let mut stats = std::collections::HashMap::new();
                for c in &list {
                    if let Some(s) = docker.container_stats(c).await {
                        stats.insert(c.id.clone(), s);
                    }
                }
                let text = crate::probes::docker::format_containers(&list, &stats);
                let _ = tx.send(Event::Containers { list, stats });
                text
            }
        }
        MENU_NODE => {
            let procs = runtimes::node_processes().await;
            let text = runtimes::format_node_overview(&procs);
            let _ = tx.send(Event::NodeProcesses(procs));
            text
        }
        MENU_PYTHON => {
            let procs = runtimes::python_processes().await;
            let text = runtimes::format_python_overview(&procs);
            let _ = tx.send(Event::PythonProcesses(procs));
            text
        }
        MENU_PORTS => {
            let list = ports::listening_ports().await;
            let text = ports::format_ports(&list);
            let _ = tx.send(Event::PortsData(list));
            text
        }
        MENU_TOP => {
            let list = system.lock().top_processes(10);
            let mut text = String::from("Top processes by CPU:\n");
            for (i, p) in list.iter().enumerate() {
                text.push_str(&format!(
                    "  {:>2}. {:<24} (PID {:<7}) {:>5.1}% CPU | {}MB{}\n",
                    i + 1,
                    p.name,
                    p.pid,
                    p.cpu,
                    p.memory_mb,
                    if p.is_dev_tool { "  [dev]" } else { "" },
                ));
            }
            let _ = tx.send(Event::TopProcesses(list));
            text
        }
        MENU_SYSTEM => {
            let resources = system::collect_resources(&system).await;
            let top = system.lock().top_processes(5);
            let text = system::format_resources_detail(&resources, &top);
            let _ = tx.send(Event::ResourcesSampled(resources));
            text
        }
        _ => {
            let _ = tx.send(Event::ServiceDataFailed { service: name.to_string() });
            return;
        }
    };

    let _ = tx.send(Event::ServiceData { service: name.to_string(), data });
}
