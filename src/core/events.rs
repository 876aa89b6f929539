//! Unified event system: one inbox, many sources.
//!
//! The controller never blocks on I/O; every asynchronous operation runs on
//! its own worker and returns its outcome as a typed event on this channel.

use std::collections::HashMap;

use crossterm::event::KeyEvent;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::probes::actions::CommandOutcome;
use crate::probes::docker::{ContainerInfo, ContainerStatsInfo};
use crate::probes::mysql::MySqlDatabase;
use crate::probes::ports::PortInfo;
use crate::probes::postgres::PostgresDatabase;
use crate::probes::redis::RedisDatabase;
use crate::probes::runtimes::{NodeProcess, PythonProcess};
use crate::probes::system::{ProcessInfo, SystemResources};

/// All events the controller consumes.
#[derive(Debug)]
pub enum Event {
    // Input
    Key(KeyEvent),
    Resize(u16, u16),

    // 1 Hz scheduler heartbeat
    Tick,

    // Probe completions
    ServiceStatus { index: usize, up: bool },
    ServiceData { service: String, data: String },
    ServiceDataFailed { service: String },
    Containers { list: Vec<ContainerInfo>, stats: HashMap<String, ContainerStatsInfo> },
    PortsData(Vec<PortInfo>),
    TopProcesses(Vec<ProcessInfo>),
    PostgresDatabases(Vec<PostgresDatabase>),
    MySqlDatabases(Vec<MySqlDatabase>),
    RedisDatabases(Vec<RedisDatabase>),
    NodeProcesses(Vec<NodeProcess>),
    PythonProcesses(Vec<PythonProcess>),
    ResourcesSampled(SystemResources),

    // Command / log / graph results
    CommandDone(CommandOutcome),
    ClearBanner,
    LogsFetched { target: String, result: Result<String, String> },
    GraphData(Vec<f64>),

    // LLM lifecycle
    AiHealth(bool),
    AiModels(Vec<String>),
    AiChunk { delta: String, done: bool },
    AiFailed(String),
    AiCommandResult(CommandOutcome),

    Quit,
}

pub struct EventHandler {
    rx: mpsc::UnboundedReceiver<Event>,
    tx: mpsc::UnboundedSender<Event>,
}

impl EventHandler {
    pub fn new() -> (Self, mpsc::UnboundedSender<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { rx, tx: tx.clone() }, tx)
    }

    pub fn sender(&self) -> mpsc::UnboundedSender<Event> {
        self.tx.clone()
    }

    /// Start the terminal reader and the 1 Hz ticker.
    pub fn spawn_sources(tx: mpsc::UnboundedSender<Event>) {
        tokio::spawn(Self::terminal_events(tx.clone()));
        tokio::spawn(Self::tick_events(tx));
    }

    async fn terminal_events(tx: mpsc::UnboundedSender<Event>) {
        use crossterm::event::{Event as CrosstermEvent, EventStream};
        use futures::StreamExt;

        let mut reader = EventStream::new();
        while let Some(event) = reader.next().await {
            let mapped = match event {
                Ok(CrosstermEvent::Key(key)) => Event::Key(key),
                Ok(CrosstermEvent::Resize(w, h)) => Event::Resize(w, h),
                _ => continue,
            };
            if tx.send(mapped).is_err() {
                break;
            }
        }
    }

    async fn tick_events(tx: mpsc::UnboundedSender<Event>) {
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        loop {
            ticker.tick().await;
            if tx.send(Event::Tick).is_err() {
                break;
            }
        }
    }

    pub async fn next(&mut self) -> Option<Event> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn inbox_delivers_in_order() {
        let (mut handler, tx) = EventHandler::new();
        tx.send(Event::Tick).unwrap();
        tx.send(Event::Quit).unwrap();

        assert!(matches!(handler.next().await, Some(Event::Tick)));
        assert!(matches!(handler.next().await, Some(Event::Quit)));
    }
}
