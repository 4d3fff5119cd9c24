//! Dashboard runtime - the single event loop tying acquisition to the engine
//!
//! One task owns the controller and the engine. Everything else talks to it
//! through channels:
//!
//! - `Command` in (refresh, cancel, ranking direction, category filter, shutdown)
//! - `Snapshot` out through a `watch` channel; state and views change together
//!
//! Fetches and retry timers run as spawned tasks that post back an internal
//! `Event`. Their handles are kept so a refresh or cancel can abort them, and
//! every result is checked against the controller's sequence before use.

use crate::acquisition::controller::{
    AcquisitionController, AcquisitionState, RetryPolicy, Step, Ticket,
};
use crate::acquisition::source::{FetchError, TransactionSource};
use crate::analytics::normalizer::{normalize, RawRecord};
use crate::analytics::ranking::RankDirection;
use crate::config::Config;
use crate::engine::{DashboardEngine, DashboardViews, EngineSettings};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Requests from the rendering layer
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Manual refresh: cancels pending work and restarts the retry budget
    Refresh,
    /// Drop any in-flight fetch or pending retry (view closed)
    Cancel,
    ToggleDirection,
    SetDirection(RankDirection),
    SetCategory(Option<String>),
    CycleCategory,
    Shutdown,
}

/// What the rendering layer sees: acquisition state plus the views it goes with
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub state: AcquisitionState,
    pub views: Arc<DashboardViews>,
}

enum Event {
    Fetched(Ticket, Result<Vec<RawRecord>, FetchError>),
    RetryDue(u64),
}

pub struct Runtime {
    source: Arc<dyn TransactionSource>,
    controller: AcquisitionController,
    engine: DashboardEngine,

    publisher: watch::Sender<Snapshot>,
    events_tx: mpsc::UnboundedSender<Event>,
    events_rx: mpsc::UnboundedReceiver<Event>,

    fetch_task: Option<JoinHandle<()>>,
    retry_timer: Option<JoinHandle<()>>,
}

impl Runtime {
    pub fn new(
        source: Arc<dyn TransactionSource>,
        policy: RetryPolicy,
        settings: EngineSettings,
    ) -> (Self, watch::Receiver<Snapshot>) {
        let controller = AcquisitionController::new(policy);
        let engine = DashboardEngine::new(settings);

        let (publisher, snapshots) = watch::channel(Snapshot {
            state: controller.state().clone(),
            views: engine.views(),
        });
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let runtime = Self {
            source,
            controller,
            engine,
            publisher,
            events_tx,
            events_rx,
            fetch_task: None,
            retry_timer: None,
        };

        (runtime, snapshots)
    }

    pub fn from_config(
        config: &Config,
        source: Arc<dyn TransactionSource>,
    ) -> (Self, watch::Receiver<Snapshot>) {
        Self::new(source, config.retry_policy(), config.engine_settings())
    }

    /// Run until `Shutdown` arrives or every command sender is dropped.
    ///
    /// Starts with one refresh so the dashboard loads without user action.
    pub async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        let policy = self.controller.policy();
        log::info!("🚀 Starting dashboard runtime");
        log::info!("   ├─ Source: {}", self.source.source_type());
        log::info!("   ├─ Max retries: {}", policy.max_retries);
        log::info!("   └─ Retry delay: {:?}", policy.delay);

        self.refresh();

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },

                Some(event) = self.events_rx.recv() => self.handle_event(event),
            }
        }

        self.abort_pending();
        self.controller.cancel();
        self.publish();
        log::info!("🛑 Dashboard runtime stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Refresh => self.refresh(),
            Command::Cancel => {
                self.abort_pending();
                self.controller.cancel();
                log::info!("Acquisition cancelled");
            }
            Command::ToggleDirection => self.engine.toggle_direction(),
            Command::SetDirection(direction) => self.engine.set_direction(direction),
            Command::SetCategory(filter) => self.engine.set_category_filter(filter),
            Command::CycleCategory => self.engine.cycle_category_filter(),
            Command::Shutdown => return,
        }
        self.publish();
    }

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::Fetched(ticket, result) => {
                match self.controller.resolve(ticket, result) {
                    Step::Install(raw) => {
                        self.fetch_task = None;
                        let records = normalize(&raw);
                        log::info!(
                            "✅ Installed {} transactions ({} received)",
                            records.len(),
                            raw.len()
                        );
                        self.engine.install(records);
                    }
                    Step::ScheduleRetry { sequence, delay } => {
                        self.fetch_task = None;
                        self.schedule_retry(sequence, delay);
                    }
                    Step::Exhausted => {
                        self.fetch_task = None;
                    }
                    Step::Discard => return,
                }
                self.publish();
            }
            Event::RetryDue(sequence) => {
                if let Some(ticket) = self.controller.retry_due(sequence) {
                    self.retry_timer = None;
                    self.spawn_fetch(ticket);
                    self.publish();
                }
            }
        }
    }

    fn refresh(&mut self) {
        self.abort_pending();
        let ticket = self.controller.start();
        self.spawn_fetch(ticket);
        self.publish();
    }

    fn spawn_fetch(&mut self, ticket: Ticket) {
        log::info!(
            "📡 Fetching transactions (sequence {}, attempt {})",
            ticket.sequence,
            ticket.attempt
        );

        let source = Arc::clone(&self.source);
        let events = self.events_tx.clone();
        self.fetch_task = Some(tokio::spawn(async move {
            let result = source.fetch().await;
            let _ = events.send(Event::Fetched(ticket, result));
        }));
    }

    fn schedule_retry(&mut self, sequence: u64, delay: Duration) {
        if let Some(timer) = self.retry_timer.take() {
            timer.abort();
        }

        let events = self.events_tx.clone();
        self.retry_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(Event::RetryDue(sequence));
        }));
    }

    fn abort_pending(&mut self) {
        if let Some(task) = self.fetch_task.take() {
            task.abort();
        }
        if let Some(timer) = self.retry_timer.take() {
            timer.abort();
        }
    }

    fn publish(&self) {
        self.publisher.send_replace(Snapshot {
            state: self.controller.state().clone(),
            views: self.engine.views(),
        });
    }
}

/// Spawn the runtime on the current tokio runtime and return its handles
pub fn spawn(
    config: &Config,
    source: Arc<dyn TransactionSource>,
) -> (mpsc::Sender<Command>, watch::Receiver<Snapshot>, JoinHandle<()>) {
    let (runtime, snapshots) = Runtime::from_config(config, source);
    let (commands_tx, commands_rx) = mpsc::channel(64);
    let handle = tokio::spawn(runtime.run(commands_rx));
    (commands_tx, snapshots, handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::source::FileTransactionSource;
    use std::io::Write;

    fn fixture() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[
                {{"id": 1, "timestamp": "2024-01-05T09:00:00", "amount": 12.5, "category": "Groceries"}},
                {{"id": 2, "timestamp": "2024-01-05T20:00:00", "amount": 40.0, "category": "Utilities"}},
                {{"id": 3, "timestamp": "not a time", "amount": 1.0}}
            ]"#
        )
        .unwrap();
        file
    }

    #[tokio::test]
    async fn test_initial_refresh_installs_file_records() {
        let file = fixture();
        let config = Config::from_lookup(|_| None);
        let (commands, mut snapshots, handle) =
            spawn(&config, Arc::new(FileTransactionSource::new(file.path())));

        let snapshot = snapshots
            .wait_for(|s| s.state.is_terminal())
            .await
            .unwrap()
            .clone();
        assert_eq!(snapshot.state, AcquisitionState::Ready);
        assert_eq!(snapshot.views.record_count, 2);

        commands.send(Command::Shutdown).await.unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_commands_republish_views() {
        let file = fixture();
        let config = Config::from_lookup(|_| None);
        let (commands, mut snapshots, handle) =
            spawn(&config, Arc::new(FileTransactionSource::new(file.path())));
        snapshots.wait_for(|s| s.state.is_terminal()).await.unwrap();

        commands.send(Command::ToggleDirection).await.unwrap();
        let snapshot = snapshots
            .wait_for(|s| s.views.ranking_direction == RankDirection::Lowest)
            .await
            .unwrap()
            .clone();
        assert_eq!(snapshot.views.ranking[0].record.amount, 12.5);

        commands
            .send(Command::SetCategory(Some("Utilities".to_string())))
            .await
            .unwrap();
        let snapshot = snapshots
            .wait_for(|s| s.views.category_filter.is_some())
            .await
            .unwrap()
            .clone();
        assert_eq!(snapshot.views.points.len(), 1);

        drop(commands);
        handle.await.unwrap();
    }
}
