//! Session controller.
//!
//! A session owns one [`AggregateState`] for its whole lifetime. A single
//! task drains two queues - adapter updates and consumer commands - and
//! applies them one at a time, publishing a fresh [`Snapshot`] after each.
//!
//! Fetches never run inside that task. They are spawned and post their
//! results back as [`Update`]s, so a slow request never blocks push events
//! and the reducer itself never suspends.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::aggregator::{AggregateState, Source, Update};
use crate::channels::{PullChannel, PushChannel};
use crate::display::Snapshot;
use crate::models::TimeRange;

// ---

const UPDATE_QUEUE_DEPTH: usize = 64;
const COMMAND_QUEUE_DEPTH: usize = 16;

/// Session start parameters.
#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    pub poll_interval: Duration,
    pub initial_range: TimeRange,
}

impl Default for SessionOptions {
    fn default() -> Self {
        SessionOptions {
            poll_interval: Duration::from_secs(5),
            initial_range: TimeRange::Hour,
        }
    }
}

#[derive(Debug)]
enum Command {
    SelectRange(TimeRange),
    Refetch,
    DismissError,
}

/// Cloneable consumer-side view of a running session.
#[derive(Debug, Clone)]
pub struct SessionClient {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<Snapshot>,
}

impl SessionClient {
    // ---
    /// Latest published snapshot.
    pub fn snapshot(&self) -> Snapshot {
        self.snapshots.borrow().clone()
    }

    /// Receiver notified after every applied update.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshots.clone()
    }

    /// Change `selectedRange`. A change triggers one history fetch.
    pub async fn select_range(&self, range: TimeRange) -> Result<()> {
        self.send(Command::SelectRange(range)).await
    }

    /// Re-run the full latest + history fetch.
    pub async fn refetch(&self) -> Result<()> {
        self.send(Command::Refetch).await
    }

    pub async fn dismiss_error(&self) -> Result<()> {
        self.send(Command::DismissError).await
    }

    async fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| anyhow!("Session has ended"))
    }
}

/// Owning handle for a session. Dropping it without [`shutdown`] leaves the
/// background tasks to end when the runtime does.
///
/// [`shutdown`]: SessionHandle::shutdown
#[derive(Debug)]
pub struct SessionHandle {
    client: SessionClient,
    updates: mpsc::Sender<Update>,
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl SessionHandle {
    // ---
    pub fn client(&self) -> SessionClient {
        self.client.clone()
    }

    /// Sender adapters use to feed the reducer.
    pub fn updates(&self) -> mpsc::Sender<Update> {
        self.updates.clone()
    }

    /// Open the push channel for this session.
    pub fn attach_push(&mut self, push: PushChannel) {
        let task = push.spawn(self.updates(), self.shutdown.subscribe());
        self.tasks.push(task);
    }

    /// Stop polling, close the push channel and end the reducer.
    pub async fn shutdown(self) {
        // ---
        info!("Shutting down session");
        self.shutdown.send_replace(true);

        for task in self.tasks {
            if let Err(e) = task.await {
                warn!("Session task ended abnormally: {}", e);
            }
        }
    }
}

/// Start a session: initial full fetch, poll timer and reducer task.
pub fn start<P: PullChannel>(pull: P, options: SessionOptions) -> SessionHandle {
    // ---
    let pull = Arc::new(pull);
    let mut state = AggregateState::new(options.initial_range);

    let (updates_tx, updates_rx) = mpsc::channel(UPDATE_QUEUE_DEPTH);
    let (commands_tx, commands_rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    state.apply(Update::FetchStarted);
    spawn_full_fetch(pull.clone(), options.initial_range, updates_tx.clone());

    let (snapshots_tx, snapshots_rx) = watch::channel(Snapshot::from_state(&state));

    let poller = tokio::spawn(poll_latest(
        pull.clone(),
        options.poll_interval,
        updates_tx.clone(),
        shutdown_tx.subscribe(),
    ));

    let reducer = Reducer {
        state,
        pull,
        updates_tx: updates_tx.clone(),
        updates_rx,
        commands_rx,
        snapshots: snapshots_tx,
        shutdown: shutdown_rx,
    };
    let reducer = tokio::spawn(reducer.run());

    SessionHandle {
        client: SessionClient {
            commands: commands_tx,
            snapshots: snapshots_rx,
        },
        updates: updates_tx,
        shutdown: shutdown_tx,
        tasks: vec![reducer, poller],
    }
}

// ---

struct Reducer<P> {
    state: AggregateState,
    pull: Arc<P>,
    updates_tx: mpsc::Sender<Update>,
    updates_rx: mpsc::Receiver<Update>,
    commands_rx: mpsc::Receiver<Command>,
    snapshots: watch::Sender<Snapshot>,
    shutdown: watch::Receiver<bool>,
}

impl<P: PullChannel> Reducer<P> {
    // ---
    async fn run(mut self) {
        // ---
        loop {
            tokio::select! {
                _ = self.shutdown.changed() => break,
                Some(update) = self.updates_rx.recv() => {
                    self.state.apply(update);
                }
                Some(command) = self.commands_rx.recv() => {
                    self.handle(command);
                }
            }
            self.publish();
        }

        debug!("Session reducer stopped");
    }

    fn handle(&mut self, command: Command) {
        // ---
        match command {
            Command::SelectRange(range) => {
                if self.state.select_range(range) {
                    self.start_full_fetch();
                }
            }
            Command::Refetch => self.start_full_fetch(),
            Command::DismissError => self.state.apply(Update::DismissError),
        }
    }

    fn start_full_fetch(&mut self) {
        self.state.apply(Update::FetchStarted);
        spawn_full_fetch(self.pull.clone(), self.state.selected_range(), self.updates_tx.clone());
    }

    fn publish(&self) {
        self.snapshots.send_replace(Snapshot::from_state(&self.state));
    }
}

/// Fire-and-forget latest + history fetch. The caller has already applied
/// [`Update::FetchStarted`]; this always ends with [`Update::FetchFinished`].
fn spawn_full_fetch<P: PullChannel>(pull: Arc<P>, range: TimeRange, updates: mpsc::Sender<Update>) {
    // ---
    tokio::spawn(async move {
        let error = full_fetch(pull.as_ref(), range, &updates)
            .await
            .err()
            .map(|e| format!("{:#}", e));
        // The session may already be gone; nothing left to report to.
        let _ = updates.send(Update::FetchFinished(error)).await;
    });
}

async fn full_fetch<P: PullChannel>(pull: &P, range: TimeRange, updates: &mpsc::Sender<Update>) -> Result<()> {
    // ---
    let latest = pull.fetch_latest().await?;
    if let Some(first) = latest.into_iter().next() {
        updates.send(Update::LatestLoaded(first)).await?;
    }

    let readings = pull.fetch_history(range).await?;
    updates.send(Update::HistoryLoaded { range, readings }).await?;
    Ok(())
}

/// Poll the latest reading on a fixed period, independent of the push
/// channel. Failures are logged and the timer keeps going.
async fn poll_latest<P: PullChannel>(
    pull: Arc<P>,
    period: Duration,
    updates: mpsc::Sender<Update>,
    mut shutdown: watch::Receiver<bool>,
) {
    // ---
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {}
        }

        match pull.fetch_latest().await {
            Ok(latest) => {
                let Some(raw) = latest.into_iter().next() else {
                    continue;
                };
                let update = Update::Reading {
                    raw,
                    source: Source::Poll,
                };
                if updates.send(update).await.is_err() {
                    break;
                }
            }
            Err(e) => warn!("Polling error: {:#}", e),
        }
    }

    debug!("Poll timer stopped");
}
