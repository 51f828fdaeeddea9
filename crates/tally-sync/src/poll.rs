// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Poll scheduler: periodic and manual refreshes of the snapshot store.
//!
//! A failed fetch is logged and retried with exponential backoff; the store
//! keeps the last good snapshot until a fetch succeeds.

use crate::diff::ChangeSet;
use crate::model::Player;
use crate::remote::{RemoteError, RemotePlayerService};
use crate::snapshot::{Snapshot, SnapshotError};
use crate::store::{lock, SharedStore};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tally_app_core::prefs::BoardPrefs;
use thiserror::Error;
use tokio::sync::{broadcast, watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// Why a refresh did not reach the store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The list call failed.
    #[error(transparent)]
    Remote(#[from] RemoteError),
    /// The list violated snapshot invariants.
    #[error(transparent)]
    Invalid(#[from] SnapshotError),
}

/// Cadence settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Regular refresh interval.
    pub interval: Duration,
    /// First retry delay after a failure.
    pub retry_initial: Duration,
    /// Retry delay ceiling.
    pub retry_max: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self::from(&BoardPrefs::default())
    }
}

impl From<&BoardPrefs> for PollConfig {
    fn from(prefs: &BoardPrefs) -> Self {
        let (retry_initial, retry_max) = prefs.retry_bounds();
        Self {
            interval: prefs.poll_interval(),
            retry_initial,
            retry_max,
        }
    }
}

/// Doubling retry delay, reset on success.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Option<Duration>,
}

impl Backoff {
    /// New backoff between `initial` and `max`.
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial: initial.min(max),
            max,
            current: None,
        }
    }

    /// Delay before the next attempt after another failure.
    pub fn next_delay(&mut self) -> Duration {
        let next = match self.current {
            None => self.initial,
            Some(d) => d.saturating_mul(2).min(self.max),
        };
        self.current = Some(next);
        next
    }

    /// Forget accumulated failures.
    pub fn reset(&mut self) {
        self.current = None;
    }
}

/// Published after every successful refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardUpdate {
    /// Store version after the refresh.
    pub version: u64,
    /// Per-player changes against the previous snapshot.
    pub changes: ChangeSet,
}

/// Answer to a manual refresh request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshRequest {
    /// A refresh will start promptly.
    Queued,
    /// A fetch is already running; no second one was started.
    AlreadyInFlight,
    /// The scheduler has been stopped.
    Stopped,
}

/// Fetch the roster once and install it in the store.
#[instrument(skip_all)]
pub async fn refresh_once(store: &SharedStore, remote: &dyn RemotePlayerService) -> Result<BoardUpdate, FetchError> {
    let players = remote.list().await?;
    install(store, players)
}

fn install(store: &SharedStore, players: Vec<Player>) -> Result<BoardUpdate, FetchError> {
    let snapshot = Snapshot::ranked(players)?;
    let mut guard = lock(store);
    let changes = guard.replace(snapshot);
    Ok(BoardUpdate {
        version: guard.version(),
        changes,
    })
}

struct PollShared {
    in_flight: AtomicBool,
    manual: Notify,
    updates: broadcast::Sender<BoardUpdate>,
}

/// Drives periodic refreshes of a shared store.
pub struct PollScheduler {
    store: SharedStore,
    remote: Arc<dyn RemotePlayerService>,
    config: PollConfig,
}

impl PollScheduler {
    /// Scheduler over `store` fed by `remote`.
    pub fn new(store: SharedStore, remote: Arc<dyn RemotePlayerService>, config: PollConfig) -> Self {
        Self { store, remote, config }
    }

    /// Start polling on the current tokio runtime. The first fetch runs immediately.
    pub fn spawn(self) -> PollHandle {
        let (updates, _) = broadcast::channel(16);
        let shared = Arc::new(PollShared {
            in_flight: AtomicBool::new(false),
            manual: Notify::new(),
            updates,
        });
        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(Arc::clone(&shared), stop_rx));
        PollHandle {
            shared,
            stop: stop_tx,
            task,
        }
    }

    #[instrument(skip_all, fields(interval = ?self.config.interval))]
    async fn run(self, shared: Arc<PollShared>, mut stop: watch::Receiver<bool>) {
        let mut backoff = Backoff::new(self.config.retry_initial, self.config.retry_max);
        info!("poll scheduler started");

        while !stopped(&stop) {
            shared.in_flight.store(true, Ordering::SeqCst);
            let fetched = self.remote.list().await;
            shared.in_flight.store(false, Ordering::SeqCst);
            if stopped(&stop) {
                debug!("scheduler stopped during fetch; discarding result");
                break;
            }

            let outcome = fetched
                .map_err(FetchError::from)
                .and_then(|players| install(&self.store, players));
            let delay = match outcome {
                Ok(update) => {
                    backoff.reset();
                    let _ = shared.updates.send(update);
                    self.config.interval
                }
                Err(err) => {
                    let retry = backoff.next_delay();
                    warn!(%err, retry_in = ?retry, "leaderboard fetch failed; keeping last snapshot");
                    retry
                }
            };

            tokio::select! {
                biased;
                _ = stop.changed() => break,
                () = shared.manual.notified() => debug!("manual refresh"),
                () = tokio::time::sleep(delay) => {}
            }
        }
        info!("poll scheduler stopped");
    }
}

fn stopped(stop: &watch::Receiver<bool>) -> bool {
    *stop.borrow()
}

/// Control handle for a running scheduler. Dropping it stops the scheduler.
pub struct PollHandle {
    shared: Arc<PollShared>,
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl PollHandle {
    /// Ask for an immediate refresh unless one is already running.
    pub fn refresh_now(&self) -> RefreshRequest {
        if *self.stop.borrow() || self.task.is_finished() {
            return RefreshRequest::Stopped;
        }
        if self.shared.in_flight.load(Ordering::SeqCst) {
            return RefreshRequest::AlreadyInFlight;
        }
        self.shared.manual.notify_one();
        RefreshRequest::Queued
    }

    /// True while a fetch is outstanding.
    pub fn is_in_flight(&self) -> bool {
        self.shared.in_flight.load(Ordering::SeqCst)
    }

    /// Receive an update after each successful refresh.
    pub fn subscribe(&self) -> broadcast::Receiver<BoardUpdate> {
        self.shared.updates.subscribe()
    }

    /// Stop scheduling further polls. An in-flight fetch completes but is discarded.
    pub fn stop(&self) {
        let _ = self.stop.send(true);
    }

    /// Stop and wait for the scheduler task to exit.
    pub async fn shutdown(self) {
        self.stop();
        if let Err(err) = self.task.await {
            warn!(?err, "poll scheduler task ended abnormally");
        }
    }
}
