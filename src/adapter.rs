//! Poll the bridge and mirror its locks until stopped.
//!
//! Every cycle moves through [`Phase::Fetching`] and [`Phase::Mirroring`]
//! before returning to [`Phase::Idle`] to wait for the next tick. Stopping
//! the adapter drops any cycle in progress, so nothing is written to the
//! store once [`AdapterHandle::stop`] has been called.
use std::sync::Arc;
use std::time::Duration;

use nuki_common::state::StateChange;
use serde::Deserialize;
use tokio::select;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::services::state_store::{StateStore, StateSubscription};
use crate::sinks::mirror::StateMirror;
use crate::sources::bridge::{self, BridgeClient};
use crate::spawn;

const fn default_poll_interval() -> Duration {
    Duration::from_secs(30)
}

/// How often to poll.
#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    /// Time between two requests to the bridge
    #[serde(
        default = "default_poll_interval",
        with = "crate::serde::with_seconds"
    )]
    pub poll_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
        }
    }
}

/// What the adapter is doing right now.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for the next tick
    Idle,

    /// Waiting for the bridge to answer
    Fetching,

    /// Writing locks to the store
    Mirroring,

    /// Shut down, nothing more will happen
    Stopped,
}

/// Phase and progress of the adapter.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Status {
    /// The current phase
    pub phase: Phase,

    /// Number of cycles that ran to the end, successful or not
    pub cycles: u64,
}

/// Mirrors one bridge into a state store.
pub struct Adapter {
    bridge: bridge::Config,
    config: Config,
    store: Arc<dyn StateStore>,
}

impl Adapter {
    /// Create an adapter for the bridge described by `bridge`.
    #[must_use]
    pub fn new(bridge: bridge::Config, config: Config, store: Arc<dyn StateStore>) -> Self {
        Self {
            bridge,
            config,
            store,
        }
    }

    /// Start polling in the background.
    ///
    /// The first request is made straight away.
    ///
    /// # Errors
    ///
    /// If the HTTP client cannot be created.
    pub fn start(self) -> Result<AdapterHandle, bridge::Error> {
        let namespace = self.bridge.namespace();
        let client = BridgeClient::new(&self.bridge)?;

        if namespace.is_empty() {
            warn!("No bridge address configured, nothing will be fetched");
        } else {
            info!("config Nuki bridge name: {namespace}");
            info!("config bridge: {}", client.url());
            info!(
                "config poll interval: {}s",
                self.config.poll_interval.as_secs()
            );
        }

        let (status_tx, status_rx) = watch::channel(Status {
            phase: Phase::Idle,
            cycles: 0,
        });
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let (poll_tx, poll_rx) = mpsc::channel(1);

        let changes = self.store.subscribe(&format!("{namespace}.*"));
        let poller = Poller {
            client,
            mirror: StateMirror::new(self.store, namespace),
            status: status_tx,
        };

        let task = spawn(poller.run(self.config.poll_interval, shutdown_rx, poll_rx, changes));

        Ok(AdapterHandle {
            status: status_rx,
            shutdown: shutdown_tx,
            poll: poll_tx,
            task,
        })
    }
}

/// Control a running [`Adapter`].
///
/// Dropping the handle stops the adapter as well.
pub struct AdapterHandle {
    status: watch::Receiver<Status>,
    shutdown: oneshot::Sender<()>,
    poll: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl AdapterHandle {
    /// The current phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.status.borrow().phase
    }

    /// Watch phase and progress.
    #[must_use]
    pub fn status(&self) -> watch::Receiver<Status> {
        self.status.clone()
    }

    /// Poll the bridge now instead of waiting for the next tick.
    ///
    /// Does nothing if a poll request is already pending.
    pub fn poll_now(&self) {
        if self.poll.try_send(()).is_err() {
            debug!("Poll already pending");
        }
    }

    /// Stop polling and wait until the adapter is [`Phase::Stopped`].
    ///
    /// A request in flight is abandoned and its result never written.
    pub async fn stop(self) {
        let _ = self.shutdown.send(());
        if let Err(err) = self.task.await {
            error!("Adapter task failed: {err}");
        }
    }
}

struct Poller {
    client: BridgeClient,
    mirror: StateMirror,
    status: watch::Sender<Status>,
}

impl Poller {
    fn set_phase(&self, phase: Phase) {
        self.status.send_modify(|status| status.phase = phase);
    }

    async fn run(
        self,
        poll_interval: Duration,
        mut shutdown: oneshot::Receiver<()>,
        mut poll: mpsc::Receiver<()>,
        mut changes: StateSubscription,
    ) {
        let mut interval = time::interval(poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        'outer: loop {
            select! {
                biased;
                _ = &mut shutdown => break,
                Ok(change) = changes.recv() => {
                    log_change(&change);
                    continue;
                }
                _ = interval.tick() => {}
                Some(()) = poll.recv() => {
                    interval.reset();
                }
            }

            let cycle = self.cycle();
            tokio::pin!(cycle);

            // Our own writes arrive while mirroring, keep up with them.
            loop {
                select! {
                    biased;
                    _ = &mut shutdown => {
                        let phase = self.status.borrow().phase;
                        info!("Shutdown during {phase:?}, abandoning cycle");
                        break 'outer;
                    }
                    Ok(change) = changes.recv() => log_change(&change),
                    () = &mut cycle => break,
                }
            }
        }

        let status = self.status;
        drop(self.client);
        status.send_modify(|status| status.phase = Phase::Stopped);
        info!("cleaned everything up...");
    }

    async fn cycle(&self) {
        self.set_phase(Phase::Fetching);

        match self.client.fetch_locks().await {
            Ok(locks) => {
                info!("Lock list requested: {} locks", locks.len());
                self.set_phase(Phase::Mirroring);
                let reports = self.mirror.mirror_all(&locks).await;
                let failed = reports.iter().filter(|report| !report.is_ok()).count();
                if failed > 0 {
                    warn!("{failed} of {} locks were not mirrored completely", locks.len());
                }
            }
            Err(err @ bridge::Error::EmptyResponse) => {
                warn!("{err}. Check IP address and try again.");
            }
            Err(err) if err.is_warning() => {
                warn!("Skipping lock list request: {err}");
            }
            Err(err) => {
                error!("Lock list request failed: {err}");
            }
        }

        self.status.send_modify(|status| {
            status.phase = Phase::Idle;
            status.cycles += 1;
        });
    }
}

fn log_change(change: &StateChange) {
    if change.state.ack {
        debug!("stateChange {} {}", change.path, change.state.val);
    } else {
        info!(
            "stateChange {} {} is not acknowledged, locks cannot be controlled yet",
            change.path, change.state.val
        );
    }
}
