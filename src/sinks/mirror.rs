//! Mirror lock records into the state tree
use std::sync::Arc;

use nuki_common::nuki::{LastKnownState, LockRecord};
use nuki_common::state::{ObjectDescriptor, Role, StateValue, ValueType};
use tracing::{debug, error};

use crate::services::state_store::{StateStore, StoreError};

/// Leaf holding the numeric state code.
pub const STATE: &str = "state";

/// Leaf holding the state as text.
pub const STATE_NAME: &str = "stateName";

/// Leaf holding the battery warning.
pub const BATTERY_CRITICAL: &str = "batteryCritical";

/// Leaf holding the time of the last state change.
pub const TIMESTAMP: &str = "timestamp";

struct Leaf {
    name: &'static str,
    descriptor: ObjectDescriptor,
    value: StateValue,
}

fn leaves(state: &LastKnownState) -> [Leaf; 4] {
    [
        Leaf {
            name: STATE,
            descriptor: ObjectDescriptor::state("Status", ValueType::Number, Role::Value),
            value: state.state.clone().into(),
        },
        Leaf {
            name: STATE_NAME,
            descriptor: ObjectDescriptor::state("Status text", ValueType::String, Role::Text),
            value: state.state_name.clone().into(),
        },
        Leaf {
            name: BATTERY_CRITICAL,
            descriptor: ObjectDescriptor::state(
                "Battery critical",
                ValueType::Boolean,
                Role::Value,
            ),
            value: state.battery_critical.into(),
        },
        Leaf {
            name: TIMESTAMP,
            descriptor: ObjectDescriptor::state("Timestamp", ValueType::String, Role::Time),
            value: state.timestamp.clone().into(),
        },
    ]
}

/// What went wrong mirroring one lock.
#[derive(Debug, Default)]
pub struct MirrorReport {
    /// Path of the lock in the state tree
    pub path: String,

    /// Number of leaves written
    pub written: usize,

    /// Every operation the store refused
    pub failures: Vec<StoreError>,
}

impl MirrorReport {
    /// Was every leaf declared and written?
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Copy lock records into the state tree, acknowledged.
pub struct StateMirror {
    store: Arc<dyn StateStore>,
    namespace: String,
}

impl StateMirror {
    /// Mirror locks into `store` under `namespace`.
    #[must_use]
    pub fn new(store: Arc<dyn StateStore>, namespace: impl Into<String>) -> Self {
        Self {
            store,
            namespace: namespace.into(),
        }
    }

    /// The namespace locks are mirrored under.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The path of the device object for `lock`.
    #[must_use]
    pub fn path_for(&self, lock: &LockRecord) -> String {
        format!("{}.{}", self.namespace, lock.id)
    }

    /// Declare and write the state of one lock.
    ///
    /// Store failures are logged and reported, they never stop the other
    /// leaves from being written.
    #[tracing::instrument(skip_all, fields(lock = %lock.id))]
    pub async fn mirror(&self, lock: &LockRecord) -> MirrorReport {
        let path = self.path_for(lock);
        let mut report = MirrorReport {
            path: path.clone(),
            ..MirrorReport::default()
        };

        let device = ObjectDescriptor::device(&lock.name);
        if let Err(err) = self.store.ensure_declared(&path, &device).await {
            error!("{path}: declare failed: {err}");
            report.failures.push(err);
        }

        let mut writes = Vec::with_capacity(4);
        for leaf in leaves(&lock.last_known_state) {
            let leaf_path = format!("{path}.{}", leaf.name);
            match self.store.ensure_declared(&leaf_path, &leaf.descriptor).await {
                Ok(()) => writes.push((leaf_path, leaf.value)),
                Err(err) => {
                    error!("{leaf_path}: declare failed: {err}");
                    report.failures.push(err);
                }
            }
        }

        let paths: Vec<String> = writes.iter().map(|(path, _)| path.clone()).collect();
        let results = self.store.write_batch(writes, true).await;

        for (leaf_path, result) in paths.iter().zip(results) {
            match result {
                Ok(()) => report.written += 1,
                Err(err) => {
                    error!("{leaf_path}: write failed: {err}");
                    report.failures.push(err);
                }
            }
        }

        debug!(
            "{path}: {} is {} ({})",
            lock.name, lock.last_known_state.state_name, lock.last_known_state.state
        );
        report
    }

    /// Mirror every lock, in order.
    ///
    /// Yields after each lock so subscribers on the same task can keep up
    /// with the change notifications.
    pub async fn mirror_all(&self, locks: &[LockRecord]) -> Vec<MirrorReport> {
        let mut reports = Vec::with_capacity(locks.len());
        for lock in locks {
            reports.push(self.mirror(lock).await);
            tokio::task::yield_now().await;
        }
        reports
    }
}
