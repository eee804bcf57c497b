//! Keep the state tree in memory
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use nuki_common::state::{ObjectDescriptor, ObjectType, State, StateChange, StateValue};
use tokio::sync::{broadcast, Mutex};
use tracing::debug;

use super::{StateStore, StateSubscription, StoreError, CHANGES_SIZE};

#[derive(Default)]
struct Tree {
    objects: HashMap<String, ObjectDescriptor>,
    states: HashMap<String, State>,
}

impl Tree {
    fn apply(
        &mut self,
        path: &str,
        value: StateValue,
        ack: bool,
    ) -> Result<StateChange, StoreError> {
        let object = self
            .objects
            .get(path)
            .ok_or_else(|| StoreError::NotDeclared(path.to_string()))?;

        if object.object_type != ObjectType::State {
            return Err(StoreError::NotAState(path.to_string()));
        }

        if let Some(expected) = object.common.value_type {
            let actual = value.value_type();
            if expected != actual {
                return Err(StoreError::TypeMismatch {
                    path: path.to_string(),
                    expected,
                    actual,
                });
            }
        }

        let state = State {
            val: value,
            ack,
            ts: Utc::now(),
        };
        self.states.insert(path.to_string(), state.clone());

        Ok(StateChange {
            path: path.to_string(),
            state,
        })
    }
}

/// A [`StateStore`] that keeps everything in memory.
///
/// A batch of writes is applied under one lock, and change notifications are
/// only sent once the whole batch is applied.
pub struct MemoryStateStore {
    tree: Mutex<Tree>,
    changes: broadcast::Sender<StateChange>,
}

impl MemoryStateStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGES_SIZE);
        Self {
            tree: Mutex::new(Tree::default()),
            changes,
        }
    }

    /// Get the current state at `path`.
    pub async fn get_state(&self, path: &str) -> Option<State> {
        self.tree.lock().await.states.get(path).cloned()
    }

    /// Get the object declared at `path`.
    pub async fn get_object(&self, path: &str) -> Option<ObjectDescriptor> {
        self.tree.lock().await.objects.get(path).cloned()
    }

    /// Get the paths of all declared objects, sorted.
    pub async fn object_paths(&self) -> Vec<String> {
        let tree = self.tree.lock().await;
        let mut paths: Vec<String> = tree.objects.keys().cloned().collect();
        paths.sort();
        paths
    }

    fn notify(&self, change: StateChange) {
        // Nobody listening is fine.
        let _ = self.changes.send(change);
    }
}

impl Default for MemoryStateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn ensure_declared(
        &self,
        path: &str,
        descriptor: &ObjectDescriptor,
    ) -> Result<(), StoreError> {
        let mut tree = self.tree.lock().await;
        if let Some(existing) = tree.objects.get(path) {
            if existing != descriptor {
                debug!("{path}: already declared as {existing:?}, keeping it");
            }
        } else {
            tree.objects.insert(path.to_string(), descriptor.clone());
        }
        Ok(())
    }

    async fn write(&self, path: &str, value: StateValue, ack: bool) -> Result<(), StoreError> {
        let change = self.tree.lock().await.apply(path, value, ack)?;
        self.notify(change);
        Ok(())
    }

    async fn write_batch(
        &self,
        writes: Vec<(String, StateValue)>,
        ack: bool,
    ) -> Vec<Result<(), StoreError>> {
        let mut changes = Vec::with_capacity(writes.len());
        let results = {
            let mut tree = self.tree.lock().await;
            writes
                .into_iter()
                .map(|(path, value)| {
                    tree.apply(&path, value, ack)
                        .map(|change| changes.push(change))
                })
                .collect()
        };

        for change in changes {
            self.notify(change);
        }

        results
    }

    fn subscribe(&self, pattern: &str) -> StateSubscription {
        StateSubscription::new(pattern, self.changes.subscribe())
    }
}
