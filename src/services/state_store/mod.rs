//! The hierarchical object/state tree of the host platform.
//!
//! Paths are dot separated, e.g. `192_168_1_10.1.state`. Every state must be
//! declared with an [`ObjectDescriptor`] before it can be written.
mod memory;

pub use memory::MemoryStateStore;

use async_trait::async_trait;
use nuki_common::state::{ObjectDescriptor, StateChange, StateValue, ValueType};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::error;

/// Size of the change notification queue.
pub const CHANGES_SIZE: usize = 100;

/// The store refused an operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Nothing was declared at this path.
    #[error("No object declared at {0}")]
    NotDeclared(String),

    /// The object at this path is not a state.
    #[error("Object at {0} is not a state")]
    NotAState(String),

    /// The value does not match the declared type.
    #[error("Type mismatch at {path}: expected {expected}, got {actual}")]
    TypeMismatch {
        /// The path written to
        path: String,
        /// The declared type
        expected: ValueType,
        /// The type of the rejected value
        actual: ValueType,
    },

    /// The store rejected the operation for some other reason.
    #[error("Rejected write to {0}: {1}")]
    Rejected(String, String),
}

/// A store of objects and their states.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Declare an object unless something is already declared at `path`.
    ///
    /// # Errors
    ///
    /// If the store refuses the declaration.
    async fn ensure_declared(
        &self,
        path: &str,
        descriptor: &ObjectDescriptor,
    ) -> Result<(), StoreError>;

    /// Write a value to a declared state.
    ///
    /// `ack` is true for confirmed facts and false for commands.
    ///
    /// # Errors
    ///
    /// If the state is not declared or the store refuses the value.
    async fn write(&self, path: &str, value: StateValue, ack: bool) -> Result<(), StoreError>;

    /// Write a number of values, returning one result per value in order.
    ///
    /// A failed write does not stop the remaining writes. The default writes
    /// one after another; stores that can should apply the whole batch before
    /// anybody can observe it.
    async fn write_batch(
        &self,
        writes: Vec<(String, StateValue)>,
        ack: bool,
    ) -> Vec<Result<(), StoreError>> {
        let mut results = Vec::with_capacity(writes.len());
        for (path, value) in writes {
            results.push(self.write(&path, value, ack).await);
        }
        results
    }

    /// Subscribe to changes of every state matching `pattern`.
    fn subscribe(&self, pattern: &str) -> StateSubscription;
}

/// Does `path` match a pattern where `*` matches any run of characters?
#[must_use]
pub fn pattern_matches(pattern: &str, path: &str) -> bool {
    let mut parts = pattern.split('*');
    let Some(first) = parts.next() else {
        return path.is_empty();
    };
    let Some(mut rest) = path.strip_prefix(first) else {
        return false;
    };

    let parts: Vec<&str> = parts.collect();
    let Some((last, middle)) = parts.split_last() else {
        // No wildcard at all.
        return rest.is_empty();
    };

    for part in middle {
        match rest.find(part) {
            Some(index) => rest = &rest[index + part.len()..],
            None => return false,
        }
    }

    rest.len() >= last.len() && rest.ends_with(last)
}

/// Something went wrong receiving changes.
#[derive(Error, Debug)]
pub enum RecvError {
    /// The store was dropped.
    #[error("The store was closed")]
    Closed,
}

/// A subscription to state changes.
pub struct StateSubscription {
    pattern: String,
    rx: broadcast::Receiver<StateChange>,
}

impl StateSubscription {
    /// Create a subscription filtering `rx` by `pattern`.
    #[must_use]
    pub fn new(pattern: impl Into<String>, rx: broadcast::Receiver<StateChange>) -> Self {
        Self {
            pattern: pattern.into(),
            rx,
        }
    }

    /// The pattern of this subscription.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Wait for the next matching change.
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Closed` if the store is gone.
    pub async fn recv(&mut self) -> Result<StateChange, RecvError> {
        loop {
            match self.rx.recv().await {
                Ok(change) if pattern_matches(&self.pattern, &change.path) => return Ok(change),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Closed) => return Err(RecvError::Closed),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    error!("{}: missed {missed} state changes", self.pattern);
                }
            }
        }
    }

    /// Get the next matching change without waiting. Returns `None` if there is none.
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Closed` if the store is gone.
    pub fn try_recv(&mut self) -> Result<Option<StateChange>, RecvError> {
        loop {
            match self.rx.try_recv() {
                Ok(change) if pattern_matches(&self.pattern, &change.path) => {
                    return Ok(Some(change))
                }
                Ok(_) => {}
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Closed) => return Err(RecvError::Closed),
                Err(broadcast::error::TryRecvError::Lagged(missed)) => {
                    error!("{}: missed {missed} state changes", self.pattern);
                }
            }
        }
    }
}
