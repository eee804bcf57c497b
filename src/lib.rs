//! Mirror the locks known to a Nuki bridge into a hierarchical state tree.
#![warn(missing_docs)]
#![deny(clippy::pedantic)]
#![deny(clippy::nursery)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::use_self)]

pub mod adapter;
pub mod config;
pub mod logging;
pub mod serde;
pub mod services;
pub mod sinks;
pub mod sources;

use std::future::Future;
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// Spawn a task and automatically monitor its execution.
///
/// If the task panics the whole process is terminated.
pub fn spawn<T>(future: T) -> JoinHandle<()>
where
    T: Future + Send + 'static,
    T::Output: Send + 'static,
{
    let task = tokio::spawn(future);

    tokio::spawn(async move {
        let rc = task.await;

        match rc {
            Ok(_rc) => {
                debug!("The task terminated normally");
            }
            Err(err) if err.is_cancelled() => {
                debug!("The task was cancelled");
            }
            Err(err) => {
                error!("The task aborted with error: {err}");
                std::process::exit(1);
            }
        };
    })
}
