//! Run the adapter against an in-memory state tree.
//!
//! Every change to the tree is logged, which makes this useful for checking
//! the bridge configuration before handing it to the host platform.
#![warn(missing_docs)]
#![deny(clippy::pedantic)]
#![deny(clippy::nursery)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

use std::sync::Arc;

use anyhow::Result;
use nuki_bridge::{
    adapter::{Adapter, AdapterHandle},
    config, logging,
    services::state_store::MemoryStateStore,
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    color_backtrace::install();

    let env = config::Environment::load()?;
    let config = env.config()?;

    logging::init_tracing_subscriber(&config.logging)?;

    info!("Starting nuki-bridge");

    let store = Arc::new(MemoryStateStore::new());
    let handle = Adapter::new(config.bridge, config.adapter, store).start()?;

    wait_for_shutdown(&handle).await?;

    info!("Shutting down");
    handle.stop().await;

    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown(handle: &AdapterHandle) -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    let mut user1 = signal(SignalKind::user_defined1())?;

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => return Ok(result?),
            _ = terminate.recv() => return Ok(()),
            _ = user1.recv() => {
                info!("Got SIGUSR1, polling now");
                handle.poll_now();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown(_handle: &AdapterHandle) -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
