mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use common::{FakeBridge, Reply, FRONT_DOOR, TWO_LOCKS};
use nuki_bridge::adapter::{self, Adapter, AdapterHandle, Phase};
use nuki_bridge::services::state_store::MemoryStateStore;
use nuki_common::state::StateValue;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

fn slow_polling() -> adapter::Config {
    adapter::Config {
        poll_interval: Duration::from_secs(3600),
    }
}

async fn wait_for_cycles(handle: &AdapterHandle, cycles: u64) {
    let mut status = handle.status();
    let finished = timeout(WAIT, status.wait_for(|status| status.cycles >= cycles))
        .await
        .is_ok();
    assert!(finished, "adapter did not finish {cycles} cycles");
}

async fn assert_state(store: &MemoryStateStore, path: &str, expected: StateValue) {
    let state = store
        .get_state(path)
        .await
        .unwrap_or_else(|| panic!("{path} not set"));
    assert_eq!(state.val, expected, "{path}");
    assert!(state.ack, "{path} not acknowledged");
}

#[test_log::test(tokio::test)]
async fn test_end_to_end() {
    let bridge = FakeBridge::start(Reply::ok(FRONT_DOOR)).await;
    let mut config = bridge.config();
    config.bridge_name = Some("192.168.1.10".to_string());

    let store = Arc::new(MemoryStateStore::new());
    let handle = Adapter::new(config, slow_polling(), store.clone())
        .start()
        .unwrap();
    wait_for_cycles(&handle, 1).await;

    assert_state(&store, "192_168_1_10.1.state", 1_i64.into()).await;
    assert_state(&store, "192_168_1_10.1.stateName", "locked".into()).await;
    assert_state(&store, "192_168_1_10.1.batteryCritical", false.into()).await;
    assert_state(
        &store,
        "192_168_1_10.1.timestamp",
        "2024-01-01T00:00:00Z".into(),
    )
    .await;
    assert_eq!(bridge.requests(), 1);

    handle.stop().await;
}

#[test_log::test(tokio::test)]
async fn test_namespace_defaults_to_ip() {
    let bridge = FakeBridge::start(Reply::ok(TWO_LOCKS)).await;

    let store = Arc::new(MemoryStateStore::new());
    let handle = Adapter::new(bridge.config(), slow_polling(), store.clone())
        .start()
        .unwrap();
    wait_for_cycles(&handle, 1).await;

    assert_state(&store, "127_0_0_1.11.stateName", "locked".into()).await;
    assert_state(&store, "127_0_0_1.22.stateName", "unlocked".into()).await;
    assert_state(&store, "127_0_0_1.22.batteryCritical", true.into()).await;

    handle.stop().await;
}

#[test_log::test(tokio::test)]
async fn test_polls_repeatedly() {
    let bridge = FakeBridge::start(Reply::ok(FRONT_DOOR)).await;
    let config = adapter::Config {
        poll_interval: Duration::from_millis(50),
    };

    let store = Arc::new(MemoryStateStore::new());
    let handle = Adapter::new(bridge.config(), config, store.clone())
        .start()
        .unwrap();

    wait_for_cycles(&handle, 1).await;
    let unlocked = FRONT_DOOR.replace(r#""stateName":"locked""#, r#""stateName":"unlocked""#);
    bridge.set_reply(Reply::ok(&unlocked));
    let cycles = handle.status().borrow().cycles;
    wait_for_cycles(&handle, cycles + 2).await;

    assert!(bridge.requests() >= 3);
    assert_state(&store, "127_0_0_1.1.stateName", "unlocked".into()).await;

    handle.stop().await;
}

#[test_log::test(tokio::test)]
async fn test_errors_write_nothing_and_keep_running() {
    let bridge = FakeBridge::start(Reply::ok("not json")).await;

    let store = Arc::new(MemoryStateStore::new());
    let handle = Adapter::new(bridge.config(), slow_polling(), store.clone())
        .start()
        .unwrap();
    wait_for_cycles(&handle, 1).await;
    assert!(store.object_paths().await.is_empty());

    bridge.set_reply(Reply::status(StatusCode::SERVICE_UNAVAILABLE));
    handle.poll_now();
    wait_for_cycles(&handle, 2).await;
    assert!(store.object_paths().await.is_empty());
    assert_ne!(handle.phase(), Phase::Stopped);

    bridge.set_reply(Reply::ok(FRONT_DOOR));
    handle.poll_now();
    wait_for_cycles(&handle, 3).await;
    assert_state(&store, "127_0_0_1.1.state", 1_i64.into()).await;

    handle.stop().await;
}

#[test_log::test(tokio::test)]
async fn test_vanished_lock_is_kept() {
    let bridge = FakeBridge::start(Reply::ok(TWO_LOCKS)).await;

    let store = Arc::new(MemoryStateStore::new());
    let handle = Adapter::new(bridge.config(), slow_polling(), store.clone())
        .start()
        .unwrap();
    wait_for_cycles(&handle, 1).await;

    bridge.set_reply(Reply::ok("[]"));
    handle.poll_now();
    wait_for_cycles(&handle, 2).await;

    assert_state(&store, "127_0_0_1.22.stateName", "unlocked".into()).await;

    handle.stop().await;
}

#[test_log::test(tokio::test)]
async fn test_stop_during_fetch() {
    let reply = Reply::ok(FRONT_DOOR).delayed(Duration::from_secs(3));
    let bridge = FakeBridge::start(reply).await;

    let store = Arc::new(MemoryStateStore::new());
    let handle = Adapter::new(bridge.config(), slow_polling(), store.clone())
        .start()
        .unwrap();

    let mut status = handle.status();
    let fetching = timeout(
        WAIT,
        status.wait_for(|status| status.phase == Phase::Fetching),
    )
    .await
    .is_ok();
    assert!(fetching);

    let stopped = timeout(Duration::from_secs(1), handle.stop()).await.is_ok();
    assert!(stopped, "stop waited for the request");
    assert_eq!(status.borrow().phase, Phase::Stopped);
    assert_eq!(status.borrow().cycles, 0);

    // Outlive the delayed reply, nothing may show up.
    tokio::time::sleep(Duration::from_secs(4)).await;
    assert!(store.object_paths().await.is_empty());
}
