#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Router,
};
use nuki_bridge::sources::bridge;
use tokio::{net::TcpListener, task::JoinHandle};

pub const TOKEN: &str = "abc123";

pub const FRONT_DOOR: &str = r#"[{"id":"1","name":"Front Door","lastKnownState":{"state":1,"stateName":"locked","batteryCritical":false,"timestamp":"2024-01-01T00:00:00Z"}}]"#;

pub const TWO_LOCKS: &str = r#"[
    {"nukiId": 11, "name": "Front Door", "lastKnownState": {"state": 1, "stateName": "locked", "batteryCritical": false, "timestamp": "2024-01-01T00:00:00Z"}},
    {"nukiId": 22, "name": "Back Door", "lastKnownState": {"state": 3, "stateName": "unlocked", "batteryCritical": true, "timestamp": "2024-01-02T00:00:00Z"}}
]"#;

/// What the fake bridge answers to `/list`.
#[derive(Clone)]
pub struct Reply {
    pub status: StatusCode,
    pub body: String,
    pub delay: Duration,
}

impl Reply {
    pub fn ok(body: &str) -> Self {
        Self {
            status: StatusCode::OK,
            body: body.to_string(),
            delay: Duration::ZERO,
        }
    }

    pub fn status(status: StatusCode) -> Self {
        Self {
            status,
            body: String::new(),
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Clone)]
struct BridgeState {
    reply: Arc<Mutex<Reply>>,
    requests: Arc<AtomicUsize>,
}

async fn list(
    State(state): State<BridgeState>,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, String) {
    state.requests.fetch_add(1, Ordering::SeqCst);
    println!("bridge: GET /list {params:?}");

    if params.get("token").map(String::as_str) != Some(TOKEN) {
        return (StatusCode::UNAUTHORIZED, String::new());
    }

    let reply = state.reply.lock().unwrap().clone();
    tokio::time::sleep(reply.delay).await;
    (reply.status, reply.body)
}

/// A bridge listening on an ephemeral local port.
pub struct FakeBridge {
    addr: SocketAddr,
    state: BridgeState,
    handle: JoinHandle<()>,
}

impl FakeBridge {
    pub async fn start(reply: Reply) -> Self {
        let state = BridgeState {
            reply: Arc::new(Mutex::new(reply)),
            requests: Arc::new(AtomicUsize::new(0)),
        };

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        println!("bridge: Listening on: {addr}");

        let app = Router::new()
            .route("/list", get(list))
            .with_state(state.clone());
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            state,
            handle,
        }
    }

    pub fn config(&self) -> bridge::Config {
        let mut config = bridge::Config::new(self.addr.ip().to_string(), TOKEN);
        config.bridge_port = self.addr.port();
        config
    }

    pub fn set_reply(&self, reply: Reply) {
        *self.state.reply.lock().unwrap() = reply;
    }

    pub fn requests(&self) -> usize {
        self.state.requests.load(Ordering::SeqCst)
    }
}

impl Drop for FakeBridge {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
