//! In-process chat hub for end-to-end tests.
//!
//! Serves `POST /new-user` (unique names) and a WebSocket at `/`. Every
//! connection gets the roster on join; `send` frames are relayed to all
//! connections and `exit` frames remove the user and rebroadcast the roster.

#![allow(dead_code)]

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use uuid::Uuid;

use parley_client::{ChannelConfig, ConnectionChannel, IdentityClient, RecordingSink, SessionController};

pub const TIMEOUT: Duration = Duration::from_secs(5);

/// Roster wire shape the hub broadcasts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RosterStyle {
    Tagged,
    Legacy,
}

struct HubState {
    style: RosterStyle,
    users: Mutex<Vec<Value>>,
    connections: Mutex<HashMap<String, mpsc::UnboundedSender<Message>>>,
    received: Mutex<Vec<Value>>,
}

impl HubState {
    fn roster_frame(&self) -> String {
        let users = Value::Array(self.users.lock().clone());
        match self.style {
            RosterStyle::Tagged => json!({"type": "users", "users": users}).to_string(),
            RosterStyle::Legacy => users.to_string(),
        }
    }

    fn broadcast(&self, text: &str) {
        for tx in self.connections.lock().values() {
            let _ = tx.send(Message::Text(text.to_string().into()));
        }
    }
}

/// A running hub.
#[derive(Clone)]
pub struct Hub {
    pub http_url: String,
    pub ws_url: String,
    state: Arc<HubState>,
}

impl Hub {
    pub async fn start() -> Self {
        Self::start_with(RosterStyle::Tagged).await
    }

    pub async fn start_with(style: RosterStyle) -> Self {
        let state = Arc::new(HubState {
            style,
            users: Mutex::new(Vec::new()),
            connections: Mutex::new(HashMap::new()),
            received: Mutex::new(Vec::new()),
        });
        let app = Router::new()
            .route("/new-user", post(new_user))
            .route("/", get(ws_handler))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _server = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Self {
            http_url: format!("http://{addr}"),
            ws_url: format!("ws://{addr}"),
            state,
        }
    }

    /// Send raw text to every connection.
    pub fn push_raw(&self, text: &str) {
        self.state.broadcast(text);
    }

    /// Send a binary frame to every connection.
    pub fn push_binary(&self, bytes: Vec<u8>) {
        for tx in self.state.connections.lock().values() {
            let _ = tx.send(Message::Binary(bytes.clone().into()));
        }
    }

    /// Close every connection from the hub side.
    pub fn kick_all(&self) {
        for tx in self.state.connections.lock().values() {
            let _ = tx.send(Message::Close(None));
        }
    }

    /// Frames received from clients, in arrival order.
    pub fn received(&self) -> Vec<Value> {
        self.state.received.lock().clone()
    }

    /// Received frames with `type == kind`.
    pub fn received_of(&self, kind: &str) -> Vec<Value> {
        self.received()
            .into_iter()
            .filter(|f| f["type"] == kind)
            .collect()
    }

    pub fn connection_count(&self) -> usize {
        self.state.connections.lock().len()
    }

    pub fn channel(&self) -> ConnectionChannel {
        ConnectionChannel::new(ChannelConfig::new(self.ws_url.clone()))
    }

    pub fn controller(&self) -> (SessionController, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::new());
        let ctl = SessionController::new(
            IdentityClient::new(self.http_url.clone(), TIMEOUT),
            self.channel(),
            sink.clone(),
        );
        (ctl, sink)
    }
}

async fn new_user(State(state): State<Arc<HubState>>, Json(body): Json<Value>) -> impl IntoResponse {
    let name = body["name"].as_str().unwrap_or_default().to_string();
    let mut users = state.users.lock();
    if name.trim().is_empty() || users.iter().any(|u| u["name"] == name.as_str()) {
        return (
            axum::http::StatusCode::BAD_REQUEST,
            Json(json!({"status": "error", "message": "taken"})),
        );
    }
    let user = json!({"id": Uuid::now_v7().to_string(), "name": name});
    users.push(user.clone());
    (
        axum::http::StatusCode::OK,
        Json(json!({"status": "ok", "user": user})),
    )
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<HubState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<HubState>) {
    let conn_id = format!("conn_{}", Uuid::now_v7());
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let _ = state.connections.lock().insert(conn_id.clone(), tx);
    state.broadcast(&state.roster_frame());

    let (mut ws_tx, mut ws_rx) = socket.split();
    loop {
        tokio::select! {
            out = rx.recv() => {
                let Some(msg) = out else { break };
                let closing = matches!(msg, Message::Close(_));
                if ws_tx.send(msg).await.is_err() || closing {
                    break;
                }
            }
            inbound = ws_rx.next() => {
                let Some(Ok(msg)) = inbound else { break };
                let text = match msg {
                    Message::Text(text) => text,
                    Message::Close(_) => break,
                    _ => continue,
                };
                let Ok(frame) = serde_json::from_str::<Value>(text.as_str()) else { continue };
                state.received.lock().push(frame.clone());
                match frame["type"].as_str() {
                    Some("send") => state.broadcast(text.as_str()),
                    Some("exit") => {
                        let id = frame["user"]["id"].clone();
                        state.users.lock().retain(|u| u["id"] != id);
                        state.broadcast(&state.roster_frame());
                    }
                    _ => {}
                }
            }
        }
    }

    let _ = state.connections.lock().remove(&conn_id);
}

/// Poll `check` until it holds or [`TIMEOUT`] passes.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + TIMEOUT;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

/// Await `fut` with [`TIMEOUT`], panicking on expiry.
pub async fn within<T>(fut: impl Future<Output = T>) -> T {
    tokio::time::timeout(TIMEOUT, fut).await.expect("timed out")
}
