//! Hub endpoint and connection settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Where the hub lives.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HubSettings {
    /// Base URL of the registration endpoint.
    pub http_url: String,
    /// WebSocket URL; derived from `http_url` when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ws_url: Option<String>,
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            http_url: "http://localhost:3000".to_string(),
            ws_url: None,
        }
    }
}

impl HubSettings {
    /// Effective WebSocket URL.
    ///
    /// `http://` maps to `ws://` and `https://` to `wss://`; the host and path
    /// are kept.
    pub fn websocket_url(&self) -> String {
        if let Some(url) = self.ws_url.as_deref().filter(|u| !u.is_empty()) {
            return url.to_string();
        }
        derive_ws_url(&self.http_url)
    }
}

/// Map an http(s) base URL to the matching ws(s) URL.
pub fn derive_ws_url(http_url: &str) -> String {
    let trimmed = http_url.trim_end_matches('/');
    if let Some(rest) = trimmed.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = trimmed.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        trimmed.to_string()
    }
}

/// Timeouts and keepalive for both transports.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectionSettings {
    /// WebSocket handshake timeout in milliseconds.
    pub connect_timeout_ms: u64,
    /// Registration request timeout in milliseconds.
    pub request_timeout_ms: u64,
    /// Client Ping interval in milliseconds (`0` disables).
    pub keepalive_interval_ms: u64,
    /// Capacity of the outbound frame queue.
    pub outbound_queue: usize,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 10_000,
            request_timeout_ms: 10_000,
            keepalive_interval_ms: 30_000,
            outbound_queue: 256,
        }
    }
}

impl ConnectionSettings {
    /// Handshake timeout.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Registration timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Keepalive interval, `None` when disabled.
    pub fn keepalive_interval(&self) -> Option<Duration> {
        (self.keepalive_interval_ms > 0).then(|| Duration::from_millis(self.keepalive_interval_ms))
    }
}
