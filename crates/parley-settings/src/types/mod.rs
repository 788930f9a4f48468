//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]` and implement
//! [`Default`] with production values. Partial JSON is accepted; missing
//! fields keep their default.

mod hub;
mod logging;

pub use hub::*;
pub use logging::*;

use parley_core::ReconnectPolicy;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type for the Parley client.
///
/// ```json
/// {
///   "hub": { "httpUrl": "https://chat.example.org" },
///   "connection": { "connectTimeoutMs": 5000 },
///   "reconnect": { "maxRetries": 3 }
/// }
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientSettings {
    /// Hub endpoints.
    pub hub: HubSettings,
    /// Timeouts and keepalive.
    pub connection: ConnectionSettings,
    /// Automatic reconnect behaviour (disabled by default).
    pub reconnect: ReconnectPolicy,
    /// Log output.
    pub logging: LoggingSettings,
}

impl ClientSettings {
    /// Check values that cannot be expressed in the type system.
    pub fn validate(&self) -> Result<()> {
        if !(self.hub.http_url.starts_with("http://") || self.hub.http_url.starts_with("https://"))
        {
            return Err(SettingsError::InvalidUrl {
                field: "hub.httpUrl",
                expected: "http(s)",
                url: self.hub.http_url.clone(),
            });
        }
        let ws = self.hub.websocket_url();
        if !(ws.starts_with("ws://") || ws.starts_with("wss://")) {
            return Err(SettingsError::InvalidUrl {
                field: "hub.wsUrl",
                expected: "ws(s)",
                url: ws,
            });
        }
        if self.connection.connect_timeout_ms == 0 || self.connection.request_timeout_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "connection timeouts must be positive".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.reconnect.jitter_factor) {
            return Err(SettingsError::InvalidValue(format!(
                "reconnect.jitterFactor must be within 0..=1, got {}",
                self.reconnect.jitter_factor
            )));
        }
        Ok(())
    }
}
