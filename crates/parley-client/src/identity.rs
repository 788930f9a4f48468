//! Name registration against the hub's HTTP endpoint.
//!
//! The hub answers `POST {base}/new-user` with a `status`-tagged body. The
//! HTTP status code is not inspected: hubs reply with an error body on 4xx,
//! and only the body shape decides the outcome.

use std::time::Duration;

use async_trait::async_trait;
use parley_core::{Identity, RegistrationError, RegistrationRequest, RegistrationResponse};
use parley_settings::ClientSettings;
use tracing::{debug, info, instrument, warn};

/// Path of the registration endpoint, relative to the hub base URL.
pub const REGISTRATION_PATH: &str = "/new-user";

/// Anything that can turn a display name into an [`Identity`].
///
/// Callers validate that the name is non-empty after trimming before calling.
/// One outstanding call at a time is expected.
#[async_trait]
pub trait Registrar: Send + Sync {
    /// Claim `display_name`.
    async fn register(&self, display_name: &str) -> Result<Identity, RegistrationError>;
}

/// HTTP registrar backed by `reqwest`.
#[derive(Clone, Debug)]
pub struct IdentityClient {
    base_url: String,
    http: reqwest::Client,
}

impl IdentityClient {
    /// Create a client for the hub at `base_url` with a per-request timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "failed to build configured HTTP client, using defaults");
                reqwest::Client::new()
            });
        Self::with_client(base_url, http)
    }

    /// Create a client reusing an existing `reqwest::Client`.
    pub fn with_client(base_url: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into(),
            http,
        }
    }

    /// Build from loaded settings.
    pub fn from_settings(settings: &ClientSettings) -> Self {
        Self::new(
            settings.hub.http_url.clone(),
            settings.connection.request_timeout(),
        )
    }

    /// Full registration URL.
    pub fn endpoint(&self) -> String {
        format!(
            "{}{REGISTRATION_PATH}",
            self.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl Registrar for IdentityClient {
    #[instrument(skip(self), fields(endpoint = %self.endpoint()))]
    async fn register(&self, display_name: &str) -> Result<Identity, RegistrationError> {
        let response = self
            .http
            .post(self.endpoint())
            .json(&RegistrationRequest { name: display_name })
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "registration request failed");
                RegistrationError::connectivity_from("registration request failed", e)
            })?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| {
            warn!(error = %e, %status, "failed to read registration response");
            RegistrationError::connectivity_from("failed to read registration response", e)
        })?;

        let parsed: RegistrationResponse = serde_json::from_slice(&body).map_err(|e| {
            warn!(error = %e, %status, len = body.len(), "unexpected registration response");
            RegistrationError::connectivity_from("unexpected registration response", e)
        })?;

        match parsed {
            RegistrationResponse::Ok { user } => {
                info!(user_id = %user.id, name = %user.display_name, "registered");
                Ok(user)
            }
            RegistrationResponse::Error { message } => {
                let err = RegistrationError::rejected(message);
                debug!(%status, error = %err, "registration rejected");
                Err(err)
            }
        }
    }
}
