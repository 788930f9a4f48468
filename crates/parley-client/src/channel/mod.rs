//! Persistent WebSocket link to the hub.
//!
//! [`ConnectionChannel`] owns at most one live link. While a link is open, an
//! I/O task multiplexes reads, queued writes and keepalive pings. Every
//! transport event becomes a [`ChannelEvent`] on an unbounded queue drained
//! by a dispatcher task, which invokes the registered handlers in order. No
//! handler ever runs inside the network read.
//!
//! ```text
//! send() ──► outbound mpsc ──► link task ──► socket
//!                                 │
//!            socket ─────────────►│──► events mpsc ──► dispatcher ──► handlers
//! ```

mod link;
mod subscriptions;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use parley_core::{ClientError, ConnectionError, FrameError, InvalidStateOperation, OutboundFrame};
use parley_settings::ClientSettings;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub use subscriptions::{EventKind, Subscription};
use subscriptions::Subscriptions;

/// Default capacity of the per-link outbound queue.
pub const DEFAULT_OUTBOUND_QUEUE: usize = 256;

/// How the link ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CloseInfo {
    /// `true` when `disconnect()` (or dropping the channel) ended the link.
    pub initiated_locally: bool,
    /// Close code from the peer's close frame, if any.
    pub code: Option<u16>,
    /// Close reason from the peer's close frame, if any.
    pub reason: Option<String>,
}

impl CloseInfo {
    /// A close requested on this side.
    pub fn local() -> Self {
        Self {
            initiated_locally: true,
            code: None,
            reason: None,
        }
    }

    /// A close observed from the peer.
    pub fn remote(code: Option<u16>, reason: Option<String>) -> Self {
        Self {
            initiated_locally: false,
            code,
            reason,
        }
    }
}

/// A transport event, in the order the link observed it.
#[derive(Clone, Debug, PartialEq)]
pub enum ChannelEvent {
    /// Handshake completed.
    Open,
    /// A well-formed JSON frame.
    Message(Value),
    /// The link is gone.
    Close(CloseInfo),
    /// The transport failed. A `Close` follows for an established link.
    Error(ConnectionError),
}

/// Link parameters.
#[derive(Clone, Debug)]
pub struct ChannelConfig {
    /// `ws://` or `wss://` endpoint.
    pub url: String,
    /// Handshake deadline.
    pub connect_timeout: Duration,
    /// Client ping interval (`None` disables).
    pub keepalive_interval: Option<Duration>,
    /// Outbound queue capacity.
    pub outbound_queue: usize,
}

impl ChannelConfig {
    /// Config for `url` with default timeouts.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connect_timeout: Duration::from_secs(10),
            keepalive_interval: Some(Duration::from_secs(30)),
            outbound_queue: DEFAULT_OUTBOUND_QUEUE,
        }
    }

    /// Config derived from loaded settings.
    pub fn from_settings(settings: &ClientSettings) -> Self {
        Self {
            url: settings.hub.websocket_url(),
            connect_timeout: settings.connection.connect_timeout(),
            keepalive_interval: settings.connection.keepalive_interval(),
            outbound_queue: settings.connection.outbound_queue.max(1),
        }
    }

    fn validate(&self) -> Result<(), ConnectionError> {
        if self.url.starts_with("ws://") || self.url.starts_with("wss://") {
            Ok(())
        } else {
            Err(ConnectionError::InvalidUrl {
                url: self.url.clone(),
                reason: "expected ws:// or wss://".into(),
            })
        }
    }
}

/// Frames queued for the link task.
#[derive(Debug)]
pub(crate) enum Outgoing {
    Text(String),
    Close,
}

enum LinkPhase {
    Idle,
    Connecting,
    Open {
        outbound: mpsc::Sender<Outgoing>,
        cancel: CancellationToken,
    },
    Closing {
        cancel: CancellationToken,
    },
}

/// State shared with the link task.
pub(crate) struct LinkShared {
    phase: Mutex<LinkPhase>,
    open: AtomicBool,
    generation: AtomicU64,
}

impl LinkShared {
    /// Mark the link of `generation` as finished. A newer link is left alone.
    pub(crate) fn finish(&self, generation: u64) {
        let mut phase = self.phase.lock();
        if self.generation.load(Ordering::SeqCst) == generation {
            *phase = LinkPhase::Idle;
            self.open.store(false, Ordering::SeqCst);
        }
    }
}

/// Resets a connect attempt abandoned before the handshake finished.
///
/// Dropping the `connect()` future (for example under an outer timeout)
/// would otherwise leave the phase at `Connecting` and refuse every retry.
struct PendingConnect<'a> {
    shared: &'a LinkShared,
    generation: u64,
    settled: bool,
}

impl Drop for PendingConnect<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let mut phase = self.shared.phase.lock();
        if matches!(*phase, LinkPhase::Connecting)
            && self.shared.generation.load(Ordering::SeqCst) == self.generation
        {
            *phase = LinkPhase::Idle;
            debug!(generation = self.generation, "abandoned connect attempt reset");
        }
    }
}

/// Client side of the hub's persistent connection.
pub struct ConnectionChannel {
    config: ChannelConfig,
    subscriptions: Arc<Subscriptions>,
    shared: Arc<LinkShared>,
    events: mpsc::UnboundedSender<ChannelEvent>,
    pending_events: Mutex<Option<mpsc::UnboundedReceiver<ChannelEvent>>>,
}

impl ConnectionChannel {
    /// Create an idle channel. Nothing is spawned until [`connect`](Self::connect).
    pub fn new(config: ChannelConfig) -> Self {
        let (events, rx) = mpsc::unbounded_channel();
        Self {
            config,
            subscriptions: Arc::new(Subscriptions::default()),
            shared: Arc::new(LinkShared {
                phase: Mutex::new(LinkPhase::Idle),
                open: AtomicBool::new(false),
                generation: AtomicU64::new(0),
            }),
            events,
            pending_events: Mutex::new(Some(rx)),
        }
    }

    /// Endpoint URL.
    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// Open the link.
    ///
    /// Resolves once the handshake completes. `on_open` handlers run after
    /// this returns, on the dispatcher task. Failures before the handshake are
    /// returned and also reported to `on_error` handlers.
    pub async fn connect(&self) -> Result<(), ConnectionError> {
        let generation = {
            let mut phase = self.shared.phase.lock();
            if !matches!(*phase, LinkPhase::Idle) {
                return Err(ConnectionError::AlreadyActive);
            }
            *phase = LinkPhase::Connecting;
            self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1
        };
        let mut pending = PendingConnect {
            shared: &self.shared,
            generation,
            settled: false,
        };
        self.ensure_dispatcher();

        if let Err(err) = self.config.validate() {
            return Err(self.fail_connect(err));
        }

        let url = self.config.url.as_str();
        info!(url, "connecting");
        let handshake =
            tokio::time::timeout(self.config.connect_timeout, tokio_tungstenite::connect_async(url))
                .await;
        let stream = match handshake {
            Ok(Ok((stream, _response))) => stream,
            Ok(Err(e)) => {
                return Err(self.fail_connect(ConnectionError::Transport {
                    url: url.to_string(),
                    message: e.to_string(),
                }));
            }
            Err(_) => {
                return Err(self.fail_connect(ConnectionError::Timeout {
                    url: url.to_string(),
                    timeout_ms: u64::try_from(self.config.connect_timeout.as_millis())
                        .unwrap_or(u64::MAX),
                }));
            }
        };

        let (outbound_tx, outbound_rx) = mpsc::channel(self.config.outbound_queue.max(1));
        let cancel = CancellationToken::new();
        {
            let mut phase = self.shared.phase.lock();
            *phase = LinkPhase::Open {
                outbound: outbound_tx,
                cancel: cancel.clone(),
            };
            self.shared.open.store(true, Ordering::SeqCst);
        }
        pending.settled = true;
        info!(url, "connected");
        let _ = self.events.send(ChannelEvent::Open);

        let _link = tokio::spawn(link::run(link::LinkTask {
            stream,
            outbound: outbound_rx,
            events: self.events.clone(),
            shared: Arc::clone(&self.shared),
            generation,
            cancel,
            keepalive: self.config.keepalive_interval,
            url: url.to_string(),
        }));
        Ok(())
    }

    fn fail_connect(&self, err: ConnectionError) -> ConnectionError {
        *self.shared.phase.lock() = LinkPhase::Idle;
        warn!(error = %err, "connect failed");
        let _ = self.events.send(ChannelEvent::Error(err.clone()));
        err
    }

    fn ensure_dispatcher(&self) {
        let Some(mut rx) = self.pending_events.lock().take() else {
            return;
        };
        let subscriptions = Arc::clone(&self.subscriptions);
        let _dispatcher = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                subscriptions.dispatch(&event);
            }
            debug!("channel dispatcher stopped");
        });
    }

    /// Queue `frame` on the open link.
    ///
    /// When no link is open the frame is discarded, a warning is logged and
    /// [`InvalidStateOperation::ChannelNotOpen`] is returned.
    pub fn send(&self, frame: &OutboundFrame) -> Result<(), ClientError> {
        let phase = self.shared.phase.lock();
        let LinkPhase::Open { outbound, .. } = &*phase else {
            warn!(kind = frame.kind(), "not connected, frame discarded");
            return Err(InvalidStateOperation::ChannelNotOpen.into());
        };

        let text = frame.to_json().map_err(|e| FrameError::Malformed {
            kind: frame.kind(),
            message: e.to_string(),
        })?;

        match outbound.try_send(Outgoing::Text(text)) {
            Ok(()) => {
                debug!(kind = frame.kind(), "frame queued");
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(kind = frame.kind(), "send queue full, dropping frame");
                Err(ConnectionError::Transport {
                    url: self.config.url.clone(),
                    message: "send queue full".into(),
                }
                .into())
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!(kind = frame.kind(), "link closed, frame discarded");
                Err(InvalidStateOperation::ChannelNotOpen.into())
            }
        }
    }

    /// Close the link after any frames already queued. Idempotent.
    pub fn disconnect(&self) {
        let mut phase = self.shared.phase.lock();
        match std::mem::replace(&mut *phase, LinkPhase::Idle) {
            LinkPhase::Open { outbound, cancel } => {
                self.shared.open.store(false, Ordering::SeqCst);
                if outbound.try_send(Outgoing::Close).is_err() {
                    cancel.cancel();
                }
                info!(url = %self.config.url, "disconnecting");
                *phase = LinkPhase::Closing { cancel };
            }
            LinkPhase::Connecting => {
                debug!("disconnect while connecting ignored");
                *phase = LinkPhase::Connecting;
            }
            other @ (LinkPhase::Idle | LinkPhase::Closing { .. }) => {
                *phase = other;
            }
        }
    }

    /// Whether a link is open and not being closed.
    pub fn is_open(&self) -> bool {
        self.shared.open.load(Ordering::SeqCst)
    }

    /// Register a handler for the open event.
    pub fn on_open(&self, handler: impl Fn() + Send + Sync + 'static) -> Subscription {
        self.subscriptions.on_open(handler)
    }

    /// Register a handler for parsed inbound frames.
    pub fn on_message(&self, handler: impl Fn(&Value) + Send + Sync + 'static) -> Subscription {
        self.subscriptions.on_message(handler)
    }

    /// Register a handler for link closure.
    pub fn on_close(&self, handler: impl Fn(&CloseInfo) + Send + Sync + 'static) -> Subscription {
        self.subscriptions.on_close(handler)
    }

    /// Register a handler for transport errors.
    pub fn on_error(
        &self,
        handler: impl Fn(&ConnectionError) + Send + Sync + 'static,
    ) -> Subscription {
        self.subscriptions.on_error(handler)
    }

    /// Release a handler. Returns `false` if it was already released.
    pub fn unsubscribe(&self, subscription: Subscription) -> bool {
        self.subscriptions.unsubscribe(subscription)
    }

    /// Number of live handlers of `kind`.
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.subscriptions.count(kind)
    }
}

impl Drop for ConnectionChannel {
    fn drop(&mut self) {
        match &*self.shared.phase.lock() {
            LinkPhase::Open { cancel, .. } | LinkPhase::Closing { cancel } => cancel.cancel(),
            LinkPhase::Idle | LinkPhase::Connecting => {}
        }
    }
}

impl std::fmt::Debug for ConnectionChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionChannel")
            .field("url", &self.config.url)
            .field("open", &self.is_open())
            .finish_non_exhaustive()
    }
}
