//! I/O task of one open link.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use parley_core::ConnectionError;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::{ChannelEvent, CloseInfo, LinkShared, Outgoing};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How long to wait for the peer to answer our close frame.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

pub(super) struct LinkTask {
    pub(super) stream: WsStream,
    pub(super) outbound: mpsc::Receiver<Outgoing>,
    pub(super) events: mpsc::UnboundedSender<ChannelEvent>,
    pub(super) shared: Arc<LinkShared>,
    pub(super) generation: u64,
    pub(super) cancel: CancellationToken,
    pub(super) keepalive: Option<Duration>,
    pub(super) url: String,
}

enum LinkEnd {
    Local,
    Remote(Option<CloseFrame>),
    Failed(String),
}

/// Multiplex queued writes, reads and keepalive pings until the link ends,
/// then report the outcome.
pub(super) async fn run(task: LinkTask) {
    let LinkTask {
        stream,
        mut outbound,
        events,
        shared,
        generation,
        cancel,
        keepalive,
        url,
    } = task;
    let (mut ws_tx, mut ws_rx) = stream.split();

    let mut ping = keepalive.map(|period| tokio::time::interval_at(Instant::now() + period, period));
    let mut close_deadline: Option<Instant> = None;

    let end = loop {
        tokio::select! {
            () = cancel.cancelled() => {
                let _ = ws_tx.send(Message::Close(None)).await;
                break LinkEnd::Local;
            }
            msg = outbound.recv(), if close_deadline.is_none() => match msg {
                Some(Outgoing::Text(text)) => {
                    trace!(len = text.len(), "frame out");
                    if let Err(e) = ws_tx.send(Message::Text(text.into())).await {
                        break LinkEnd::Failed(e.to_string());
                    }
                }
                Some(Outgoing::Close) | None => {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    close_deadline = Some(Instant::now() + CLOSE_GRACE);
                }
            },
            () = wait_until(close_deadline) => {
                debug!("close handshake timed out");
                break LinkEnd::Local;
            }
            () = tick(ping.as_mut()) => {
                if let Err(e) = ws_tx.send(Message::Ping(Vec::new().into())).await {
                    break LinkEnd::Failed(e.to_string());
                }
                trace!("sent ping");
            }
            frame = ws_rx.next() => match frame {
                Some(Ok(Message::Text(text))) => forward(&events, text.as_str()),
                Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                    Ok(text) => forward(&events, text),
                    Err(_) => warn!(len = bytes.len(), "dropping non-UTF-8 binary frame"),
                },
                Some(Ok(Message::Close(frame))) => {
                    break if close_deadline.is_some() { LinkEnd::Local } else { LinkEnd::Remote(frame) };
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {}
                Some(Err(e)) => {
                    break if close_deadline.is_some() { LinkEnd::Local } else { LinkEnd::Failed(e.to_string()) };
                }
                None => {
                    break if close_deadline.is_some() { LinkEnd::Local } else { LinkEnd::Remote(None) };
                }
            },
        }
    };

    shared.finish(generation);
    match end {
        LinkEnd::Local => {
            info!(url = %url, "link closed locally");
            let _ = events.send(ChannelEvent::Close(CloseInfo::local()));
        }
        LinkEnd::Remote(frame) => {
            let (code, reason) = frame.map_or((None, None), |f| {
                let reason = f.reason.as_str();
                (
                    Some(u16::from(f.code)),
                    (!reason.is_empty()).then(|| reason.to_string()),
                )
            });
            info!(url = %url, ?code, "link closed by peer");
            let _ = events.send(ChannelEvent::Close(CloseInfo::remote(code, reason)));
        }
        LinkEnd::Failed(message) => {
            warn!(url = %url, error = %message, "link failed");
            let _ = events.send(ChannelEvent::Error(ConnectionError::Transport {
                url,
                message: message.clone(),
            }));
            let _ = events.send(ChannelEvent::Close(CloseInfo::remote(None, Some(message))));
        }
    }
}

/// Parse a text frame and hand it to the dispatcher. Invalid JSON is dropped.
fn forward(events: &mpsc::UnboundedSender<ChannelEvent>, text: &str) {
    match serde_json::from_str::<Value>(text) {
        Ok(value) => {
            trace!(len = text.len(), "frame in");
            let _ = events.send(ChannelEvent::Message(value));
        }
        Err(e) => warn!(error = %e, len = text.len(), "dropping malformed frame"),
    }
}

async fn tick(interval: Option<&mut tokio::time::Interval>) {
    match interval {
        Some(interval) => {
            let _ = interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
