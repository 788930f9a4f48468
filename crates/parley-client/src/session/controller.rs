//! The session controller.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use parley_core::{
    ChatMessage, ClientError, ConnectionError, ErrorSeverity, FrameError, Identity, InboundFrame,
    InvalidStateOperation, OutboundFrame, ReconnectPolicy, RegistrationError, RosterEntry,
    SessionState,
};
use parley_settings::ClientSettings;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::SessionEvent;
use crate::channel::{ChannelConfig, ChannelEvent, ConnectionChannel, Subscription};
use crate::identity::{IdentityClient, Registrar};
use crate::render::{Notice, RenderingSink, RosterView};

/// Shown when registration fails for any reason other than a hub rejection.
pub const CONNECTIVITY_HINT: &str = "Connection error. Please try again.";

/// Drives one chat session from registration to exit.
pub struct SessionController {
    registrar: Box<dyn Registrar>,
    channel: ConnectionChannel,
    sink: Arc<dyn RenderingSink>,
    state: SessionState,
    identity: Option<Identity>,
    roster: Vec<RosterEntry>,
    inbox: mpsc::UnboundedReceiver<ChannelEvent>,
    subscriptions: Vec<Subscription>,
}

impl SessionController {
    /// Create a controller in [`SessionState::Unauthenticated`].
    pub fn new(
        registrar: impl Registrar + 'static,
        channel: ConnectionChannel,
        sink: Arc<dyn RenderingSink>,
    ) -> Self {
        let (tx, inbox) = mpsc::unbounded_channel();
        let subscriptions = forward_events(&channel, &tx);
        Self {
            registrar: Box::new(registrar),
            channel,
            sink,
            state: SessionState::Unauthenticated,
            identity: None,
            roster: Vec::new(),
            inbox,
            subscriptions,
        }
    }

    /// Controller wired to the hub described by `settings`.
    pub fn from_settings(settings: &ClientSettings, sink: Arc<dyn RenderingSink>) -> Self {
        Self::new(
            IdentityClient::from_settings(settings),
            ConnectionChannel::new(ChannelConfig::from_settings(settings)),
            sink,
        )
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Registered identity, once registration succeeded.
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Last roster received from the hub.
    pub fn roster(&self) -> &[RosterEntry] {
        &self.roster
    }

    /// The underlying channel.
    pub fn channel(&self) -> &ConnectionChannel {
        &self.channel
    }

    /// Claim `display_name`.
    ///
    /// Only valid while unauthenticated. On failure the reason is shown via
    /// the sink and the session stays unauthenticated.
    pub async fn register(&mut self, display_name: &str) -> Result<Identity, ClientError> {
        self.require(SessionState::Unauthenticated, "register")?;
        let mut op = InFlight::new(self, SessionState::Unauthenticated);
        op.run_registration(display_name).await
    }

    /// Open the connection and wait for the open event.
    ///
    /// Only valid while authenticated and disconnected. Returns with the
    /// session either connected or back to authenticated-disconnected, also
    /// when the returned future is dropped before it completes.
    pub async fn connect(&mut self) -> Result<(), ClientError> {
        self.require(SessionState::AuthenticatedDisconnected, "connect")?;
        let mut op = InFlight::new(self, SessionState::AuthenticatedDisconnected);
        op.run_connect().await
    }

    async fn run_registration(&mut self, display_name: &str) -> Result<Identity, ClientError> {
        self.transition(SessionState::Registering);

        match self.registrar.register(display_name).await {
            Ok(identity) => {
                info!(user_id = %identity.id, name = %identity.display_name, "identity acquired");
                self.identity = Some(identity.clone());
                self.transition(SessionState::AuthenticatedDisconnected);
                Ok(identity)
            }
            Err(err) => {
                self.transition(SessionState::Unauthenticated);
                let shown = match &err {
                    RegistrationError::Rejected { message } => message.as_str(),
                    RegistrationError::Connectivity { .. } => CONNECTIVITY_HINT,
                };
                warn!(error = %err, "registration failed");
                self.sink.show_registration_error(shown);
                Err(err.into())
            }
        }
    }

    async fn run_connect(&mut self) -> Result<(), ClientError> {
        let _ = self.process_pending();
        self.transition(SessionState::Connecting);

        if let Err(err) = self.channel.connect().await {
            if !matches!(err, ConnectionError::AlreadyActive) {
                // the failure is also reported to on_error; consume it here
                self.skip_until(|event| matches!(event, ChannelEvent::Error(_)))
                    .await;
            }
            self.transition(SessionState::AuthenticatedDisconnected);
            return Err(err.into());
        }

        loop {
            match self.inbox.recv().await {
                Some(ChannelEvent::Open) => {
                    self.transition(SessionState::Connected);
                    info!(url = %self.channel.url(), "session connected");
                    return Ok(());
                }
                Some(ChannelEvent::Error(err)) => {
                    self.transition(SessionState::AuthenticatedDisconnected);
                    return Err(err.into());
                }
                Some(ChannelEvent::Close(info)) => {
                    self.transition(SessionState::AuthenticatedDisconnected);
                    return Err(ConnectionError::Transport {
                        url: self.channel.url().to_string(),
                        message: info
                            .reason
                            .unwrap_or_else(|| "closed before open".to_string()),
                    }
                    .into());
                }
                Some(ChannelEvent::Message(_)) => debug!("frame before open ignored"),
                None => {
                    self.transition(SessionState::AuthenticatedDisconnected);
                    return Err(InvalidStateOperation::ChannelNotOpen.into());
                }
            }
        }
    }

    /// Connect, retrying transient failures per `policy`.
    ///
    /// With the default policy this is a single [`connect`](Self::connect).
    pub async fn reconnect(&mut self, policy: &ReconnectPolicy) -> Result<(), ClientError> {
        let mut attempt = 0;
        loop {
            match self.connect().await {
                Ok(()) => return Ok(()),
                Err(ClientError::Connection(err))
                    if attempt < policy.max_retries && err.severity() == ErrorSeverity::Transient =>
                {
                    let delay = policy.delay_for(attempt, rand::random::<f64>());
                    attempt += 1;
                    warn!(
                        attempt,
                        max_retries = policy.max_retries,
                        ?delay,
                        error = %err,
                        "connect failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Send a chat message.
    ///
    /// Bodies that are empty after trimming are ignored. Outside the connected
    /// state nothing is transmitted, a notice is shown and an error returned.
    pub fn send_message(&self, body: &str) -> Result<(), ClientError> {
        if body.trim().is_empty() {
            debug!("empty message ignored");
            return Ok(());
        }
        let identity = match (&self.identity, self.state.accepts_commands()) {
            (Some(identity), true) => identity,
            _ => {
                warn!(state = %self.state, "send refused");
                self.sink.show_notice(&Notice::NotConnected);
                return Err(InvalidStateOperation::WrongState {
                    operation: "send_message",
                    state: self.state,
                }
                .into());
            }
        };

        self.channel
            .send(&OutboundFrame::send_message(identity, body))
            .inspect_err(|_| self.sink.show_notice(&Notice::NotConnected))
    }

    /// Announce departure and close the connection.
    ///
    /// Only valid while connected. The exit frame is fire-and-forget.
    pub fn exit(&mut self) -> Result<(), ClientError> {
        self.require(SessionState::Connected, "exit")?;
        self.shut_down(true);
        Ok(())
    }

    /// Best-effort shutdown from any state; always ends terminated.
    pub fn teardown(&mut self) {
        match self.state {
            SessionState::Terminated => {}
            SessionState::Connected => self.shut_down(true),
            _ => self.shut_down(false),
        }
    }

    /// Wait for the next channel event and apply it.
    ///
    /// Returns `None` once the session is terminated.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        if self.state.is_terminal() {
            return None;
        }
        let event = self.inbox.recv().await?;
        Some(self.apply(event))
    }

    /// Apply every event already delivered, without waiting.
    pub fn process_pending(&mut self) -> Vec<SessionEvent> {
        let mut applied = Vec::new();
        while let Ok(event) = self.inbox.try_recv() {
            applied.push(self.apply(event));
        }
        applied
    }

    // ── internals ───────────────────────────────────────────────────

    fn require(
        &self,
        expected: SessionState,
        operation: &'static str,
    ) -> Result<(), InvalidStateOperation> {
        if self.state == expected {
            Ok(())
        } else {
            warn!(operation, state = %self.state, "operation refused");
            Err(InvalidStateOperation::WrongState {
                operation,
                state: self.state,
            })
        }
    }

    fn transition(&mut self, to: SessionState) {
        let from = self.state;
        if from == to {
            return;
        }
        if !from.can_transition_to(to) {
            warn!(%from, %to, "unexpected state transition");
        }
        debug!(%from, %to, "state transition");
        self.state = to;
    }

    fn shut_down(&mut self, announce: bool) {
        self.transition(SessionState::Exiting);
        if announce {
            if let Some(identity) = &self.identity {
                if let Err(err) = self.channel.send(&OutboundFrame::exit(identity)) {
                    warn!(error = %err, "exit frame not sent");
                }
            }
        }
        self.channel.disconnect();
        for sub in self.subscriptions.drain(..) {
            let _ = self.channel.unsubscribe(sub);
        }
        self.identity = None;
        self.roster.clear();
        self.transition(SessionState::Terminated);
        info!("session terminated");
    }

    async fn skip_until(&mut self, done: impl Fn(&ChannelEvent) -> bool) {
        while let Some(event) = self.inbox.recv().await {
            if done(&event) {
                break;
            }
            let _ = self.apply(event);
        }
    }

    fn apply(&mut self, event: ChannelEvent) -> SessionEvent {
        match event {
            ChannelEvent::Open => {
                if self.state == SessionState::Connecting {
                    self.transition(SessionState::Connected);
                    SessionEvent::Connected
                } else {
                    debug!(state = %self.state, "open event ignored");
                    SessionEvent::Ignored
                }
            }
            ChannelEvent::Message(value) => self.apply_frame(&value),
            ChannelEvent::Close(info) => match self.state {
                SessionState::Connected | SessionState::Connecting => {
                    self.transition(SessionState::AuthenticatedDisconnected);
                    info!(
                        locally = info.initiated_locally,
                        code = ?info.code,
                        "disconnected from chat"
                    );
                    if !info.initiated_locally {
                        self.sink.show_notice(&Notice::ConnectionClosed);
                    }
                    SessionEvent::Disconnected(info)
                }
                _ => {
                    debug!(state = %self.state, "close event ignored");
                    SessionEvent::Ignored
                }
            },
            ChannelEvent::Error(err) => match self.state {
                SessionState::Connected | SessionState::Connecting => {
                    if self.state == SessionState::Connecting {
                        self.transition(SessionState::AuthenticatedDisconnected);
                    }
                    self.sink
                        .show_notice(&Notice::TransportError(err.to_string()));
                    SessionEvent::TransportError(err)
                }
                _ => {
                    debug!(state = %self.state, error = %err, "error event ignored");
                    SessionEvent::Ignored
                }
            },
        }
    }

    fn apply_frame(&mut self, value: &Value) -> SessionEvent {
        if self.state != SessionState::Connected {
            debug!(state = %self.state, "frame outside connected state ignored");
            return SessionEvent::Ignored;
        }

        match InboundFrame::decode(value) {
            Ok(InboundFrame::Roster { entries, shape }) => {
                debug!(count = entries.len(), ?shape, "roster update");
                self.roster = entries;
                let views = RosterView::from_entries(&self.roster, self.identity.as_ref());
                self.sink.render_roster(&views);
                SessionEvent::RosterUpdated {
                    entries: self.roster.len(),
                    shape,
                }
            }
            Ok(InboundFrame::Chat { body, sender }) => {
                let message = ChatMessage::observed_now(sender, body);
                let is_own = self
                    .identity
                    .as_ref()
                    .is_some_and(|me| me.owns(&message.sender_id));
                debug!(sender = %message.sender_id, is_own, "message received");
                self.sink.render_message(&message, is_own);
                SessionEvent::MessageReceived { message, is_own }
            }
            Err(err) => {
                match &err {
                    FrameError::Unrecognized { .. } => debug!(error = %err, "ignoring frame"),
                    FrameError::Malformed { .. } => warn!(error = %err, "dropping frame"),
                }
                SessionEvent::FrameDropped(err)
            }
        }
    }
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("state", &self.state)
            .field("identity", &self.identity)
            .field("roster", &self.roster.len())
            .field("channel", &self.channel)
            .finish_non_exhaustive()
    }
}

/// Settles the controller if an awaited operation is dropped midway.
///
/// A completed operation always leaves a settled state, so the guard only
/// acts when the future was abandoned in `Registering` or `Connecting`.
struct InFlight<'a> {
    ctl: &'a mut SessionController,
    fallback: SessionState,
}

impl<'a> InFlight<'a> {
    fn new(ctl: &'a mut SessionController, fallback: SessionState) -> Self {
        Self { ctl, fallback }
    }
}

impl Deref for InFlight<'_> {
    type Target = SessionController;

    fn deref(&self) -> &SessionController {
        self.ctl
    }
}

impl DerefMut for InFlight<'_> {
    fn deref_mut(&mut self) -> &mut SessionController {
        self.ctl
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let ctl = &mut *self.ctl;
        if !matches!(
            ctl.state,
            SessionState::Registering | SessionState::Connecting
        ) {
            return;
        }
        // the handshake may have finished with the open event still queued
        let settled = if ctl.state == SessionState::Connecting && ctl.channel.is_open() {
            SessionState::Connected
        } else {
            self.fallback
        };
        warn!(state = %ctl.state, to = %settled, "operation abandoned");
        ctl.transition(settled);
    }
}

/// Forward every channel event into the controller's inbox.
fn forward_events(
    channel: &ConnectionChannel,
    tx: &mpsc::UnboundedSender<ChannelEvent>,
) -> Vec<Subscription> {
    let (open, message, close, error) = (tx.clone(), tx.clone(), tx.clone(), tx.clone());
    vec![
        channel.on_open(move || {
            let _ = open.send(ChannelEvent::Open);
        }),
        channel.on_message(move |value| {
            let _ = message.send(ChannelEvent::Message(value.clone()));
        }),
        channel.on_close(move |info| {
            let _ = close.send(ChannelEvent::Close(info.clone()));
        }),
        channel.on_error(move |err| {
            let _ = error.send(ChannelEvent::Error(err.clone()));
        }),
    ]
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::channel::{CloseInfo, EventKind};
    use crate::render::{RecordingSink, Rendered};
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use parley_core::RosterShape;
    use serde_json::json;

    enum Reply {
        Accept(Identity),
        Reject(Option<String>),
        Down,
    }

    struct FixedRegistrar(Reply);

    #[async_trait]
    impl Registrar for FixedRegistrar {
        async fn register(&self, _display_name: &str) -> Result<Identity, RegistrationError> {
            match &self.0 {
                Reply::Accept(identity) => Ok(identity.clone()),
                Reply::Reject(message) => Err(RegistrationError::rejected(message.clone())),
                Reply::Down => Err(RegistrationError::connectivity("refused")),
            }
        }
    }

    fn alice() -> Identity {
        Identity::new("1", "alice")
    }

    /// URL of a port nothing listens on.
    fn dead_url() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        format!("ws://127.0.0.1:{port}")
    }

    fn controller(reply: Reply) -> (SessionController, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::new());
        let channel = ConnectionChannel::new(ChannelConfig::new(dead_url()));
        let ctl = SessionController::new(FixedRegistrar(reply), channel, sink.clone());
        (ctl, sink)
    }

    /// Controller pretending to be connected, for feeding frames directly.
    fn connected() -> (SessionController, Arc<RecordingSink>) {
        let (mut ctl, sink) = controller(Reply::Accept(alice()));
        ctl.identity = Some(alice());
        ctl.state = SessionState::Connected;
        (ctl, sink)
    }

    #[tokio::test]
    async fn register_success_moves_to_authenticated() {
        let (mut ctl, sink) = controller(Reply::Accept(alice()));
        let identity = ctl.register("alice").await.unwrap();
        assert_eq!(identity, alice());
        assert_eq!(ctl.state(), SessionState::AuthenticatedDisconnected);
        assert_eq!(ctl.identity(), Some(&alice()));
        assert!(sink.calls().is_empty());
    }

    #[tokio::test]
    async fn register_rejected_shows_hub_message() {
        let (mut ctl, sink) = controller(Reply::Reject(Some("taken".into())));
        let err = ctl.register("alice").await.unwrap_err();
        assert_matches!(err, ClientError::Registration(RegistrationError::Rejected { .. }));
        assert_eq!(ctl.state(), SessionState::Unauthenticated);
        assert!(ctl.identity().is_none());
        assert_eq!(sink.registration_errors(), vec!["taken".to_string()]);
    }

    #[tokio::test]
    async fn register_rejected_without_message_uses_default() {
        let (mut ctl, sink) = controller(Reply::Reject(None));
        let _ = ctl.register("alice").await.unwrap_err();
        assert_eq!(sink.registration_errors(), vec!["Registration failed".to_string()]);
    }

    #[tokio::test]
    async fn register_connectivity_failure_shows_hint() {
        let (mut ctl, sink) = controller(Reply::Down);
        let err = ctl.register("alice").await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(ctl.state(), SessionState::Unauthenticated);
        assert_eq!(sink.registration_errors(), vec![CONNECTIVITY_HINT.to_string()]);
    }

    #[tokio::test]
    async fn register_twice_is_refused() {
        let (mut ctl, _sink) = controller(Reply::Accept(alice()));
        let _ = ctl.register("alice").await.unwrap();
        let err = ctl.register("alice").await.unwrap_err();
        assert_matches!(
            err,
            ClientError::InvalidState(InvalidStateOperation::WrongState {
                operation: "register",
                state: SessionState::AuthenticatedDisconnected,
            })
        );
    }

    #[tokio::test]
    async fn connect_before_register_is_refused() {
        let (mut ctl, _sink) = controller(Reply::Accept(alice()));
        let err = ctl.connect().await.unwrap_err();
        assert_matches!(err, ClientError::InvalidState(_));
        assert_eq!(ctl.state(), SessionState::Unauthenticated);
    }

    #[tokio::test]
    async fn failed_connect_returns_to_authenticated() {
        let (mut ctl, _sink) = controller(Reply::Accept(alice()));
        let _ = ctl.register("alice").await.unwrap();

        for _ in 0..2 {
            let err = ctl.connect().await.unwrap_err();
            assert_matches!(err, ClientError::Connection(ConnectionError::Transport { .. }));
            assert_eq!(ctl.state(), SessionState::AuthenticatedDisconnected);
        }
        assert!(ctl.process_pending().is_empty());
    }

    /// Never answers its first call, accepts every later one.
    struct StallOnce(std::sync::atomic::AtomicBool);

    #[async_trait]
    impl Registrar for StallOnce {
        async fn register(&self, _display_name: &str) -> Result<Identity, RegistrationError> {
            if !self.0.swap(true, std::sync::atomic::Ordering::SeqCst) {
                std::future::pending::<()>().await;
            }
            Ok(alice())
        }
    }

    #[tokio::test]
    async fn abandoned_register_returns_to_unauthenticated() {
        let sink = Arc::new(RecordingSink::new());
        let channel = ConnectionChannel::new(ChannelConfig::new(dead_url()));
        let mut ctl = SessionController::new(
            StallOnce(std::sync::atomic::AtomicBool::new(false)),
            channel,
            sink,
        );

        let abandoned = tokio::time::timeout(Duration::from_millis(100), ctl.register("alice")).await;
        assert!(abandoned.is_err());
        assert_eq!(ctl.state(), SessionState::Unauthenticated);
        assert!(ctl.identity().is_none());

        let identity = ctl.register("alice").await.unwrap();
        assert_eq!(identity, alice());
        assert_eq!(ctl.state(), SessionState::AuthenticatedDisconnected);
    }

    #[tokio::test]
    async fn abandoned_connect_returns_to_authenticated() {
        // accepts TCP but never answers the upgrade
        let silent = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = silent.local_addr().unwrap().port();
        let mut config = ChannelConfig::new(format!("ws://127.0.0.1:{port}"));
        config.connect_timeout = Duration::from_secs(60);
        let sink = Arc::new(RecordingSink::new());
        let mut ctl = SessionController::new(
            FixedRegistrar(Reply::Accept(alice())),
            ConnectionChannel::new(config),
            sink,
        );
        let _ = ctl.register("alice").await.unwrap();

        let abandoned = tokio::time::timeout(Duration::from_millis(200), ctl.connect()).await;
        assert!(abandoned.is_err());
        assert_eq!(ctl.state(), SessionState::AuthenticatedDisconnected);
        assert!(!ctl.channel().is_open());

        drop(silent);
        let err = ctl.connect().await.unwrap_err();
        assert_matches!(err, ClientError::Connection(ConnectionError::Transport { .. }));
        assert_eq!(ctl.state(), SessionState::AuthenticatedDisconnected);
    }

    #[tokio::test]
    async fn reconnect_gives_up_after_max_retries() {
        let (mut ctl, _sink) = controller(Reply::Accept(alice()));
        let _ = ctl.register("alice").await.unwrap();
        let policy = ReconnectPolicy {
            max_retries: 2,
            base_delay_ms: 10,
            max_delay_ms: 50,
            jitter_factor: 0.0,
        };
        let err = ctl.reconnect(&policy).await.unwrap_err();
        assert_matches!(err, ClientError::Connection(_));
        assert_eq!(ctl.state(), SessionState::AuthenticatedDisconnected);
    }

    #[tokio::test]
    async fn reconnect_does_not_retry_usage_errors() {
        let (mut ctl, _sink) = controller(Reply::Accept(alice()));
        let policy = ReconnectPolicy {
            max_retries: 5,
            ..ReconnectPolicy::default()
        };
        let err = tokio::time::timeout(Duration::from_secs(1), ctl.reconnect(&policy))
            .await
            .unwrap()
            .unwrap_err();
        assert_matches!(err, ClientError::InvalidState(_));
    }

    #[test]
    fn send_before_connect_never_transmits() {
        let (ctl, sink) = controller(Reply::Accept(alice()));
        let err = ctl.send_message("hello").unwrap_err();
        assert_matches!(
            err,
            ClientError::InvalidState(InvalidStateOperation::WrongState {
                operation: "send_message",
                ..
            })
        );
        assert_eq!(sink.notices(), vec![Notice::NotConnected]);
    }

    #[test]
    fn blank_message_is_ignored() {
        let (ctl, sink) = controller(Reply::Accept(alice()));
        ctl.send_message("   \t").unwrap();
        assert!(sink.calls().is_empty());
    }

    #[test]
    fn exit_requires_connected() {
        let (mut ctl, _sink) = controller(Reply::Accept(alice()));
        let err = ctl.exit().unwrap_err();
        assert_matches!(err, ClientError::InvalidState(_));
        assert_eq!(ctl.state(), SessionState::Unauthenticated);
    }

    #[tokio::test]
    async fn teardown_terminates_and_releases_subscriptions() {
        let (mut ctl, _sink) = controller(Reply::Accept(alice()));
        assert_eq!(ctl.channel().subscriber_count(EventKind::Message), 1);
        ctl.teardown();
        assert_eq!(ctl.state(), SessionState::Terminated);
        assert_eq!(ctl.channel().subscriber_count(EventKind::Message), 0);
        assert!(ctl.next_event().await.is_none());

        ctl.teardown();
        assert_eq!(ctl.state(), SessionState::Terminated);
    }

    #[test]
    fn roster_frames_replace_roster_and_flag_self() {
        let (mut ctl, sink) = connected();
        let event = ctl.apply(ChannelEvent::Message(json!({
            "type": "users",
            "users": [{"id": "1", "name": "alice"}, {"id": "2", "name": "bob"}]
        })));
        assert_eq!(
            event,
            SessionEvent::RosterUpdated {
                entries: 2,
                shape: RosterShape::Tagged
            }
        );
        assert_eq!(ctl.roster().len(), 2);
        let roster = sink.last_roster().unwrap();
        assert!(roster[0].is_self);
        assert!(!roster[1].is_self);

        let _ = ctl.apply(ChannelEvent::Message(json!([{"id": "2", "name": "bob"}])));
        assert_eq!(ctl.roster(), &[RosterEntry::new("2", "bob")]);
    }

    #[test]
    fn legacy_and_tagged_rosters_render_identically() {
        let entries = json!([{"id": "1", "name": "alice"}, {"id": "3", "name": "carol"}]);

        let (mut tagged, tagged_sink) = connected();
        let _ = tagged.apply(ChannelEvent::Message(json!({"type": "users", "users": entries})));

        let (mut legacy, legacy_sink) = connected();
        let _ = legacy.apply(ChannelEvent::Message(entries));

        assert_eq!(tagged_sink.calls(), legacy_sink.calls());
        assert_eq!(tagged.roster(), legacy.roster());
    }

    #[test]
    fn chat_frames_render_with_own_flag() {
        let (mut ctl, sink) = connected();
        let _ = ctl.apply(ChannelEvent::Message(json!({
            "type": "send", "message": "hi", "user": {"id": "1", "name": "alice"}
        })));
        let _ = ctl.apply(ChannelEvent::Message(json!({
            "type": "send", "message": "hey", "user": {"id": "2", "name": "bob"}
        })));
        let messages = sink.messages();
        assert_eq!(messages.len(), 2);
        assert!(messages[0].1);
        assert_eq!(messages[1].0.sender_display_name, "bob");
        assert!(!messages[1].1);
    }

    #[test]
    fn malformed_frames_leave_state_untouched() {
        let (mut ctl, sink) = connected();
        let _ = ctl.apply(ChannelEvent::Message(json!([{"id": "1", "name": "alice"}])));
        let calls_before = sink.calls().len();

        for frame in [
            json!({"type": "users", "users": "nope"}),
            json!({"type": "typing"}),
            json!(42),
            json!({"message": "no type"}),
        ] {
            assert_matches!(
                ctl.apply(ChannelEvent::Message(frame)),
                SessionEvent::FrameDropped(_)
            );
        }
        assert_eq!(ctl.state(), SessionState::Connected);
        assert_eq!(ctl.roster(), &[RosterEntry::new("1", "alice")]);
        assert_eq!(sink.calls().len(), calls_before);
    }

    #[test]
    fn remote_close_returns_to_authenticated() {
        let (mut ctl, sink) = connected();
        let event = ctl.apply(ChannelEvent::Close(CloseInfo::remote(Some(1001), None)));
        assert_matches!(event, SessionEvent::Disconnected(_));
        assert_eq!(ctl.state(), SessionState::AuthenticatedDisconnected);
        assert_eq!(ctl.identity(), Some(&alice()));
        assert_eq!(sink.calls(), vec![Rendered::Notice(Notice::ConnectionClosed)]);
    }

    #[test]
    fn frames_outside_connected_are_ignored() {
        let (mut ctl, sink) = controller(Reply::Accept(alice()));
        let event = ctl.apply(ChannelEvent::Message(json!([{"id": "1", "name": "alice"}])));
        assert_eq!(event, SessionEvent::Ignored);
        assert!(ctl.roster().is_empty());
        assert!(sink.calls().is_empty());
    }
}
