//! Handler registry for channel events.
//!
//! Each event kind keeps its handlers in registration order. Dispatch clones
//! the handler list under the lock and invokes the snapshot after releasing
//! it, so a handler may subscribe or unsubscribe (itself included) while
//! running.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use parley_core::ConnectionError;
use serde_json::Value;

use super::{ChannelEvent, CloseInfo};

type Handler<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Which event a [`Subscription`] listens to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Link opened.
    Open,
    /// Parsed inbound frame.
    Message,
    /// Link closed.
    Close,
    /// Transport failure.
    Error,
}

/// Handle returned by every `on_*` registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Subscription {
    kind: EventKind,
    id: u64,
}

impl Subscription {
    /// Event kind this handle refers to.
    pub fn kind(&self) -> EventKind {
        self.kind
    }
}

struct HandlerList<T: ?Sized> {
    entries: Mutex<Vec<(u64, Handler<T>)>>,
}

impl<T: ?Sized> Default for HandlerList<T> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }
}

impl<T: ?Sized> HandlerList<T> {
    fn push(&self, id: u64, handler: Handler<T>) {
        self.entries.lock().push((id, handler));
    }

    fn remove(&self, id: u64) -> bool {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        entries.len() != before
    }

    fn snapshot(&self) -> Vec<Handler<T>> {
        self.entries.lock().iter().map(|(_, h)| Arc::clone(h)).collect()
    }

    fn len(&self) -> usize {
        self.entries.lock().len()
    }

    fn invoke(&self, arg: &T) {
        for handler in self.snapshot() {
            handler(arg);
        }
    }
}

/// All handlers of one channel.
#[derive(Default)]
pub(crate) struct Subscriptions {
    next_id: AtomicU64,
    open: HandlerList<()>,
    message: HandlerList<Value>,
    close: HandlerList<CloseInfo>,
    error: HandlerList<ConnectionError>,
}

impl Subscriptions {
    fn next(&self, kind: EventKind) -> Subscription {
        Subscription {
            kind,
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
        }
    }

    pub(crate) fn on_open(&self, handler: impl Fn() + Send + Sync + 'static) -> Subscription {
        let sub = self.next(EventKind::Open);
        self.open.push(sub.id, Arc::new(move |_: &()| handler()));
        sub
    }

    pub(crate) fn on_message(
        &self,
        handler: impl Fn(&Value) + Send + Sync + 'static,
    ) -> Subscription {
        let sub = self.next(EventKind::Message);
        self.message.push(sub.id, Arc::new(handler));
        sub
    }

    pub(crate) fn on_close(
        &self,
        handler: impl Fn(&CloseInfo) + Send + Sync + 'static,
    ) -> Subscription {
        let sub = self.next(EventKind::Close);
        self.close.push(sub.id, Arc::new(handler));
        sub
    }

    pub(crate) fn on_error(
        &self,
        handler: impl Fn(&ConnectionError) + Send + Sync + 'static,
    ) -> Subscription {
        let sub = self.next(EventKind::Error);
        self.error.push(sub.id, Arc::new(handler));
        sub
    }

    /// Remove a handler. Returns `false` if it was already gone.
    pub(crate) fn unsubscribe(&self, sub: Subscription) -> bool {
        match sub.kind {
            EventKind::Open => self.open.remove(sub.id),
            EventKind::Message => self.message.remove(sub.id),
            EventKind::Close => self.close.remove(sub.id),
            EventKind::Error => self.error.remove(sub.id),
        }
    }

    pub(crate) fn count(&self, kind: EventKind) -> usize {
        match kind {
            EventKind::Open => self.open.len(),
            EventKind::Message => self.message.len(),
            EventKind::Close => self.close.len(),
            EventKind::Error => self.error.len(),
        }
    }

    pub(crate) fn dispatch(&self, event: &ChannelEvent) {
        match event {
            ChannelEvent::Open => self.open.invoke(&()),
            ChannelEvent::Message(value) => self.message.invoke(value),
            ChannelEvent::Close(info) => self.close.invoke(info),
            ChannelEvent::Error(err) => self.error.invoke(err),
        }
    }
}
