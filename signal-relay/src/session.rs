//! Per-connection session management.
//!
//! Each signaling connection gets a Session that owns the connection's
//! subscription set and dispatches inbound envelopes. Handlers are plain
//! synchronous functions; the socket loop lives in [`crate::http::signaling`].

use crate::server::{Frame, Outbox, SignalRelay};
use signal_types::{ConnectionId, Envelope, PONG};
use std::collections::HashSet;
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Session state machine states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Accepted; able to send and receive.
    Open,
    /// Terminal. Memberships have been released.
    Closed,
}

/// A per-connection session.
pub struct Session {
    relay: Arc<SignalRelay>,
    id: ConnectionId,
    outbox: Outbox,
    subscriptions: HashSet<String>,
    state: SessionState,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("subscriptions", &self.subscriptions)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Open a session that delivers outbound frames into `outbox`.
    pub fn new(relay: Arc<SignalRelay>, outbox: Outbox) -> Self {
        let id = relay.next_connection_id();
        let metrics = relay.metrics();
        metrics.connections_total.fetch_add(1, Ordering::Relaxed);
        metrics.connections_open.fetch_add(1, Ordering::Relaxed);

        Self {
            relay,
            id,
            outbox,
            subscriptions: HashSet::new(),
            state: SessionState::Open,
        }
    }

    /// Identity of this connection.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Topics this connection is subscribed to.
    pub fn subscriptions(&self) -> &HashSet<String> {
        &self.subscriptions
    }

    /// Handle one inbound text frame.
    ///
    /// Returns the direct reply for the sender, if any. Replies bypass
    /// fan-out so the caller can wait for room in the sender's own outbox.
    /// Malformed frames are dropped; the session stays open.
    pub fn handle_text(&mut self, text: &str) -> Option<Frame> {
        if self.state == SessionState::Closed {
            return None;
        }
        self.relay
            .metrics()
            .envelopes_received
            .fetch_add(1, Ordering::Relaxed);
        self.handle_received(text)
    }

    /// Handle one inbound binary frame. Only UTF-8 JSON is understood.
    pub fn handle_binary(&mut self, bytes: &[u8]) -> Option<Frame> {
        if self.state == SessionState::Closed {
            return None;
        }
        self.relay
            .metrics()
            .envelopes_received
            .fetch_add(1, Ordering::Relaxed);

        match std::str::from_utf8(bytes) {
            Ok(text) => self.handle_received(text),
            Err(_) => {
                self.relay
                    .metrics()
                    .envelopes_ignored
                    .fetch_add(1, Ordering::Relaxed);
                tracing::debug!("Ignoring non-UTF-8 binary frame from {}", self.id);
                None
            }
        }
    }

    fn handle_received(&mut self, text: &str) -> Option<Frame> {
        match Envelope::parse(text) {
            Ok(envelope) => self.dispatch(envelope, text),
            Err(e) => {
                self.relay
                    .metrics()
                    .envelopes_ignored
                    .fetch_add(1, Ordering::Relaxed);
                tracing::debug!("Ignoring frame from {}: {}", self.id, e);
                None
            }
        }
    }

    /// Route a decoded envelope. `frame` is its original text, forwarded
    /// unchanged on publish.
    pub fn dispatch(&mut self, envelope: Envelope, frame: &str) -> Option<Frame> {
        match envelope {
            Envelope::Subscribe { topics } => self.handle_subscribe(topics),
            Envelope::Unsubscribe { topics } => self.handle_unsubscribe(topics),
            Envelope::Publish { topic } => {
                self.handle_publish(topic.as_deref(), frame);
            }
            Envelope::Ping => return Some(self.handle_ping()),
            other @ (Envelope::Pong | Envelope::Unknown) => {
                self.relay
                    .metrics()
                    .envelopes_ignored
                    .fetch_add(1, Ordering::Relaxed);
                tracing::debug!("Ignoring {} envelope from {}", other.kind(), self.id);
            }
        }
        None
    }

    fn handle_subscribe(&mut self, topics: Vec<String>) {
        for topic in topics {
            if self.relay.join(&topic, self.id, &self.outbox) {
                self.subscriptions.insert(topic);
            }
        }
    }

    fn handle_unsubscribe(&mut self, topics: Vec<String>) {
        for topic in topics {
            if self.subscriptions.remove(&topic) {
                self.relay.leave(&topic, self.id);
            }
        }
    }

    fn handle_publish(&self, topic: Option<&str>, frame: &str) -> usize {
        match topic {
            Some(topic) if !topic.is_empty() => {
                let frame: Frame = Arc::from(frame);
                self.relay.publish(topic, self.id, &frame)
            }
            _ => {
                tracing::debug!("Publish from {} without topic dropped", self.id);
                0
            }
        }
    }

    fn handle_ping(&self) -> Frame {
        tracing::debug!("Ping from {}", self.id);
        Arc::from(PONG)
    }

    /// Release every membership and move to `Closed`.
    ///
    /// Runs its cleanup exactly once; later calls are no-ops.
    pub fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.state = SessionState::Closed;

        let topics = std::mem::take(&mut self.subscriptions);
        for topic in &topics {
            self.relay.leave(topic, self.id);
        }
        self.relay
            .metrics()
            .connections_open
            .fetch_sub(1, Ordering::Relaxed);

        tracing::debug!("Closed {} (released {} topics)", self.id, topics.len());
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}
