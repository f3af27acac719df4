//! Topic membership and fan-out.
//!
//! SignalRelay owns the topic map and the counters. Sessions mutate the map
//! through it; it never holds a reference back to a session.

use crate::config::RelayConfig;
use dashmap::DashMap;
use signal_types::ConnectionId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// One encoded text frame, shared between all receivers of a fan-out.
pub type Frame = Arc<str>;

/// Bounded outbound queue of one connection, drained by its writer task.
pub type Outbox = mpsc::Sender<Frame>;

/// Operational metrics for monitoring relay activity.
///
/// Counters are monotonically increasing (reset only on restart), except
/// `connections_open` which tracks live sessions.
#[derive(Debug, Default)]
pub struct RelayMetrics {
    /// Total signaling connections accepted.
    pub connections_total: AtomicU64,
    /// Sessions currently open.
    pub connections_open: AtomicU64,
    /// Total inbound frames handed to the dispatcher.
    pub envelopes_received: AtomicU64,
    /// Inbound frames dropped as malformed or of unknown kind.
    pub envelopes_ignored: AtomicU64,
    /// Total publish envelopes routed.
    pub publishes_total: AtomicU64,
    /// Frames enqueued to receivers by fan-out.
    pub deliveries_total: AtomicU64,
    /// Receivers skipped because their outbox was full or closed.
    pub deliveries_skipped: AtomicU64,
}

/// Main relay state: topic name to current members.
///
/// A topic is present exactly while it has at least one member.
pub struct SignalRelay {
    config: RelayConfig,
    next_connection: AtomicU64,
    metrics: RelayMetrics,
    topics: DashMap<String, HashMap<ConnectionId, Outbox>>,
}

impl std::fmt::Debug for SignalRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalRelay")
            .field("config", &self.config)
            .field("metrics", &self.metrics)
            .field("topics_count", &self.topics.len())
            .finish_non_exhaustive()
    }
}

impl SignalRelay {
    /// Create an empty relay.
    pub fn new(config: RelayConfig) -> Self {
        Self {
            config,
            next_connection: AtomicU64::new(1),
            metrics: RelayMetrics::default(),
            topics: DashMap::new(),
        }
    }

    /// Get the relay configuration.
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Get access to the operational metrics.
    pub fn metrics(&self) -> &RelayMetrics {
        &self.metrics
    }

    /// Allocate the identity of a new connection.
    pub fn next_connection_id(&self) -> ConnectionId {
        ConnectionId::new(self.next_connection.fetch_add(1, Ordering::Relaxed))
    }

    /// Add a connection to a topic, creating the topic if absent.
    ///
    /// Returns `false` if the connection was already a member.
    pub fn join(&self, topic: &str, id: ConnectionId, outbox: &Outbox) -> bool {
        let mut members = self.topics.entry(topic.to_string()).or_default();
        if members.contains_key(&id) {
            return false;
        }
        members.insert(id, outbox.clone());

        tracing::debug!(
            "{} joined topic {:?} (members: {})",
            id,
            topic,
            members.len()
        );
        true
    }

    /// Remove a connection from a topic and erase the topic if it became empty.
    ///
    /// Removing a non-member, or leaving an unknown topic, is a no-op.
    /// Returns `true` if a membership was removed.
    pub fn leave(&self, topic: &str, id: ConnectionId) -> bool {
        let mut removed = false;
        // Both steps run under the shard lock, so no subscriber can slip in
        // between the removal and the emptiness check.
        let erased = self.topics.remove_if_mut(topic, |_, members| {
            removed = members.remove(&id).is_some();
            members.is_empty()
        });

        if removed {
            tracing::debug!(
                "{} left topic {:?}{}",
                id,
                topic,
                if erased.is_some() { " (topic erased)" } else { "" }
            );
        }
        removed
    }

    /// Enqueue `frame` to every member of `topic` except `sender`.
    ///
    /// Fan-out runs over a snapshot taken at the start of the call. Members
    /// whose outbox is full or closed are skipped, never waited on.
    /// Returns the number of receivers the frame was enqueued for.
    pub fn publish(&self, topic: &str, sender: ConnectionId, frame: &Frame) -> usize {
        self.metrics.publishes_total.fetch_add(1, Ordering::Relaxed);

        let receivers: Vec<(ConnectionId, Outbox)> = match self.topics.get(topic) {
            Some(members) => members
                .iter()
                .filter(|(id, _)| **id != sender)
                .map(|(id, outbox)| (*id, outbox.clone()))
                .collect(),
            None => {
                tracing::debug!("Publish from {} to unknown topic {:?} dropped", sender, topic);
                return 0;
            }
        };

        let mut delivered = 0;
        for (id, outbox) in &receivers {
            match outbox.try_send(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::debug!("Outbox of {} full, skipping", id);
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!("Outbox of {} closed, skipping", id);
                }
            }
        }

        let skipped = receivers.len() - delivered;
        self.metrics
            .deliveries_total
            .fetch_add(delivered as u64, Ordering::Relaxed);
        self.metrics
            .deliveries_skipped
            .fetch_add(skipped as u64, Ordering::Relaxed);

        tracing::debug!(
            "Published from {} to {:?}: {}/{} delivered",
            sender,
            topic,
            delivered,
            receivers.len()
        );
        delivered
    }

    /// Whether a topic currently exists (has at least one member).
    pub fn has_topic(&self, topic: &str) -> bool {
        self.topics.contains_key(topic)
    }

    /// Whether `id` is a member of `topic`.
    pub fn is_member(&self, topic: &str, id: ConnectionId) -> bool {
        self.topics
            .get(topic)
            .map(|members| members.contains_key(&id))
            .unwrap_or(false)
    }

    /// Count members of a topic.
    pub fn member_count(&self, topic: &str) -> usize {
        self.topics.get(topic).map(|members| members.len()).unwrap_or(0)
    }

    /// Get total active topics.
    pub fn total_topics(&self) -> usize {
        self.topics.len()
    }

    /// Get the number of open sessions.
    pub fn open_connections(&self) -> u64 {
        self.metrics.connections_open.load(Ordering::Relaxed)
    }
}
