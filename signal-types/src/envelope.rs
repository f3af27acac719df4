//! Envelope - the JSON message unit exchanged over a signaling socket.
//!
//! The relay only looks at the `type` discriminant and the routing fields.
//! A `publish` envelope may carry arbitrary extra fields; those are never
//! modelled here; the relay forwards the original frame text instead.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::EnvelopeError;

/// Encoded reply to a `ping` envelope.
pub const PONG: &str = r#"{"type":"pong"}"#;

/// All envelope kinds understood by the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Envelope {
    /// Join the named topics
    Subscribe {
        /// Topic names (non-string and empty entries are dropped on decode)
        #[serde(default, deserialize_with = "topic_list")]
        topics: Vec<String>,
    },
    /// Leave the named topics
    Unsubscribe {
        /// Topic names (non-string and empty entries are dropped on decode)
        #[serde(default, deserialize_with = "topic_list")]
        topics: Vec<String>,
    },
    /// Broadcast to the other members of one topic
    Publish {
        /// Target topic
        #[serde(default, skip_serializing_if = "Option::is_none")]
        topic: Option<String>,
    },
    /// Liveness probe from a peer
    Ping,
    /// Reply to [`Envelope::Ping`]
    Pong,
    /// Any other `type` value
    #[serde(other)]
    Unknown,
}

impl Envelope {
    /// Decode an envelope from a text frame.
    pub fn parse(text: &str) -> Result<Self, EnvelopeError> {
        serde_json::from_str(text).map_err(EnvelopeError::Malformed)
    }

    /// Encode to JSON text.
    pub fn to_json(&self) -> Result<String, EnvelopeError> {
        serde_json::to_string(self).map_err(EnvelopeError::Encoding)
    }

    /// Wire name of this envelope's kind, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Envelope::Subscribe { .. } => "subscribe",
            Envelope::Unsubscribe { .. } => "unsubscribe",
            Envelope::Publish { .. } => "publish",
            Envelope::Ping => "ping",
            Envelope::Pong => "pong",
            Envelope::Unknown => "unknown",
        }
    }
}

/// Accepts a missing/null list and keeps only non-empty string entries.
fn topic_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Vec<Value>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .filter_map(|entry| match entry {
            Value::String(name) if !name.is_empty() => Some(name),
            _ => None,
        })
        .collect())
}
