//! Error types for envelope handling.

use thiserror::Error;

/// Errors that can occur while decoding or encoding envelopes.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// Frame was not a well-formed envelope
    #[error("malformed envelope: {0}")]
    Malformed(#[source] serde_json::Error),

    /// Envelope could not be encoded
    #[error("envelope encoding failed: {0}")]
    Encoding(#[source] serde_json::Error),
}
