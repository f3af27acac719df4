//! # signal-types
//!
//! Wire format types for the topic signaling relay.
//!
//! This crate provides the types shared between the relay and its peers:
//! - [`Envelope`] - The JSON message unit exchanged over a signaling socket
//! - [`ConnectionId`] - Opaque identity of one relay connection
//! - [`EnvelopeError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod envelope;
mod error;
mod ids;

pub use envelope::{Envelope, PONG};
pub use error::EnvelopeError;
pub use ids::ConnectionId;
