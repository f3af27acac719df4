//! HTTP surface for signal-relay.
//!
//! One router serves both components: the signaling path is upgraded to a
//! WebSocket, every other path falls through to the static asset server.

pub mod assets;
pub mod signaling;

use crate::server::SignalRelay;
use axum::{routing::get, Extension, Router};
use std::sync::Arc;

pub use assets::StaticAssets;

/// Build the HTTP router with the signaling endpoint and asset fallback.
pub fn build_router(relay: Arc<SignalRelay>, assets: Arc<StaticAssets>) -> Router {
    let path = relay.config().path.clone();
    Router::new()
        .route(&path, get(signaling::signaling_handler))
        .fallback(assets::asset_handler)
        .layer(Extension(relay))
        .layer(Extension(assets))
}
