//! # signal-relay
//!
//! Topic-based signaling relay for peer discovery.
//!
//! This crate implements a server that:
//! - Accepts WebSocket connections from many devices on one fixed path
//! - Lets each connection join and leave named topics
//! - Fans every published envelope out, unmodified, to the other members
//! - Serves the single-page application on every other path
//!
//! ## Architecture
//!
//! ```text
//! Device A ──┐   WebSocket /signaling   ┌── Device B
//!            │                          │
//!        ┌───┴──────────────────────────┴───┐
//!        │           signal-relay           │
//!        │  ┌────────────────────────────┐  │
//!        │  │ topics: name -> members    │  │
//!        │  └────────────────────────────┘  │
//!        │  static assets (SPA fallback)    │
//!        └──────────────────────────────────┘
//! ```
//!
//! ## Protocol
//!
//! JSON envelopes discriminated by `type`:
//! - `subscribe` / `unsubscribe` with `topics`
//! - `publish` with `topic` (forwarded verbatim to the other members)
//! - `ping` → `pong`
//!
//! Nothing is persisted, acknowledged, or retried.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod http;
pub mod server;
pub mod session;

use crate::config::Config;
use crate::error::{RelayError, Result};
use crate::http::StaticAssets;
use crate::server::SignalRelay;
use std::future::Future;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Bind the configured address and serve until Ctrl-C or SIGTERM.
pub async fn run(config: Config) -> Result<()> {
    config.validate()?;

    let address = config.bind_address();
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|e| RelayError::Bind {
            address: address.clone(),
            source: e,
        })?;

    serve(listener, config, shutdown_signal()).await
}

/// Serve on an already bound listener until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, config: Config, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let relay = Arc::new(SignalRelay::new(config.relay.clone()));
    let assets = Arc::new(StaticAssets::from_config(&config.assets));
    let app = http::build_router(relay.clone(), assets);

    tracing::info!(
        "Listening on {} (signaling at {}, assets from {})",
        listener.local_addr()?,
        config.relay.path,
        config.assets.root.display()
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    let m = relay.metrics();
    tracing::info!(
        "Relay stopped: connections={} open={} topics={} publishes={} deliveries={} skipped={} ignored={}",
        m.connections_total.load(Ordering::Relaxed),
        relay.open_connections(),
        relay.total_topics(),
        m.publishes_total.load(Ordering::Relaxed),
        m.deliveries_total.load(Ordering::Relaxed),
        m.deliveries_skipped.load(Ordering::Relaxed),
        m.envelopes_ignored.load(Ordering::Relaxed),
    );
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
