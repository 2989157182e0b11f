//! Proxy server: the accept loop.
//!
//! # Responsibilities
//! - Accept client connections from the listener
//! - Refuse forbidden client IPs before any session exists
//! - Spawn one `ForwardingSession` per connection, inside a tracing span
//! - Stop accepting on shutdown and give live sessions a grace period

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::Instrument;

use crate::cache::CacheStore;
use crate::config::{ProxyConfig, TimeoutConfig};
use crate::http::response::Rejection;
use crate::http::session::{lingering_close, send_rejection, serve_connection};
use crate::net::connection::ConnectionTracker;
use crate::net::listener::Listener;
use crate::observability::metrics;
use crate::routing::RedirectOrder;
use crate::security::PolicyStore;

/// Read-only state shared by every session.
#[derive(Debug, Clone)]
pub struct AppState {
    pub policy: Arc<PolicyStore>,
    pub cache: CacheStore,
    pub redirect_order: RedirectOrder,
    pub timeouts: TimeoutConfig,
    pub max_header_bytes: usize,
}

impl AppState {
    /// Combine a configuration with an already populated policy.
    pub fn new(config: &ProxyConfig, policy: PolicyStore) -> Self {
        Self {
            policy: Arc::new(policy),
            cache: CacheStore::from_config(&config.cache),
            redirect_order: config.policy.redirect_order,
            timeouts: config.timeouts.clone(),
            max_header_bytes: config.security.max_header_bytes,
        }
    }
}

/// The forwarding proxy server.
pub struct ProxyServer {
    state: Arc<AppState>,
    tracker: ConnectionTracker,
    shutdown_grace: Duration,
}

impl ProxyServer {
    /// Create a server for `config`, serving with `policy`.
    pub fn new(config: &ProxyConfig, policy: PolicyStore) -> Self {
        Self {
            state: Arc::new(AppState::new(config, policy)),
            tracker: ConnectionTracker::new(),
            shutdown_grace: Duration::from_secs(config.timeouts.shutdown_grace_secs),
        }
    }

    /// Accept connections until a shutdown message arrives (or its sender is dropped).
    pub async fn run(
        self,
        listener: Listener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            cache_directory = ?self.state.cache.root(),
            "Proxy server starting"
        );

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, peer, permit) = match accepted {
                        Ok(connection) => connection,
                        Err(e) => {
                            tracing::error!(error = %e, "Accept failed");
                            tokio::time::sleep(Duration::from_millis(100)).await;
                            continue;
                        }
                    };
                    metrics::record_connection_accepted();

                    if self.state.policy.is_forbidden_user(&peer.ip().to_string()) {
                        tracing::info!(peer_addr = %peer, "Forbidden user refused");
                        tokio::spawn(async move {
                            let _permit = permit;
                            let mut stream = stream;
                            if let Err(e) = send_rejection(&mut stream, &Rejection::ForbiddenUser).await {
                                tracing::debug!(peer_addr = %peer, error = %e, "Rejection not delivered");
                            }
                            lingering_close(&mut stream).await;
                        });
                        continue;
                    }

                    let guard = self.tracker.track();
                    let span = tracing::info_span!(
                        "session",
                        connection_id = %guard.id(),
                        peer_addr = %peer
                    );
                    let state = Arc::clone(&self.state);
                    tokio::spawn(
                        async move {
                            let _permit = permit;
                            let _guard = guard;
                            serve_connection(state, stream, peer).await;
                        }
                        .instrument(span),
                    );
                }
                _ = shutdown.recv() => {
                    tracing::info!("Shutdown signal received, no longer accepting");
                    break;
                }
            }
        }

        let active = self.tracker.active_count();
        if active > 0 {
            tracing::info!(active, grace_secs = self.shutdown_grace.as_secs(), "Waiting for sessions");
            if !self.tracker.wait_idle(self.shutdown_grace).await {
                tracing::warn!(
                    remaining = self.tracker.active_count(),
                    "Sessions still running after grace period"
                );
            }
        }

        tracing::info!("Proxy server stopped");
        Ok(())
    }
}
