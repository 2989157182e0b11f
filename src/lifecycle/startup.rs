//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize subsystems in dependency order
//! - Bind the listener and serve until shutdown
//!
//! Any startup error is fatal and returned to `main`.

use thiserror::Error;

use crate::cache::CacheStore;
use crate::config::ProxyConfig;
use crate::http::ProxyServer;
use crate::lifecycle::{signals, Shutdown};
use crate::net::listener::{Listener, ListenerError};
use crate::observability::metrics;
use crate::security::PolicyStore;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("cannot prepare cache directory {path}: {source}")]
    CacheDirectory {
        path: String,
        source: std::io::Error,
    },
    #[error(transparent)]
    Listener(#[from] ListenerError),
    #[error("server error: {0}")]
    Server(#[from] std::io::Error),
}

/// Start the proxy and block until it shuts down on a signal.
pub async fn run(config: ProxyConfig) -> Result<(), StartupError> {
    let shutdown = Shutdown::new();
    let _signals = signals::spawn_signal_handler(shutdown.clone());
    serve(config, shutdown).await
}

/// Start the proxy and serve until `shutdown` is triggered.
pub async fn serve(config: ProxyConfig, shutdown: Shutdown) -> Result<(), StartupError> {
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let policy = PolicyStore::from_config(&config.policy);
    tracing::info!(
        forbidden_sites = config.policy.forbidden_sites.len(),
        forbidden_users = config.policy.forbidden_users.len(),
        host_redirects = config.policy.host_redirects.len(),
        url_redirects = config.policy.url_redirects.len(),
        redirect_order = ?config.policy.redirect_order,
        "Policy loaded"
    );

    let cache = CacheStore::from_config(&config.cache);
    cache
        .ensure_root()
        .await
        .map_err(|source| StartupError::CacheDirectory {
            path: cache.root().display().to_string(),
            source,
        })?;

    let listener = Listener::bind(&config.listener).await?;
    let receiver = shutdown.subscribe();

    ProxyServer::new(&config, policy).run(listener, receiver).await?;
    Ok(())
}
