//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::routing::RedirectOrder;

/// Root configuration for the forwarding proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, connection cap).
    pub listener: ListenerConfig,

    /// Location of cache artifacts.
    pub cache: CacheConfig,

    /// Access control and redirection tables.
    pub policy: PolicyConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Limits on client input.
    pub security: SecurityConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum concurrent connections (backpressure).
    /// `None` spawns one session per connection without bound.
    pub max_connections: Option<usize>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_connections: None,
        }
    }
}

/// Cache artifact configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory holding `<sanitized url>.cache` files.
    pub directory: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
        }
    }
}

/// Policy tables loaded once at startup.
///
/// Every entry is matched verbatim: `"http://x.com"` and `"http://x.com/"`
/// are different keys.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct PolicyConfig {
    /// URLs clients may not visit.
    pub forbidden_sites: Vec<String>,

    /// Client IP addresses refused at accept time.
    pub forbidden_users: Vec<String>,

    /// Origin host -> replacement host.
    pub host_redirects: BTreeMap<String, String>,

    /// Origin URL -> replacement URL.
    pub url_redirects: BTreeMap<String, String>,

    /// Which redirect table is the primary key.
    pub redirect_order: RedirectOrder,
}

/// Timeout configuration for origin traffic and shutdown.
///
/// Connect and idle timeouts are unset by default: a silent origin stalls
/// only its own session.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Origin connection establishment timeout in seconds.
    pub connect_secs: Option<u64>,

    /// Maximum silence on the origin stream before the relay ends, in seconds.
    pub idle_secs: Option<u64>,

    /// Time granted to in-flight sessions after shutdown, in seconds.
    pub shutdown_grace_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: None,
            idle_secs: None,
            shutdown_grace_secs: 5,
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum size of the client header block in bytes.
    pub max_header_bytes: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_header_bytes: 64 * 1024, // 64KB
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error) used when `RUST_LOG` is unset.
    pub log_level: String,

    /// Colored log output.
    pub ansi: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            ansi: true,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
