//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses and value ranges (limits > 0, IP literals)
//! - Reject empty policy entries that could never match
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::{IpAddr, SocketAddr};

use crate::config::schema::ProxyConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// `listener.bind_address` is not a socket address.
    InvalidBindAddress(String),
    /// `listener.max_connections` is set to zero.
    ZeroMaxConnections,
    /// `cache.directory` is empty.
    EmptyCacheDirectory,
    /// A `policy.forbidden_users` entry is not an IP literal.
    InvalidForbiddenUser(String),
    /// A `policy.forbidden_sites` entry is empty.
    EmptyForbiddenSite,
    /// A redirect table holds an empty key or value.
    EmptyRedirect { table: &'static str, key: String },
    /// `security.max_header_bytes` is zero.
    ZeroHeaderLimit,
    /// A timeout is set to zero seconds.
    ZeroTimeout(&'static str),
    /// `observability.metrics_address` is not a socket address.
    InvalidMetricsAddress(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::InvalidBindAddress(addr) => {
                write!(f, "listener.bind_address `{}` is not a socket address", addr)
            }
            ValidationError::ZeroMaxConnections => {
                write!(f, "listener.max_connections must be greater than zero")
            }
            ValidationError::EmptyCacheDirectory => write!(f, "cache.directory must not be empty"),
            ValidationError::InvalidForbiddenUser(user) => {
                write!(f, "policy.forbidden_users entry `{}` is not an IP address", user)
            }
            ValidationError::EmptyForbiddenSite => {
                write!(f, "policy.forbidden_sites contains an empty entry")
            }
            ValidationError::EmptyRedirect { table, key } => {
                write!(f, "policy.{} has an empty entry for `{}`", table, key)
            }
            ValidationError::ZeroHeaderLimit => {
                write!(f, "security.max_header_bytes must be greater than zero")
            }
            ValidationError::ZeroTimeout(name) => {
                write!(f, "timeouts.{} must be greater than zero when set", name)
            }
            ValidationError::InvalidMetricsAddress(addr) => {
                write!(f, "observability.metrics_address `{}` is not a socket address", addr)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Check a parsed configuration, collecting every problem found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }
    if config.listener.max_connections == Some(0) {
        errors.push(ValidationError::ZeroMaxConnections);
    }

    if config.cache.directory.as_os_str().is_empty() {
        errors.push(ValidationError::EmptyCacheDirectory);
    }

    let policy = &config.policy;
    for user in &policy.forbidden_users {
        if user.parse::<IpAddr>().is_err() {
            errors.push(ValidationError::InvalidForbiddenUser(user.clone()));
        }
    }
    if policy.forbidden_sites.iter().any(|site| site.is_empty()) {
        errors.push(ValidationError::EmptyForbiddenSite);
    }
    for (table, redirects) in [
        ("host_redirects", &policy.host_redirects),
        ("url_redirects", &policy.url_redirects),
    ] {
        for (from, to) in redirects {
            if from.is_empty() || to.is_empty() {
                errors.push(ValidationError::EmptyRedirect {
                    table,
                    key: from.clone(),
                });
            }
        }
    }

    if config.security.max_header_bytes == 0 {
        errors.push(ValidationError::ZeroHeaderLimit);
    }

    if config.timeouts.connect_secs == Some(0) {
        errors.push(ValidationError::ZeroTimeout("connect_secs"));
    }
    if config.timeouts.idle_secs == Some(0) {
        errors.push(ValidationError::ZeroTimeout("idle_secs"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
