//! Access control and redirection tables.
//!
//! A `PolicyStore` is filled once during startup and then shared read-only
//! (behind an `Arc`) with every session. All lookups are exact string
//! comparisons; no normalization of scheme, case or trailing slash is done.

use std::collections::{HashMap, HashSet};

use crate::config::PolicyConfig;

/// Forbidden sites, forbidden users, and the two redirect tables.
#[derive(Debug, Clone, Default)]
pub struct PolicyStore {
    forbidden_sites: HashSet<String>,
    forbidden_users: HashSet<String>,
    host_redirects: HashMap<String, String>,
    url_redirects: HashMap<String, String>,
}

impl PolicyStore {
    /// Create an empty policy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a policy from the `[policy]` configuration section.
    pub fn from_config(config: &PolicyConfig) -> Self {
        let mut policy = Self::new();
        for site in &config.forbidden_sites {
            policy.add_forbidden_site(site.clone());
        }
        for user in &config.forbidden_users {
            policy.add_forbidden_user(user.clone());
        }
        for (from, to) in &config.host_redirects {
            policy.add_host_redirect(from.clone(), to.clone());
        }
        for (from, to) in &config.url_redirects {
            policy.add_url_redirect(from.clone(), to.clone());
        }

        tracing::debug!(
            forbidden_sites = policy.forbidden_sites.len(),
            forbidden_users = policy.forbidden_users.len(),
            host_redirects = policy.host_redirects.len(),
            url_redirects = policy.url_redirects.len(),
            "Policy loaded"
        );
        policy
    }

    /// Forbid visiting `url`. Returns `false` if it was already forbidden.
    pub fn add_forbidden_site(&mut self, url: impl Into<String>) -> bool {
        self.forbidden_sites.insert(url.into())
    }

    /// Forbid the client at `ip`. Returns `false` if it was already forbidden.
    pub fn add_forbidden_user(&mut self, ip: impl Into<String>) -> bool {
        self.forbidden_users.insert(ip.into())
    }

    /// Redirect `origin_host` to `new_host`, returning the replaced mapping.
    pub fn add_host_redirect(
        &mut self,
        origin_host: impl Into<String>,
        new_host: impl Into<String>,
    ) -> Option<String> {
        self.host_redirects.insert(origin_host.into(), new_host.into())
    }

    /// Redirect `origin_url` to `new_url`, returning the replaced mapping.
    pub fn add_url_redirect(
        &mut self,
        origin_url: impl Into<String>,
        new_url: impl Into<String>,
    ) -> Option<String> {
        self.url_redirects.insert(origin_url.into(), new_url.into())
    }

    pub fn is_forbidden_site(&self, url: &str) -> bool {
        self.forbidden_sites.contains(url)
    }

    pub fn is_forbidden_user(&self, ip: &str) -> bool {
        self.forbidden_users.contains(ip)
    }

    /// Replacement host for `host`, if one is registered.
    pub fn redirected_host(&self, host: &str) -> Option<&str> {
        let new_host = self.host_redirects.get(host)?;
        tracing::info!(host = %host, new_host = %new_host, "Host redirected");
        Some(new_host)
    }

    /// Replacement URL for `url`, if one is registered.
    pub fn redirected_url(&self, url: &str) -> Option<&str> {
        let new_url = self.url_redirects.get(url)?;
        tracing::info!(url = %url, new_url = %new_url, "URL redirected");
        Some(new_url)
    }
}
