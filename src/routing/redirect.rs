//! Proxy-side redirection of the request target.
//!
//! # Design Decisions
//! - The host and URL tables are applied together; the order decides which
//!   table is the primary key
//! - `UrlFirst`: a URL hit replaces the URL, and the host comes from the host
//!   table for the original host, else from the new URL's authority
//! - `HostFirst`: a host hit replaces the host, and the URL comes from the URL
//!   table for the original URL, else stays
//! - A miss on the primary table leaves the target untouched

use serde::{Deserialize, Serialize};
use url::Url;

use crate::security::PolicyStore;

/// Which redirect table is consulted first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RedirectOrder {
    #[default]
    UrlFirst,
    HostFirst,
}

/// Where a request is sent, and the cache key it is stored under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub url: String,
    pub host: String,
    pub port: u16,
}

/// Apply the policy's redirect tables to `target`.
pub fn resolve(policy: &PolicyStore, order: RedirectOrder, target: Target) -> Target {
    match order {
        RedirectOrder::UrlFirst => resolve_url_first(policy, target),
        RedirectOrder::HostFirst => resolve_host_first(policy, target),
    }
}

fn resolve_url_first(policy: &PolicyStore, target: Target) -> Target {
    let Some(new_url) = policy.redirected_url(&target.url) else {
        return target;
    };

    let (host, port) = if let Some(new_host) = policy.redirected_host(&target.host) {
        (new_host.to_string(), target.port)
    } else if let Some(authority) = authority_of(new_url) {
        authority
    } else {
        (target.host, target.port)
    };

    Target {
        url: new_url.to_string(),
        host,
        port,
    }
}

fn resolve_host_first(policy: &PolicyStore, target: Target) -> Target {
    let Some(new_host) = policy.redirected_host(&target.host) else {
        return target;
    };

    let url = match policy.redirected_url(&target.url) {
        Some(new_url) => new_url.to_string(),
        None => target.url,
    };

    Target {
        url,
        host: new_host.to_string(),
        port: target.port,
    }
}

/// Host and port of an absolute http(s) URL.
fn authority_of(url: &str) -> Option<(String, u16)> {
    let parsed = Url::parse(url).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }
    let host = parsed.host_str()?.to_string();
    let port = parsed.port_or_known_default()?;
    Some((host, port))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(url: &str, host: &str, port: u16) -> Target {
        Target {
            url: url.into(),
            host: host.into(),
            port,
        }
    }

    #[test]
    fn no_redirect_keeps_target() {
        let policy = PolicyStore::new();
        let original = target("http://a.test/", "a.test", 80);
        for order in [RedirectOrder::UrlFirst, RedirectOrder::HostFirst] {
            assert_eq!(resolve(&policy, order, original.clone()), original);
        }
    }

    #[test]
    fn url_first_takes_host_from_new_url() {
        let mut policy = PolicyStore::new();
        policy.add_url_redirect("http://old.test/page", "http://127.0.0.1:8081/moved");

        let resolved = resolve(
            &policy,
            RedirectOrder::UrlFirst,
            target("http://old.test/page", "old.test", 80),
        );
        assert_eq!(resolved, target("http://127.0.0.1:8081/moved", "127.0.0.1", 8081));
    }

    #[test]
    fn url_first_pairs_with_host_table() {
        let mut policy = PolicyStore::new();
        policy.add_url_redirect("http://jwts.hit.edu.cn/", "http://www.ipuhui.com/");
        policy.add_host_redirect("jwts.hit.edu.cn", "mirror.ipuhui.com");

        let resolved = resolve(
            &policy,
            RedirectOrder::UrlFirst,
            target("http://jwts.hit.edu.cn/", "jwts.hit.edu.cn", 80),
        );
        assert_eq!(resolved, target("http://www.ipuhui.com/", "mirror.ipuhui.com", 80));
    }

    #[test]
    fn url_first_ignores_host_table_alone() {
        let mut policy = PolicyStore::new();
        policy.add_host_redirect("jwts.hit.edu.cn", "www.ipuhui.com");

        let original = target("http://jwts.hit.edu.cn/", "jwts.hit.edu.cn", 80);
        assert_eq!(resolve(&policy, RedirectOrder::UrlFirst, original.clone()), original);
    }

    #[test]
    fn url_first_relative_new_url_keeps_host() {
        let mut policy = PolicyStore::new();
        policy.add_url_redirect("/old", "/new");

        let resolved = resolve(&policy, RedirectOrder::UrlFirst, target("/old", "a.test", 8080));
        assert_eq!(resolved, target("/new", "a.test", 8080));
    }

    #[test]
    fn host_first_replaces_both() {
        let mut policy = PolicyStore::new();
        policy.add_host_redirect("jwts.hit.edu.cn", "www.ipuhui.com");
        policy.add_url_redirect("http://jwts.hit.edu.cn/", "http://www.ipuhui.com/");

        let resolved = resolve(
            &policy,
            RedirectOrder::HostFirst,
            target("http://jwts.hit.edu.cn/", "jwts.hit.edu.cn", 80),
        );
        assert_eq!(resolved, target("http://www.ipuhui.com/", "www.ipuhui.com", 80));
    }

    #[test]
    fn host_first_without_url_entry_keeps_url() {
        let mut policy = PolicyStore::new();
        policy.add_host_redirect("a.test", "b.test");

        let resolved = resolve(
            &policy,
            RedirectOrder::HostFirst,
            target("http://a.test/x", "a.test", 80),
        );
        assert_eq!(resolved, target("http://a.test/x", "b.test", 80));
    }

    #[test]
    fn host_first_ignores_url_table_alone() {
        let mut policy = PolicyStore::new();
        policy.add_url_redirect("http://a.test/", "http://b.test/");

        let original = target("http://a.test/", "a.test", 80);
        assert_eq!(resolve(&policy, RedirectOrder::HostFirst, original.clone()), original);
    }

    #[test]
    fn order_parses_from_kebab_case() {
        #[derive(Deserialize)]
        struct Wrapper {
            order: RedirectOrder,
        }
        let parsed: Wrapper = toml::from_str("order = \"host-first\"").unwrap();
        assert_eq!(parsed.order, RedirectOrder::HostFirst);
    }
}
