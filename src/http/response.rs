//! Responses the proxy writes itself, and inspection of origin responses.
//!
//! # Responsibilities
//! - Fixed plain-text rejections (no status line, connection closes after)
//! - Detect a "not modified" origin reply from its first bytes

/// Number of origin bytes inspected before deciding how to relay.
pub const INITIAL_CHUNK_LEN: usize = 20;

/// Why the proxy refused to forward a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// The client IP is on the forbidden-user list.
    ForbiddenUser,
    /// The requested URL is on the forbidden-site list.
    ForbiddenSite(String),
}

impl Rejection {
    /// Text written to the client before the connection is closed.
    pub fn message(&self) -> String {
        match self {
            Rejection::ForbiddenUser => "Forbidden user!\n\n".to_string(),
            Rejection::ForbiddenSite(url) => {
                format!("The website {} is forbidden visiting!\n", url)
            }
        }
    }

    /// Short label for logs and metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            Rejection::ForbiddenUser => "forbidden_user",
            Rejection::ForbiddenSite(_) => "forbidden_site",
        }
    }
}

/// True when the first bytes of an origin response carry `304`.
pub fn is_not_modified(chunk: &[u8]) -> bool {
    chunk.windows(3).any(|w| w == b"304")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_messages() {
        assert_eq!(Rejection::ForbiddenUser.message(), "Forbidden user!\n\n");
        assert_eq!(
            Rejection::ForbiddenSite("http://x.com/".into()).message(),
            "The website http://x.com/ is forbidden visiting!\n"
        );
    }

    #[test]
    fn detects_not_modified() {
        assert!(is_not_modified(b"HTTP/1.1 304 Not Mod"));
        assert!(!is_not_modified(b"HTTP/1.1 200 OK\r\nCon"));
        assert!(!is_not_modified(b""));
    }
}
