//! Client header intake and outbound request synthesis.
//!
//! # Responsibilities
//! - Read the client header block line by line, up to the blank line
//! - Enforce the header size limit before anything is parsed
//! - Build the fixed-shape conditional request sent to the origin
//!
//! # Design Decisions
//! - The outbound request is synthesized from scratch; client headers other
//!   than method, URL and host are not forwarded
//! - Non UTF-8 bytes are replaced, never rejected

use std::fmt;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use crate::http::session::SessionError;

const ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";
const ACCEPT_ENCODING: &str = "gzip, deflate, sdch";
const ACCEPT_LANGUAGE: &str = "zh-CN,zh;q=0.8";
const ENCODING: &str = "UTF-8";

/// Read header lines until a blank line or end of stream.
///
/// Lines are returned joined with `\n` (each line terminated), without the
/// blank separator line. Anything after the blank line is left unread.
pub async fn read_client_header<R>(reader: &mut R, max_bytes: usize) -> Result<String, SessionError>
where
    R: AsyncBufRead + Unpin,
{
    let mut header = String::new();
    let mut consumed = 0usize;
    let mut line = Vec::with_capacity(256);

    loop {
        line.clear();
        let remaining = max_bytes.saturating_sub(consumed) as u64;
        let n = (&mut *reader).take(remaining + 1).read_until(b'\n', &mut line).await?;
        if n == 0 {
            break;
        }
        consumed += n;
        if consumed > max_bytes {
            return Err(SessionError::HeaderTooLarge(max_bytes));
        }

        let text = String::from_utf8_lossy(&line);
        let text = text.trim_end_matches(['\r', '\n']);
        if text.is_empty() {
            break;
        }
        header.push_str(text);
        header.push('\n');
    }

    Ok(header)
}

/// The conditional request forwarded to the origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundRequest {
    pub method: String,
    pub url: String,
    pub host: String,
    /// HTTP date of the cached copy, or the "never cached" sentinel.
    pub if_modified_since: String,
}

impl OutboundRequest {
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
}

impl fmt::Display for OutboundRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} HTTP/1.1\r\n", self.method, self.url)?;
        write!(f, "HOST: {}\r\n", self.host)?;
        write!(f, "Accept:{}\r\n", ACCEPT)?;
        write!(f, "Accept-Encoding:{}\r\n", ACCEPT_ENCODING)?;
        write!(f, "Accept-Language:{}\r\n", ACCEPT_LANGUAGE)?;
        write!(f, "If-Modified-Since: {}\r\n", self.if_modified_since)?;
        write!(f, "Encoding:{}\r\n", ENCODING)?;
        write!(f, "Connection:keep-alive\r\n\r\n")
    }
}

/// Rewrite an inbound header block for a new host and URL.
///
/// The request line gets `new_url`, `Host:` gets `new_host`, `Referer:` gets
/// `new_url` and `Accept:` gets the proxy's fixed accept list. Every other
/// line is kept as is.
pub fn rebuild_header(header: &str, new_host: &str, new_url: &str) -> String {
    let mut rebuilt = String::with_capacity(header.len());
    for line in header.lines() {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let is_request_line = ["GET", "POST", "CONNECT"]
            .iter()
            .any(|method| tokens.contains(method));

        if is_request_line {
            let method = tokens.first().copied().unwrap_or("GET");
            let version = tokens.get(2).copied().unwrap_or("HTTP/1.1");
            rebuilt.push_str(&format!("{} {} {}\n", method, new_url, version));
        } else if line.contains("Host: ") {
            rebuilt.push_str(&format!("Host: {}\n", new_host));
        } else if line.contains("Referer: ") {
            rebuilt.push_str(&format!("Referer: {}\n", new_url));
        } else if line.contains("Accept: ") {
            rebuilt.push_str(&format!("Accept: {}\n", ACCEPT));
        } else {
            rebuilt.push_str(line);
            rebuilt.push('\n');
        }
    }
    rebuilt
}
