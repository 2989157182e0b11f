//! Best-effort extraction of method, URL, host and port from a client header.
//!
//! # Design Decisions
//! - Order dependent: the first request line wins, the first `Host:` line wins
//! - Malformed input is never rejected, fields are simply left empty
//! - An explicit port in the request line beats the one on the `Host:` line

/// Port used when neither the request line nor the host line names one.
pub const DEFAULT_PORT: u16 = 80;

const REQUEST_METHODS: [&str; 3] = ["GET", "POST", "CONNECT"];
const HOST_MARKERS: [&str; 2] = ["Host:", "HOSt"];

/// The parts of a client request needed to reach the origin.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestHeader {
    pub method: Option<String>,
    pub url: Option<String>,
    /// Hostname without port.
    pub host: Option<String>,
    /// Always `Some` for non-empty input.
    pub port: Option<u16>,
}

/// Parse a newline-joined header block (request line plus header lines).
///
/// Returns an entirely empty header, port included, for empty input.
pub fn parse_header(header: &str) -> RequestHeader {
    if header.is_empty() {
        return RequestHeader::default();
    }

    let mut parsed = RequestHeader::default();
    for line in header.lines() {
        if parsed.method.is_none() && is_request_line(line) {
            let mut tokens = line.split_whitespace();
            parsed.method = tokens.next().map(str::to_string);
            parsed.url = tokens.next().map(str::to_string);
            parsed.port = parsed.url.as_deref().and_then(port_from_url);
        } else if parsed.host.is_none() && HOST_MARKERS.iter().any(|m| line.contains(m)) {
            let Some(value) = line.split_whitespace().nth(1) else {
                continue;
            };
            match value.split_once(':') {
                Some((host, port)) => {
                    parsed.host = Some(host.to_string());
                    if parsed.port.is_none() {
                        parsed.port = port.parse().ok();
                    }
                }
                None => parsed.host = Some(value.to_string()),
            }
        }
    }

    parsed.port.get_or_insert(DEFAULT_PORT);
    parsed
}

fn is_request_line(line: &str) -> bool {
    line.split_whitespace()
        .any(|token| REQUEST_METHODS.contains(&token))
}

/// Explicit port of an absolute (`http://host:port/...`) or authority-form
/// (`host:port/...`) URL.
fn port_from_url(url: &str) -> Option<u16> {
    let segment = if url.contains("http://") || url.contains("https://") {
        2
    } else {
        1
    };
    let token = url.split(':').nth(segment)?;
    let token = token.split('/').next().unwrap_or(token);
    token.parse().ok()
}
