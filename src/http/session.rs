//! One forwarding session per accepted client connection.
//!
//! # States
//! ```text
//! ReadingClientHeader → PolicyCheck → CacheLookup
//!     → ForwardingToOrigin → RelayingResponse → Closed
//! ```
//! A policy rejection or any error jumps straight to `Closed`. Errors are
//! returned to `serve_connection`, which logs them; nothing is retried and
//! the client gets no error response.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use crate::http::header::{parse_header, DEFAULT_PORT};
use crate::http::relay::{Relay, RelayMode};
use crate::http::request::{read_client_header, OutboundRequest};
use crate::http::response::Rejection;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::routing::{self, Target};

const LINGER: Duration = Duration::from_secs(1);

/// Everything that can end a session early.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("client closed the connection before sending a request")]
    EmptyRequest,
    #[error("client header exceeds {0} bytes")]
    HeaderTooLarge(usize),
    #[error("request has no URL")]
    MissingUrl,
    #[error("request has no host")]
    MissingHost,
    #[error("cannot connect to origin {host}:{port}: {source}")]
    Connect {
        host: String,
        port: u16,
        source: io::Error,
    },
    #[error("timed out connecting to origin {host}:{port}")]
    ConnectTimeout { host: String, port: u16 },
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// How a session that did not fail ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    Rejected(Rejection),
    Forwarded {
        url: String,
        mode: RelayMode,
        bytes: u64,
    },
}

impl SessionOutcome {
    fn label(&self) -> &'static str {
        match self {
            SessionOutcome::Rejected(_) => "rejected",
            SessionOutcome::Forwarded { mode, .. } => mode.as_str(),
        }
    }
}

/// State of one client connection.
pub struct ForwardingSession {
    state: Arc<AppState>,
    client: TcpStream,
    peer: SocketAddr,
}

impl ForwardingSession {
    pub fn new(state: Arc<AppState>, client: TcpStream, peer: SocketAddr) -> Self {
        Self {
            state,
            client,
            peer,
        }
    }

    /// Drive the session to `Closed`.
    pub async fn run(mut self) -> Result<SessionOutcome, SessionError> {
        let state = Arc::clone(&self.state);

        if state.policy.is_forbidden_user(&self.peer.ip().to_string()) {
            return self.reject(Rejection::ForbiddenUser).await;
        }

        // ReadingClientHeader
        let raw = {
            let mut reader = BufReader::new(&mut self.client);
            read_client_header(&mut reader, state.max_header_bytes).await?
        };
        if raw.is_empty() {
            return Err(SessionError::EmptyRequest);
        }
        tracing::debug!(header = %raw, "Client header received");

        // PolicyCheck
        let header = parse_header(&raw);
        if let Some(url) = header.url.as_deref().filter(|url| !url.is_empty()) {
            if state.policy.is_forbidden_site(url) {
                return self.reject(Rejection::ForbiddenSite(url.to_string())).await;
            }
        }

        let method = header.method.unwrap_or_else(|| "GET".to_string());
        let target = Target {
            url: header.url.ok_or(SessionError::MissingUrl)?,
            host: header.host.ok_or(SessionError::MissingHost)?,
            port: header.port.unwrap_or(DEFAULT_PORT),
        };
        let target = routing::resolve(&state.policy, state.redirect_order, target);

        // CacheLookup
        let artifact = state.cache.artifact_path(&target.url);
        let has_artifact = state.cache.is_fresh(&artifact).await;
        let if_modified_since = state.cache.conditional_date(&artifact).await;
        metrics::record_cache_lookup(has_artifact);
        tracing::debug!(
            url = %target.url,
            artifact = ?artifact,
            if_modified_since = %if_modified_since,
            "Cache lookup"
        );

        // ForwardingToOrigin
        let mut origin = self.connect(&target).await?;
        let request = OutboundRequest {
            method,
            url: target.url.clone(),
            host: target.host.clone(),
            if_modified_since,
        };
        origin.write_all(&request.to_bytes()).await?;
        origin.flush().await?;
        tracing::debug!(host = %target.host, port = target.port, "Request sent to origin");

        // RelayingResponse
        let relay = Relay {
            cache: &state.cache,
            artifact: &artifact,
            has_artifact,
            idle_timeout: state.timeouts.idle_secs.map(Duration::from_secs),
        };
        let report = relay.run(&mut origin, &mut self.client).await?;

        // Closed
        self.client.flush().await?;
        let _ = self.client.shutdown().await;
        drop(origin);

        Ok(SessionOutcome::Forwarded {
            url: target.url,
            mode: report.mode,
            bytes: report.client_bytes,
        })
    }

    async fn reject(mut self, rejection: Rejection) -> Result<SessionOutcome, SessionError> {
        send_rejection(&mut self.client, &rejection).await?;
        lingering_close(&mut self.client).await;
        Ok(SessionOutcome::Rejected(rejection))
    }

    async fn connect(&self, target: &Target) -> Result<TcpStream, SessionError> {
        let connect = TcpStream::connect((target.host.as_str(), target.port));
        let result = match self.state.timeouts.connect_secs {
            Some(secs) => tokio::time::timeout(Duration::from_secs(secs), connect)
                .await
                .map_err(|_| SessionError::ConnectTimeout {
                    host: target.host.clone(),
                    port: target.port,
                })?,
            None => connect.await,
        };
        result.map_err(|source| SessionError::Connect {
            host: target.host.clone(),
            port: target.port,
            source,
        })
    }
}

/// Write a rejection text and close the write side.
pub async fn send_rejection<W>(client: &mut W, rejection: &Rejection) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    metrics::record_rejection(rejection.reason());
    client.write_all(rejection.message().as_bytes()).await?;
    client.flush().await?;
    client.shutdown().await
}

/// Discard client input until it closes or `LINGER` elapses.
///
/// Closing with unread input resets the connection, which can drop the
/// rejection text before the client reads it.
pub async fn lingering_close(client: &mut TcpStream) {
    let mut buf = [0u8; 1024];
    let drain = async {
        while let Ok(n) = client.read(&mut buf).await {
            if n == 0 {
                break;
            }
        }
    };
    let _ = tokio::time::timeout(LINGER, drain).await;
}

/// Run a session and log how it ended. Never fails.
pub async fn serve_connection(state: Arc<AppState>, client: TcpStream, peer: SocketAddr) {
    let start = Instant::now();
    let session = ForwardingSession::new(state, client, peer);

    match session.run().await {
        Ok(outcome) => {
            match &outcome {
                SessionOutcome::Rejected(rejection) => {
                    tracing::info!(reason = rejection.reason(), "Request rejected");
                }
                SessionOutcome::Forwarded { url, mode, bytes } => {
                    metrics::record_relayed_bytes(*bytes);
                    tracing::info!(
                        url = %url,
                        mode = mode.as_str(),
                        bytes = *bytes,
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "Request forwarded"
                    );
                }
            }
            metrics::record_session(outcome.label(), start);
        }
        Err(e) => {
            tracing::warn!(error = %e, "Session failed");
            metrics::record_session("failed", start);
        }
    }
}
