//! HTTP forwarding subsystem.
//!
//! # Data Flow
//! ```text
//! Accepted TCP connection
//!     → server.rs (forbidden user check, spawn session)
//!     → session.rs (state machine for one request)
//!         → request.rs (read client header, build outbound request)
//!         → header.rs (method, url, host, port)
//!         → [security + routing + cache lookups]
//!         → relay.rs (origin → client, origin → cache artifact)
//!     → response.rs (rejection texts, 304 detection)
//! ```

pub mod header;
pub mod relay;
pub mod request;
pub mod response;
pub mod server;
pub mod session;

pub use header::{parse_header, RequestHeader};
pub use server::{AppState, ProxyServer};
pub use session::{ForwardingSession, SessionError, SessionOutcome};
