//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, optional connection cap)
//!     → connection.rs (connection id, active session tracking)
//!     → Hand off to HTTP layer (one session per connection)
//! ```
//!
//! # Design Decisions
//! - One spawned task per accepted connection
//! - Connection cap is opt-in; uncapped mode never waits on accept
//! - Each connection tracked for graceful shutdown

pub mod connection;
pub mod listener;
