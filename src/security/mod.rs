//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Accepted connection:
//!     → policy.rs (client IP against forbidden users)
//! Parsed request:
//!     → policy.rs (URL against forbidden sites)
//!     → routing (redirect tables)
//! ```
//!
//! # Design Decisions
//! - Fail closed: a rejected client never reaches an origin
//! - Exact string matching only; no patterns

pub mod policy;

pub use policy::PolicyStore;
