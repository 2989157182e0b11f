//! Request routing subsystem.
//!
//! # Data Flow
//! ```text
//! Parsed request (url, host, port)
//!     → redirect.rs (URL / host redirect tables)
//!     → Target (origin address + cache key)
//! ```
//!
//! # Design Decisions
//! - Exact string matching against the policy tables
//! - The resolved URL is both what the origin sees and the cache key

pub mod redirect;

pub use redirect::{resolve, RedirectOrder, Target};
