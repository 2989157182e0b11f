//! Response cache subsystem.
//!
//! # Data Flow
//! ```text
//! Resolved URL
//!     → store.rs artifact_path (sanitized file name)
//!     → conditional_date (If-Modified-Since for the origin)
//! Origin reply:
//!     304 → open_for_read, artifact streamed to client
//!     else → open_for_write, bytes teed to client and artifact
//! ```

pub mod store;

pub use store::{CacheSink, CacheStore, NEVER_CACHED};
