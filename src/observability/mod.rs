//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Listener and sessions produce:
//!     → logging.rs (structured log events, per-session spans)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Session failures are logged at the session boundary, never swallowed
//! - Metrics are cheap (atomic increments) and no-ops when disabled

pub mod logging;
pub mod metrics;
