//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!     → spans.rs (per-request spans with correlation IDs)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Request ID flows from the edge into replayed requests
//! - Metrics are cheap (atomic increments); without an installed recorder they are no-ops

pub mod logging;
pub mod metrics;
pub mod spans;
