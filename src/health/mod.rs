//! Application health monitoring.
//!
//! # Data Flow
//! ```text
//! Periodic timer (heartbeat.rs)
//!     → GET <application>/<path>
//!     → Update state.rs
//!     → On transition, flip container-unavailable
//! ```
//!
//! # Design Decisions
//! - State transitions require consecutive successes/failures
//! - Only transitions touch the availability flag, so a restore that marked
//!   the container unavailable is not undone by a steady healthy check

pub mod heartbeat;
pub mod state;

pub use heartbeat::HeartbeatMonitor;
pub use state::{HealthTracker, HealthTransition};
