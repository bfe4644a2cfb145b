//! Replay queue subsystem.
//!
//! # Data Flow
//! ```text
//! Request while unavailable ──┐
//!                             ├─→ replay.rs (FIFO, mutex-protected)
//! Restore replay candidates ──┘        │
//!                                      ▼
//!                      drain.rs (fixed tick, owns queue-draining)
//!                                      │
//!                                      ▼
//!                            forwarder (own task per request)
//! ```
//!
//! # Design Decisions
//! - Relative order within the queue is preserved, including across requeues
//! - Fresh traffic is queued while draining, so it never overtakes queued requests
//! - A request popped just as a snapshot starts goes back to the head

pub mod drain;
pub mod replay;

pub use drain::{DrainLoop, DrainTick};
pub use replay::{QueuedRequest, ReplayQueue};
