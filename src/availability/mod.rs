//! Availability state machine.
//!
//! # States
//! ```text
//! unavailable = queue_draining
//!             ∨ snapshot_in_progress
//!             ∨ restore_in_progress
//!             ∨ container_unavailable
//! ```
//!
//! # Design Decisions
//! - No transition table: four independent booleans, one owner each
//! - "Unavailable" is derived on every read, never stored
//! - Flag reads are lock-free atomics

pub mod flags;

pub use flags::{Availability, AvailabilityFlags};
