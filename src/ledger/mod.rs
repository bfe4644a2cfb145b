//! Request ledger subsystem.
//!
//! # Data Flow
//! ```text
//! Forwarding path:
//!     record() → Pending
//!     response delivered → mark_processed() → Processed
//!
//! Daemon acknowledgment (watermark W):
//!     mark_snapshoted(W) → every entry ≤ W is Snapshoted
//!
//! Restore:
//!     reprocessable() → replay queue → mark_for_replay() → Pending
//!
//! Timer (reclaim.rs):
//!     reclaim() → Snapshoted entries dropped
//! ```
//!
//! # Design Decisions
//! - Sequence numbers come from one atomic counter and are never reused
//! - Reclamation is timer-driven, never inline with request handling
//! - The daemon's watermark is authoritative over local state

pub mod entry;
pub mod reclaim;
pub mod store;

pub use entry::{LedgerEntry, LedgerStats, ReplayCandidate, RequestState};
pub use store::RequestLedger;
