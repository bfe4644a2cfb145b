//! Checkpoint coordination.
//!
//! # Data Flow
//! ```text
//! Interval tick (coordinator.rs)
//!     → take the snapshot lock (gate.rs)
//!     → wait for the replay queue to drain (bounded)
//!     → set snapshot-in-progress
//!     → CreateSnapshot to the daemon
//!         ├─ rejected / unreachable → release, next tick retries
//!         └─ accepted → AwaitingDaemon
//!
//! Daemon Reply (control endpoint)
//!     → mark ledger entries up to the watermark Snapshoted
//!     → release the lock
//! ```

pub mod coordinator;
pub mod gate;

pub use coordinator::{CheckpointCoordinator, SnapshotDaemon, TickOutcome};
pub use gate::{CompletionOutcome, SnapshotGate, SnapshotPhase};
