//! Typed messages exchanged with the checkpoint daemon.
//!
//! These are the crate's own types; `proto.rs` maps them onto the gRPC wire
//! messages.

use serde::{Deserialize, Serialize};

use crate::availability::AvailabilityFlags;
use crate::checkpoint::SnapshotPhase;
use crate::ledger::LedgerStats;

/// Sent to the daemon to request a checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSnapshotRequest {
    pub service_name: String,
    pub registry_name: String,
    pub namespace: String,
    /// Highest sequence number assigned when the snapshot was triggered.
    pub latest_request: u64,
}

/// The daemon's immediate answer to `CreateSnapshotRequest`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSnapshotResponse {
    pub response: bool,
    pub error: String,
}

/// The daemon's asynchronous completion callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyRequest {
    /// False when the checkpoint failed on the daemon's side.
    pub status: bool,
    /// Watermark: every sequence up to and including this one is captured.
    pub latest_request: u64,
    pub service_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopAck {
    pub ledger: LedgerStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReprocessAck {
    pub requeued: usize,
    pub dropped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyAck {
    /// False when no attempt was in flight or the reply was for another service.
    pub accepted: bool,
    /// Entries newly marked Snapshoted.
    pub marked: usize,
}

/// Everything `GET /v1/stats` reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlStatus {
    pub ledger: LedgerStats,
    pub queue_len: usize,
    pub availability: AvailabilityFlags,
    pub snapshot_phase: SnapshotPhase,
}
