//! Ledger entry types.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::http::request::RetainedRequest;
use crate::http::response::ReplyHandle;

/// Lifecycle of an intercepted request.
///
/// States only move forward, Pending → Processed → Snapshoted, except that a
/// restore may send a Pending or Processed entry back to Pending for replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestState {
    Pending,
    Processed,
    Snapshoted,
}

impl RequestState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestState::Pending => "pending",
            RequestState::Processed => "processed",
            RequestState::Snapshoted => "snapshoted",
        }
    }
}

/// Per-request bookkeeping record.
///
/// The request and its reply slot are released once the caller has been
/// answered; only the sequence and state outlive that.
#[derive(Debug)]
pub struct LedgerEntry {
    pub sequence: u64,
    pub state: RequestState,
    pub request: Option<Arc<RetainedRequest>>,
    pub reply: ReplyHandle,
    pub recorded_at: Instant,
}

/// An entry handed back for replay after a restore.
#[derive(Debug, Clone)]
pub struct ReplayCandidate {
    pub sequence: u64,
    pub state: RequestState,
    /// `None` once the entry was answered and released its request.
    pub request: Option<Arc<RetainedRequest>>,
    pub reply: ReplyHandle,
}

/// Entry counts per state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerStats {
    pub pending: usize,
    pub processed: usize,
    pub snapshoted: usize,
    /// Highest sequence number assigned so far.
    pub latest_sequence: u64,
}

impl LedgerStats {
    pub fn total(&self) -> usize {
        self.pending + self.processed + self.snapshoted
    }
}
