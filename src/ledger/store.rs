//! The request ledger.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;

use crate::http::request::RetainedRequest;
use crate::http::response::ReplyHandle;
use crate::ledger::entry::{LedgerEntry, LedgerStats, ReplayCandidate, RequestState};

/// Sequence-numbered record of every request that reached the forwarding step.
///
/// Entries live in a sharded map; every state change on one entry happens
/// under that entry's shard lock, so concurrent marks on the same sequence
/// never interleave.
#[derive(Debug, Default)]
pub struct RequestLedger {
    last_sequence: AtomicU64,
    entries: DashMap<u64, LedgerEntry>,
}

impl RequestLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign the next sequence number and store a Pending entry under it.
    pub fn record(&self, request: Arc<RetainedRequest>, reply: ReplyHandle) -> u64 {
        let sequence = self.last_sequence.fetch_add(1, Ordering::SeqCst) + 1;
        self.entries.insert(
            sequence,
            LedgerEntry {
                sequence,
                state: RequestState::Pending,
                request: Some(request),
                reply,
                recorded_at: Instant::now(),
            },
        );
        tracing::trace!(sequence, "Request recorded");
        sequence
    }

    /// Highest sequence number assigned so far (0 before the first request).
    pub fn latest_sequence(&self) -> u64 {
        self.last_sequence.load(Ordering::SeqCst)
    }

    /// Pending → Processed. Missing entries and later states are left alone.
    ///
    /// The caller is answered right after this, so the retained request and
    /// the reply slot are dropped here; an answered entry cannot be replayed.
    pub fn mark_processed(&self, sequence: u64) -> bool {
        match self.entries.get_mut(&sequence) {
            Some(mut entry) if entry.state == RequestState::Pending => {
                entry.state = RequestState::Processed;
                entry.request = None;
                entry.reply = ReplyHandle::detached();
                true
            }
            _ => false,
        }
    }

    /// Every entry with `sequence <= watermark` becomes Snapshoted.
    ///
    /// Returns how many entries changed state.
    pub fn mark_snapshoted(&self, watermark: u64) -> usize {
        let mut marked = 0;
        for mut entry in self.entries.iter_mut() {
            if entry.sequence <= watermark && entry.state != RequestState::Snapshoted {
                entry.state = RequestState::Snapshoted;
                marked += 1;
            }
        }
        marked
    }

    /// Send an entry back to Pending after it was re-queued for replay.
    pub fn mark_for_replay(&self, sequence: u64) -> bool {
        match self.entries.get_mut(&sequence) {
            Some(mut entry) if entry.state != RequestState::Snapshoted => {
                entry.state = RequestState::Pending;
                true
            }
            _ => false,
        }
    }

    /// Pending and Processed entries, in arrival order.
    pub fn reprocessable(&self) -> Vec<ReplayCandidate> {
        let mut candidates: Vec<ReplayCandidate> = self
            .entries
            .iter()
            .filter(|entry| entry.state != RequestState::Snapshoted)
            .map(|entry| ReplayCandidate {
                sequence: entry.sequence,
                state: entry.state,
                request: entry.request.clone(),
                reply: entry.reply.clone(),
            })
            .collect();
        candidates.sort_by_key(|c| c.sequence);
        candidates
    }

    pub fn state(&self, sequence: u64) -> Option<RequestState> {
        self.entries.get(&sequence).map(|entry| entry.state)
    }

    pub fn stats(&self) -> LedgerStats {
        let mut stats = LedgerStats {
            latest_sequence: self.latest_sequence(),
            ..LedgerStats::default()
        };
        for entry in self.entries.iter() {
            match entry.state {
                RequestState::Pending => stats.pending += 1,
                RequestState::Processed => stats.processed += 1,
                RequestState::Snapshoted => stats.snapshoted += 1,
            }
        }
        stats
    }

    /// Body bytes still held by resident entries.
    pub fn retained_bytes(&self) -> usize {
        self.entries
            .iter()
            .filter_map(|entry| entry.request.as_ref().map(|request| request.body.len()))
            .sum()
    }

    /// Drop every Snapshoted entry. Returns how many were removed.
    pub fn reclaim(&self) -> usize {
        let mut removed = 0;
        self.entries.retain(|_, entry| {
            let keep = entry.state != RequestState::Snapshoted;
            if !keep {
                removed += 1;
            }
            keep
        });
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
