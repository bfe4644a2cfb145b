//! Snapshot lock and attempt phase.
//!
//! # State Transitions
//! ```text
//! Idle ──try_trigger──▶ Triggered ──begin──▶ Requested ──await_completion──▶ AwaitingDaemon
//!  ▲                        │                    │                                │
//!  └────────release─────────┴──release/complete──┴────────────complete────────────┘
//! ```
//!
//! The mutex covers the phase change and the matching snapshot-in-progress
//! assignment, plus the watermark a completion applies. Waiting on the
//! daemon happens outside it.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::availability::Availability;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotPhase {
    /// No attempt in flight.
    Idle,
    /// Lock taken; waiting for the replay queue to drain.
    Triggered,
    /// snapshot-in-progress set; CreateSnapshot call in flight.
    Requested,
    /// Daemon accepted; waiting for its completion callback.
    AwaitingDaemon,
}

impl SnapshotPhase {
    /// The daemon has been (or is being) asked for a snapshot.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, SnapshotPhase::Requested | SnapshotPhase::AwaitingDaemon)
    }
}

/// How the daemon said an attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionOutcome {
    Captured,
    Failed,
}

#[derive(Debug)]
struct GateState {
    phase: SnapshotPhase,
    attempt: u64,
    since: Instant,
    /// Outcome reported for the most recently completed attempt.
    completed: Option<(u64, CompletionOutcome)>,
}

/// At most one snapshot attempt at a time.
#[derive(Debug)]
pub struct SnapshotGate {
    state: Mutex<GateState>,
    availability: Arc<Availability>,
}

impl SnapshotGate {
    pub fn new(availability: Arc<Availability>) -> Self {
        Self {
            state: Mutex::new(GateState {
                phase: SnapshotPhase::Idle,
                attempt: 0,
                since: Instant::now(),
                completed: None,
            }),
            availability,
        }
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn phase(&self) -> SnapshotPhase {
        self.lock().phase
    }

    /// Idle → Triggered. Returns the new attempt's id, or `None` if one is already in flight.
    pub fn try_trigger(&self) -> Option<u64> {
        let mut state = self.lock();
        if state.phase != SnapshotPhase::Idle {
            return None;
        }
        state.attempt += 1;
        state.phase = SnapshotPhase::Triggered;
        state.since = Instant::now();
        Some(state.attempt)
    }

    /// Triggered → Requested, setting snapshot-in-progress.
    pub fn begin(&self, attempt: u64) -> bool {
        let mut state = self.lock();
        if state.attempt != attempt || state.phase != SnapshotPhase::Triggered {
            return false;
        }
        state.phase = SnapshotPhase::Requested;
        state.since = Instant::now();
        self.availability.begin_snapshot();
        true
    }

    /// Requested → AwaitingDaemon once the daemon accepted the request.
    ///
    /// Returns false when the attempt already finished, i.e. the daemon's
    /// completion callback overtook its own response.
    pub fn await_completion(&self, attempt: u64) -> bool {
        let mut state = self.lock();
        if state.attempt != attempt || state.phase != SnapshotPhase::Requested {
            return false;
        }
        state.phase = SnapshotPhase::AwaitingDaemon;
        state.since = Instant::now();
        true
    }

    /// Abort `attempt`: back to Idle, snapshot-in-progress cleared.
    pub fn release(&self, attempt: u64) -> bool {
        let mut state = self.lock();
        if state.attempt != attempt || state.phase == SnapshotPhase::Idle {
            return false;
        }
        self.finish(&mut state);
        true
    }

    /// End whatever attempt the daemon is working on.
    ///
    /// Only a Requested or AwaitingDaemon attempt can complete; otherwise this
    /// is a no-op and returns `None`.
    pub fn complete(&self, outcome: CompletionOutcome) -> Option<u64> {
        self.complete_with(outcome, |_| ()).map(|(attempt, ())| attempt)
    }

    /// Like `complete`, but runs `apply` on the attempt id first, under the
    /// same lock. Nothing can expire or replace the attempt in between.
    pub fn complete_with<T>(
        &self,
        outcome: CompletionOutcome,
        apply: impl FnOnce(u64) -> T,
    ) -> Option<(u64, T)> {
        let mut state = self.lock();
        if !state.phase.is_in_flight() {
            return None;
        }
        let attempt = state.attempt;
        let applied = apply(attempt);
        state.completed = Some((attempt, outcome));
        self.finish(&mut state);
        Some((attempt, applied))
    }

    /// What the daemon reported for `attempt`, if it completed.
    pub fn outcome_of(&self, attempt: u64) -> Option<CompletionOutcome> {
        match self.lock().completed {
            Some((completed, outcome)) if completed == attempt => Some(outcome),
            _ => None,
        }
    }

    /// How long the current attempt has been awaiting the daemon, if it is.
    pub fn awaiting_for(&self) -> Option<(u64, Duration)> {
        let state = self.lock();
        (state.phase == SnapshotPhase::AwaitingDaemon).then(|| (state.attempt, state.since.elapsed()))
    }

    fn finish(&self, state: &mut GateState) {
        state.phase = SnapshotPhase::Idle;
        state.since = Instant::now();
        self.availability.end_snapshot();
    }
}
