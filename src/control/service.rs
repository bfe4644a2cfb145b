//! The operations the daemon invokes on this sidecar.
//!
//! Every operation tolerates arbitrary call order: a `Reply` with no attempt
//! in flight, or a second `StopRequests`, is a no-op rather than an error.

use std::sync::Arc;

use axum::response::IntoResponse;

use crate::availability::Availability;
use crate::checkpoint::{CompletionOutcome, SnapshotGate};
use crate::context::InterceptorContext;
use crate::control::messages::{ControlStatus, ReplyAck, ReplyRequest, ReprocessAck, StopAck};
use crate::http::response::ForwardError;
use crate::ledger::RequestLedger;
use crate::observability::metrics;
use crate::queue::{QueuedRequest, ReplayQueue};

#[derive(Clone)]
pub struct ControlService {
    ledger: Arc<RequestLedger>,
    availability: Arc<Availability>,
    queue: Arc<ReplayQueue>,
    snapshots: Arc<SnapshotGate>,
    service_name: String,
}

impl ControlService {
    pub fn new(ctx: &InterceptorContext) -> Self {
        Self {
            ledger: Arc::clone(&ctx.ledger),
            availability: Arc::clone(&ctx.availability),
            queue: Arc::clone(&ctx.queue),
            snapshots: Arc::clone(&ctx.snapshots),
            service_name: ctx.config.service.name.clone(),
        }
    }

    /// The application is about to be restored: hold all traffic.
    pub fn stop_accepting(&self) -> StopAck {
        self.availability.mark_container_unavailable();
        self.availability.begin_restore();

        let ledger = self.ledger.stats();
        tracing::info!(
            pending = ledger.pending,
            processed = ledger.processed,
            snapshoted = ledger.snapshoted,
            latest_sequence = ledger.latest_sequence,
            "Stopped accepting requests for restore"
        );
        StopAck { ledger }
    }

    /// The application was restored: replay everything it has not seen.
    pub fn resume_and_reprocess(&self) -> ReprocessAck {
        let mut requeued = 0;
        let mut dropped = 0;

        for candidate in self.ledger.reprocessable() {
            let sequence = candidate.sequence;
            if !candidate.reply.is_live() {
                tracing::warn!(sequence, "Caller gone, cannot replay request");
                dropped += 1;
                continue;
            }
            let Some(queued) = QueuedRequest::replay(candidate) else {
                tracing::warn!(sequence, "Request no longer retained, cannot replay");
                dropped += 1;
                continue;
            };
            if let Err(queued) = self.queue.enqueue(queued) {
                tracing::warn!(sequence, "Queue closed, cannot replay request");
                queued.reply.send(ForwardError::ShuttingDown.into_response());
                dropped += 1;
                continue;
            }
            self.ledger.mark_for_replay(sequence);
            requeued += 1;
        }

        self.availability.end_restore();
        self.availability.mark_container_available();

        metrics::record_replay("requeued", requeued);
        metrics::record_replay("dropped", dropped);
        tracing::info!(requeued, dropped, queue_len = self.queue.len(), "Resumed after restore");

        ReprocessAck { requeued, dropped }
    }

    /// The daemon's completion callback for a snapshot attempt.
    ///
    /// The watermark is applied under the snapshot lock, before it is
    /// released, so a late callback can never end a newer attempt.
    pub fn reply(&self, reply: ReplyRequest) -> ReplyAck {
        if reply.service_name != self.service_name {
            tracing::warn!(
                expected = %self.service_name,
                received = %reply.service_name,
                "Ignoring snapshot reply for another service"
            );
            return ReplyAck { accepted: false, marked: 0 };
        }

        let outcome = if reply.status {
            CompletionOutcome::Captured
        } else {
            CompletionOutcome::Failed
        };
        let completed = self.snapshots.complete_with(outcome, |_| match outcome {
            CompletionOutcome::Captured => self.ledger.mark_snapshoted(reply.latest_request),
            CompletionOutcome::Failed => 0,
        });

        match (completed, outcome) {
            (Some((attempt, marked)), CompletionOutcome::Captured) => {
                tracing::info!(attempt, watermark = reply.latest_request, marked, "Snapshot completed");
                metrics::record_snapshot_attempt("completed");
                ReplyAck { accepted: true, marked }
            }
            (Some((attempt, _)), CompletionOutcome::Failed) => {
                tracing::warn!(attempt, "Daemon reported snapshot failure");
                metrics::record_snapshot_attempt("failed_on_daemon");
                ReplyAck { accepted: true, marked: 0 }
            }
            (None, _) => {
                tracing::debug!(watermark = reply.latest_request, "Snapshot reply with no attempt in flight");
                ReplyAck { accepted: false, marked: 0 }
            }
        }
    }

    pub fn status(&self) -> ControlStatus {
        ControlStatus {
            ledger: self.ledger.stats(),
            queue_len: self.queue.len(),
            availability: self.availability.flags(),
            snapshot_phase: self.snapshots.phase(),
        }
    }
}
