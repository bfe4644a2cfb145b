//! Periodic snapshot trigger.
//!
//! Each tick takes the snapshot lock, lets the replay queue finish draining,
//! then asks the daemon for a checkpoint. A positive answer leaves the
//! attempt in AwaitingDaemon; only the daemon's `Reply` callback ends it.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::{self, Instant};

use crate::availability::Availability;
use crate::checkpoint::{CompletionOutcome, SnapshotGate};
use crate::config::{CheckpointConfig, ServiceIdentity};
use crate::context::InterceptorContext;
use crate::control::client::ControlError;
use crate::control::messages::{CreateSnapshotRequest, CreateSnapshotResponse};
use crate::ledger::RequestLedger;
use crate::observability::metrics;

const DRAIN_POLL: Duration = Duration::from_millis(10);

/// The daemon side of `CreateSnapshot`.
pub trait SnapshotDaemon: Send + Sync + 'static {
    fn create_snapshot(
        &self,
        request: CreateSnapshotRequest,
    ) -> impl Future<Output = Result<CreateSnapshotResponse, ControlError>> + Send;
}

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Another attempt holds the lock.
    Busy,
    /// The daemon accepted; the attempt now waits for its callback.
    AwaitingDaemon,
    /// The daemon's success callback arrived before its own response.
    CompletedEarly,
    /// The daemon's failure callback arrived before its own response.
    FailedEarly,
    /// The daemon answered `response: false`.
    Rejected,
    /// The daemon could not be reached.
    Failed,
}

impl TickOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            TickOutcome::Busy => "busy",
            TickOutcome::AwaitingDaemon => "accepted",
            TickOutcome::CompletedEarly => "completed_early",
            TickOutcome::FailedEarly => "failed_early",
            TickOutcome::Rejected => "rejected",
            TickOutcome::Failed => "failed",
        }
    }
}

pub struct CheckpointCoordinator<D> {
    daemon: D,
    gate: Arc<SnapshotGate>,
    availability: Arc<Availability>,
    ledger: Arc<RequestLedger>,
    identity: ServiceIdentity,
    interval: Duration,
    drain_wait: Duration,
    completion_timeout: Option<Duration>,
}

impl<D: SnapshotDaemon> CheckpointCoordinator<D> {
    pub fn new(ctx: &InterceptorContext, daemon: D) -> Self {
        Self::with_config(ctx, &ctx.config.checkpoint, daemon)
    }

    fn with_config(ctx: &InterceptorContext, config: &CheckpointConfig, daemon: D) -> Self {
        Self {
            daemon,
            gate: Arc::clone(&ctx.snapshots),
            availability: Arc::clone(&ctx.availability),
            ledger: Arc::clone(&ctx.ledger),
            identity: ctx.config.service.clone(),
            interval: config.interval(),
            drain_wait: config.drain_wait(),
            completion_timeout: config.completion_timeout(),
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            interval = ?self.interval,
            drain_wait = ?self.drain_wait,
            service = %self.identity.name,
            "Checkpoint coordinator starting"
        );

        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Checkpoint coordinator received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    pub async fn tick(&self) -> TickOutcome {
        self.expire_stalled_attempt();

        let Some(attempt) = self.gate.try_trigger() else {
            tracing::debug!(phase = ?self.gate.phase(), "Snapshot attempt already in flight, skipping tick");
            return TickOutcome::Busy;
        };

        self.wait_for_drain().await;

        // Nothing else moves a Triggered attempt, so this cannot fail.
        self.gate.begin(attempt);

        let request = CreateSnapshotRequest {
            service_name: self.identity.name.clone(),
            registry_name: self.identity.registry.clone(),
            namespace: self.identity.namespace.clone(),
            latest_request: self.ledger.latest_sequence(),
        };
        tracing::info!(attempt, latest_request = request.latest_request, "Requesting snapshot");

        let outcome = match self.daemon.create_snapshot(request).await {
            Ok(CreateSnapshotResponse { response: true, .. }) => {
                if self.gate.await_completion(attempt) {
                    tracing::info!(attempt, "Daemon accepted snapshot request, awaiting completion");
                    TickOutcome::AwaitingDaemon
                } else if self.gate.outcome_of(attempt) == Some(CompletionOutcome::Failed) {
                    tracing::warn!(attempt, "Daemon reported snapshot failure before answering");
                    TickOutcome::FailedEarly
                } else {
                    tracing::info!(attempt, "Daemon completed snapshot before answering");
                    TickOutcome::CompletedEarly
                }
            }
            Ok(CreateSnapshotResponse { error, .. }) => {
                let error = ControlError::Rejected(error);
                tracing::warn!(attempt, error = %error, "Snapshot attempt aborted");
                self.gate.release(attempt);
                TickOutcome::Rejected
            }
            Err(error) => {
                tracing::error!(attempt, error = %error, "Snapshot attempt aborted");
                self.gate.release(attempt);
                TickOutcome::Failed
            }
        };

        metrics::record_snapshot_attempt(outcome.as_str());
        outcome
    }

    async fn wait_for_drain(&self) {
        let deadline = Instant::now() + self.drain_wait;
        while self.availability.is_queue_draining() {
            if Instant::now() >= deadline {
                tracing::warn!(drain_wait = ?self.drain_wait, "Replay queue still draining, snapshotting anyway");
                return;
            }
            time::sleep(DRAIN_POLL).await;
        }
    }

    fn expire_stalled_attempt(&self) {
        let Some(limit) = self.completion_timeout else {
            return;
        };
        if let Some((attempt, waited)) = self.gate.awaiting_for() {
            if waited >= limit && self.gate.release(attempt) {
                tracing::warn!(attempt, waited = ?waited, "No completion from daemon, abandoning snapshot attempt");
                metrics::record_snapshot_attempt("abandoned");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use super::*;
    use crate::checkpoint::SnapshotPhase;
    use crate::config::InterceptorConfig;
    use crate::http::request::RetainedRequest;
    use crate::http::response::ReplyHandle;

    #[derive(Clone)]
    enum Answer {
        Accept,
        Reject,
        Unreachable,
        CompleteFirst(Arc<SnapshotGate>),
        FailFirst(Arc<SnapshotGate>),
    }

    #[derive(Clone)]
    struct MockDaemon {
        answer: Answer,
        calls: Arc<AtomicUsize>,
        seen: Arc<Mutex<Vec<CreateSnapshotRequest>>>,
    }

    impl MockDaemon {
        fn new(answer: Answer) -> Self {
            Self {
                answer,
                calls: Arc::new(AtomicUsize::new(0)),
                seen: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    impl SnapshotDaemon for MockDaemon {
        async fn create_snapshot(
            &self,
            request: CreateSnapshotRequest,
        ) -> Result<CreateSnapshotResponse, ControlError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(request);
            match &self.answer {
                Answer::Accept => Ok(CreateSnapshotResponse { response: true, error: String::new() }),
                Answer::Reject => Ok(CreateSnapshotResponse {
                    response: false,
                    error: "disk full".into(),
                }),
                Answer::Unreachable => Err(ControlError::Status(tonic::Status::unavailable("daemon down"))),
                Answer::CompleteFirst(gate) => {
                    gate.complete(CompletionOutcome::Captured);
                    Ok(CreateSnapshotResponse { response: true, error: String::new() })
                }
                Answer::FailFirst(gate) => {
                    gate.complete(CompletionOutcome::Failed);
                    Ok(CreateSnapshotResponse { response: true, error: String::new() })
                }
            }
        }
    }

    fn context() -> InterceptorContext {
        let mut config = InterceptorConfig::default();
        config.application.url = "http://127.0.0.1:9".into();
        config.service.name = "orders".into();
        config.service.namespace = "shop".into();
        config.service.registry = "registry.local".into();
        config.checkpoint.drain_wait_secs = 1;
        InterceptorContext::new(config).unwrap()
    }

    fn record(ctx: &InterceptorContext) -> u64 {
        let request = RetainedRequest {
            method: axum::http::Method::GET,
            uri: axum::http::Uri::from_static("/"),
            headers: Default::default(),
            body: Default::default(),
        };
        ctx.ledger.record(Arc::new(request), ReplyHandle::detached())
    }

    #[tokio::test]
    async fn accepted_attempt_holds_lock_until_reply() {
        let ctx = context();
        record(&ctx);
        record(&ctx);
        let daemon = MockDaemon::new(Answer::Accept);
        let coordinator = CheckpointCoordinator::new(&ctx, daemon.clone());

        assert_eq!(coordinator.tick().await, TickOutcome::AwaitingDaemon);
        assert_eq!(ctx.snapshots.phase(), SnapshotPhase::AwaitingDaemon);
        assert!(ctx.availability.is_snapshot_in_progress());

        let seen = daemon.seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].latest_request, 2);
        assert_eq!(seen[0].service_name, "orders");
        assert_eq!(seen[0].namespace, "shop");
    }

    #[tokio::test]
    async fn second_tick_while_awaiting_is_noop() {
        let ctx = context();
        let daemon = MockDaemon::new(Answer::Accept);
        let coordinator = CheckpointCoordinator::new(&ctx, daemon.clone());

        assert_eq!(coordinator.tick().await, TickOutcome::AwaitingDaemon);
        assert_eq!(coordinator.tick().await, TickOutcome::Busy);
        assert_eq!(daemon.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rejection_releases_everything() {
        let ctx = context();
        let daemon = MockDaemon::new(Answer::Reject);
        let coordinator = CheckpointCoordinator::new(&ctx, daemon.clone());

        assert_eq!(coordinator.tick().await, TickOutcome::Rejected);
        assert_eq!(ctx.snapshots.phase(), SnapshotPhase::Idle);
        assert!(!ctx.availability.is_snapshot_in_progress());

        // next tick retries
        assert_eq!(coordinator.tick().await, TickOutcome::Rejected);
        assert_eq!(daemon.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn transport_failure_releases_everything() {
        let ctx = context();
        let coordinator = CheckpointCoordinator::new(&ctx, MockDaemon::new(Answer::Unreachable));

        assert_eq!(coordinator.tick().await, TickOutcome::Failed);
        assert_eq!(ctx.snapshots.phase(), SnapshotPhase::Idle);
        assert!(!ctx.availability.is_unavailable());
    }

    #[tokio::test]
    async fn early_completion_is_not_overwritten() {
        let ctx = context();
        let daemon = MockDaemon::new(Answer::CompleteFirst(Arc::clone(&ctx.snapshots)));
        let coordinator = CheckpointCoordinator::new(&ctx, daemon);

        assert_eq!(coordinator.tick().await, TickOutcome::CompletedEarly);
        assert_eq!(ctx.snapshots.phase(), SnapshotPhase::Idle);
        assert!(!ctx.availability.is_snapshot_in_progress());
    }

    #[tokio::test]
    async fn early_failure_is_reported_as_failure() {
        let ctx = context();
        let daemon = MockDaemon::new(Answer::FailFirst(Arc::clone(&ctx.snapshots)));
        let coordinator = CheckpointCoordinator::new(&ctx, daemon);

        assert_eq!(coordinator.tick().await, TickOutcome::FailedEarly);
        assert_eq!(ctx.snapshots.phase(), SnapshotPhase::Idle);
        assert!(!ctx.availability.is_snapshot_in_progress());
    }

    #[tokio::test]
    async fn proceeds_after_drain_wait_expires() {
        let ctx = context();
        ctx.availability.set_queue_draining(true);
        let coordinator = CheckpointCoordinator::new(&ctx, MockDaemon::new(Answer::Accept));

        let started = std::time::Instant::now();
        assert_eq!(coordinator.tick().await, TickOutcome::AwaitingDaemon);
        assert!(started.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test]
    async fn stalled_attempt_is_abandoned() {
        let mut config = InterceptorConfig::default();
        config.application.url = "http://127.0.0.1:9".into();
        config.checkpoint.completion_timeout_secs = 1;
        let ctx = InterceptorContext::new(config).unwrap();
        let daemon = MockDaemon::new(Answer::Accept);
        let coordinator = CheckpointCoordinator::new(&ctx, daemon.clone());

        assert_eq!(coordinator.tick().await, TickOutcome::AwaitingDaemon);
        assert_eq!(coordinator.tick().await, TickOutcome::Busy);

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(coordinator.tick().await, TickOutcome::AwaitingDaemon);
        assert_eq!(daemon.calls.load(Ordering::SeqCst), 2);
    }
}
