//! Process-wide shared state, built once at startup.

use std::sync::Arc;

use crate::availability::Availability;
use crate::checkpoint::SnapshotGate;
use crate::config::InterceptorConfig;
use crate::http::forward::Forwarder;
use crate::ledger::RequestLedger;
use crate::queue::ReplayQueue;

/// Everything the request path, the background loops and the control
/// endpoint share. Cloning is cheap; all members are reference-counted.
#[derive(Clone)]
pub struct InterceptorContext {
    pub config: Arc<InterceptorConfig>,
    pub ledger: Arc<RequestLedger>,
    pub availability: Arc<Availability>,
    pub queue: Arc<ReplayQueue>,
    pub snapshots: Arc<SnapshotGate>,
    pub forwarder: Arc<Forwarder>,
}

impl InterceptorContext {
    pub fn new(config: InterceptorConfig) -> reqwest::Result<Self> {
        let ledger = Arc::new(RequestLedger::new());
        let availability = Arc::new(Availability::new());
        let queue = Arc::new(ReplayQueue::new());
        let snapshots = Arc::new(SnapshotGate::new(Arc::clone(&availability)));
        let forwarder = Arc::new(Forwarder::new(
            &config.application,
            config.queue.backpressure,
            Arc::clone(&ledger),
            Arc::clone(&availability),
            Arc::clone(&queue),
        )?);

        Ok(Self {
            config: Arc::new(config),
            ledger,
            availability,
            queue,
            snapshots,
            forwarder,
        })
    }
}
