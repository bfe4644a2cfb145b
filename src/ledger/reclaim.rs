//! Periodic reclamation of snapshoted entries.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time;

use crate::ledger::RequestLedger;
use crate::observability::metrics;

/// Run reclamation passes every `interval` until shutdown.
///
/// Reclamation never runs inline with request handling; a snapshoted entry
/// stays resident for up to one interval.
pub async fn run_reclaimer(
    ledger: Arc<RequestLedger>,
    interval: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    tracing::info!(interval = ?interval, "Ledger reclaimer starting");

    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let removed = ledger.reclaim();
                let stats = ledger.stats();
                if removed > 0 {
                    tracing::debug!(removed, remaining = stats.total(), "Reclaimed snapshoted requests");
                }
                metrics::record_ledger_stats(&stats);
            }
            _ = shutdown.recv() => {
                tracing::info!("Ledger reclaimer received shutdown signal, exiting loop");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::request::RetainedRequest;
    use crate::http::response::ReplyHandle;
    use crate::lifecycle::Shutdown;
    use axum::http::{HeaderMap, Method, Uri};

    #[tokio::test]
    async fn reclaims_on_timer_not_inline() {
        let ledger = Arc::new(RequestLedger::new());
        for _ in 0..3 {
            ledger.record(
                Arc::new(RetainedRequest {
                    method: Method::GET,
                    uri: Uri::from_static("/"),
                    headers: HeaderMap::new(),
                    body: Default::default(),
                }),
                ReplyHandle::detached(),
            );
        }
        ledger.mark_snapshoted(2);
        assert_eq!(ledger.len(), 3);

        let shutdown = Shutdown::new();
        let task = tokio::spawn(run_reclaimer(
            Arc::clone(&ledger),
            Duration::from_millis(20),
            shutdown.subscribe(),
        ));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(ledger.len(), 1);

        shutdown.trigger();
        task.await.unwrap();
    }
}
