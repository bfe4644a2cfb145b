//! The drain loop: dispatches queued requests once availability returns.

use std::sync::Arc;
use std::time::Duration;

use axum::response::IntoResponse;
use tokio::sync::broadcast;
use tokio::time;

use crate::availability::Availability;
use crate::context::InterceptorContext;
use crate::http::forward::Forwarder;
use crate::http::response::ForwardError;
use crate::queue::ReplayQueue;

/// Result of one drain tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainTick {
    /// The container is unavailable; nothing was touched.
    ContainerUnavailable,
    /// Queue empty; draining cleared.
    Idle,
    /// A snapshot or restore is underway; queued requests stay put.
    Held,
    /// This many requests were handed to the forwarder.
    Dispatched(usize),
}

/// Single long-running task owning the queue-draining flag.
pub struct DrainLoop {
    queue: Arc<ReplayQueue>,
    availability: Arc<Availability>,
    forwarder: Arc<Forwarder>,
    tick: Duration,
    batch_size: usize,
}

impl DrainLoop {
    pub fn new(ctx: &InterceptorContext) -> Self {
        Self {
            queue: Arc::clone(&ctx.queue),
            availability: Arc::clone(&ctx.availability),
            forwarder: Arc::clone(&ctx.forwarder),
            tick: ctx.config.queue.drain_tick(),
            batch_size: ctx.config.queue.batch_size.max(1),
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(tick = ?self.tick, batch_size = self.batch_size, "Drain loop starting");

        let mut ticker = time::interval(self.tick);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.drain_once();
                }
                _ = shutdown.recv() => {
                    tracing::info!(queue_len = self.queue.len(), "Drain loop received shutdown signal, exiting loop");
                    self.abandon_queued();
                    break;
                }
            }
        }
    }

    /// Close the queue and answer every parked caller with 503, so graceful
    /// shutdown is not left waiting on their connections.
    pub fn abandon_queued(&self) -> usize {
        let abandoned = self.queue.close();
        let count = abandoned.len();
        for queued in abandoned {
            queued.reply.send(ForwardError::ShuttingDown.into_response());
        }
        if count > 0 {
            tracing::warn!(abandoned = count, "Answered queued requests with 503 on shutdown");
        }
        count
    }

    /// One tick of the loop. Dispatched requests are forwarded on their own tasks.
    pub fn drain_once(&self) -> DrainTick {
        if self.availability.is_container_unavailable() {
            return DrainTick::ContainerUnavailable;
        }

        if self.queue.is_empty() {
            self.availability.set_queue_draining(false);
            return DrainTick::Idle;
        }

        self.availability.set_queue_draining(true);

        let mut dispatched = 0;
        while dispatched < self.batch_size {
            let Some(queued) = self.queue.dequeue() else {
                break;
            };

            // A snapshot or restore may have started since the last check.
            if self.availability.is_checkpointing() {
                if let Err(queued) = self.queue.requeue_front(queued) {
                    queued.reply.send(ForwardError::ShuttingDown.into_response());
                }
                break;
            }

            tracing::debug!(
                sequence = ?queued.sequence,
                waited = ?queued.enqueued_at.elapsed(),
                "Dispatching queued request"
            );
            self.forwarder.spawn_forward(queued);
            dispatched += 1;
        }

        if dispatched == 0 {
            DrainTick::Held
        } else {
            DrainTick::Dispatched(dispatched)
        }
    }
}
