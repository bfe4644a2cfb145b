//! FIFO buffer of requests that arrived while the application was unavailable.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use crate::http::request::RetainedRequest;
use crate::http::response::ReplyHandle;
use crate::ledger::ReplayCandidate;
use crate::observability::metrics;

/// A retained request paired with the means to answer its caller.
#[derive(Debug, Clone)]
pub struct QueuedRequest {
    pub request: Arc<RetainedRequest>,
    pub reply: ReplyHandle,
    /// Ledger sequence, when the request was recorded before it was queued.
    pub sequence: Option<u64>,
    pub enqueued_at: Instant,
}

impl QueuedRequest {
    /// A request that has not reached the ledger yet.
    pub fn fresh(request: Arc<RetainedRequest>, reply: ReplyHandle) -> Self {
        Self {
            request,
            reply,
            sequence: None,
            enqueued_at: Instant::now(),
        }
    }

    /// A ledger entry handed back for replay; it keeps its sequence number.
    ///
    /// `None` when the entry no longer retains its request.
    pub fn replay(candidate: ReplayCandidate) -> Option<Self> {
        Some(Self {
            request: candidate.request?,
            reply: candidate.reply,
            sequence: Some(candidate.sequence),
            enqueued_at: Instant::now(),
        })
    }
}

#[derive(Debug, Default)]
struct QueueState {
    entries: VecDeque<QueuedRequest>,
    closed: bool,
}

/// Mutex-protected FIFO queue.
///
/// Closing it at shutdown hands back whatever is still parked and refuses
/// anything enqueued afterwards.
#[derive(Debug, Default)]
pub struct ReplayQueue {
    inner: Mutex<QueueState>,
}

impl ReplayQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append to the tail. A closed queue hands the request back.
    pub fn enqueue(&self, queued: QueuedRequest) -> Result<(), QueuedRequest> {
        let len = {
            let mut queue = self.lock();
            if queue.closed {
                return Err(queued);
            }
            queue.entries.push_back(queued);
            queue.entries.len()
        };
        metrics::record_queue_depth(len);
        tracing::debug!(queue_len = len, "Request added to queue");
        Ok(())
    }

    /// Pop the head, or `None` if the queue is empty. Never blocks on an empty queue.
    pub fn dequeue(&self) -> Option<QueuedRequest> {
        let (queued, len) = {
            let mut queue = self.lock();
            (queue.entries.pop_front(), queue.entries.len())
        };
        if queued.is_some() {
            metrics::record_queue_depth(len);
        }
        queued
    }

    /// Put a popped request back at the head, ahead of everything queued since.
    ///
    /// A closed queue hands the request back for the caller to answer.
    pub fn requeue_front(&self, queued: QueuedRequest) -> Result<(), QueuedRequest> {
        let len = {
            let mut queue = self.lock();
            if queue.closed {
                return Err(queued);
            }
            queue.entries.push_front(queued);
            queue.entries.len()
        };
        metrics::record_queue_depth(len);
        Ok(())
    }

    /// Refuse further requests and take everything still parked, head first.
    pub fn close(&self) -> Vec<QueuedRequest> {
        let abandoned: Vec<QueuedRequest> = {
            let mut queue = self.lock();
            queue.closed = true;
            queue.entries.drain(..).collect()
        };
        metrics::record_queue_depth(0);
        abandoned
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, Method, Uri};

    fn queued(path: &'static str) -> QueuedRequest {
        QueuedRequest::fresh(
            Arc::new(RetainedRequest {
                method: Method::GET,
                uri: Uri::from_static(path),
                headers: HeaderMap::new(),
                body: Default::default(),
            }),
            ReplyHandle::detached(),
        )
    }

    #[test]
    fn preserves_fifo_order() {
        let queue = ReplayQueue::new();
        queue.enqueue(queued("/a")).unwrap();
        queue.enqueue(queued("/b")).unwrap();

        assert_eq!(queue.dequeue().unwrap().request.path_and_query(), "/a");
        assert_eq!(queue.dequeue().unwrap().request.path_and_query(), "/b");
        assert!(queue.dequeue().is_none());
    }

    #[test]
    fn requeued_request_goes_first() {
        let queue = ReplayQueue::new();
        queue.enqueue(queued("/a")).unwrap();
        queue.enqueue(queued("/b")).unwrap();

        let head = queue.dequeue().unwrap();
        queue.enqueue(queued("/c")).unwrap();
        queue.requeue_front(head).unwrap();

        let order: Vec<_> = std::iter::from_fn(|| queue.dequeue())
            .map(|q| q.request.path_and_query().to_string())
            .collect();
        assert_eq!(order, vec!["/a", "/b", "/c"]);
    }

    #[test]
    fn empty_queue_reports_none() {
        let queue = ReplayQueue::new();
        assert!(queue.is_empty());
        assert!(queue.dequeue().is_none());
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn close_returns_parked_requests_and_refuses_new_ones() {
        let queue = ReplayQueue::new();
        queue.enqueue(queued("/a")).unwrap();
        queue.enqueue(queued("/b")).unwrap();
        let head = queue.dequeue().unwrap();

        let abandoned = queue.close();
        let paths: Vec<_> = abandoned.iter().map(|q| q.request.path_and_query()).collect();
        assert_eq!(paths, vec!["/b"]);
        assert!(queue.is_closed());
        assert!(queue.is_empty());

        assert!(queue.enqueue(queued("/c")).is_err());
        let back = queue.requeue_front(head).unwrap_err();
        assert_eq!(back.request.path_and_query(), "/a");
        assert!(queue.close().is_empty());
    }
}
