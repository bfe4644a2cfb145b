//! Forwarding path to the application.
//!
//! # Responsibilities
//! - Apply the backpressure policy to every intercepted request
//! - Record forwarded requests in the ledger and tag them with their sequence
//! - Send through one pooled client, built once at startup
//! - Deliver the application's answer (or a synthesized error) to the caller
//!
//! # Design Decisions
//! - Each forward runs on its own task, so a caller hanging up never leaves
//!   a ledger entry Pending
//! - No automatic retries; every failure becomes a response
//! - Every send carries a deadline

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::header::{CONTENT_LENGTH, HOST};
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::response::{IntoResponse, Response};

use crate::availability::Availability;
use crate::config::{ApplicationConfig, BackpressurePolicy};
use crate::http::request::RetainedRequest;
use crate::http::response::{end_to_end_headers, is_hop_by_hop, ForwardError, ReplyHandle};
use crate::ledger::RequestLedger;
use crate::queue::{QueuedRequest, ReplayQueue};

/// Header carrying the decimal sequence number to the application.
pub const INTERCEPTOR_CONTROLLER: HeaderName = HeaderName::from_static("interceptor-controller");

const AVAILABILITY_POLL: Duration = Duration::from_millis(50);

/// What happened to an intercepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Sent to the application right away.
    Forwarded,
    /// Parked in the replay queue; the caller is answered when it drains.
    Queued,
}

/// Build the shared outbound client.
///
/// Certificate verification is off on purpose: the application sits behind
/// the same pod boundary and may present a self-signed certificate.
/// reqwest is built without its decompression features, so response bodies
/// and their `content-encoding` pass through untouched.
pub fn build_client(config: &ApplicationConfig) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .no_proxy()
        .danger_accept_invalid_certs(true)
        .pool_idle_timeout(config.pool_idle_timeout())
        .build()
}

pub struct Forwarder {
    client: reqwest::Client,
    base_url: String,
    request_timeout: Duration,
    policy: BackpressurePolicy,
    ledger: Arc<RequestLedger>,
    availability: Arc<Availability>,
    queue: Arc<ReplayQueue>,
}

impl Forwarder {
    pub fn new(
        config: &ApplicationConfig,
        policy: BackpressurePolicy,
        ledger: Arc<RequestLedger>,
        availability: Arc<Availability>,
        queue: Arc<ReplayQueue>,
    ) -> reqwest::Result<Self> {
        Ok(Self {
            client: build_client(config)?,
            base_url: config.url.trim_end_matches('/').to_string(),
            request_timeout: config.request_timeout(),
            policy,
            ledger,
            availability,
            queue,
        })
    }

    pub fn policy(&self) -> BackpressurePolicy {
        self.policy
    }

    /// Admit an intercepted request under the configured backpressure policy.
    ///
    /// With `Queue`, an unavailable system parks the request and returns at once;
    /// once the queue is closed for shutdown the caller gets
    /// `ForwardError::ShuttingDown` instead. With `WaitThenFail`, the caller
    /// waits for availability and gets `ForwardError::Unavailable` if it never returns.
    pub async fn intercept(
        self: &Arc<Self>,
        request: Arc<RetainedRequest>,
        reply: ReplyHandle,
    ) -> Result<Admission, ForwardError> {
        match self.policy {
            BackpressurePolicy::Queue => {
                if self.availability.is_unavailable() {
                    tracing::debug!(request_id = %request.request_id(), "Unavailable, queueing request");
                    self.queue
                        .enqueue(QueuedRequest::fresh(request, reply))
                        .map_err(|_| ForwardError::ShuttingDown)?;
                    return Ok(Admission::Queued);
                }
            }
            BackpressurePolicy::WaitThenFail { timeout_secs } => {
                self.wait_until_available(Duration::from_secs(timeout_secs)).await?;
            }
        }

        self.spawn_forward(QueuedRequest::fresh(request, reply));
        Ok(Admission::Forwarded)
    }

    async fn wait_until_available(&self, timeout: Duration) -> Result<(), ForwardError> {
        let deadline = Instant::now() + timeout;
        while self.availability.is_unavailable() {
            if Instant::now() >= deadline {
                return Err(ForwardError::Unavailable(timeout));
            }
            tokio::time::sleep(AVAILABILITY_POLL).await;
        }
        Ok(())
    }

    /// Forward on a dedicated task.
    pub fn spawn_forward(self: &Arc<Self>, queued: QueuedRequest) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.forward(queued).await;
        });
    }

    /// Record (unless replaying), send, answer the caller, mark Processed.
    pub async fn forward(&self, queued: QueuedRequest) -> u64 {
        let sequence = match queued.sequence {
            Some(sequence) => sequence,
            None => self
                .ledger
                .record(Arc::clone(&queued.request), queued.reply.clone()),
        };

        let response = match self.send(&queued.request, sequence).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(
                    sequence,
                    request_id = %queued.request.request_id(),
                    error = %e,
                    "Forwarding failed"
                );
                e.into_response()
            }
        };

        // Processed before the caller hears back, so an answered request is never Pending.
        self.ledger.mark_processed(sequence);
        if !queued.reply.send(response) {
            tracing::debug!(sequence, "Caller gone before the reply was delivered");
        }
        sequence
    }

    async fn send(&self, request: &RetainedRequest, sequence: u64) -> Result<Response, ForwardError> {
        let url = format!("{}{}", self.base_url, request.path_and_query());

        let outbound = self
            .client
            .request(request.method.clone(), &url)
            .headers(outbound_headers(&request.headers, sequence))
            .body(request.body.clone())
            .timeout(self.request_timeout)
            .build()
            .map_err(|e| ForwardError::Build(e.to_string()))?;

        tracing::debug!(sequence, method = %request.method, url = %url, "Forwarding request");

        let response = self.client.execute(outbound).await.map_err(|e| {
            if e.is_timeout() {
                ForwardError::Timeout(self.request_timeout)
            } else {
                ForwardError::Transport(e)
            }
        })?;

        let status = response.status();
        let headers = end_to_end_headers(response.headers());
        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                ForwardError::Timeout(self.request_timeout)
            } else {
                ForwardError::ResponseBody(e)
            }
        })?;

        let mut out = Response::new(Body::from(body));
        *out.status_mut() = status;
        *out.headers_mut() = headers;
        Ok(out)
    }
}

/// The caller's headers plus the sequence tag.
///
/// `Host` and `Content-Length` are recomputed by the client for the new
/// target; hop-by-hop headers describe the inbound connection only.
fn outbound_headers(original: &HeaderMap, sequence: u64) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(original.len() + 1);
    for (name, value) in original {
        if name == HOST || name == CONTENT_LENGTH || is_hop_by_hop(name) {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    headers.insert(INTERCEPTOR_CONTROLLER, HeaderValue::from(sequence));
    headers
}
