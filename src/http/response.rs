//! Response handling and delivery.
//!
//! # Responsibilities
//! - Deliver a response to a caller that may be waiting on another task
//! - Transform backend response for client
//! - Map forwarding errors to status codes
//!
//! # Design Decisions
//! - Hop-by-hop headers stripped before the response is handed back
//! - A reply can be delivered at most once; later sends are dropped

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::body::Body;
use axum::http::{HeaderMap, HeaderName, StatusCode};
use axum::response::{IntoResponse, Response};
use tokio::sync::oneshot;

/// Headers that describe a single connection and must not be forwarded.
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

pub fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(&name.as_str())
}

/// Copy `headers` minus hop-by-hop ones.
pub fn end_to_end_headers(headers: &HeaderMap) -> HeaderMap {
    let mut out = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        if !is_hop_by_hop(name) {
            out.append(name.clone(), value.clone());
        }
    }
    out
}

type Slot = Option<oneshot::Sender<Response>>;

/// The means to write a response back to the original caller.
///
/// Clones share one underlying channel, so the ledger and the replay queue can
/// both hold the handle while only the first `send` reaches the caller.
#[derive(Clone)]
pub struct ReplyHandle {
    slot: Arc<Mutex<Slot>>,
}

impl std::fmt::Debug for ReplyHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplyHandle")
            .field("live", &self.is_live())
            .finish()
    }
}

impl ReplyHandle {
    /// A handle plus the receiver the caller's handler awaits.
    pub fn channel() -> (Self, oneshot::Receiver<Response>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                slot: Arc::new(Mutex::new(Some(tx))),
            },
            rx,
        )
    }

    /// A handle with no caller behind it.
    pub fn detached() -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// True while a caller is still waiting for this reply.
    pub fn is_live(&self) -> bool {
        self.lock().as_ref().is_some_and(|tx| !tx.is_closed())
    }

    /// Deliver `response`. Returns false if the reply was already sent or the caller is gone.
    pub fn send(&self, response: Response) -> bool {
        match self.lock().take() {
            Some(tx) => tx.send(response).is_ok(),
            None => false,
        }
    }
}

/// Errors on the forwarding path, each mapped to the status the caller sees.
#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("failed to read request body: {0}")]
    Body(#[source] axum::Error),

    #[error("failed to build outbound request: {0}")]
    Build(String),

    #[error("failed to reach application: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("failed to read application response: {0}")]
    ResponseBody(#[source] reqwest::Error),

    #[error("application did not answer within {0:?}")]
    Timeout(std::time::Duration),

    #[error("application unavailable for {0:?}")]
    Unavailable(std::time::Duration),

    #[error("interceptor shutting down")]
    ShuttingDown,
}

impl ForwardError {
    pub fn status(&self) -> StatusCode {
        match self {
            ForwardError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ForwardError::Unavailable(_) => StatusCode::BAD_GATEWAY,
            ForwardError::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ForwardError {
    fn into_response(self) -> Response {
        (self.status(), Body::empty()).into_response()
    }
}
