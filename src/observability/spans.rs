//! Request spans.
//!
//! Every inbound request runs inside a span carrying its method, path and
//! `x-request-id`, so log lines from the forwarding path and the replay
//! queue can be correlated back to one caller.

use axum::http::Request;
use tracing::Span;

use crate::http::request::X_REQUEST_ID;

/// `make_span_with` hook for `TraceLayer`.
pub fn request_span<B>(request: &Request<B>) -> Span {
    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %request.method(),
        path = %request.uri().path(),
    )
}
