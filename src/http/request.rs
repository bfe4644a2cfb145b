//! Request retention.
//!
//! # Responsibilities
//! - Buffer an intercepted request into a replayable value
//! - Keep the request ID assigned at the edge for log correlation
//!
//! # Design Decisions
//! - The body is fully buffered so the request can be sent more than once
//! - Original request preserved for replay; the outbound copy is built per send

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, HeaderValue, Method, Request, Uri};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

/// Header carrying the edge-assigned request ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Assigns a UUID v4 to requests that arrive without an `x-request-id`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// An intercepted request, retained until its ledger entry is reclaimed.
#[derive(Debug, Clone)]
pub struct RetainedRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RetainedRequest {
    /// Buffer `request` up to `limit` body bytes.
    pub async fn buffer(request: Request<Body>, limit: usize) -> Result<Self, axum::Error> {
        let (parts, body) = request.into_parts();
        let body = axum::body::to_bytes(body, limit).await?;
        Ok(Self {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            body,
        })
    }

    /// Path and raw query string, exactly as received.
    pub fn path_and_query(&self) -> &str {
        self.uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/")
    }

    pub fn request_id(&self) -> &str {
        self.headers
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
    }
}
