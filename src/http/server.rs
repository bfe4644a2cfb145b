//! Inbound HTTP listener.
//!
//! # Responsibilities
//! - Create the Axum Router: two restart hooks plus a catch-all
//! - Wire up middleware (request ID, tracing)
//! - Buffer each request and hand it to the forwarding path
//! - Hold the caller open until its reply arrives, however late

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::availability::Availability;
use crate::context::InterceptorContext;
use crate::http::forward::Forwarder;
use crate::http::request::{MakeRequestUuid, RetainedRequest};
use crate::http::response::{ForwardError, ReplyHandle};
use crate::observability::{metrics, spans};

pub const RESTART_START_PATH: &str = "/_internal/pod/restart/start";
pub const RESTART_END_PATH: &str = "/_internal/pod/restart/end";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub forwarder: Arc<Forwarder>,
    pub availability: Arc<Availability>,
    pub max_body_bytes: usize,
}

pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(ctx: &InterceptorContext) -> Self {
        let state = AppState {
            forwarder: Arc::clone(&ctx.forwarder),
            availability: Arc::clone(&ctx.availability),
            max_body_bytes: ctx.config.application.max_body_bytes,
        };
        Self {
            router: Self::build_router(state),
        }
    }

    /// No request timeout layer: queued callers are held open on purpose.
    ///
    /// The restart hooks match as prefixes: anything below them is a hook
    /// call too and never reaches the application.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route(RESTART_START_PATH, any(restart_start))
            .route(&format!("{RESTART_START_PATH}/"), any(restart_start))
            .route(&format!("{RESTART_START_PATH}/{{*rest}}"), any(restart_start))
            .route(RESTART_END_PATH, any(restart_end))
            .route(&format!("{RESTART_END_PATH}/"), any(restart_end))
            .route(&format!("{RESTART_END_PATH}/{{*rest}}"), any(restart_end))
            .route("/{*path}", any(intercept_handler))
            .route("/", any(intercept_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                spans::request_span(request)
            }))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    pub fn into_router(self) -> Router {
        self.router
    }

    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn restart_start(State(state): State<AppState>) -> StatusCode {
    tracing::info!("Pod restart starting");
    state.availability.mark_container_unavailable();
    StatusCode::NO_CONTENT
}

async fn restart_end(State(state): State<AppState>) -> StatusCode {
    tracing::info!("Pod restart finished");
    state.availability.mark_container_available();
    StatusCode::NO_CONTENT
}

/// Every path other than the restart hooks lands here.
async fn intercept_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();

    let response = match intercept(&state, request).await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(error = %e, "Request not forwarded");
            e.into_response()
        }
    };

    metrics::record_request(&method, response.status().as_u16(), start);
    response
}

async fn intercept(state: &AppState, request: Request<Body>) -> Result<Response, ForwardError> {
    let retained = RetainedRequest::buffer(request, state.max_body_bytes)
        .await
        .map_err(ForwardError::Body)?;

    let (reply, rx) = ReplyHandle::channel();
    let admission = state.forwarder.intercept(Arc::new(retained), reply).await?;
    tracing::debug!(?admission, "Request admitted");

    match rx.await {
        Ok(response) => Ok(response),
        Err(_) => {
            tracing::error!("Reply channel dropped without an answer");
            Ok(StatusCode::INTERNAL_SERVER_ERROR.into_response())
        }
    }
}
