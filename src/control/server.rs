//! Daemon-facing listener.
//!
//! gRPC (`InterceptorRPCService`) and the JSON stats route share one port;
//! the server speaks HTTP/1.1 and prior-knowledge HTTP/2 side by side.

use axum::{extract::State, routing::get, Json, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tonic::{Request, Response, Status};
use tower_http::trace::TraceLayer;

use crate::context::InterceptorContext;
use crate::control::messages::ControlStatus;
use crate::control::proto;
use crate::control::proto::interceptor_rpc_service_server::{
    InterceptorRpcService, InterceptorRpcServiceServer,
};
use crate::control::service::ControlService;

pub const STATS_PATH: &str = "/v1/stats";

pub struct ControlServer {
    router: Router,
}

impl ControlServer {
    pub fn new(ctx: &InterceptorContext) -> Self {
        Self {
            router: router(ControlService::new(ctx)),
        }
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
        tracing::info!(address = %addr, "Control endpoint listening");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("Control endpoint stopped");
        Ok(())
    }
}

/// Build the gRPC service and the stats route over `service`.
pub fn router(service: ControlService) -> Router {
    let grpc = tonic::service::Routes::new(InterceptorRpcServiceServer::new(service.clone()))
        .into_axum_router();

    Router::new()
        .route(STATS_PATH, get(stats))
        .with_state(service)
        .merge(grpc)
        .layer(TraceLayer::new_for_http())
}

async fn stats(State(service): State<ControlService>) -> Json<ControlStatus> {
    Json(service.status())
}

#[tonic::async_trait]
impl InterceptorRpcService for ControlService {
    async fn stop_requests(
        &self,
        _request: Request<proto::StopRequestsRequest>,
    ) -> Result<Response<proto::StopRequestsResponse>, Status> {
        Ok(Response::new(self.stop_accepting().into()))
    }

    async fn reprocess_requests(
        &self,
        _request: Request<proto::ReprocessRequestsRequest>,
    ) -> Result<Response<proto::ReprocessRequestsResponse>, Status> {
        Ok(Response::new(self.resume_and_reprocess().into()))
    }

    async fn reply(
        &self,
        request: Request<proto::ReplyRequest>,
    ) -> Result<Response<proto::ReplyResponse>, Status> {
        let ack = ControlService::reply(self, request.into_inner().into());
        Ok(Response::new(ack.into()))
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::StatusCode;
    use tower::ServiceExt;

    use super::*;
    use crate::config::InterceptorConfig;

    fn context() -> InterceptorContext {
        let mut config = InterceptorConfig::default();
        config.application.url = "http://127.0.0.1:9".into();
        config.service.name = "orders".into();
        InterceptorContext::new(config).unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn stop_then_stats() {
        let ctx = context();
        let service = ControlService::new(&ctx);
        let app = router(service.clone());

        let ack = InterceptorRpcService::stop_requests(&service, Request::new(proto::StopRequestsRequest {}))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(ack.pending, 0);

        let response = app
            .oneshot(axum::http::Request::get(STATS_PATH).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["availability"]["container_unavailable"], true);
        assert_eq!(json["availability"]["restore_in_progress"], true);
        assert_eq!(json["snapshot_phase"], "idle");
    }

    #[tokio::test]
    async fn reply_without_attempt_is_accepted_as_noop() {
        let ctx = context();
        let service = ControlService::new(&ctx);

        let ack = InterceptorRpcService::reply(
            &service,
            Request::new(proto::ReplyRequest {
                status: true,
                latest_request: 3,
                service_name: "orders".into(),
            }),
        )
        .await
        .unwrap()
        .into_inner();
        assert!(!ack.accepted);
        assert_eq!(ack.marked, 0);
    }

    #[tokio::test]
    async fn unknown_grpc_method_is_unimplemented() {
        let ctx = context();
        let app = ControlServer::new(&ctx).into_router();

        let response = app
            .oneshot(
                axum::http::Request::post("/protos.InterceptorRPCService/Nope")
                    .header("content-type", "application/grpc")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.headers()["grpc-status"], "12");
    }
}
