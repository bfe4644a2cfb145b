//! Shared fixtures for integration tests: a programmable application, a mock
//! checkpoint daemon and a fully wired interceptor, all on ephemeral ports.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, Uri},
    routing::any,
    Json, Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tonic::transport::Channel;

use cr_interceptor::config::InterceptorConfig;
use cr_interceptor::control::messages::CreateSnapshotRequest;
use cr_interceptor::control::proto;
use cr_interceptor::control::proto::interceptor_rpc_service_client::InterceptorRpcServiceClient;
use cr_interceptor::control::proto::snapshot_rpc_service_server::{
    SnapshotRpcService, SnapshotRpcServiceServer,
};
use cr_interceptor::control::ControlServer;
use cr_interceptor::queue::DrainLoop;
use cr_interceptor::{HttpServer, InterceptorContext, Shutdown};

/// Paths under this prefix make the application sleep before answering.
pub const SLOW_PREFIX: &str = "/slow";

/// What the application saw for one request.
#[derive(Debug, Clone)]
pub struct Hit {
    pub method: String,
    pub uri: String,
    pub sequence: Option<String>,
    pub body: String,
}

#[derive(Clone)]
struct AppState {
    hits: Arc<Mutex<Vec<Hit>>>,
    slow: Duration,
}

/// Application stand-in that echoes what it received, including the
/// `interceptor-controller` header.
pub struct MockApplication {
    pub addr: SocketAddr,
    hits: Arc<Mutex<Vec<Hit>>>,
}

impl MockApplication {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn hits(&self) -> Vec<Hit> {
        self.hits.lock().unwrap().clone()
    }

    pub fn hits_for_sequence(&self, sequence: &str) -> usize {
        self.hits()
            .iter()
            .filter(|hit| hit.sequence.as_deref() == Some(sequence))
            .count()
    }
}

pub async fn start_application(slow: Duration) -> MockApplication {
    let hits = Arc::new(Mutex::new(Vec::new()));
    let state = AppState {
        hits: hits.clone(),
        slow,
    };
    let app = Router::new()
        .route("/", any(echo))
        .route("/{*path}", any(echo))
        .with_state(state);

    let addr = serve(app).await;
    MockApplication { addr, hits }
}

async fn echo(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Json<Value> {
    let hit = Hit {
        method: method.to_string(),
        uri: uri.to_string(),
        sequence: headers
            .get("interceptor-controller")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body: String::from_utf8_lossy(&body).into_owned(),
    };
    state.hits.lock().unwrap().push(hit.clone());

    if uri.path().starts_with(SLOW_PREFIX) {
        tokio::time::sleep(state.slow).await;
    }

    Json(json!({
        "method": hit.method,
        "uri": hit.uri,
        "sequence": hit.sequence,
        "body": hit.body,
    }))
}

#[derive(Clone)]
struct DaemonService {
    calls: Arc<Mutex<Vec<CreateSnapshotRequest>>>,
    accept: bool,
}

#[tonic::async_trait]
impl SnapshotRpcService for DaemonService {
    async fn create(
        &self,
        request: tonic::Request<proto::CreateSnapshotRequest>,
    ) -> Result<tonic::Response<proto::CreateSnapshotResponse>, tonic::Status> {
        self.calls.lock().unwrap().push(request.into_inner().into());
        Ok(tonic::Response::new(proto::CreateSnapshotResponse {
            response: self.accept,
            error: if self.accept { String::new() } else { "not now".into() },
        }))
    }
}

/// Checkpoint daemon stand-in; records every Create it receives.
pub struct MockDaemon {
    pub addr: SocketAddr,
    calls: Arc<Mutex<Vec<CreateSnapshotRequest>>>,
}

impl MockDaemon {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn calls(&self) -> Vec<CreateSnapshotRequest> {
        self.calls.lock().unwrap().clone()
    }
}

pub async fn start_daemon(accept: bool) -> MockDaemon {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let service = DaemonService {
        calls: calls.clone(),
        accept,
    };
    let app = tonic::service::Routes::new(SnapshotRpcServiceServer::new(service)).into_axum_router();

    let addr = serve(app).await;
    MockDaemon { addr, calls }
}

/// A running interceptor with its inbound and control listeners.
pub struct Interceptor {
    pub ctx: InterceptorContext,
    pub addr: SocketAddr,
    pub control_addr: SocketAddr,
    pub shutdown: Shutdown,
    /// The inbound server task; finishes once graceful shutdown completes.
    pub server: Option<JoinHandle<()>>,
}

impl Interceptor {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn control_url(&self, path: &str) -> String {
        format!("http://{}{}", self.control_addr, path)
    }

    /// gRPC client for the control endpoint, as the daemon would use it.
    pub async fn control_client(&self) -> InterceptorRpcServiceClient<Channel> {
        InterceptorRpcServiceClient::connect(self.control_url(""))
            .await
            .unwrap()
    }
}

impl Drop for Interceptor {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Config pointing at `application_url`, with the service identity filled in.
pub fn config_for(application_url: &str) -> InterceptorConfig {
    let mut config = InterceptorConfig::default();
    config.application.url = application_url.to_string();
    config.service.name = "orders".into();
    config.service.namespace = "shop".into();
    config.service.registry = "registry.local".into();
    config
}

pub async fn start_interceptor(config: InterceptorConfig) -> Interceptor {
    let ctx = InterceptorContext::new(config).unwrap();
    let shutdown = Shutdown::new();

    let inbound = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let control = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = inbound.local_addr().unwrap();
    let control_addr = control.local_addr().unwrap();

    tokio::spawn(DrainLoop::new(&ctx).run(shutdown.subscribe()));

    let server = HttpServer::new(&ctx);
    let rx = shutdown.subscribe();
    let server = tokio::spawn(async move {
        let _ = server.run(inbound, rx).await;
    });

    let control_server = ControlServer::new(&ctx);
    let rx = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = control_server.run(control, rx).await;
    });

    Interceptor {
        ctx,
        addr,
        control_addr,
        shutdown,
        server: Some(server),
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

/// Poll `check` every 10ms until it holds or `timeout` passes.
pub async fn eventually<F: Fn() -> bool>(timeout: Duration, check: F) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

async fn serve(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}
