//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the shared context once
//! - Bind both listeners before anything is spawned
//! - Start the background loops and serve until shutdown
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listeners start last (traffic only when ready)

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::checkpoint::CheckpointCoordinator;
use crate::config::InterceptorConfig;
use crate::context::InterceptorContext;
use crate::control::{ControlServer, DaemonClient};
use crate::health::HeartbeatMonitor;
use crate::http::HttpServer;
use crate::ledger::reclaim::run_reclaimer;
use crate::lifecycle::{signals, Shutdown};
use crate::observability::metrics;
use crate::queue::DrainLoop;

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("invalid checkpoint daemon address: {0}")]
    Daemon(#[from] tonic::transport::Error),

    #[error("failed to bind {role} listener on {address}: {source}")]
    Bind {
        role: &'static str,
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid metrics address {0}")]
    MetricsAddress(String),

    #[error("failed to install metrics exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Run the sidecar until SIGINT/SIGTERM.
pub async fn run(config: InterceptorConfig) -> Result<(), StartupError> {
    let shutdown = Shutdown::new();
    tokio::spawn(signals::watch(shutdown.clone()));
    run_until(config, shutdown).await
}

/// Run the sidecar until `shutdown` fires.
pub async fn run_until(config: InterceptorConfig, shutdown: Shutdown) -> Result<(), StartupError> {
    if config.observability.metrics_enabled {
        let addr: SocketAddr = config
            .observability
            .metrics_address
            .parse()
            .map_err(|_| StartupError::MetricsAddress(config.observability.metrics_address.clone()))?;
        metrics::init_metrics(addr)?;
    }

    let inbound = bind("inbound", &config.listener.bind_address).await?;
    let control = bind("control", &config.control.bind_address).await?;

    let ctx = InterceptorContext::new(config)?;
    let config = ctx.config.clone();

    tracing::info!(
        application = %config.application.url,
        service = %config.service.name,
        namespace = %config.service.namespace,
        backpressure = ?config.queue.backpressure,
        checkpoint_enabled = config.checkpoint.enabled,
        heartbeat_enabled = config.heartbeat.enabled,
        "Interceptor starting"
    );

    let mut tasks: Vec<JoinHandle<()>> = Vec::new();

    tasks.push(tokio::spawn(DrainLoop::new(&ctx).run(shutdown.subscribe())));
    tasks.push(tokio::spawn(run_reclaimer(
        ctx.ledger.clone(),
        config.ledger.reclaim_interval(),
        shutdown.subscribe(),
    )));

    if config.checkpoint.enabled {
        let daemon = DaemonClient::new(&config.control)?;
        let coordinator = CheckpointCoordinator::new(&ctx, daemon);
        tasks.push(tokio::spawn(coordinator.run(shutdown.subscribe())));
    } else {
        tracing::info!("Checkpointing disabled");
    }

    if config.heartbeat.enabled {
        let monitor = HeartbeatMonitor::new(&config.application.url, &config.heartbeat, ctx.availability.clone())?;
        tasks.push(tokio::spawn(monitor.run(shutdown.subscribe())));
    } else {
        tracing::info!("Heartbeat disabled");
    }

    let control_server = ControlServer::new(&ctx);
    let control_shutdown = shutdown.subscribe();
    let control_task = tokio::spawn(async move {
        if let Err(e) = control_server.run(control, control_shutdown).await {
            tracing::error!(error = %e, "Control endpoint failed");
        }
    });

    let served = HttpServer::new(&ctx).run(inbound, shutdown.subscribe()).await;

    // The inbound server can also stop on its own error; make sure the rest follows.
    shutdown.trigger();
    let _ = control_task.await;
    for task in tasks {
        let _ = task.await;
    }

    tracing::info!(ledger = ?ctx.ledger.stats(), queue_len = ctx.queue.len(), "Shutdown complete");
    served.map_err(StartupError::from)
}

async fn bind(role: &'static str, address: &str) -> Result<TcpListener, StartupError> {
    let listener = TcpListener::bind(address)
        .await
        .map_err(|source| StartupError::Bind {
            role,
            address: address.to_string(),
            source,
        })?;
    if let Ok(local) = listener.local_addr() {
        tracing::info!(role, address = %local, "Listener bound");
    }
    Ok(listener)
}
