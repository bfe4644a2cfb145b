//! Client side of the control channel: this sidecar calling the checkpoint daemon.

use std::future::Future;

use tonic::transport::{Channel, Endpoint};

use crate::checkpoint::SnapshotDaemon;
use crate::config::ControlConfig;
use crate::control::messages::{CreateSnapshotRequest, CreateSnapshotResponse};
use crate::control::proto;
use crate::control::proto::snapshot_rpc_service_client::SnapshotRpcServiceClient;

/// Failures talking to the daemon.
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("checkpoint daemon call failed: {0}")]
    Status(#[from] tonic::Status),

    #[error("checkpoint daemon rejected snapshot: {0}")]
    Rejected(String),
}

/// gRPC client for the daemon's `SnapshotRPCService`.
///
/// The channel connects lazily and reconnects on its own, so a daemon that
/// starts after the sidecar is picked up on the next tick.
#[derive(Debug, Clone)]
pub struct DaemonClient {
    client: SnapshotRpcServiceClient<Channel>,
}

impl DaemonClient {
    /// Connect and per-call timeouts are both `rpc_timeout_secs`.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn new(config: &ControlConfig) -> Result<Self, tonic::transport::Error> {
        let channel = Endpoint::from_shared(config.daemon_url.clone())?
            .connect_timeout(config.rpc_timeout())
            .timeout(config.rpc_timeout())
            .connect_lazy();

        Ok(Self {
            client: SnapshotRpcServiceClient::new(channel),
        })
    }

    async fn call_create(
        &self,
        request: CreateSnapshotRequest,
    ) -> Result<CreateSnapshotResponse, ControlError> {
        // Clones share the underlying channel.
        let mut client = self.client.clone();
        let response = client
            .create(proto::CreateSnapshotRequest::from(request))
            .await?;
        Ok(response.into_inner().into())
    }
}

impl SnapshotDaemon for DaemonClient {
    fn create_snapshot(
        &self,
        request: CreateSnapshotRequest,
    ) -> impl Future<Output = Result<CreateSnapshotResponse, ControlError>> + Send {
        self.call_create(request)
    }
}
