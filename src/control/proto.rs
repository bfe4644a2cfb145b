//! Generated gRPC types for the control channel, and their mapping onto the
//! crate's own message types.

#![allow(clippy::all)]

tonic::include_proto!("protos");

use crate::control::messages;
use crate::ledger::LedgerStats;

impl From<messages::CreateSnapshotRequest> for CreateSnapshotRequest {
    fn from(request: messages::CreateSnapshotRequest) -> Self {
        Self {
            service_name: request.service_name,
            registry_name: request.registry_name,
            namespace: request.namespace,
            latest_request: request.latest_request,
        }
    }
}

impl From<CreateSnapshotRequest> for messages::CreateSnapshotRequest {
    fn from(request: CreateSnapshotRequest) -> Self {
        Self {
            service_name: request.service_name,
            registry_name: request.registry_name,
            namespace: request.namespace,
            latest_request: request.latest_request,
        }
    }
}

impl From<CreateSnapshotResponse> for messages::CreateSnapshotResponse {
    fn from(response: CreateSnapshotResponse) -> Self {
        Self {
            response: response.response,
            error: response.error,
        }
    }
}

impl From<messages::CreateSnapshotResponse> for CreateSnapshotResponse {
    fn from(response: messages::CreateSnapshotResponse) -> Self {
        Self {
            response: response.response,
            error: response.error,
        }
    }
}

impl From<ReplyRequest> for messages::ReplyRequest {
    fn from(request: ReplyRequest) -> Self {
        Self {
            status: request.status,
            latest_request: request.latest_request,
            service_name: request.service_name,
        }
    }
}

impl From<messages::ReplyRequest> for ReplyRequest {
    fn from(request: messages::ReplyRequest) -> Self {
        Self {
            status: request.status,
            latest_request: request.latest_request,
            service_name: request.service_name,
        }
    }
}

impl From<messages::StopAck> for StopRequestsResponse {
    fn from(ack: messages::StopAck) -> Self {
        let LedgerStats {
            pending,
            processed,
            snapshoted,
            latest_sequence,
        } = ack.ledger;
        Self {
            pending: pending as u64,
            processed: processed as u64,
            snapshoted: snapshoted as u64,
            latest_request: latest_sequence,
        }
    }
}

impl From<messages::ReprocessAck> for ReprocessRequestsResponse {
    fn from(ack: messages::ReprocessAck) -> Self {
        Self {
            requeued: ack.requeued as u64,
            dropped: ack.dropped as u64,
        }
    }
}

impl From<messages::ReplyAck> for ReplyResponse {
    fn from(ack: messages::ReplyAck) -> Self {
        Self {
            accepted: ack.accepted,
            marked: ack.marked as u64,
        }
    }
}
