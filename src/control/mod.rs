//! Control channel with the checkpoint daemon.
//!
//! # Data Flow
//! ```text
//! Daemon → this sidecar (server.rs, service.rs), gRPC protos.InterceptorRPCService:
//!     StopRequests       → hold traffic for a restore
//!     ReprocessRequests  → replay unsnapshoted requests, resume
//!     Reply              → snapshot finished up to a watermark
//!   plus GET /v1/stats (JSON) on the same port for operators
//!
//! This sidecar → daemon (client.rs), gRPC protos.SnapshotRPCService:
//!     Create
//! ```
//!
//! The wire schema lives in `proto/interceptor.proto`; messages.rs holds
//! the crate-side types the rest of the code works with.

pub mod client;
pub mod messages;
pub mod proto;
pub mod server;
pub mod service;

pub use client::{ControlError, DaemonClient};
pub use server::ControlServer;
pub use service::ControlService;
