//! Checkpoint/restore-aware request interceptor.
//!
//! Sits in front of an application container, records every request in a
//! ledger, and holds traffic in a replay queue while a snapshot or restore
//! is underway. After a restore, requests the snapshot did not capture are
//! replayed so no caller loses an answer.

// Core state
pub mod availability;
pub mod context;
pub mod ledger;
pub mod queue;

// Traffic
pub mod http;

// Checkpointing
pub mod checkpoint;
pub mod control;

// Cross-cutting concerns
pub mod config;
pub mod health;
pub mod lifecycle;
pub mod observability;

pub use config::InterceptorConfig;
pub use context::InterceptorContext;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
