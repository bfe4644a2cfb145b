//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the interceptor.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the interceptor.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct InterceptorConfig {
    /// Inbound listener configuration.
    pub listener: ListenerConfig,

    /// The application this sidecar fronts.
    pub application: ApplicationConfig,

    /// Control channel shared with the checkpoint daemon.
    pub control: ControlConfig,

    /// Periodic snapshot trigger.
    pub checkpoint: CheckpointConfig,

    /// Replay queue and backpressure.
    pub queue: QueueConfig,

    /// Request ledger housekeeping.
    pub ledger: LedgerConfig,

    /// Application liveness polling.
    pub heartbeat: HeartbeatConfig,

    /// Identity reported to the checkpoint daemon.
    pub service: ServiceIdentity,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Backend application settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Base URL of the application, with port (e.g., "http://127.0.0.1:3000").
    pub url: String,

    /// Deadline for a single forwarded request, in seconds.
    pub request_timeout_secs: u64,

    /// Lifetime of idle pooled connections, in seconds.
    pub pool_idle_timeout_secs: u64,

    /// Maximum buffered request body in bytes.
    pub max_body_bytes: usize,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            request_timeout_secs: 60,
            pool_idle_timeout_secs: 5,
            max_body_bytes: 16 * 1024 * 1024,
        }
    }
}

impl ApplicationConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn pool_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.pool_idle_timeout_secs)
    }
}

/// Control channel configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Address the control endpoint listens on (e.g., "0.0.0.0:50052").
    pub bind_address: String,

    /// gRPC endpoint of the checkpoint daemon (e.g., "http://daemon:50051").
    pub daemon_url: String,

    /// Connect and response timeout for calls to the daemon, in seconds.
    pub rpc_timeout_secs: u64,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:50052".to_string(),
            daemon_url: String::new(),
            rpc_timeout_secs: 10,
        }
    }
}

impl ControlConfig {
    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs)
    }
}

/// Checkpoint trigger configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CheckpointConfig {
    /// Enable the periodic snapshot trigger.
    pub enabled: bool,

    /// Interval between snapshot attempts, in seconds.
    pub interval_secs: u64,

    /// How long an attempt waits for the replay queue to drain, in seconds.
    pub drain_wait_secs: u64,

    /// Abandon an attempt whose completion never arrives (0 = wait forever).
    pub completion_timeout_secs: u64,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: 60,
            drain_wait_secs: 30,
            completion_timeout_secs: 0,
        }
    }
}

impl CheckpointConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn drain_wait(&self) -> Duration {
        Duration::from_secs(self.drain_wait_secs)
    }

    pub fn completion_timeout(&self) -> Option<Duration> {
        (self.completion_timeout_secs > 0).then(|| Duration::from_secs(self.completion_timeout_secs))
    }
}

/// What to do with a request that arrives while the application is unavailable.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum BackpressurePolicy {
    /// Queue immediately and hold the caller's connection open.
    #[default]
    Queue,
    /// Poll availability for up to `timeout_secs`, then fail with 502.
    WaitThenFail { timeout_secs: u64 },
}

/// Replay queue configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Drain loop tick, in milliseconds.
    pub drain_tick_ms: u64,

    /// Requests dispatched per drain tick.
    pub batch_size: usize,

    /// Backpressure policy applied to every intercepted request.
    pub backpressure: BackpressurePolicy,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            drain_tick_ms: 10,
            batch_size: 1,
            backpressure: BackpressurePolicy::Queue,
        }
    }
}

impl QueueConfig {
    pub fn drain_tick(&self) -> Duration {
        Duration::from_millis(self.drain_tick_ms)
    }
}

/// Ledger housekeeping configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Interval between reclamation passes, in seconds.
    pub reclaim_interval_secs: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            reclaim_interval_secs: 30,
        }
    }
}

impl LedgerConfig {
    pub fn reclaim_interval(&self) -> Duration {
        Duration::from_secs(self.reclaim_interval_secs)
    }
}

/// Heartbeat configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HeartbeatConfig {
    /// Enable heartbeat polling of the application.
    pub enabled: bool,

    /// Health path polled on the application.
    pub path: String,

    /// Poll interval in seconds.
    pub interval_secs: u64,

    /// Poll timeout in seconds.
    pub timeout_secs: u64,

    /// Consecutive failures before marking the container unavailable.
    pub unhealthy_threshold: u32,

    /// Consecutive successes before marking the container available.
    pub healthy_threshold: u32,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: "health".to_string(),
            interval_secs: 5,
            timeout_secs: 2,
            unhealthy_threshold: 6,
            healthy_threshold: 6,
        }
    }
}

/// Service identity strings.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceIdentity {
    pub name: String,
    pub namespace: String,
    pub registry: String,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
