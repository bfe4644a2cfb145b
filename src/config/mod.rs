//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → environment overrides (APPLICATION_URL, SERVICE_NAME, ...)
//!     → validation.rs (semantic checks)
//!     → InterceptorConfig (validated, immutable)
//!     → shared via the interceptor context
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; any error is fatal at startup
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    ApplicationConfig, BackpressurePolicy, CheckpointConfig, ControlConfig, HeartbeatConfig,
    InterceptorConfig, LedgerConfig, ListenerConfig, ObservabilityConfig, QueueConfig,
    ServiceIdentity,
};
