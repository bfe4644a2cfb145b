//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (intervals > 0, thresholds > 0)
//! - Check that URLs and socket addresses parse
//! - Require the service identity reported to the daemon
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: InterceptorConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use url::Url;

use crate::config::schema::{BackpressurePolicy, InterceptorConfig};

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{0} can't be empty")]
    Empty(&'static str),

    #[error("{field} is not a valid URL: {value}")]
    InvalidUrl { field: &'static str, value: String },

    #[error("{field} is not a valid socket address: {value}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// Validate a loaded configuration.
pub fn validate_config(config: &InterceptorConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_url(&mut errors, "application.url", &config.application.url);
    check_addr(&mut errors, "listener.bind_address", &config.listener.bind_address);
    check_addr(&mut errors, "control.bind_address", &config.control.bind_address);

    if config.checkpoint.enabled {
        check_url(&mut errors, "control.daemon_url", &config.control.daemon_url);
    }

    check_non_empty(&mut errors, "service.name", &config.service.name);
    check_non_empty(&mut errors, "service.namespace", &config.service.namespace);
    check_non_empty(&mut errors, "service.registry", &config.service.registry);

    check_positive(&mut errors, "checkpoint.interval_secs", config.checkpoint.interval_secs);
    check_positive(&mut errors, "control.rpc_timeout_secs", config.control.rpc_timeout_secs);
    check_positive(&mut errors, "application.request_timeout_secs", config.application.request_timeout_secs);
    check_positive(&mut errors, "queue.drain_tick_ms", config.queue.drain_tick_ms);
    check_positive(&mut errors, "queue.batch_size", config.queue.batch_size as u64);
    check_positive(&mut errors, "ledger.reclaim_interval_secs", config.ledger.reclaim_interval_secs);

    if let BackpressurePolicy::WaitThenFail { timeout_secs } = config.queue.backpressure {
        check_positive(&mut errors, "queue.backpressure.timeout_secs", timeout_secs);
    }

    if config.heartbeat.enabled {
        check_non_empty(&mut errors, "heartbeat.path", &config.heartbeat.path);
        check_positive(&mut errors, "heartbeat.interval_secs", config.heartbeat.interval_secs);
        check_positive(&mut errors, "heartbeat.timeout_secs", config.heartbeat.timeout_secs);
        check_positive(&mut errors, "heartbeat.unhealthy_threshold", config.heartbeat.unhealthy_threshold as u64);
        check_positive(&mut errors, "heartbeat.healthy_threshold", config.heartbeat.healthy_threshold as u64);
    }

    if config.observability.metrics_enabled {
        check_addr(&mut errors, "observability.metrics_address", &config.observability.metrics_address);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_non_empty(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.trim().is_empty() {
        errors.push(ValidationError::Empty(field));
    }
}

fn check_url(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.trim().is_empty() {
        errors.push(ValidationError::Empty(field));
    } else if Url::parse(value).is_err() {
        errors.push(ValidationError::InvalidUrl {
            field,
            value: value.to_string(),
        });
    }
}

fn check_addr(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}

fn check_positive(errors: &mut Vec<ValidationError>, field: &'static str, value: u64) {
    if value == 0 {
        errors.push(ValidationError::Zero(field));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> InterceptorConfig {
        let mut config = InterceptorConfig::default();
        config.application.url = "http://127.0.0.1:3000".into();
        config.service.name = "orders".into();
        config.service.namespace = "shop".into();
        config.service.registry = "registry.local".into();
        config
    }

    #[test]
    fn accepts_minimal_config() {
        assert!(validate_config(&valid()).is_ok());
    }

    #[test]
    fn reports_every_error() {
        let mut config = valid();
        config.application.url = String::new();
        config.service.name = " ".into();
        config.checkpoint.interval_secs = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.contains(&ValidationError::Empty("application.url")));
        assert!(errors.contains(&ValidationError::Empty("service.name")));
        assert!(errors.contains(&ValidationError::Zero("checkpoint.interval_secs")));
    }

    #[test]
    fn daemon_url_required_only_when_checkpointing() {
        let mut config = valid();
        assert!(validate_config(&config).is_ok());

        config.checkpoint.enabled = true;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors, vec![ValidationError::Empty("control.daemon_url")]);

        config.control.daemon_url = "http://daemon:50051".into();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn rejects_bad_listener_address() {
        let mut config = valid();
        config.listener.bind_address = "localhost".into();
        let errors = validate_config(&config).unwrap_err();
        assert!(matches!(
            errors[0],
            ValidationError::InvalidAddress { field: "listener.bind_address", .. }
        ));
    }
}
