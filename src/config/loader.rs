//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;

use crate::config::schema::InterceptorConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("{var} must be {expected}, got {value:?}")]
    Env {
        var: &'static str,
        expected: &'static str,
        value: String,
    },

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load the configuration: optional TOML file, then environment overrides, then validation.
pub fn load_config(path: Option<&Path>) -> Result<InterceptorConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => InterceptorConfig::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Overlay the sidecar's environment variables onto `config`.
///
/// `lookup` returns the raw value of a variable, if set.
pub fn apply_env_overrides<F>(config: &mut InterceptorConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup("APPLICATION_URL") {
        config.application.url = url;
    }

    if let Some(port) = lookup("INTERCEPTOR_PORT") {
        let digits = port.trim_start_matches(':');
        let port: u16 = digits.parse().map_err(|_| ConfigError::Env {
            var: "INTERCEPTOR_PORT",
            expected: "a port number",
            value: port.clone(),
        })?;
        config.listener.bind_address = format!("0.0.0.0:{}", port);
    }

    if let Some(value) = lookup("HEARTBEAT_ENABLED") {
        config.heartbeat.enabled = parse_bool("HEARTBEAT_ENABLED", &value)?;
    }

    if let Some(path) = lookup("HEARTBEAT_PATH") {
        config.heartbeat.path = path;
    }

    if let Some(value) = lookup("CHECKPOINT_ENABLED") {
        config.checkpoint.enabled = parse_bool("CHECKPOINT_ENABLED", &value)?;
    }

    if let Some(value) = lookup("CHECKPOINT_INTERVAL") {
        config.checkpoint.interval_secs = value.trim().parse().map_err(|_| ConfigError::Env {
            var: "CHECKPOINT_INTERVAL",
            expected: "a number of seconds",
            value: value.clone(),
        })?;
    }

    if let Some(namespace) = lookup("NAMESPACE") {
        config.service.namespace = namespace;
    }

    if let Some(name) = lookup("SERVICE_NAME") {
        config.service.name = name;
    }

    if let Some(registry) = lookup("REGISTRY_NAME") {
        config.service.registry = registry;
    }

    if let Some(url) = lookup("DAEMON_GRPC_URL") {
        config.control.daemon_url = with_scheme(&url);
    }

    if let Some(addr) = lookup("GRPC_URL") {
        config.control.bind_address = bind_address(&addr);
    }

    Ok(())
}

/// Accepts `1`/`0`, `t`/`f` and `true`/`false` in upper, lower or title case.
fn parse_bool(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim() {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Ok(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Ok(false),
        _ => Err(ConfigError::Env {
            var,
            expected: "a boolean",
            value: value.to_string(),
        }),
    }
}

fn with_scheme(url: &str) -> String {
    if url.contains("://") {
        url.to_string()
    } else {
        format!("http://{}", url)
    }
}

fn bind_address(addr: &str) -> String {
    let addr = addr.split("://").last().unwrap_or(addr);
    if addr.starts_with(':') {
        format!("0.0.0.0{}", addr)
    } else {
        addr.to_string()
    }
}
