//! Application heartbeat.
//!
//! # Responsibilities
//! - Periodically poll the application's health path
//! - Mark the container unavailable after repeated failures, and available
//!   again once it recovers
//!
//! The application URL may be http or https; certificates are not verified,
//! the same as on the forwarding path.

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use tokio::sync::broadcast;
use tokio::time;

use crate::availability::Availability;
use crate::config::HeartbeatConfig;
use crate::health::state::{HealthTracker, HealthTransition};

pub struct HeartbeatMonitor {
    availability: Arc<Availability>,
    tracker: HealthTracker,
    target: String,
    interval: Duration,
    timeout: Duration,
    client: reqwest::Client,
}

impl HeartbeatMonitor {
    pub fn new(
        application_url: &str,
        config: &HeartbeatConfig,
        availability: Arc<Availability>,
    ) -> reqwest::Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = reqwest::Client::builder()
            .no_proxy()
            .danger_accept_invalid_certs(true)
            .user_agent("cr-interceptor-heartbeat")
            .timeout(timeout)
            .build()?;

        Ok(Self {
            availability,
            tracker: HealthTracker::new(config.unhealthy_threshold, config.healthy_threshold),
            target: health_url(application_url, &config.path),
            interval: Duration::from_secs(config.interval_secs),
            timeout,
            client,
        })
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(target = %self.target, interval = ?self.interval, "Heartbeat monitor starting");

        let mut ticker = time::interval(self.interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Heartbeat monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Poll once and apply the result.
    pub async fn check(&self) -> Option<HealthTransition> {
        let transition = if self.is_healthy().await {
            self.tracker.mark_success()
        } else {
            self.tracker.mark_failure()
        };

        match transition {
            Some(HealthTransition::BecameUnhealthy) => {
                tracing::error!(target = %self.target, "Heartbeat failing, marking container unavailable");
                self.availability.mark_container_unavailable();
            }
            Some(HealthTransition::BecameHealthy) => {
                tracing::info!(target = %self.target, "Heartbeat recovered, marking container available");
                self.availability.mark_container_available();
            }
            None => {}
        }
        transition
    }

    async fn is_healthy(&self) -> bool {
        match self.poll().await {
            Ok(status) if status.is_success() => true,
            Ok(status) => {
                tracing::warn!(status = %status, "Heartbeat failed: non-success status");
                false
            }
            Err(e) if e.is_timeout() => {
                tracing::warn!(timeout = ?self.timeout, "Heartbeat failed: timeout");
                false
            }
            Err(e) => {
                tracing::warn!(error = %e, "Heartbeat failed: connection error");
                false
            }
        }
    }

    /// One GET against the health path.
    pub async fn poll(&self) -> reqwest::Result<StatusCode> {
        let response = self.client.get(&self.target).send().await?;
        Ok(response.status())
    }
}

fn health_url(application_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        application_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::get, Router};

    #[test]
    fn joins_url_and_path() {
        assert_eq!(health_url("http://app:8080/", "health"), "http://app:8080/health");
        assert_eq!(health_url("http://app:8080", "/live"), "http://app:8080/live");
    }

    #[tokio::test]
    async fn unreachable_application_flips_container_flag() {
        let availability = Arc::new(Availability::new());
        let config = HeartbeatConfig {
            unhealthy_threshold: 2,
            healthy_threshold: 1,
            timeout_secs: 1,
            ..HeartbeatConfig::default()
        };
        let monitor = HeartbeatMonitor::new("http://127.0.0.1:9", &config, Arc::clone(&availability)).unwrap();

        assert_eq!(monitor.check().await, None);
        assert!(!availability.is_container_unavailable());
        assert_eq!(monitor.check().await, Some(HealthTransition::BecameUnhealthy));
        assert!(availability.is_container_unavailable());
    }

    #[tokio::test]
    async fn healthy_application_restores_availability() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new().route("/health", get(|| async { "ok" }));
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let availability = Arc::new(Availability::new());
        let config = HeartbeatConfig {
            unhealthy_threshold: 1,
            healthy_threshold: 2,
            ..HeartbeatConfig::default()
        };
        let monitor =
            HeartbeatMonitor::new(&format!("http://{addr}"), &config, Arc::clone(&availability)).unwrap();

        monitor.tracker.mark_failure();
        availability.mark_container_unavailable();

        assert_eq!(monitor.check().await, None);
        assert_eq!(monitor.check().await, Some(HealthTransition::BecameHealthy));
        assert!(!availability.is_container_unavailable());
    }

    #[tokio::test]
    async fn https_application_is_reached_over_tls() {
        // A plain-HTTP listener: the TLS handshake fails, but the scheme itself is accepted.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new().route("/health", get(|| async { "ok" }));
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let config = HeartbeatConfig {
            timeout_secs: 2,
            ..HeartbeatConfig::default()
        };
        let monitor =
            HeartbeatMonitor::new(&format!("https://{addr}"), &config, Arc::new(Availability::new())).unwrap();
        assert_eq!(monitor.target, format!("https://{addr}/health"));

        let error = monitor.poll().await.unwrap_err();
        assert!(!error.is_builder(), "{error}");
        assert!(error.is_connect() || error.is_request(), "{error}");
    }

    #[tokio::test]
    async fn healthy_poll_reports_status() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new().route("/health", get(|| async { StatusCode::SERVICE_UNAVAILABLE }));
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let availability = Arc::new(Availability::new());
        let config = HeartbeatConfig {
            unhealthy_threshold: 1,
            ..HeartbeatConfig::default()
        };
        let monitor =
            HeartbeatMonitor::new(&format!("http://{addr}/"), &config, Arc::clone(&availability)).unwrap();

        assert_eq!(monitor.poll().await.unwrap(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(monitor.check().await, Some(HealthTransition::BecameUnhealthy));
        assert!(availability.is_container_unavailable());
    }
}
