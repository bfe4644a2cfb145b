//! Application health state machine.
//!
//! # States
//! - Healthy: health checks are passing
//! - Unhealthy: the heartbeat has marked the container unavailable
//!
//! # State Transitions
//! ```text
//! Healthy → Unhealthy: consecutive failures >= unhealthy_threshold
//! Unhealthy → Healthy: consecutive successes >= healthy_threshold
//! ```
//!
//! # Design Decisions
//! - Hysteresis prevents flapping
//! - Each outcome resets the opposite counter

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// A state change caused by a health check result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthTransition {
    BecameHealthy,
    BecameUnhealthy,
}

#[derive(Debug)]
pub struct HealthTracker {
    unhealthy: AtomicBool,
    consecutive_failures: AtomicU32,
    consecutive_successes: AtomicU32,
    unhealthy_threshold: u32,
    healthy_threshold: u32,
}

impl HealthTracker {
    pub fn new(unhealthy_threshold: u32, healthy_threshold: u32) -> Self {
        Self {
            unhealthy: AtomicBool::new(false),
            consecutive_failures: AtomicU32::new(0),
            consecutive_successes: AtomicU32::new(0),
            unhealthy_threshold: unhealthy_threshold.max(1),
            healthy_threshold: healthy_threshold.max(1),
        }
    }

    pub fn is_healthy(&self) -> bool {
        !self.unhealthy.load(Ordering::Relaxed)
    }

    pub fn mark_success(&self) -> Option<HealthTransition> {
        self.consecutive_failures.store(0, Ordering::Relaxed);
        if self.is_healthy() {
            return None;
        }

        let successes = self.consecutive_successes.fetch_add(1, Ordering::Relaxed) + 1;
        if successes >= self.healthy_threshold {
            self.unhealthy.store(false, Ordering::Relaxed);
            self.consecutive_successes.store(0, Ordering::Relaxed);
            return Some(HealthTransition::BecameHealthy);
        }
        None
    }

    pub fn mark_failure(&self) -> Option<HealthTransition> {
        self.consecutive_successes.store(0, Ordering::Relaxed);
        if !self.is_healthy() {
            return None;
        }

        let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
        if failures >= self.unhealthy_threshold {
            self.unhealthy.store(true, Ordering::Relaxed);
            self.consecutive_failures.store(0, Ordering::Relaxed);
            return Some(HealthTransition::BecameUnhealthy);
        }
        None
    }
}
