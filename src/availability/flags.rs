//! The four availability conditions.

use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

use crate::observability::metrics;

/// Independent conditions whose logical OR decides whether new requests are
/// forwarded or queued.
///
/// Each flag has its own setters, and those setters are only reachable from
/// the component that owns the flag:
/// - queue-draining: the drain loop
/// - snapshot-in-progress: the checkpoint coordinator and the daemon's acknowledgment
/// - restore-in-progress: the control endpoint
/// - container-unavailable: lifecycle hooks, the control endpoint and the heartbeat
#[derive(Debug, Default)]
pub struct Availability {
    queue_draining: AtomicBool,
    snapshot_in_progress: AtomicBool,
    restore_in_progress: AtomicBool,
    container_unavailable: AtomicBool,
}

/// Point-in-time copy of the flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityFlags {
    pub queue_draining: bool,
    pub snapshot_in_progress: bool,
    pub restore_in_progress: bool,
    pub container_unavailable: bool,
    pub unavailable: bool,
}

impl Availability {
    pub fn new() -> Self {
        Self::default()
    }

    /// True if any flag is set. Derived on every call, never stored.
    pub fn is_unavailable(&self) -> bool {
        self.is_queue_draining()
            || self.is_snapshot_in_progress()
            || self.is_restore_in_progress()
            || self.is_container_unavailable()
    }

    pub fn is_queue_draining(&self) -> bool {
        self.queue_draining.load(Ordering::SeqCst)
    }

    pub fn is_snapshot_in_progress(&self) -> bool {
        self.snapshot_in_progress.load(Ordering::SeqCst)
    }

    pub fn is_restore_in_progress(&self) -> bool {
        self.restore_in_progress.load(Ordering::SeqCst)
    }

    pub fn is_container_unavailable(&self) -> bool {
        self.container_unavailable.load(Ordering::SeqCst)
    }

    /// Snapshot or restore underway; queued requests must not be dispatched.
    pub fn is_checkpointing(&self) -> bool {
        self.is_snapshot_in_progress() || self.is_restore_in_progress()
    }

    pub fn flags(&self) -> AvailabilityFlags {
        AvailabilityFlags {
            queue_draining: self.is_queue_draining(),
            snapshot_in_progress: self.is_snapshot_in_progress(),
            restore_in_progress: self.is_restore_in_progress(),
            container_unavailable: self.is_container_unavailable(),
            unavailable: self.is_unavailable(),
        }
    }

    pub(crate) fn set_queue_draining(&self, draining: bool) {
        if self.queue_draining.swap(draining, Ordering::SeqCst) != draining {
            tracing::debug!(draining, "Queue draining changed");
            self.publish();
        }
    }

    pub(crate) fn begin_snapshot(&self) {
        self.snapshot_in_progress.store(true, Ordering::SeqCst);
        self.publish();
    }

    pub(crate) fn end_snapshot(&self) {
        self.snapshot_in_progress.store(false, Ordering::SeqCst);
        self.publish();
    }

    pub(crate) fn begin_restore(&self) {
        self.restore_in_progress.store(true, Ordering::SeqCst);
        self.publish();
    }

    pub(crate) fn end_restore(&self) {
        self.restore_in_progress.store(false, Ordering::SeqCst);
        self.publish();
    }

    pub fn mark_container_unavailable(&self) {
        if !self.container_unavailable.swap(true, Ordering::SeqCst) {
            tracing::info!("Container marked unavailable");
            self.publish();
        }
    }

    pub fn mark_container_available(&self) {
        if self.container_unavailable.swap(false, Ordering::SeqCst) {
            tracing::info!("Container marked available");
            self.publish();
        }
    }

    fn publish(&self) {
        metrics::record_availability(&self.flags());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(availability: &Availability, mask: u8) {
        availability.set_queue_draining(mask & 0b0001 != 0);
        if mask & 0b0010 != 0 {
            availability.begin_snapshot();
        } else {
            availability.end_snapshot();
        }
        if mask & 0b0100 != 0 {
            availability.begin_restore();
        } else {
            availability.end_restore();
        }
        if mask & 0b1000 != 0 {
            availability.mark_container_unavailable();
        } else {
            availability.mark_container_available();
        }
    }

    #[test]
    fn unavailable_iff_any_flag_set() {
        let availability = Availability::new();
        for mask in 0u8..16 {
            apply(&availability, mask);
            assert_eq!(
                availability.is_unavailable(),
                mask != 0,
                "mask {:04b}",
                mask
            );
        }
    }

    #[test]
    fn single_flag_toggles_result() {
        let availability = Availability::new();
        assert!(!availability.is_unavailable());

        availability.begin_restore();
        assert!(availability.is_unavailable());
        assert!(availability.is_checkpointing());
        availability.end_restore();
        assert!(!availability.is_unavailable());

        availability.set_queue_draining(true);
        assert!(availability.is_unavailable());
        assert!(!availability.is_checkpointing());
        availability.set_queue_draining(false);
        assert!(!availability.is_unavailable());
    }

    #[test]
    fn flags_are_independent() {
        let availability = Availability::new();
        availability.begin_snapshot();
        availability.mark_container_unavailable();
        availability.mark_container_available();

        let flags = availability.flags();
        assert!(flags.snapshot_in_progress);
        assert!(!flags.container_unavailable);
        assert!(!flags.restore_in_progress);
        assert!(flags.unavailable);
    }
}
