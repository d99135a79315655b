//! Process-wide monitored-item diagnostics.
//!
//! Samplers register on bind and unregister on unbind; the counters feed
//! server diagnostics and have no behavioural role.

use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

static LIVE_ITEMS: AtomicUsize = AtomicUsize::new(0);
static SAMPLES_RECORDED: AtomicU64 = AtomicU64::new(0);
static NOTIFICATIONS_EXTRACTED: AtomicU64 = AtomicU64::new(0);
static QUEUE_OVERFLOWS: AtomicU64 = AtomicU64::new(0);
static FILTER_REJECTIONS: AtomicU64 = AtomicU64::new(0);

/// Number of items with a live sampler binding.
pub fn live_item_count() -> usize {
    LIVE_ITEMS.load(Ordering::Acquire)
}

/// Point-in-time view of the engine counters.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct MonitorMetricsSnapshot {
    pub live_items: usize,
    pub samples_recorded: u64,
    pub notifications_extracted: u64,
    pub queue_overflows: u64,
    pub filter_rejections: u64,
}

pub fn metrics_snapshot() -> MonitorMetricsSnapshot {
    MonitorMetricsSnapshot {
        live_items: LIVE_ITEMS.load(Ordering::Acquire),
        samples_recorded: SAMPLES_RECORDED.load(Ordering::Relaxed),
        notifications_extracted: NOTIFICATIONS_EXTRACTED.load(Ordering::Relaxed),
        queue_overflows: QUEUE_OVERFLOWS.load(Ordering::Relaxed),
        filter_rejections: FILTER_REJECTIONS.load(Ordering::Relaxed),
    }
}

pub(crate) fn note_sample_recorded() {
    SAMPLES_RECORDED.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn note_notifications_extracted(count: usize) {
    NOTIFICATIONS_EXTRACTED.fetch_add(count as u64, Ordering::Relaxed);
}

pub(crate) fn note_queue_overflow() {
    QUEUE_OVERFLOWS.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn note_filter_rejection() {
    FILTER_REJECTIONS.fetch_add(1, Ordering::Relaxed);
}

/// Per-item handle making register/unregister idempotent. Double-unbind must
/// not drive the live counter negative.
#[derive(Debug, Default)]
pub(crate) struct RegistryHandle {
    registered: AtomicBool,
}

impl RegistryHandle {
    pub(crate) fn register(&self) {
        if !self.registered.swap(true, Ordering::AcqRel) {
            LIVE_ITEMS.fetch_add(1, Ordering::AcqRel);
        }
    }

    pub(crate) fn unregister(&self) {
        if self.registered.swap(false, Ordering::AcqRel) {
            LIVE_ITEMS.fetch_sub(1, Ordering::AcqRel);
        }
    }
}

impl Drop for RegistryHandle {
    fn drop(&mut self) {
        self.unregister();
    }
}
