//! The monitored item: per-subscription observer of one
//! `(node, attribute, index range)` triple.
//!
//! Lifecycle: created in the `Invalid` pre-initial mode, activated through
//! [`MonitoredItem::set_monitoring_mode`], re-parameterised through
//! [`MonitoredItem::modify`], drained through
//! [`MonitoredItem::extract_notifications`] and released through
//! [`MonitoredItem::terminate`]. All state mutation happens behind a short
//! critical section; nothing here blocks.

use crate::{
    error::{MonitorError, MonitorResult},
    filter,
    node::{lock_unpoisoned, MonitoredNode},
    params::{self, MonitorLimits, MonitoringParameters},
    queue::NotificationQueue,
    registry::{self, RegistryHandle},
    sampler::{self, SamplerBinding, ValueSampler},
};
use serde::{Deserialize, Serialize};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, MutexGuard, Weak,
};
use tracing::{debug, warn};
use ua_server_types::{
    AttributeId, DataValue, NodeId, NumericRange, StatusCode, TimestampsToReturn,
};

/// Monitoring mode state machine. `Invalid` is the pre-initial state only;
/// it is never a valid transition target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitoringMode {
    Invalid,
    Disabled,
    Sampling,
    Reporting,
}

/// What to observe: node, attribute and optional index range / encoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadValueId {
    pub node_id: NodeId,
    pub attribute_id: AttributeId,
    #[serde(default)]
    pub index_range: Option<NumericRange>,
    #[serde(default)]
    pub data_encoding: Option<String>,
}

impl ReadValueId {
    pub fn value_of(node_id: NodeId) -> Self {
        ReadValueId {
            node_id,
            attribute_id: AttributeId::Value,
            index_range: None,
            data_encoding: None,
        }
    }
}

/// Creation request. Deliberately carries no monitoring mode: items start
/// `Invalid` and are activated exclusively through
/// [`MonitoredItem::set_monitoring_mode`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateRequest {
    pub monitored_item_id: u32,
    pub item_to_monitor: ReadValueId,
    /// Defaults to `Both` when absent.
    #[serde(default)]
    pub timestamps_to_return: Option<TimestampsToReturn>,
    pub parameters: MonitoringParameters,
}

/// Entry handed to the subscription when the queue is drained.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub client_handle: u32,
    pub value: DataValue,
}

/// Outcome of [`MonitoredItem::modify`]. Data-change filters produce no
/// filter result structure, so none is carried here.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ModifyResult {
    pub status_code: StatusCode,
    pub revised_sampling_interval: f64,
    pub revised_queue_size: usize,
}

struct ItemState {
    mode: MonitoringMode,
    client_handle: u32,
    sampling_interval: f64,
    filter: Option<crate::params::DataChangeFilter>,
    timestamps: TimestampsToReturn,
    queue: NotificationQueue,
    /// Baseline for the filter: the last reading accepted into the queue,
    /// initially the unavailable sentinel.
    old_reading: DataValue,
}

pub struct MonitoredItem {
    monitored_item_id: u32,
    item_to_monitor: ReadValueId,
    node: Weak<MonitoredNode>,
    limits: MonitorLimits,
    sampling_fn: Option<Arc<dyn ValueSampler>>,
    state: Mutex<ItemState>,
    sampler: Mutex<SamplerBinding>,
    sampling_in_flight: AtomicBool,
    force_next_sample: AtomicBool,
    terminated: AtomicBool,
    registry: RegistryHandle,
}

impl MonitoredItem {
    /// Create an item in the `Invalid` pre-initial mode.
    ///
    /// Parameters are normalised against `limits` and the filter is
    /// validated against the node; both fail synchronously. `sampling_fn`
    /// is the subscription-supplied sampling function for periodic items;
    /// when `None`, ticks read the node's current value.
    pub fn create(
        request: CreateRequest,
        node: &Arc<MonitoredNode>,
        limits: MonitorLimits,
        sampling_fn: Option<Arc<dyn ValueSampler>>,
    ) -> MonitorResult<Arc<MonitoredItem>> {
        let revised = params::normalize(
            &request.parameters,
            request.item_to_monitor.attribute_id,
            &limits,
        )?;
        params::validate_filter(request.parameters.filter.as_ref(), node)?;

        Ok(Arc::new(MonitoredItem {
            monitored_item_id: request.monitored_item_id,
            item_to_monitor: request.item_to_monitor,
            node: Arc::downgrade(node),
            limits,
            sampling_fn,
            state: Mutex::new(ItemState {
                mode: MonitoringMode::Invalid,
                client_handle: revised.client_handle,
                sampling_interval: revised.sampling_interval,
                filter: revised.filter,
                timestamps: request.timestamps_to_return.unwrap_or_default(),
                queue: NotificationQueue::new(revised.queue_size, revised.discard_oldest),
                old_reading: DataValue::unavailable(),
            }),
            sampler: Mutex::new(SamplerBinding::None),
            sampling_in_flight: AtomicBool::new(false),
            force_next_sample: AtomicBool::new(false),
            terminated: AtomicBool::new(false),
            registry: RegistryHandle::default(),
        }))
    }

    /// Drive the mode state machine.
    ///
    /// Enabling from `Invalid`/`Disabled` binds the sampler and arms the
    /// initial-sample bypass so the first reading is reported regardless of
    /// the filter. `Sampling` and `Reporting` share sampler and queue;
    /// only `Reporting` lets [`extract_notifications`] drain. Disabling
    /// unbinds, clears the queue and resets the overflow marker. Same-mode
    /// transitions are no-ops.
    ///
    /// [`extract_notifications`]: MonitoredItem::extract_notifications
    pub fn set_monitoring_mode(self: &Arc<Self>, mode: MonitoringMode) {
        if self.terminated.load(Ordering::Acquire) {
            warn!(
                item_id = self.monitored_item_id,
                "mode change on terminated item ignored"
            );
            return;
        }
        if mode == MonitoringMode::Invalid {
            warn!(
                item_id = self.monitored_item_id,
                "Invalid is not a valid monitoring mode target"
            );
            return;
        }

        let previous = {
            let mut state = self.lock_state();
            let previous = state.mode;
            if previous == mode {
                return;
            }
            state.mode = mode;
            if mode == MonitoringMode::Disabled {
                state.queue.clear();
            }
            previous
        };
        debug!(
            item_id = self.monitored_item_id,
            from = ?previous,
            to = ?mode,
            "monitoring mode transition"
        );

        match (previous, mode) {
            (_, MonitoringMode::Disabled) => sampler::unbind(self),
            (MonitoringMode::Invalid | MonitoringMode::Disabled, _) => {
                self.force_next_sample.store(true, Ordering::Release);
                sampler::bind(self);
            }
            // Sampling <-> Reporting: sampler and queue untouched.
            _ => {}
        }
    }

    /// Atomically re-parameterise the item.
    ///
    /// The queue is resized under the revised capacity and policy, and a
    /// bound timer is restarted when the revised interval differs. A change
    /// between periodic and exception-based sampling rebinds the strategy.
    pub fn modify(
        self: &Arc<Self>,
        timestamps_to_return: Option<TimestampsToReturn>,
        parameters: MonitoringParameters,
    ) -> MonitorResult<ModifyResult> {
        if self.terminated.load(Ordering::Acquire) {
            return Err(MonitorError::Terminated);
        }
        let node = self.node.upgrade().ok_or(MonitorError::NodeGone)?;
        let revised = params::normalize(
            &parameters,
            self.item_to_monitor.attribute_id,
            &self.limits,
        )?;
        params::validate_filter(parameters.filter.as_ref(), &node)?;

        let (interval_changed, active) = {
            let mut state = self.lock_state();
            state.client_handle = revised.client_handle;
            state.filter = revised.filter;
            if let Some(t) = timestamps_to_return {
                state.timestamps = t;
            }
            state.queue.resize(revised.queue_size, revised.discard_oldest);
            let changed = state.sampling_interval != revised.sampling_interval;
            state.sampling_interval = revised.sampling_interval;
            (
                changed,
                matches!(
                    state.mode,
                    MonitoringMode::Sampling | MonitoringMode::Reporting
                ),
            )
        };

        if interval_changed && active {
            let timer_bound = self.sampler_binding().is_timer();
            if timer_bound && revised.sampling_interval > 0.0 {
                sampler::restart_timer(self, revised.sampling_interval);
            } else {
                // Periodic <-> exception-based flip: replace the strategy.
                sampler::unbind(self);
                sampler::bind(self);
            }
        }

        Ok(ModifyResult {
            status_code: StatusCode::GOOD,
            revised_sampling_interval: revised.sampling_interval,
            revised_queue_size: revised.queue_size,
        })
    }

    /// Single ingestion path for all samplers and direct deliveries.
    ///
    /// `index_range` is the range the producing write covered; deliveries
    /// that do not overlap the monitored range are discarded silently. The
    /// reading is narrowed to the monitored range, filtered against the
    /// baseline and enqueued. Never errors; malformed readings are logged
    /// and dropped.
    pub fn record_value(&self, reading: DataValue, index_range: Option<&NumericRange>) {
        if self.terminated.load(Ordering::Acquire) {
            return;
        }
        let mut state = self.lock_state();
        if !matches!(
            state.mode,
            MonitoringMode::Sampling | MonitoringMode::Reporting
        ) {
            return;
        }

        let monitored_range = self.item_to_monitor.index_range.as_ref();
        if let (Some(written), Some(monitored)) = (index_range, monitored_range) {
            if !written.overlaps(monitored) {
                return;
            }
        }

        let narrowed = match monitored_range {
            None => reading,
            Some(range) => match range.extract(&reading.value) {
                Some(value) => DataValue { value, ..reading },
                None => {
                    debug!(
                        item_id = self.monitored_item_id,
                        range = %range,
                        "reading carries no data for the monitored index range"
                    );
                    return;
                }
            },
        };

        let force = self.force_next_sample.swap(false, Ordering::AcqRel);
        if !force {
            let eu_range = self.node.upgrade().and_then(|n| n.eu_range());
            if !filter::reportable(
                &narrowed,
                &state.old_reading,
                state.filter.as_ref(),
                eu_range.as_ref(),
            ) {
                registry::note_filter_rejection();
                return;
            }
        }

        state.old_reading = narrowed.clone();
        state.queue.enqueue(narrowed);
        registry::note_sample_recorded();
    }

    /// Drain the queue into client notifications.
    ///
    /// Only drains in `Reporting`; in every other mode the queue is left
    /// untouched and an empty list is returned. Timestamps are reduced to
    /// what the item was asked to return.
    pub fn extract_notifications(&self) -> Vec<Notification> {
        let (client_handle, timestamps, drained) = {
            let mut state = self.lock_state();
            if state.mode != MonitoringMode::Reporting {
                return Vec::new();
            }
            (state.client_handle, state.timestamps, state.queue.drain())
        };
        registry::note_notifications_extracted(drained.len());
        drained
            .into_iter()
            .map(|mut value| {
                value.normalise_timestamps(timestamps);
                Notification {
                    client_handle,
                    value,
                }
            })
            .collect()
    }

    /// Release the sampler binding. Idempotent; the queue is left as-is but
    /// is no longer fed, and any in-flight sample decays to a no-op.
    pub fn terminate(&self) {
        if self.terminated.swap(true, Ordering::AcqRel) {
            return;
        }
        sampler::unbind(self);
        debug!(item_id = self.monitored_item_id, "monitored item terminated");
    }

    // === read-only accessors ===

    pub fn monitored_item_id(&self) -> u32 {
        self.monitored_item_id
    }

    pub fn client_handle(&self) -> u32 {
        self.lock_state().client_handle
    }

    pub fn item_to_monitor(&self) -> &ReadValueId {
        &self.item_to_monitor
    }

    pub fn monitoring_mode(&self) -> MonitoringMode {
        self.lock_state().mode
    }

    pub fn sampling_interval(&self) -> f64 {
        self.lock_state().sampling_interval
    }

    pub fn queue_size(&self) -> usize {
        self.lock_state().queue.capacity()
    }

    pub fn discard_oldest(&self) -> bool {
        self.lock_state().queue.discard_oldest()
    }

    pub fn timestamps_to_return(&self) -> TimestampsToReturn {
        self.lock_state().timestamps
    }

    pub fn queue_len(&self) -> usize {
        self.lock_state().queue.len()
    }

    pub fn overflow(&self) -> bool {
        self.lock_state().queue.overflow()
    }

    /// Whether a sampling callback is currently in flight.
    pub fn is_sampling(&self) -> bool {
        self.sampling_in_flight.load(Ordering::Acquire)
    }

    /// Diagnostic clone of the filter baseline.
    pub fn last_reading(&self) -> DataValue {
        self.lock_state().old_reading.clone()
    }

    // === sampler-facing internals ===

    fn lock_state(&self) -> MutexGuard<'_, ItemState> {
        lock_unpoisoned(&self.state)
    }

    pub(crate) fn sampler_binding(&self) -> MutexGuard<'_, SamplerBinding> {
        lock_unpoisoned(&self.sampler)
    }

    pub(crate) fn node(&self) -> Option<Arc<MonitoredNode>> {
        self.node.upgrade()
    }

    pub(crate) fn attribute_id(&self) -> AttributeId {
        self.item_to_monitor.attribute_id
    }

    pub(crate) fn sampling_fn(&self) -> Option<Arc<dyn ValueSampler>> {
        self.sampling_fn.clone()
    }

    pub(crate) fn registry_handle(&self) -> &RegistryHandle {
        &self.registry
    }

    /// Take the at-most-one-outstanding-sample guard. Returns false when a
    /// callback is already in flight.
    pub(crate) fn begin_sample(&self) -> bool {
        !self.sampling_in_flight.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn end_sample(&self) {
        self.sampling_in_flight.store(false, Ordering::Release);
    }

    pub(crate) fn clear_sampling_guard(&self) {
        self.sampling_in_flight.store(false, Ordering::Release);
    }
}

impl Drop for MonitoredItem {
    fn drop(&mut self) {
        sampler::unbind(self);
    }
}

impl std::fmt::Debug for MonitoredItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitoredItem")
            .field("monitored_item_id", &self.monitored_item_id)
            .field("item_to_monitor", &self.item_to_monitor)
            .field("mode", &self.monitoring_mode())
            .field("queue_len", &self.queue_len())
            .finish_non_exhaustive()
    }
}
