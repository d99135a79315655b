//! Sampling strategies.
//!
//! One binding per item, chosen at bind time: a periodic timer for Value
//! attributes with a positive interval, a `value_changed` listener for
//! exception-based Value items, and a per-attribute listener for everything
//! else. Tasks hold a weak reference to the item and exit when it goes away;
//! unbinding cancels the token and aborts the task, which is safe from
//! inside a sampler callback because the abort lands at the next await
//! point.

use crate::{
    item::MonitoredItem,
    node::{make_attribute_event_name, MonitoredNode, EVENT_VALUE_CHANGED},
};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::{
    sync::broadcast,
    task::JoinHandle,
    time::{interval, interval_at, Duration, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use ua_server_types::DataValue;

/// Sampling function supplied by the owning subscription for periodic
/// items. The default behaviour (when none is supplied) reads the node's
/// current value.
#[async_trait]
pub trait ValueSampler: Send + Sync {
    /// Produce the next reading given the current baseline. `None` means no
    /// reading this tick; the baseline stays authoritative.
    async fn sample(&self, last: &DataValue) -> Option<DataValue>;
}

pub(crate) struct SamplerTask {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl SamplerTask {
    fn release(self) {
        self.token.cancel();
        if !self.handle.is_finished() {
            self.handle.abort();
        }
    }
}

pub(crate) enum SamplerBinding {
    None,
    Timer { task: SamplerTask, period_ms: f64 },
    AttributeEvent { task: SamplerTask },
    ValueEvent { task: SamplerTask },
}

impl SamplerBinding {
    pub(crate) fn is_timer(&self) -> bool {
        matches!(self, SamplerBinding::Timer { .. })
    }
}

/// Bind the strategy matching the item's parameters, replacing any previous
/// binding. The caller has already moved the item into an active mode and
/// armed the initial-sample bypass.
pub(crate) fn bind(item: &Arc<MonitoredItem>) {
    let Some(node) = item.node() else {
        warn!(
            item_id = item.monitored_item_id(),
            "node released before sampler bind"
        );
        return;
    };

    let mut binding = item.sampler_binding();
    release_binding(&mut binding, item);

    let attribute_id = item.attribute_id();
    *binding = if !attribute_id.is_value() {
        // Exception-based attribute listener; the initial sample is a
        // synchronous attribute read.
        item.record_value(node.read_attribute(attribute_id), None);
        SamplerBinding::AttributeEvent {
            task: spawn_event_task(item, &node, &make_attribute_event_name(attribute_id)),
        }
    } else if item.sampling_interval() == 0.0 {
        let task = spawn_event_task(item, &node, EVENT_VALUE_CHANGED);
        spawn_initial_value_read(item, &node, task.token.clone());
        SamplerBinding::ValueEvent { task }
    } else {
        let period_ms = item.sampling_interval();
        SamplerBinding::Timer {
            task: spawn_timer_task(item, period_ms, true),
            period_ms,
        }
    };
    item.registry_handle().register();
}

/// Release the current binding, if any. Idempotent.
pub(crate) fn unbind(item: &MonitoredItem) {
    let mut binding = item.sampler_binding();
    release_binding(&mut binding, item);
}

fn release_binding(binding: &mut SamplerBinding, item: &MonitoredItem) {
    match std::mem::replace(binding, SamplerBinding::None) {
        SamplerBinding::None => return,
        SamplerBinding::Timer { task, .. } => task.release(),
        SamplerBinding::AttributeEvent { task } => task.release(),
        SamplerBinding::ValueEvent { task } => task.release(),
    }
    item.clear_sampling_guard();
    item.registry_handle().unregister();
}

/// Restart a bound timer with a new period. The first tick of the restarted
/// timer fires one full period out; only the initial bind samples
/// immediately.
pub(crate) fn restart_timer(item: &Arc<MonitoredItem>, period_ms: f64) {
    let mut binding = item.sampler_binding();
    if let SamplerBinding::Timer {
        task,
        period_ms: bound_period,
    } = &mut *binding
    {
        let old = std::mem::replace(task, spawn_timer_task(item, period_ms, false));
        old.release();
        *bound_period = period_ms;
    }
}

fn spawn_timer_task(
    item: &Arc<MonitoredItem>,
    period_ms: f64,
    immediate_first_tick: bool,
) -> SamplerTask {
    let weak = Arc::downgrade(item);
    let token = CancellationToken::new();
    let task_token = token.clone();
    let period = Duration::from_secs_f64((period_ms / 1_000.0).max(0.001));

    let handle = tokio::spawn(async move {
        let mut ticker = if immediate_first_tick {
            interval(period)
        } else {
            interval_at(Instant::now() + period, period)
        };
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = task_token.cancelled() => break,
                _ = ticker.tick() => {
                    let Some(item) = weak.upgrade() else { break };
                    sample_once(&item).await;
                }
            }
        }
    });
    SamplerTask { token, handle }
}

async fn sample_once(item: &Arc<MonitoredItem>) {
    if !item.begin_sample() {
        warn!(
            item_id = item.monitored_item_id(),
            "previous sampling callback still in flight, skipping tick"
        );
        return;
    }
    let last = item.last_reading();
    let sampled = match item.sampling_fn() {
        Some(sampler) => sampler.sample(&last).await,
        None => match item.node() {
            Some(node) => Some(node.read_value_async().await),
            None => None,
        },
    };
    match sampled {
        Some(reading) => item.record_value(reading, None),
        None => debug!(
            item_id = item.monitored_item_id(),
            "sampling produced no reading, baseline unchanged"
        ),
    }
    item.end_sample();
}

/// One-shot asynchronous read feeding the initial sample of an
/// exception-based Value item. The listener's token cancels it with the
/// binding.
fn spawn_initial_value_read(
    item: &Arc<MonitoredItem>,
    node: &Arc<MonitoredNode>,
    token: CancellationToken,
) {
    if !item.begin_sample() {
        warn!(
            item_id = item.monitored_item_id(),
            "initial read skipped, sampling already in flight"
        );
        return;
    }
    let weak = Arc::downgrade(item);
    let node = Arc::clone(node);
    tokio::spawn(async move {
        tokio::select! {
            _ = token.cancelled() => {}
            reading = node.read_value_async() => {
                if let Some(item) = weak.upgrade() {
                    item.record_value(reading, None);
                    item.end_sample();
                }
            }
        }
    });
}

fn spawn_event_task(
    item: &Arc<MonitoredItem>,
    node: &Arc<MonitoredNode>,
    event: &str,
) -> SamplerTask {
    let mut rx = node.subscribe(event);
    let weak = Arc::downgrade(item);
    let token = CancellationToken::new();
    let task_token = token.clone();
    let event_name = event.to_string();

    let handle = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = task_token.cancelled() => break,
                received = rx.recv() => match received {
                    Ok(reading) => {
                        let Some(item) = weak.upgrade() else { break };
                        item.record_value(reading, None);
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(event = %event_name, missed, "change listener lagged, notifications lost");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }
    });
    SamplerTask { token, handle }
}
