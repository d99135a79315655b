#![allow(dead_code)]

use async_trait::async_trait;
use std::{
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Arc, Once,
    },
    time::Duration,
};
use tracing::Level;
use ua_server_monitor::{
    CreateRequest, DataChangeFilter, EuRange, MonitorLimits, MonitoredItem, MonitoredNode,
    MonitoringParameters, ReadValueId, ValueSampler,
};
use ua_server_types::{AttributeId, DataValue, NodeId, Variant};

static INIT_TRACING: Once = Once::new();

pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(Level::DEBUG)
            .with_target(false)
            .without_time()
            .try_init();
    });
}

pub fn plain_node(key: &str) -> Arc<MonitoredNode> {
    MonitoredNode::new(NodeId::string(2, key))
}

/// Analog node with an EURange and an initial Value reading.
pub fn analog_node(key: &str, low: f64, high: f64, initial: f64) -> Arc<MonitoredNode> {
    let node = plain_node(key);
    node.set_eu_range(Some(EuRange::new(low, high)));
    node.set_value(double(initial));
    node
}

pub fn double(v: f64) -> DataValue {
    DataValue::new_now(Variant::Double(v))
}

pub fn create_request(
    id: u32,
    node: &Arc<MonitoredNode>,
    sampling_interval: Option<f64>,
    queue_size: u32,
    discard_oldest: bool,
    filter: Option<DataChangeFilter>,
) -> CreateRequest {
    CreateRequest {
        monitored_item_id: id,
        item_to_monitor: ReadValueId::value_of(node.node_id().clone()),
        timestamps_to_return: None,
        parameters: MonitoringParameters {
            client_handle: id * 10,
            sampling_interval,
            queue_size,
            discard_oldest,
            filter,
        },
    }
}

pub fn attribute_request(
    id: u32,
    node: &Arc<MonitoredNode>,
    attribute_id: AttributeId,
    queue_size: u32,
) -> CreateRequest {
    let mut request = create_request(id, node, Some(500.0), queue_size, true, None);
    request.item_to_monitor.attribute_id = attribute_id;
    request
}

/// Limits with a low sampling floor so timer tests can run fast.
pub fn fast_limits() -> MonitorLimits {
    MonitorLimits {
        min_sampling_interval_ms: 10.0,
        ..MonitorLimits::default()
    }
}

/// Poll `cond` until it holds or the timeout elapses.
pub async fn wait_until(mut cond: impl FnMut() -> bool, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    cond()
}

pub async fn wait_for_queue_len(item: &Arc<MonitoredItem>, len: usize) {
    let reached = wait_until(|| item.queue_len() >= len, Duration::from_secs(5)).await;
    assert!(
        reached,
        "queue did not reach length {len} (currently {})",
        item.queue_len()
    );
}

/// Sampler producing a strictly increasing value on every call, so every
/// sample passes the default filter.
#[derive(Default)]
pub struct CountingSampler {
    calls: AtomicU64,
}

impl CountingSampler {
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ValueSampler for CountingSampler {
    async fn sample(&self, _last: &DataValue) -> Option<DataValue> {
        let n = self.calls.fetch_add(1, Ordering::Relaxed);
        Some(double(n as f64))
    }
}

/// Sampler that takes `hold` per call and tracks how many calls overlap.
pub struct SlowSampler {
    hold: Duration,
    active: AtomicUsize,
    max_active: AtomicUsize,
    calls: AtomicU64,
}

impl SlowSampler {
    pub fn new(hold: Duration) -> Self {
        SlowSampler {
            hold,
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            calls: AtomicU64::new(0),
        }
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ValueSampler for SlowSampler {
    async fn sample(&self, _last: &DataValue) -> Option<DataValue> {
        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now_active, Ordering::SeqCst);
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.hold).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        Some(double(n as f64))
    }
}
