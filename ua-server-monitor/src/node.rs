//! Engine-facing view of an address-space node.
//!
//! The monitored item observes a node but never owns it: items hold a weak
//! back-reference and subscribe to per-event broadcast channels for change
//! notifications. The hub is lazily populated per event name.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard},
};
use tokio::sync::broadcast;
use tracing::error;
use ua_server_types::{AttributeId, DataValue, NodeId, StatusCode, Variant};

/// Event name fired whenever the Value attribute changes.
pub const EVENT_VALUE_CHANGED: &str = "value_changed";

/// Event name fired when the given attribute changes.
pub fn make_attribute_event_name(attribute_id: AttributeId) -> String {
    format!("attribute_changed_{}", attribute_id.id())
}

/// Lock a `Mutex<T>` without panicking.
///
/// If the mutex is poisoned we log and recover the inner value; item state
/// stays observable even after a panicking sampler task.
pub(crate) fn lock_unpoisoned<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| {
        error!("monitor mutex poisoned; recovering inner value");
        poisoned.into_inner()
    })
}

fn read_unpoisoned<T>(l: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    l.read().unwrap_or_else(|poisoned| {
        error!("monitor rwlock poisoned; recovering inner value");
        poisoned.into_inner()
    })
}

fn write_unpoisoned<T>(l: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    l.write().unwrap_or_else(|poisoned| {
        error!("monitor rwlock poisoned; recovering inner value");
        poisoned.into_inner()
    })
}

/// Engineering-unit bounds of an analog node. Percent deadbands scale
/// against `high - low`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EuRange {
    pub low: f64,
    pub high: f64,
}

impl EuRange {
    pub fn new(low: f64, high: f64) -> Self {
        EuRange { low, high }
    }

    #[inline]
    pub fn span(&self) -> f64 {
        self.high - self.low
    }

    #[inline]
    pub fn contains(&self, v: f64) -> bool {
        v >= self.low && v <= self.high
    }
}

type PostCloneHook = Arc<dyn Fn(&Arc<MonitoredNode>) + Send + Sync>;

/// One observable node: attribute store, engineering ranges and a per-event
/// broadcast hub. Buffer sizing balances burst handling and memory.
const EVENT_CHANNEL_CAPACITY: usize = 256;

pub struct MonitoredNode {
    node_id: NodeId,
    attributes: RwLock<HashMap<AttributeId, DataValue>>,
    eu_range: RwLock<Option<EuRange>>,
    instrument_range: RwLock<Option<EuRange>>,
    events: DashMap<String, broadcast::Sender<DataValue>>,
    post_clone_hooks: Mutex<Vec<PostCloneHook>>,
}

impl MonitoredNode {
    pub fn new(node_id: NodeId) -> Arc<Self> {
        let mut attributes = HashMap::new();
        attributes.insert(AttributeId::Value, DataValue::unavailable());
        Arc::new(MonitoredNode {
            node_id,
            attributes: RwLock::new(attributes),
            eu_range: RwLock::new(None),
            instrument_range: RwLock::new(None),
            events: DashMap::new(),
            post_clone_hooks: Mutex::new(Vec::new()),
        })
    }

    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    /// Current reading of the given attribute; the unavailable sentinel when
    /// the attribute was never written.
    pub fn read_attribute(&self, attribute_id: AttributeId) -> DataValue {
        read_unpoisoned(&self.attributes)
            .get(&attribute_id)
            .cloned()
            .unwrap_or_else(DataValue::unavailable)
    }

    /// Asynchronous read of the Value attribute. This is the suspension
    /// point exception-based items use for their initial sample.
    pub async fn read_value_async(&self) -> DataValue {
        tokio::task::yield_now().await;
        self.read_attribute(AttributeId::Value)
    }

    /// Store an attribute and fire its change event (plus `value_changed`
    /// for the Value attribute).
    pub fn set_attribute(&self, attribute_id: AttributeId, reading: DataValue) {
        write_unpoisoned(&self.attributes).insert(attribute_id, reading.clone());
        self.emit(&make_attribute_event_name(attribute_id), reading.clone());
        if attribute_id.is_value() {
            self.emit(EVENT_VALUE_CHANGED, reading);
        }
    }

    /// Store a new Value reading.
    pub fn set_value(&self, reading: DataValue) {
        self.set_attribute(AttributeId::Value, reading);
    }

    /// Apply a client/driver write to the Value attribute.
    ///
    /// Writes outside the instrument range are rejected with
    /// `BadOutOfRange`, but the rejection is still recorded as the observed
    /// reading so monitored items report it downstream.
    pub fn write_value(&self, value: Variant) -> StatusCode {
        let status = match (self.instrument_range(), f64::try_from(&value)) {
            (Some(range), Ok(v)) if !range.contains(v) => StatusCode::BAD_OUT_OF_RANGE,
            _ => StatusCode::GOOD,
        };
        self.set_value(DataValue::new_now(value).with_status(status));
        status
    }

    pub fn eu_range(&self) -> Option<EuRange> {
        *read_unpoisoned(&self.eu_range)
    }

    pub fn set_eu_range(&self, range: Option<EuRange>) {
        *write_unpoisoned(&self.eu_range) = range;
    }

    pub fn instrument_range(&self) -> Option<EuRange> {
        *read_unpoisoned(&self.instrument_range)
    }

    pub fn set_instrument_range(&self, range: Option<EuRange>) {
        *write_unpoisoned(&self.instrument_range) = range;
    }

    /// Subscribe to a named change event. The channel is created lazily on
    /// first interest.
    pub fn subscribe(&self, event: &str) -> broadcast::Receiver<DataValue> {
        self.events
            .entry(event.to_string())
            .or_insert_with(|| broadcast::channel(EVENT_CHANNEL_CAPACITY).0)
            .value()
            .subscribe()
    }

    /// Best-effort event emission; lagging subscribers are skipped via the
    /// broadcast channel's built-in semantics.
    fn emit(&self, event: &str, reading: DataValue) {
        if let Some(sender) = self.events.get(event) {
            let _ = sender.send(reading);
        }
    }

    /// Register a hook re-run on every clone of this node. Used to
    /// re-install event wiring that keeps derived state in sync (e.g. a
    /// text mirror of an enumerated value).
    pub fn on_clone(&self, hook: impl Fn(&Arc<MonitoredNode>) + Send + Sync + 'static) {
        lock_unpoisoned(&self.post_clone_hooks).push(Arc::new(hook));
    }

    /// Clone this node under a new id. Attributes and ranges are copied,
    /// event subscriptions are not; post-clone hooks run on the clone so
    /// derived wiring is re-installed.
    pub fn clone_node(&self, new_node_id: NodeId) -> Arc<MonitoredNode> {
        let hooks: Vec<PostCloneHook> = lock_unpoisoned(&self.post_clone_hooks).clone();
        let clone = Arc::new(MonitoredNode {
            node_id: new_node_id,
            attributes: RwLock::new(read_unpoisoned(&self.attributes).clone()),
            eu_range: RwLock::new(self.eu_range()),
            instrument_range: RwLock::new(self.instrument_range()),
            events: DashMap::new(),
            post_clone_hooks: Mutex::new(hooks.clone()),
        });
        for hook in &hooks {
            hook(&clone);
        }
        clone
    }
}

impl std::fmt::Debug for MonitoredNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitoredNode")
            .field("node_id", &self.node_id)
            .field("eu_range", &self.eu_range())
            .finish_non_exhaustive()
    }
}
