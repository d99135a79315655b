use crate::{
    error::{MonitorError, MonitorResult},
    node::MonitoredNode,
};
use serde::{Deserialize, Serialize};
use ua_server_types::AttributeId;

/// Server-side bounds applied to every create/modify request.
///
/// Defaults follow common server profiles: 50 ms floor, one hour ceiling,
/// 1.5 s default period and queues capped at 5000 readings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MonitorLimits {
    #[serde(default = "MonitorLimits::default_min_sampling_interval_ms")]
    pub min_sampling_interval_ms: f64,
    #[serde(default = "MonitorLimits::default_max_sampling_interval_ms")]
    pub max_sampling_interval_ms: f64,
    #[serde(default = "MonitorLimits::default_sampling_interval_ms")]
    pub default_sampling_interval_ms: f64,
    #[serde(default = "MonitorLimits::default_max_queue_size")]
    pub max_queue_size: usize,
}

impl MonitorLimits {
    fn default_min_sampling_interval_ms() -> f64 {
        50.0
    }
    fn default_max_sampling_interval_ms() -> f64 {
        3_600_000.0
    }
    fn default_sampling_interval_ms() -> f64 {
        1_500.0
    }
    fn default_max_queue_size() -> usize {
        5_000
    }
}

impl Default for MonitorLimits {
    fn default() -> Self {
        MonitorLimits {
            min_sampling_interval_ms: Self::default_min_sampling_interval_ms(),
            max_sampling_interval_ms: Self::default_max_sampling_interval_ms(),
            default_sampling_interval_ms: Self::default_sampling_interval_ms(),
            max_queue_size: Self::default_max_queue_size(),
        }
    }
}

/// What makes a sampled reading reportable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataChangeTrigger {
    /// Status code changed.
    Status,
    /// Status code or value changed (under the configured deadband).
    #[default]
    StatusValue,
    /// Status, value or source timestamp changed.
    StatusValueTimestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeadbandType {
    #[default]
    None,
    Absolute,
    /// Percent of the node's engineering-unit range; analog nodes only.
    Percent,
}

/// Data-change filter as supplied by the client.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DataChangeFilter {
    #[serde(default)]
    pub trigger: DataChangeTrigger,
    #[serde(default)]
    pub deadband_type: DeadbandType,
    #[serde(default)]
    pub deadband_value: f64,
}

impl DataChangeFilter {
    pub fn new(trigger: DataChangeTrigger, deadband_type: DeadbandType, deadband_value: f64) -> Self {
        DataChangeFilter {
            trigger,
            deadband_type,
            deadband_value,
        }
    }
}

/// Client-requested monitoring parameters, before normalisation.
///
/// `sampling_interval` semantics: `None` resolves to the server default,
/// `0` selects exception-based sampling, anything else is clamped into the
/// server bounds. Negative values behave like `None`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MonitoringParameters {
    pub client_handle: u32,
    #[serde(default)]
    pub sampling_interval: Option<f64>,
    pub queue_size: u32,
    #[serde(default = "default_discard_oldest")]
    pub discard_oldest: bool,
    #[serde(default)]
    pub filter: Option<DataChangeFilter>,
}

fn default_discard_oldest() -> bool {
    true
}

/// Parameters after normalisation against [`MonitorLimits`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RevisedParameters {
    pub client_handle: u32,
    pub sampling_interval: f64,
    pub queue_size: usize,
    pub discard_oldest: bool,
    pub filter: Option<DataChangeFilter>,
}

/// Clamp the requested parameters into the server bounds.
///
/// Non-Value attributes are always exception-based, so their interval is
/// forced to zero regardless of the request.
pub(crate) fn normalize(
    params: &MonitoringParameters,
    attribute_id: AttributeId,
    limits: &MonitorLimits,
) -> MonitorResult<RevisedParameters> {
    let sampling_interval = if !attribute_id.is_value() {
        0.0
    } else {
        match params.sampling_interval {
            Some(v) if !v.is_finite() => {
                return Err(MonitorError::InvalidParameter {
                    name: "sampling_interval",
                    reason: format!("must be finite, got {v}"),
                })
            }
            Some(v) if v == 0.0 => 0.0,
            Some(v) if v > 0.0 => {
                v.clamp(limits.min_sampling_interval_ms, limits.max_sampling_interval_ms)
            }
            // Negative means "use the server default", like an absent value.
            _ => limits
                .default_sampling_interval_ms
                .clamp(limits.min_sampling_interval_ms, limits.max_sampling_interval_ms),
        }
    };

    let queue_size = (params.queue_size as usize).clamp(1, limits.max_queue_size.max(1));

    Ok(RevisedParameters {
        client_handle: params.client_handle,
        sampling_interval,
        queue_size,
        discard_oldest: params.discard_oldest,
        filter: params.filter,
    })
}

/// Validate the filter against the target node. Runs at create/modify time;
/// sampling never re-validates.
pub(crate) fn validate_filter(
    filter: Option<&DataChangeFilter>,
    node: &MonitoredNode,
) -> MonitorResult<()> {
    let Some(filter) = filter else {
        return Ok(());
    };
    match filter.deadband_type {
        DeadbandType::None => Ok(()),
        DeadbandType::Absolute => {
            if !filter.deadband_value.is_finite() || filter.deadband_value < 0.0 {
                return Err(MonitorError::DeadbandFilterInvalid {
                    reason: format!(
                        "absolute deadband must be a non-negative finite number, got {}",
                        filter.deadband_value
                    ),
                });
            }
            Ok(())
        }
        DeadbandType::Percent => {
            if !filter.deadband_value.is_finite()
                || !(0.0..=100.0).contains(&filter.deadband_value)
            {
                return Err(MonitorError::DeadbandFilterInvalid {
                    reason: format!(
                        "percent deadband must be within [0, 100], got {}",
                        filter.deadband_value
                    ),
                });
            }
            if node.eu_range().is_none() {
                return Err(MonitorError::DeadbandFilterInvalid {
                    reason: format!(
                        "percent deadband requires an EURange on node {}",
                        node.node_id()
                    ),
                });
            }
            Ok(())
        }
    }
}
