//! Data-change filter evaluation.
//!
//! Decides whether a narrowed reading is a reportable change against the
//! item's baseline. Status comparison ignores info bits so queue-applied
//! overflow markers never register as status transitions.

use crate::{
    node::EuRange,
    params::{DataChangeFilter, DataChangeTrigger, DeadbandType},
};
use ua_server_types::{DataValue, Variant};

/// Whether `new` is a reportable change relative to `old`.
///
/// With no filter configured, a change of status or any value difference
/// reports (equivalent to a StatusValue trigger with no deadband).
pub(crate) fn reportable(
    new: &DataValue,
    old: &DataValue,
    filter: Option<&DataChangeFilter>,
    eu_range: Option<&EuRange>,
) -> bool {
    let Some(filter) = filter else {
        return status_changed(new, old)
            || value_changed(&new.value, &old.value, DeadbandType::None, 0.0, None);
    };
    match filter.trigger {
        DataChangeTrigger::Status => status_changed(new, old),
        DataChangeTrigger::StatusValue => {
            status_changed(new, old)
                || value_changed(
                    &new.value,
                    &old.value,
                    filter.deadband_type,
                    filter.deadband_value,
                    eu_range,
                )
        }
        DataChangeTrigger::StatusValueTimestamp => {
            status_changed(new, old)
                || value_changed(
                    &new.value,
                    &old.value,
                    filter.deadband_type,
                    filter.deadband_value,
                    eu_range,
                )
                || source_timestamp_changed(new, old)
        }
    }
}

fn status_changed(new: &DataValue, old: &DataValue) -> bool {
    new.status.code() != old.status.code()
}

fn source_timestamp_changed(new: &DataValue, old: &DataValue) -> bool {
    new.source_timestamp != old.source_timestamp
        || new.source_picoseconds != old.source_picoseconds
}

/// Value comparison under the configured deadband.
///
/// Percent deadbands have been validated against the node at create/modify
/// time; if the EURange disappeared since, the comparison degrades to plain
/// inequality rather than dropping changes.
fn value_changed(
    new: &Variant,
    old: &Variant,
    deadband_type: DeadbandType,
    deadband_value: f64,
    eu_range: Option<&EuRange>,
) -> bool {
    let threshold = match deadband_type {
        DeadbandType::None => return new != old,
        DeadbandType::Absolute => deadband_value,
        DeadbandType::Percent => match eu_range {
            Some(range) => deadband_value / 100.0 * range.span(),
            None => return new != old,
        },
    };
    exceeds_deadband(new, old, threshold)
}

fn exceeds_deadband(new: &Variant, old: &Variant, threshold: f64) -> bool {
    match (new, old) {
        // Arrays compare element-wise; any changed element reports the
        // whole array. A shape change always reports.
        (Variant::Array(a), Variant::Array(b)) => {
            a.len() != b.len()
                || a.iter()
                    .zip(b.iter())
                    .any(|(x, y)| exceeds_deadband(x, y, threshold))
        }
        // 64-bit integers compare as (high, low) word pairs: differing high
        // words always report, avoiding silent wrap through an f64 cast.
        (Variant::Int64(a), Variant::Int64(b)) => {
            if (a >> 32) != (b >> 32) {
                return true;
            }
            low_word_delta(*a as u32, *b as u32) > threshold
        }
        (Variant::UInt64(a), Variant::UInt64(b)) => {
            if (a >> 32) != (b >> 32) {
                return true;
            }
            low_word_delta(*a as u32, *b as u32) > threshold
        }
        _ => match (f64::try_from(new), f64::try_from(old)) {
            (Ok(a), Ok(b)) => (a - b).abs() > threshold,
            // Deadbands only apply to numeric values; anything else falls
            // back to inequality.
            _ => new != old,
        },
    }
}

fn low_word_delta(a: u32, b: u32) -> f64 {
    (a as i64 - b as i64).abs() as f64
}
