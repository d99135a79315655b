use serde::{Deserialize, Serialize};
use std::fmt;

/// OPC UA status code.
///
/// The upper 16 bits carry the code identifier (severity + sub-code), the
/// lower 16 bits carry flags and info bits. Comparisons that care about
/// *what happened* (e.g. data-change filters) should compare [`code`]
/// rather than the raw value so queue-applied markers do not register as
/// status transitions.
///
/// [`code`]: StatusCode::code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusCode(u32);

/// Info bits layout: bit 10 selects the DataValue info type, bit 7 is the
/// overflow marker within it.
const INFO_TYPE_DATA_VALUE: u32 = 0x0000_0400;
const OVERFLOW_BIT: u32 = 0x0000_0080;
const SEVERITY_BAD: u32 = 0x8000_0000;
const SEVERITY_UNCERTAIN: u32 = 0x4000_0000;
const CODE_MASK: u32 = 0xFFFF_0000;

impl StatusCode {
    pub const GOOD: StatusCode = StatusCode(0x0000_0000);
    /// `Good` with the DataValue info type and overflow bit set. Applied by
    /// the notification queue to the reading adjacent to a drop.
    pub const GOOD_WITH_OVERFLOW_BIT: StatusCode =
        StatusCode(INFO_TYPE_DATA_VALUE | OVERFLOW_BIT);

    pub const BAD_NODE_ID_UNKNOWN: StatusCode = StatusCode(0x8034_0000);
    pub const BAD_ATTRIBUTE_ID_INVALID: StatusCode = StatusCode(0x8035_0000);
    pub const BAD_INDEX_RANGE_INVALID: StatusCode = StatusCode(0x8036_0000);
    pub const BAD_OUT_OF_RANGE: StatusCode = StatusCode(0x803C_0000);
    pub const BAD_MONITORED_ITEM_ID_INVALID: StatusCode = StatusCode(0x8042_0000);
    pub const BAD_MONITORED_ITEM_FILTER_INVALID: StatusCode = StatusCode(0x8043_0000);
    pub const BAD_DEADBAND_FILTER_INVALID: StatusCode = StatusCode(0x808E_0000);
    pub const BAD_DATA_UNAVAILABLE: StatusCode = StatusCode(0x809B_0000);
    pub const BAD_INVALID_ARGUMENT: StatusCode = StatusCode(0x80AB_0000);

    #[inline]
    pub const fn from_bits(bits: u32) -> Self {
        StatusCode(bits)
    }

    #[inline]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Code identifier without flags/info bits.
    #[inline]
    pub const fn code(self) -> u32 {
        self.0 & CODE_MASK
    }

    #[inline]
    pub const fn is_good(self) -> bool {
        self.0 & (SEVERITY_BAD | SEVERITY_UNCERTAIN) == 0
    }

    #[inline]
    pub const fn is_bad(self) -> bool {
        self.0 & SEVERITY_BAD != 0
    }

    #[inline]
    pub const fn has_overflow(self) -> bool {
        self.0 & (INFO_TYPE_DATA_VALUE | OVERFLOW_BIT) == (INFO_TYPE_DATA_VALUE | OVERFLOW_BIT)
    }

    /// Return this status with the overflow marker applied.
    #[inline]
    pub const fn with_overflow(self) -> StatusCode {
        StatusCode(self.0 | INFO_TYPE_DATA_VALUE | OVERFLOW_BIT)
    }

    /// Return this status with the overflow marker removed.
    #[inline]
    pub const fn without_overflow(self) -> StatusCode {
        StatusCode(self.0 & !(INFO_TYPE_DATA_VALUE | OVERFLOW_BIT))
    }

    /// Symbolic name for the codes this subsystem produces or passes through.
    pub fn name(self) -> Option<&'static str> {
        Some(match StatusCode(self.code()) {
            StatusCode::GOOD => {
                if self.has_overflow() {
                    "GoodWithOverflowBit"
                } else {
                    "Good"
                }
            }
            StatusCode::BAD_NODE_ID_UNKNOWN => "BadNodeIdUnknown",
            StatusCode::BAD_ATTRIBUTE_ID_INVALID => "BadAttributeIdInvalid",
            StatusCode::BAD_INDEX_RANGE_INVALID => "BadIndexRangeInvalid",
            StatusCode::BAD_OUT_OF_RANGE => "BadOutOfRange",
            StatusCode::BAD_MONITORED_ITEM_ID_INVALID => "BadMonitoredItemIdInvalid",
            StatusCode::BAD_MONITORED_ITEM_FILTER_INVALID => "BadMonitoredItemFilterInvalid",
            StatusCode::BAD_DEADBAND_FILTER_INVALID => "BadDeadbandFilterInvalid",
            StatusCode::BAD_DATA_UNAVAILABLE => "BadDataUnavailable",
            StatusCode::BAD_INVALID_ARGUMENT => "BadInvalidArgument",
            _ => return None,
        })
    }
}

impl Default for StatusCode {
    fn default() -> Self {
        StatusCode::GOOD
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "0x{:08X}", self.0),
        }
    }
}
