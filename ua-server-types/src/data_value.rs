use crate::{StatusCode, Variant};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which timestamps a notification keeps when it is handed to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampsToReturn {
    Source,
    Server,
    #[default]
    Both,
    Neither,
}

/// A value observed at one instant: payload, quality and timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataValue {
    pub value: Variant,
    pub status: StatusCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_picoseconds: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_picoseconds: Option<u16>,
}

impl DataValue {
    /// Good reading stamped with the current instant on both clocks.
    pub fn new_now(value: Variant) -> Self {
        let now = Utc::now();
        DataValue {
            value,
            status: StatusCode::GOOD,
            source_timestamp: Some(now),
            source_picoseconds: None,
            server_timestamp: Some(now),
            server_picoseconds: None,
        }
    }

    /// Reading stamped with an explicit instant on both clocks.
    pub fn new_at(value: Variant, at: DateTime<Utc>) -> Self {
        DataValue {
            value,
            status: StatusCode::GOOD,
            source_timestamp: Some(at),
            source_picoseconds: None,
            server_timestamp: Some(at),
            server_picoseconds: None,
        }
    }

    /// Baseline sentinel used before any sample was taken.
    pub fn unavailable() -> Self {
        DataValue {
            value: Variant::Empty,
            status: StatusCode::BAD_DATA_UNAVAILABLE,
            source_timestamp: None,
            source_picoseconds: None,
            server_timestamp: None,
            server_picoseconds: None,
        }
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Drop the timestamps the client did not ask for.
    pub fn normalise_timestamps(&mut self, which: TimestampsToReturn) {
        match which {
            TimestampsToReturn::Both => {}
            TimestampsToReturn::Source => {
                self.server_timestamp = None;
                self.server_picoseconds = None;
            }
            TimestampsToReturn::Server => {
                self.source_timestamp = None;
                self.source_picoseconds = None;
            }
            TimestampsToReturn::Neither => {
                self.source_timestamp = None;
                self.source_picoseconds = None;
                self.server_timestamp = None;
                self.server_picoseconds = None;
            }
        }
    }
}

impl Default for DataValue {
    fn default() -> Self {
        DataValue::unavailable()
    }
}
