use thiserror::Error;
use ua_server_types::StatusCode;

pub type MonitorResult<T> = Result<T, MonitorError>;

/// Errors surfaced synchronously from item creation and re-parameterisation.
///
/// Ingestion (`record_value`) and termination never fail; malformed readings
/// are logged and dropped instead.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MonitorError {
    #[error("deadband filter invalid: {reason}")]
    DeadbandFilterInvalid { reason: String },
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter {
        name: &'static str,
        reason: String,
    },
    #[error("monitored item already terminated")]
    Terminated,
    #[error("monitored node released")]
    NodeGone,
}

impl MonitorError {
    /// Status code reported to the service layer for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            MonitorError::DeadbandFilterInvalid { .. } => StatusCode::BAD_DEADBAND_FILTER_INVALID,
            MonitorError::InvalidParameter { .. } => StatusCode::BAD_INVALID_ARGUMENT,
            MonitorError::Terminated => StatusCode::BAD_MONITORED_ITEM_ID_INVALID,
            MonitorError::NodeGone => StatusCode::BAD_NODE_ID_UNKNOWN,
        }
    }
}
