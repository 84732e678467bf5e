//! Error types for beatmark
//!
//! Two families: [`ConfigError`] is fatal and raised before any computation,
//! [`ComputeError`] is scoped to one biomarker of one unit and is reported as
//! NaN by the engine.

use crate::types::Channel;
use crate::units::UnitCategory;
use thiserror::Error;

/// Errors that reject a run configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unrecognized biomarker `{0}`")]
    UnknownBiomarker(String),

    #[error("Unsupported unit `{unit}`; supported units: {supported}")]
    UnknownUnit { unit: String, supported: String },

    #[error("Unit `{unit}` is a {actual} unit but {expected} was required")]
    UnitCategoryMismatch {
        unit: String,
        expected: UnitCategory,
        actual: UnitCategory,
    },

    #[error("Biomarker `{0}` requested more than once")]
    DuplicateBiomarker(String),

    #[error("Malformed bounds: {0}")]
    MalformedBounds(String),

    #[error("Unknown channel `{0}`")]
    UnknownChannel(String),

    #[error("Channel `{channel}` given more than once for unit `{unit}`")]
    DuplicateChannel { unit: String, channel: Channel },

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised while computing a single biomarker
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ComputeError {
    #[error("Required channel `{0}` is not present")]
    ChannelMissing(Channel),

    #[error("Insufficient data: {0}")]
    DataInsufficiency(String),

    #[error("Detection failed: {0}")]
    DetectionFailure(String),

    #[error("Invalid trace: {0}")]
    InvalidTrace(String),
}

impl ComputeError {
    /// Stable snake_case identifier used in reports
    pub fn kind(&self) -> &'static str {
        match self {
            ComputeError::ChannelMissing(_) => "channel_missing",
            ComputeError::DataInsufficiency(_) => "data_insufficiency",
            ComputeError::DetectionFailure(_) => "detection_failure",
            ComputeError::InvalidTrace(_) => "invalid_trace",
        }
    }
}
