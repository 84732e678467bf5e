//! Run configuration
//!
//! A [`RunConfig`] names the biomarkers to compute (in output order), an
//! optional reporting unit for each, and the tunables of segmentation and of
//! the mechanical searches. All values are in canonical units.

use crate::error::ConfigError;
use crate::signal::peaks::PeakFilter;
use serde::{Deserialize, Serialize};

/// Default number of trailing beats analysed
pub const DEFAULT_BEAT_DEPTH: usize = 4;

/// Potential above which diastolic depolarization has turned into the upstroke (V)
pub const DEFAULT_DIASTOLIC_THRESHOLD: f64 = -0.040;

/// Lag, in samples, of the calcium mid-cycle point comparison
pub const DEFAULT_MCP_LAG: usize = 20;

/// Rise ratio over the lagged calcium value that marks the mid-cycle point
pub const DEFAULT_MCP_RATIO: f64 = 1.2;

/// Half-relaxation search band, as fractions of the twitch amplitude
pub const DEFAULT_RELAX_MIN_TOLERANCE: f64 = 0.001;
pub const DEFAULT_RELAX_TOLERANCE_STEP: f64 = 0.001;
pub const DEFAULT_RELAX_MAX_TOLERANCE: f64 = 0.05;

/// Beat segmentation tunables
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Number of trailing beats to analyse
    pub beat_depth: usize,
    /// Gates applied to valley detection (on the negated signal)
    pub valley_filter: PeakFilter,
    /// Potential marking the diastolic-depolarization point of spontaneous beats
    pub diastolic_threshold: f64,
    pub mcp_lag: usize,
    pub mcp_ratio: f64,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            beat_depth: DEFAULT_BEAT_DEPTH,
            valley_filter: PeakFilter::none(),
            diastolic_threshold: DEFAULT_DIASTOLIC_THRESHOLD,
            mcp_lag: DEFAULT_MCP_LAG,
            mcp_ratio: DEFAULT_MCP_RATIO,
        }
    }
}

impl SegmentationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.beat_depth == 0 {
            return Err(ConfigError::MalformedBounds(
                "beat_depth must be at least 1".to_string(),
            ));
        }
        if self.mcp_lag == 0 {
            return Err(ConfigError::MalformedBounds(
                "mcp_lag must be at least 1 sample".to_string(),
            ));
        }
        if !(self.mcp_ratio.is_finite() && self.mcp_ratio > 0.0) {
            return Err(ConfigError::MalformedBounds(format!(
                "mcp_ratio must be positive, got {}",
                self.mcp_ratio
            )));
        }
        if !self.diastolic_threshold.is_finite() {
            return Err(ConfigError::MalformedBounds(
                "diastolic_threshold must be finite".to_string(),
            ));
        }
        Ok(())
    }
}

/// Tolerance-expanding search used by half-relaxation time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MechanicsConfig {
    pub min_tolerance: f64,
    pub tolerance_step: f64,
    pub max_tolerance: f64,
}

impl Default for MechanicsConfig {
    fn default() -> Self {
        Self {
            min_tolerance: DEFAULT_RELAX_MIN_TOLERANCE,
            tolerance_step: DEFAULT_RELAX_TOLERANCE_STEP,
            max_tolerance: DEFAULT_RELAX_MAX_TOLERANCE,
        }
    }
}

impl MechanicsConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let all_finite = [self.min_tolerance, self.tolerance_step, self.max_tolerance]
            .iter()
            .all(|v| v.is_finite());
        if !all_finite || self.min_tolerance < 0.0 || self.tolerance_step <= 0.0 {
            return Err(ConfigError::MalformedBounds(format!(
                "relaxation tolerances must be finite with a positive step, got min {} step {}",
                self.min_tolerance, self.tolerance_step
            )));
        }
        if self.max_tolerance < self.min_tolerance {
            return Err(ConfigError::MalformedBounds(format!(
                "max_tolerance {} is below min_tolerance {}",
                self.max_tolerance, self.min_tolerance
            )));
        }
        Ok(())
    }
}

/// One requested biomarker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiomarkerRequest {
    pub biomarker: String,
    /// Reporting unit; the biomarker's canonical unit when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl BiomarkerRequest {
    pub fn new(biomarker: &str) -> Self {
        Self {
            biomarker: biomarker.to_string(),
            unit: None,
        }
    }

    pub fn with_unit(biomarker: &str, unit: &str) -> Self {
        Self {
            biomarker: biomarker.to_string(),
            unit: Some(unit.to_string()),
        }
    }
}

/// Everything a run needs besides the recordings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub biomarkers: Vec<BiomarkerRequest>,
    #[serde(default)]
    pub segmentation: SegmentationConfig,
    #[serde(default)]
    pub mechanics: MechanicsConfig,
}

impl RunConfig {
    /// Request biomarkers by name in their canonical units
    pub fn for_biomarkers(names: &[&str]) -> Self {
        Self {
            biomarkers: names.iter().map(|n| BiomarkerRequest::new(n)).collect(),
            ..Default::default()
        }
    }

    /// Load configuration from JSON
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize configuration to JSON
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
