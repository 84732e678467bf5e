//! beatmark - Beat segmentation and biomarker extraction for cardiac cell recordings
//!
//! Recordings of transmembrane potential, intracellular calcium, stimulus
//! current, active tension and sarcomere length are split into beats, beat
//! landmarks are located, and a registry of unit-carrying biomarker formulas is
//! evaluated per experimental unit:
//! input recordings → canonical units → signal window → beats → biomarkers →
//! reporting units → result table.
//!
//! ## Modules
//!
//! - **Signal**: extrema primitives, beat segmentation, per-unit windows
//! - **Biomarkers**: action-potential, calcium-transient and mechanical metrics
//! - **Engine**: validated runs with per-biomarker failure isolation

pub mod biomarkers;
pub mod config;
pub mod engine;
pub mod error;
pub mod input;
pub mod report;
pub mod signal;
pub mod types;
pub mod units;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

#[cfg(test)]
mod testutil;

pub use biomarkers::{Biomarker, BiomarkerRegistry};
pub use config::{BiomarkerRequest, MechanicsConfig, RunConfig, SegmentationConfig};
pub use engine::{compute_report_json, BiomarkerEngine};
pub use error::{ComputeError, ConfigError};
pub use input::RecordingSet;
pub use report::{ReportEncoder, ResultTable, TableFormat, UnitResult};
pub use signal::{Beat, SignalWindow};
pub use types::{Channel, ChannelSet, TraceSet};
pub use units::{UnitCategory, UnitConverter, UnitTable};

/// Library version embedded in every report
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for reports
pub const PRODUCER_NAME: &str = "beatmark";
