//! Biomarker engine
//!
//! The engine validates a [`RunConfig`] once, up front, into a plan of
//! biomarkers with resolved reporting units. It then processes units one at a
//! time: each unit gets its own [`SignalWindow`], every planned biomarker is
//! computed in isolation, and failures become NaN cells plus a recorded
//! [`BiomarkerFailure`] instead of aborting the unit.

use crate::biomarkers::{Biomarker, BiomarkerRegistry};
use crate::config::{MechanicsConfig, RunConfig, SegmentationConfig};
use crate::error::{ComputeError, ConfigError};
use crate::input::RecordingSet;
use crate::report::{BiomarkerFailure, BiomarkerValue, Column, ReportEncoder, ResultTable, UnitResult};
use crate::signal::SignalWindow;
use crate::types::{Channel, ChannelSet, TraceSet};
use crate::units::{UnitCategory, UnitConverter, UnitSpec, DEFAULT_UNIT};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// A requested biomarker with its resolved reporting unit
#[derive(Clone)]
pub struct PlannedBiomarker {
    biomarker: Arc<dyn Biomarker>,
    unit: UnitSpec,
}

impl PlannedBiomarker {
    pub fn name(&self) -> &str {
        self.biomarker.name()
    }

    pub fn unit(&self) -> &UnitSpec {
        &self.unit
    }

    pub fn biomarker(&self) -> &dyn Biomarker {
        self.biomarker.as_ref()
    }
}

/// Serializable description of one planned biomarker
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanEntry {
    pub name: String,
    pub unit: String,
    pub category: UnitCategory,
    pub required_channels: Vec<Channel>,
    pub optional_channels: Vec<Channel>,
}

/// Validated run: computes the planned biomarkers for any number of units
pub struct BiomarkerEngine {
    plan: Vec<PlannedBiomarker>,
    converter: UnitConverter,
    segmentation: SegmentationConfig,
    mechanics: MechanicsConfig,
}

impl BiomarkerEngine {
    /// Validate a configuration against the standard registry and unit table
    pub fn new(config: &RunConfig) -> Result<Self, ConfigError> {
        Self::with_registry(config, &BiomarkerRegistry::standard(), UnitConverter::default())
    }

    /// Validate a configuration against a specific registry and unit table
    pub fn with_registry(
        config: &RunConfig,
        registry: &BiomarkerRegistry,
        converter: UnitConverter,
    ) -> Result<Self, ConfigError> {
        config.segmentation.validate()?;
        config.mechanics.validate()?;

        let mut seen = HashSet::with_capacity(config.biomarkers.len());
        let mut plan = Vec::with_capacity(config.biomarkers.len());

        for request in &config.biomarkers {
            let biomarker = registry.lookup(&request.biomarker)?;
            if !seen.insert(request.biomarker.as_str()) {
                return Err(ConfigError::DuplicateBiomarker(request.biomarker.clone()));
            }

            let unit_name = request.unit.as_deref().unwrap_or(DEFAULT_UNIT);
            let unit = converter
                .table()
                .resolve(unit_name, biomarker.unit_category())?
                .clone();

            plan.push(PlannedBiomarker { biomarker, unit });
        }

        log::debug!("planned {} biomarkers", plan.len());
        Ok(Self {
            plan,
            converter,
            segmentation: config.segmentation,
            mechanics: config.mechanics,
        })
    }

    pub fn plan(&self) -> &[PlannedBiomarker] {
        &self.plan
    }

    pub fn converter(&self) -> &UnitConverter {
        &self.converter
    }

    /// Describe the plan without computing anything
    pub fn describe(&self) -> Vec<PlanEntry> {
        self.plan
            .iter()
            .map(|p| PlanEntry {
                name: p.name().to_string(),
                unit: p.unit.name.clone(),
                category: p.unit.category,
                required_channels: p.biomarker.required_channels().iter().collect(),
                optional_channels: p.biomarker.optional_channels().iter().collect(),
            })
            .collect()
    }

    /// Channels some planned biomarker cannot do without
    pub fn required_channels(&self) -> ChannelSet {
        let mut set = ChannelSet::default();
        for planned in &self.plan {
            for channel in planned.biomarker.required_channels().iter() {
                set.insert(channel);
            }
        }
        set
    }

    /// Channels read only when present, excluding any that are required
    pub fn optional_channels(&self) -> ChannelSet {
        let required = self.required_channels();
        let mut set = ChannelSet::default();
        for planned in &self.plan {
            for channel in planned.biomarker.optional_channels().iter() {
                if !required.contains(channel) {
                    set.insert(channel);
                }
            }
        }
        set
    }

    pub fn columns(&self) -> Vec<Column> {
        self.plan
            .iter()
            .map(|p| Column {
                name: p.name().to_string(),
                unit: p.unit.name.clone(),
            })
            .collect()
    }

    /// Empty table with this plan's columns
    pub fn new_table(&self) -> ResultTable {
        ResultTable::new(self.columns())
    }

    /// Compute every planned biomarker for one unit
    pub fn process_unit(&self, id: &str, traces: TraceSet) -> UnitResult {
        let window = SignalWindow::new(traces, self.segmentation, self.mechanics);
        let mut values = Vec::with_capacity(self.plan.len());
        let mut failures = Vec::new();

        for planned in &self.plan {
            let canonical = match compute_isolated(&window, planned.biomarker()) {
                Ok(value) => value,
                Err(error) => {
                    log::warn!("unit `{id}`: {} failed: {error}", planned.name());
                    failures.push(BiomarkerFailure {
                        biomarker: planned.name().to_string(),
                        error,
                    });
                    f64::NAN
                }
            };

            values.push(BiomarkerValue {
                name: planned.name().to_string(),
                value: planned.unit.from_canonical(canonical),
                unit: planned.unit.name.clone(),
            });
        }

        log::debug!(
            "unit `{id}`: {} of {} biomarkers computed with {} segmentations",
            self.plan.len() - failures.len(),
            self.plan.len(),
            window.segmentations_run()
        );

        UnitResult {
            id: id.to_string(),
            values,
            failures,
        }
    }

    /// Build a trace set from canonical channels and process it.
    ///
    /// An invalid trace set fails every biomarker of the unit.
    pub fn process_channels(&self, id: &str, channels: HashMap<Channel, Vec<f64>>) -> UnitResult {
        match TraceSet::new(channels) {
            Ok(traces) => self.process_unit(id, traces),
            Err(error) => {
                log::warn!("unit `{id}`: {error}");
                self.failed_unit(id, error)
            }
        }
    }

    fn failed_unit(&self, id: &str, error: ComputeError) -> UnitResult {
        UnitResult {
            id: id.to_string(),
            values: self
                .plan
                .iter()
                .map(|p| BiomarkerValue {
                    name: p.name().to_string(),
                    value: f64::NAN,
                    unit: p.unit.name.clone(),
                })
                .collect(),
            failures: self
                .plan
                .iter()
                .map(|p| BiomarkerFailure {
                    biomarker: p.name().to_string(),
                    error: error.clone(),
                })
                .collect(),
        }
    }

    /// Canonicalize and process every unit of a recording set
    pub fn process_recordings(&self, recordings: RecordingSet) -> Result<ResultTable, ConfigError> {
        let units = recordings.canonicalize(&self.converter)?;
        let mut table = self.new_table();
        for unit in units {
            table.push(self.process_channels(&unit.id, unit.channels));
        }

        log::info!(
            "processed {} units, {} failed cells",
            table.rows().len(),
            table.failure_count()
        );
        Ok(table)
    }
}

/// Check declared channels, then compute
fn compute_isolated(window: &SignalWindow, biomarker: &dyn Biomarker) -> Result<f64, ComputeError> {
    let present = window.traces().channels();
    if let Some(missing) = biomarker
        .required_channels()
        .iter()
        .find(|c| !present.contains(*c))
    {
        return Err(ComputeError::ChannelMissing(missing));
    }
    biomarker.compute(window)
}

/// Run configuration JSON plus recording JSON in, JSON report out
pub fn compute_report_json(config_json: &str, recordings_json: &str) -> Result<String, ConfigError> {
    let config = RunConfig::from_json(config_json)?;
    let engine = BiomarkerEngine::new(&config)?;
    let recordings = RecordingSet::from_json(recordings_json)?;
    let table = engine.process_recordings(recordings)?;
    Ok(ReportEncoder::new().encode_to_json(&table)?)
}
