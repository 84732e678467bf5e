//! Biomarker registry
//!
//! Every biomarker implements [`Biomarker`]: it declares the channels it reads
//! and the physical category of its result, and computes one canonical scalar
//! from a [`SignalWindow`]. The [`BiomarkerRegistry`] is built once and maps
//! names to instances in registration order.
//!
//! Families:
//! - [`action_potential`]: MDP, CL, APD{N}, dVdtMax, APA, Peak, Rate_AP, RAPP_APD
//! - [`calcium`]: RT{N}{M}, RT{N}Peak, DT{N}{M}, CTD{N}, CAI_DURATION, Rate_Cai,
//!   Cai_Diastolic, Cai_Amplitude
//! - [`mechanics`]: peakTension, cellShortPerc, relaxTime50

pub mod action_potential;
pub mod calcium;
pub mod mechanics;

use crate::error::{ComputeError, ConfigError};
use crate::signal::SignalWindow;
use crate::types::{Channel, ChannelSet};
use crate::units::UnitCategory;
use std::collections::HashMap;
use std::sync::Arc;

/// Percent levels used by the parameterised biomarkers
pub const PERCENT_LEVELS: [u32; 9] = [10, 20, 30, 40, 50, 60, 70, 80, 90];

/// A named scalar computed from one unit's signal window
pub trait Biomarker: Send + Sync {
    /// Registry name, e.g. `APD90`
    fn name(&self) -> &str;

    /// Channels read on every compute path
    fn required_channels(&self) -> ChannelSet;

    /// Channels read only when recorded
    fn optional_channels(&self) -> ChannelSet {
        ChannelSet::default()
    }

    /// Physical category of the result
    fn unit_category(&self) -> UnitCategory;

    /// Compute the value in canonical units
    fn compute(&self, window: &SignalWindow) -> Result<f64, ComputeError>;
}

pub(crate) fn channel_set(channels: &[Channel]) -> ChannelSet {
    channels.iter().copied().collect()
}

/// Name-indexed collection of biomarkers
pub struct BiomarkerRegistry {
    entries: Vec<Arc<dyn Biomarker>>,
    by_name: HashMap<String, usize>,
}

impl Default for BiomarkerRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl BiomarkerRegistry {
    /// An empty registry
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    /// Registry holding every built-in biomarker
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        let builtins = action_potential::all()
            .into_iter()
            .chain(calcium::all())
            .chain(mechanics::all());

        for biomarker in builtins {
            // Built-in names are unique; a clash would be a programming error
            // caught by the registry tests.
            let _ = registry.register(biomarker);
        }
        registry
    }

    /// Add a biomarker; names must be unique
    pub fn register(&mut self, biomarker: Box<dyn Biomarker>) -> Result<(), ConfigError> {
        let name = biomarker.name().to_string();
        if self.by_name.contains_key(&name) {
            return Err(ConfigError::DuplicateBiomarker(name));
        }
        self.by_name.insert(name, self.entries.len());
        self.entries.push(Arc::from(biomarker));
        Ok(())
    }

    /// Shared handle to a registered biomarker
    pub fn lookup(&self, name: &str) -> Result<Arc<dyn Biomarker>, ConfigError> {
        self.by_name
            .get(name)
            .map(|&idx| Arc::clone(&self.entries[idx]))
            .ok_or_else(|| ConfigError::UnknownBiomarker(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Biomarkers in registration order
    pub fn iter(&self) -> impl Iterator<Item = &dyn Biomarker> {
        self.entries.iter().map(|b| b.as_ref())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
