//! Physical units
//!
//! Every physical category has exactly one canonical unit. Inputs are converted
//! to canonical units once at ingestion, all biomarker math runs in canonical
//! units, and values are converted back only when reported.
//!
//! Conversions are ratio-scale: a unit is described by the number of canonical
//! units in one of it, so `to_canonical(x) = x * scale` and
//! `from_canonical(x) = x / scale`.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Pseudo-unit that resolves to the canonical unit of a category
pub const DEFAULT_UNIT: &str = "default";

/// Physical category of a value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitCategory {
    Time,
    Potential,
    Force,
    Length,
    Molar,
    Unitless,
    ForcePerArea,
    VoltPerSecond,
    Frequency,
}

impl UnitCategory {
    pub const ALL: [UnitCategory; 9] = [
        UnitCategory::Time,
        UnitCategory::Potential,
        UnitCategory::Force,
        UnitCategory::Length,
        UnitCategory::Molar,
        UnitCategory::Unitless,
        UnitCategory::ForcePerArea,
        UnitCategory::VoltPerSecond,
        UnitCategory::Frequency,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            UnitCategory::Time => "time",
            UnitCategory::Potential => "potential",
            UnitCategory::Force => "force",
            UnitCategory::Length => "length",
            UnitCategory::Molar => "molar",
            UnitCategory::Unitless => "unitless",
            UnitCategory::ForcePerArea => "force_per_area",
            UnitCategory::VoltPerSecond => "volt_per_second",
            UnitCategory::Frequency => "frequency",
        }
    }
}

impl fmt::Display for UnitCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named unit and its linear scale relative to the canonical unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitSpec {
    pub name: String,
    pub category: UnitCategory,
    /// Canonical units per one of this unit
    pub scale: f64,
    pub canonical: bool,
}

impl UnitSpec {
    pub fn to_canonical(&self, value: f64) -> f64 {
        value * self.scale
    }

    pub fn from_canonical(&self, value: f64) -> f64 {
        value / self.scale
    }
}

/// Immutable table of every supported unit
#[derive(Debug, Clone)]
pub struct UnitTable {
    units: Vec<UnitSpec>,
    by_name: HashMap<String, usize>,
    canonical: HashMap<UnitCategory, usize>,
}

impl UnitTable {
    /// Build the standard SI-based table
    pub fn standard() -> Self {
        use UnitCategory::*;

        let entries: [(UnitCategory, &str, f64); 23] = [
            (Time, "s", 1.0),
            (Time, "ms", 1e-3),
            (Time, "min", 60.0),
            (Potential, "V", 1.0),
            (Potential, "mV", 1e-3),
            (Potential, "uV", 1e-6),
            (Force, "N", 1.0),
            (Force, "mN", 1e-3),
            (Length, "m", 1.0),
            (Length, "mm", 1e-3),
            (Length, "um", 1e-6),
            (Molar, "mol", 1.0),
            (Molar, "mmol", 1e-3),
            (Molar, "umol", 1e-6),
            (Molar, "nmol", 1e-9),
            (Unitless, "unitless", 1.0),
            (ForcePerArea, "N/m2", 1.0),
            (ForcePerArea, "mN/mm2", 1e3),
            (ForcePerArea, "kPa", 1e3),
            (VoltPerSecond, "V/s", 1.0),
            (VoltPerSecond, "mV/ms", 1.0),
            (Frequency, "Hz", 1.0),
            (Frequency, "bpm", 1.0 / 60.0),
        ];

        let mut table = Self {
            units: Vec::with_capacity(entries.len()),
            by_name: HashMap::with_capacity(entries.len()),
            canonical: HashMap::new(),
        };

        for (category, name, scale) in entries {
            let canonical = !table.canonical.contains_key(&category);
            table.push(UnitSpec {
                name: name.to_string(),
                category,
                scale,
                canonical,
            });
        }

        table
    }

    fn push(&mut self, spec: UnitSpec) {
        let idx = self.units.len();
        if spec.canonical {
            self.canonical.insert(spec.category, idx);
        }
        self.by_name.insert(spec.name.clone(), idx);
        self.units.push(spec);
    }

    /// All units in table order
    pub fn units(&self) -> &[UnitSpec] {
        &self.units
    }

    /// Units belonging to one category
    pub fn units_of(&self, category: UnitCategory) -> impl Iterator<Item = &UnitSpec> {
        self.units.iter().filter(move |u| u.category == category)
    }

    /// Canonical unit of a category
    pub fn canonical(&self, category: UnitCategory) -> &UnitSpec {
        // Every category receives its first entry as canonical in `standard`
        &self.units[self.canonical[&category]]
    }

    /// Look up a unit by name
    pub fn lookup(&self, name: &str) -> Result<&UnitSpec, ConfigError> {
        self.by_name
            .get(name)
            .map(|&idx| &self.units[idx])
            .ok_or_else(|| ConfigError::UnknownUnit {
                unit: name.to_string(),
                supported: self.supported_names(),
            })
    }

    /// Resolve a unit name for a category, accepting the `default` pseudo-unit
    pub fn resolve(&self, name: &str, category: UnitCategory) -> Result<&UnitSpec, ConfigError> {
        if name == DEFAULT_UNIT {
            return Ok(self.canonical(category));
        }

        let spec = self.lookup(name)?;
        if spec.category != category {
            return Err(ConfigError::UnitCategoryMismatch {
                unit: name.to_string(),
                expected: category,
                actual: spec.category,
            });
        }
        Ok(spec)
    }

    fn supported_names(&self) -> String {
        self.units
            .iter()
            .map(|u| u.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Converts values between named units and canonical units
#[derive(Debug, Clone)]
pub struct UnitConverter {
    table: Arc<UnitTable>,
}

impl Default for UnitConverter {
    fn default() -> Self {
        Self::new(Arc::new(UnitTable::standard()))
    }
}

impl UnitConverter {
    pub fn new(table: Arc<UnitTable>) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &UnitTable {
        &self.table
    }

    /// Convert a value expressed in `unit` to canonical units
    pub fn to_canonical(&self, value: f64, unit: &str) -> Result<f64, ConfigError> {
        Ok(self.table.lookup(unit)?.to_canonical(value))
    }

    /// Convert a canonical value into `unit`
    pub fn from_canonical(&self, value: f64, unit: &str) -> Result<f64, ConfigError> {
        Ok(self.table.lookup(unit)?.from_canonical(value))
    }

    /// Convert a whole sample sequence in place
    pub fn samples_to_canonical(&self, samples: &mut [f64], unit: &str) -> Result<(), ConfigError> {
        let scale = self.table.lookup(unit)?.scale;
        if scale != 1.0 {
            samples.iter_mut().for_each(|s| *s *= scale);
        }
        Ok(())
    }
}
