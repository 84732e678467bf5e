//! JSON recordings
//!
//! A [`RecordingSet`] carries one entry per experimental unit, each with named
//! channels in arbitrary supported units:
//!
//! ```json
//! {"units": [{"id": "cell-1", "channels": {
//!     "time": {"unit": "ms", "samples": [0.0, 1.0, 2.0]},
//!     "Vm": {"unit": "mV", "samples": [-80.0, 20.0, -80.0]}
//! }}]}
//! ```
//!
//! Canonicalization stops at the first unknown channel or unit, so a malformed
//! input is rejected as a whole before anything is computed.

use crate::error::ConfigError;
use crate::types::Channel;
use crate::units::{UnitConverter, DEFAULT_UNIT};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

fn default_unit() -> String {
    DEFAULT_UNIT.to_string()
}

/// Samples of one channel in a named unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelRecording {
    #[serde(default = "default_unit")]
    pub unit: String,
    pub samples: Vec<f64>,
}

/// All channels recorded for one unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitRecording {
    pub id: String,
    pub channels: BTreeMap<String, ChannelRecording>,
}

impl UnitRecording {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            channels: BTreeMap::new(),
        }
    }

    /// Builder-style channel insertion
    pub fn with_channel(mut self, channel: Channel, unit: &str, samples: Vec<f64>) -> Self {
        self.channels.insert(
            channel.as_str().to_string(),
            ChannelRecording {
                unit: unit.to_string(),
                samples,
            },
        );
        self
    }

    /// Resolve channel names and convert every channel to canonical units
    pub fn canonicalize(self, converter: &UnitConverter) -> Result<CanonicalRecording, ConfigError> {
        let mut channels = HashMap::with_capacity(self.channels.len());

        for (name, recording) in self.channels {
            let channel: Channel = name.parse()?;
            let spec = converter.table().resolve(&recording.unit, channel.category())?;

            let mut samples = recording.samples;
            converter.samples_to_canonical(&mut samples, &spec.name)?;

            if channels.insert(channel, samples).is_some() {
                return Err(ConfigError::DuplicateChannel {
                    unit: self.id,
                    channel,
                });
            }
        }

        Ok(CanonicalRecording {
            id: self.id,
            channels,
        })
    }
}

/// A unit's channels in canonical units, ready to become a `TraceSet`
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalRecording {
    pub id: String,
    pub channels: HashMap<Channel, Vec<f64>>,
}

/// Recordings for every unit of a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordingSet {
    pub units: Vec<UnitRecording>,
}

impl RecordingSet {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Canonicalize every unit, failing on the first invalid channel or unit
    pub fn canonicalize(self, converter: &UnitConverter) -> Result<Vec<CanonicalRecording>, ConfigError> {
        self.units
            .into_iter()
            .map(|unit| unit.canonicalize(converter))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_canonicalize_converts_units() {
        let json = r#"{"units": [{"id": "cell-1", "channels": {
            "time": {"unit": "ms", "samples": [0.0, 1.0, 2.0]},
            "Vm": {"unit": "mV", "samples": [-80.0, 20.0, -80.0]},
            "Cai": {"samples": [1e-7, 2e-7, 1e-7]}
        }}]}"#;

        let set = RecordingSet::from_json(json).unwrap();
        let units = set.canonicalize(&UnitConverter::default()).unwrap();
        assert_eq!(units.len(), 1);

        let unit = &units[0];
        assert_eq!(unit.id, "cell-1");
        assert_eq!(unit.channels[&Channel::Time], vec![0.0, 0.001, 0.002]);
        let vm = &unit.channels[&Channel::Potential];
        assert!((vm[0] + 0.080).abs() < 1e-12);
        assert!((vm[1] - 0.020).abs() < 1e-12);
        assert_eq!(unit.channels[&Channel::Calcium], vec![1e-7, 2e-7, 1e-7]);
    }

    #[test]
    fn test_rejects_bad_channels_and_units() {
        let converter = UnitConverter::default();

        let mut unknown_channel = UnitRecording::new("a");
        unknown_channel.channels.insert(
            "pressure".to_string(),
            ChannelRecording {
                unit: "default".to_string(),
                samples: vec![0.0],
            },
        );
        assert!(matches!(
            unknown_channel.canonicalize(&converter),
            Err(ConfigError::UnknownChannel(_))
        ));

        let wrong_category = UnitRecording::new("b").with_channel(Channel::Time, "mV", vec![0.0, 1.0]);
        assert!(matches!(
            wrong_category.canonicalize(&converter),
            Err(ConfigError::UnitCategoryMismatch { .. })
        ));

        let unknown_unit = UnitRecording::new("c").with_channel(Channel::Force, "lbf", vec![0.0]);
        assert!(matches!(
            unknown_unit.canonicalize(&converter),
            Err(ConfigError::UnknownUnit { .. })
        ));
    }

    #[test]
    fn test_rejects_aliased_duplicate_channel() {
        let mut unit = UnitRecording::new("d").with_channel(Channel::Potential, "V", vec![0.0]);
        unit.channels.insert(
            "Vm".to_string(),
            ChannelRecording {
                unit: "mV".to_string(),
                samples: vec![0.0],
            },
        );
        assert!(matches!(
            unit.canonicalize(&UnitConverter::default()),
            Err(ConfigError::DuplicateChannel { .. })
        ));
    }

    #[test]
    fn test_json_round_trip() {
        let set = RecordingSet {
            units: vec![UnitRecording::new("x").with_channel(Channel::Time, "s", vec![0.0, 0.5])],
        };
        let loaded = RecordingSet::from_json(&set.to_json().unwrap()).unwrap();
        assert_eq!(loaded, set);
    }
}
