//! Core types for recorded channel data
//!
//! A unit's recording is a [`TraceSet`]: one sample sequence per [`Channel`],
//! all aligned to a strictly increasing time channel and already expressed in
//! canonical units.

use crate::error::{ComputeError, ConfigError};
use crate::units::UnitCategory;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Recorded channel identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Time,
    #[serde(alias = "Vm")]
    Potential,
    #[serde(alias = "Ca", alias = "Cai")]
    Calcium,
    #[serde(alias = "stim")]
    Stimulus,
    Force,
    #[serde(alias = "SL")]
    SarcomereLength,
}

impl Channel {
    pub const ALL: [Channel; 6] = [
        Channel::Time,
        Channel::Potential,
        Channel::Calcium,
        Channel::Stimulus,
        Channel::Force,
        Channel::SarcomereLength,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Time => "time",
            Channel::Potential => "potential",
            Channel::Calcium => "calcium",
            Channel::Stimulus => "stimulus",
            Channel::Force => "force",
            Channel::SarcomereLength => "sarcomere_length",
        }
    }

    /// Physical category the channel's samples are expressed in
    pub fn category(&self) -> UnitCategory {
        match self {
            Channel::Time => UnitCategory::Time,
            Channel::Potential => UnitCategory::Potential,
            Channel::Calcium => UnitCategory::Molar,
            Channel::Stimulus => UnitCategory::Unitless,
            Channel::Force => UnitCategory::ForcePerArea,
            Channel::SarcomereLength => UnitCategory::Length,
        }
    }

    fn bit(&self) -> u8 {
        1 << (*self as u8)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "time" => Ok(Channel::Time),
            "potential" | "Vm" => Ok(Channel::Potential),
            "calcium" | "Ca" | "Cai" => Ok(Channel::Calcium),
            "stimulus" | "stim" => Ok(Channel::Stimulus),
            "force" => Ok(Channel::Force),
            "sarcomere_length" | "SL" => Ok(Channel::SarcomereLength),
            other => Err(ConfigError::UnknownChannel(other.to_string())),
        }
    }
}

/// Compact set of channels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelSet(u8);

impl ChannelSet {
    pub fn insert(&mut self, channel: Channel) {
        self.0 |= channel.bit();
    }

    pub fn contains(&self, channel: Channel) -> bool {
        self.0 & channel.bit() != 0
    }

    pub fn is_subset(&self, other: &ChannelSet) -> bool {
        self.0 & !other.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = Channel> + '_ {
        Channel::ALL.into_iter().filter(|c| self.contains(*c))
    }
}

impl FromIterator<Channel> for ChannelSet {
    fn from_iter<I: IntoIterator<Item = Channel>>(iter: I) -> Self {
        let mut set = ChannelSet::default();
        for channel in iter {
            set.insert(channel);
        }
        set
    }
}

/// Aligned channel samples for one experimental unit, in canonical units
#[derive(Debug, Clone)]
pub struct TraceSet {
    channels: HashMap<Channel, Vec<f64>>,
    len: usize,
}

impl TraceSet {
    /// Validate and wrap a channel map.
    ///
    /// The time channel is mandatory and strictly increasing, and every channel
    /// must have the same number of samples.
    pub fn new(channels: HashMap<Channel, Vec<f64>>) -> Result<Self, ComputeError> {
        let time = channels
            .get(&Channel::Time)
            .ok_or_else(|| ComputeError::InvalidTrace("missing time channel".to_string()))?;

        let len = time.len();
        if len < 2 {
            return Err(ComputeError::InvalidTrace(format!(
                "time channel has {len} samples, at least 2 are needed"
            )));
        }

        if let Some(i) = time.windows(2).position(|w| !(w[1] > w[0])) {
            return Err(ComputeError::InvalidTrace(format!(
                "time is not strictly increasing at sample {}",
                i + 1
            )));
        }

        for (channel, samples) in &channels {
            if samples.len() != len {
                return Err(ComputeError::InvalidTrace(format!(
                    "channel `{channel}` has {} samples but time has {len}",
                    samples.len()
                )));
            }
        }

        Ok(Self { channels, len })
    }

    /// Start a trace set from a time axis
    pub fn from_time(time: Vec<f64>) -> Result<Self, ComputeError> {
        Self::new(HashMap::from([(Channel::Time, time)]))
    }

    /// Add or replace a channel
    pub fn with_channel(mut self, channel: Channel, samples: Vec<f64>) -> Result<Self, ComputeError> {
        if samples.len() != self.len {
            return Err(ComputeError::InvalidTrace(format!(
                "channel `{channel}` has {} samples but time has {}",
                samples.len(),
                self.len
            )));
        }
        self.channels.insert(channel, samples);
        if channel == Channel::Time {
            // A replaced time axis must be re-checked for monotonicity
            return Self::new(self.channels);
        }
        Ok(self)
    }

    pub fn get(&self, channel: Channel) -> Option<&[f64]> {
        self.channels.get(&channel).map(Vec::as_slice)
    }

    pub fn contains(&self, channel: Channel) -> bool {
        self.channels.contains_key(&channel)
    }

    /// Channels present, in canonical order
    pub fn channels(&self) -> ChannelSet {
        self.channels.keys().copied().collect()
    }

    /// Number of samples per channel
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_aliases_deserialize() {
        let vm: Channel = serde_json::from_str("\"Vm\"").unwrap();
        let ca: Channel = serde_json::from_str("\"Cai\"").unwrap();
        let sl: Channel = serde_json::from_str("\"sarcomere_length\"").unwrap();
        assert_eq!(vm, Channel::Potential);
        assert_eq!(ca, Channel::Calcium);
        assert_eq!(sl, Channel::SarcomereLength);
        assert_eq!("stim".parse::<Channel>().unwrap(), Channel::Stimulus);
        assert!("pressure".parse::<Channel>().is_err());
    }

    #[test]
    fn test_channel_set() {
        let required: ChannelSet = [Channel::Time, Channel::Potential].into_iter().collect();
        let mut read = ChannelSet::default();
        read.insert(Channel::Time);
        assert!(read.is_subset(&required));
        read.insert(Channel::Calcium);
        assert!(!read.is_subset(&required));
        assert_eq!(
            read.iter().collect::<Vec<_>>(),
            vec![Channel::Time, Channel::Calcium]
        );
    }

    #[test]
    fn test_trace_set_validation() {
        assert!(TraceSet::from_time(vec![0.0, 1.0, 2.0]).is_ok());
        assert!(matches!(
            TraceSet::from_time(vec![0.0, 1.0, 1.0]),
            Err(ComputeError::InvalidTrace(_))
        ));
        assert!(matches!(
            TraceSet::from_time(vec![0.0]),
            Err(ComputeError::InvalidTrace(_))
        ));
        assert!(matches!(
            TraceSet::new(HashMap::from([(Channel::Potential, vec![0.0, 1.0])])),
            Err(ComputeError::InvalidTrace(_))
        ));

        let traces = TraceSet::from_time(vec![0.0, 1.0, 2.0]).unwrap();
        assert!(traces
            .clone()
            .with_channel(Channel::Potential, vec![1.0, 2.0])
            .is_err());
        let traces = traces
            .with_channel(Channel::Potential, vec![-0.08, 0.02, -0.08])
            .unwrap();
        assert!(traces.contains(Channel::Potential));
        assert_eq!(traces.len(), 3);
    }
}
