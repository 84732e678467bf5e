//! Calcium-transient biomarkers
//!
//! Levels are percentages of the transient amplitude measured from the
//! mid-cycle point (MCP) to the peak: `level(p) = ca[mcp] + p/100 * A` with
//! `A = ca[top] - ca[mcp]`. Crossings are located by first-index search, not
//! interpolation.
//!
//! Decay-side searches run over the stitched range `[top, end]`, which includes
//! the first sample of the following beat, so they only use the first
//! `beat_depth - 1` beats.

use super::{channel_set, Biomarker, PERCENT_LEVELS};
use crate::error::ComputeError;
use crate::signal::peaks::{first_index_where, mean};
use crate::signal::{Beat, SignalWindow};
use crate::types::{Channel, ChannelSet};
use crate::units::UnitCategory;

/// Every calcium biomarker in registration order
pub fn all() -> Vec<Box<dyn Biomarker>> {
    let mut biomarkers: Vec<Box<dyn Biomarker>> = Vec::new();

    for (i, &from) in PERCENT_LEVELS.iter().enumerate() {
        for &to in &PERCENT_LEVELS[i + 1..] {
            biomarkers.push(Box::new(RiseTime::new(from, to)));
        }
    }
    for from in PERCENT_LEVELS {
        biomarkers.push(Box::new(RiseTimeToPeak::new(from)));
    }
    for (i, &to) in PERCENT_LEVELS.iter().enumerate() {
        for &from in &PERCENT_LEVELS[i + 1..] {
            biomarkers.push(Box::new(DecayTime::new(from, to)));
        }
    }
    for percent in PERCENT_LEVELS {
        biomarkers.push(Box::new(TransientDuration::new(percent)));
    }

    biomarkers.push(Box::new(CalciumDuration));
    biomarkers.push(Box::new(CalciumRate));
    biomarkers.push(Box::new(DiastolicCalcium));
    biomarkers.push(Box::new(CalciumAmplitude));
    biomarkers
}

fn required() -> ChannelSet {
    channel_set(&[Channel::Time, Channel::Calcium])
}

/// Landmark values of one calcium beat
struct Transient<'a> {
    ca: &'a [f64],
    beat: &'a Beat,
    mcp: usize,
    base: f64,
    amplitude: f64,
}

impl<'a> Transient<'a> {
    fn new(ca: &'a [f64], beat: &'a Beat) -> Result<Self, ComputeError> {
        let mcp = beat.mcp_idx.ok_or_else(|| {
            ComputeError::DetectionFailure(format!(
                "beat [{}, {}) has no mid-cycle point",
                beat.start, beat.end
            ))
        })?;

        let base = ca[mcp];
        let amplitude = ca[beat.top_idx] - base;
        if !(amplitude > 0.0) {
            return Err(ComputeError::DetectionFailure(format!(
                "calcium transient in beat [{}, {}) has no amplitude",
                beat.start, beat.end
            )));
        }

        Ok(Self {
            ca,
            beat,
            mcp,
            base,
            amplitude,
        })
    }

    fn level(&self, percent: u32) -> f64 {
        self.base + percent as f64 / 100.0 * self.amplitude
    }

    /// First rising-phase sample at or above `level`
    fn rise_crossing(&self, level: f64) -> Result<usize, ComputeError> {
        first_index_where(self.mcp..self.beat.top_idx + 1, |i| self.ca[i] >= level).ok_or_else(|| {
            ComputeError::DetectionFailure(format!(
                "calcium never rises to {level:e} in beat [{}, {})",
                self.beat.start, self.beat.end
            ))
        })
    }

    /// First decay-phase sample at or below `level`, searching into the next beat's first sample
    fn decay_crossing(&self, level: f64) -> Result<usize, ComputeError> {
        first_index_where(self.beat.top_idx..self.beat.end + 1, |i| self.ca[i] <= level)
            .ok_or_else(|| {
                ComputeError::DetectionFailure(format!(
                    "calcium never decays to {level:e} after beat [{}, {}) peaks",
                    self.beat.start, self.beat.end
                ))
            })
    }
}

/// Apply `per_beat` to every calcium beat and average
fn over_beats(
    window: &SignalWindow,
    mut per_beat: impl FnMut(&[f64], &Transient) -> Result<f64, ComputeError>,
) -> Result<f64, ComputeError> {
    let beats = window.calcium_beats()?;
    let t = window.time()?;
    let ca = window.channel(Channel::Calcium)?;

    let mut values = Vec::with_capacity(beats.len());
    for beat in beats.iter() {
        values.push(per_beat(t, &Transient::new(ca, beat)?)?);
    }
    Ok(mean(values))
}

/// Like [`over_beats`] but over the beats that have a successor
fn over_stitched_beats(
    window: &SignalWindow,
    mut per_beat: impl FnMut(&[f64], &Transient) -> Result<f64, ComputeError>,
) -> Result<f64, ComputeError> {
    let beats = window.calcium_beats()?;
    if beats.len() < 2 {
        return Err(ComputeError::DataInsufficiency(format!(
            "decay measurements need at least 2 calcium beats, got {}",
            beats.len()
        )));
    }
    let t = window.time()?;
    let ca = window.channel(Channel::Calcium)?;

    let mut values = Vec::with_capacity(beats.len() - 1);
    for beat in &beats[..beats.len() - 1] {
        values.push(per_beat(t, &Transient::new(ca, beat)?)?);
    }
    Ok(mean(values))
}

/// Rise time between two amplitude levels, `RT{N}{M}` with N < M
pub struct RiseTime {
    from: u32,
    to: u32,
    name: String,
}

impl RiseTime {
    pub fn new(from: u32, to: u32) -> Self {
        Self {
            from,
            to,
            name: format!("RT{from}{to}"),
        }
    }
}

impl Biomarker for RiseTime {
    fn name(&self) -> &str {
        &self.name
    }

    fn required_channels(&self) -> ChannelSet {
        required()
    }

    fn unit_category(&self) -> UnitCategory {
        UnitCategory::Time
    }

    fn compute(&self, window: &SignalWindow) -> Result<f64, ComputeError> {
        over_beats(window, |t, tr| {
            let start = tr.rise_crossing(tr.level(self.from))?;
            let end = tr.rise_crossing(tr.level(self.to))?;
            Ok(t[end] - t[start])
        })
    }
}

/// Rise time from an amplitude level to the peak, `RT{N}Peak`
pub struct RiseTimeToPeak {
    from: u32,
    name: String,
}

impl RiseTimeToPeak {
    pub fn new(from: u32) -> Self {
        Self {
            from,
            name: format!("RT{from}Peak"),
        }
    }
}

impl Biomarker for RiseTimeToPeak {
    fn name(&self) -> &str {
        &self.name
    }

    fn required_channels(&self) -> ChannelSet {
        required()
    }

    fn unit_category(&self) -> UnitCategory {
        UnitCategory::Time
    }

    fn compute(&self, window: &SignalWindow) -> Result<f64, ComputeError> {
        over_beats(window, |t, tr| {
            let start = tr.rise_crossing(tr.level(self.from))?;
            Ok(t[tr.beat.top_idx] - t[start])
        })
    }
}

/// Decay time between two amplitude levels, `DT{N}{M}` with N > M
pub struct DecayTime {
    from: u32,
    to: u32,
    name: String,
}

impl DecayTime {
    pub fn new(from: u32, to: u32) -> Self {
        Self {
            from,
            to,
            name: format!("DT{from}{to}"),
        }
    }
}

impl Biomarker for DecayTime {
    fn name(&self) -> &str {
        &self.name
    }

    fn required_channels(&self) -> ChannelSet {
        required()
    }

    fn unit_category(&self) -> UnitCategory {
        UnitCategory::Time
    }

    fn compute(&self, window: &SignalWindow) -> Result<f64, ComputeError> {
        over_stitched_beats(window, |t, tr| {
            let start = tr.decay_crossing(tr.level(self.from))?;
            let end = tr.decay_crossing(tr.level(self.to))?;
            Ok(t[end] - t[start])
        })
    }
}

/// Transient duration from the MCP to N% decay below the peak, `CTD{N}`
pub struct TransientDuration {
    percent: u32,
    name: String,
}

impl TransientDuration {
    pub fn new(percent: u32) -> Self {
        Self {
            percent,
            name: format!("CTD{percent}"),
        }
    }
}

impl Biomarker for TransientDuration {
    fn name(&self) -> &str {
        &self.name
    }

    fn required_channels(&self) -> ChannelSet {
        required()
    }

    fn unit_category(&self) -> UnitCategory {
        UnitCategory::Time
    }

    fn compute(&self, window: &SignalWindow) -> Result<f64, ComputeError> {
        over_stitched_beats(window, |t, tr| {
            let level = tr.ca[tr.beat.top_idx] - self.percent as f64 / 100.0 * tr.amplitude;
            let end = tr.decay_crossing(level)?;
            Ok(t[end] - t[tr.mcp])
        })
    }
}

/// Time from the MCP until calcium decays back to its MCP value
pub struct CalciumDuration;

impl Biomarker for CalciumDuration {
    fn name(&self) -> &str {
        "CAI_DURATION"
    }

    fn required_channels(&self) -> ChannelSet {
        required()
    }

    fn unit_category(&self) -> UnitCategory {
        UnitCategory::Time
    }

    fn compute(&self, window: &SignalWindow) -> Result<f64, ComputeError> {
        over_stitched_beats(window, |t, tr| {
            let end = tr.decay_crossing(tr.base)?;
            Ok(t[end] - t[tr.mcp])
        })
    }
}

/// Transients per second from the mean peak-to-peak interval
pub struct CalciumRate;

impl Biomarker for CalciumRate {
    fn name(&self) -> &str {
        "Rate_Cai"
    }

    fn required_channels(&self) -> ChannelSet {
        required()
    }

    fn unit_category(&self) -> UnitCategory {
        UnitCategory::Frequency
    }

    fn compute(&self, window: &SignalWindow) -> Result<f64, ComputeError> {
        let beats = window.calcium_beats()?;
        if beats.len() < 2 {
            return Err(ComputeError::DataInsufficiency(
                "calcium rate needs at least 2 beats".to_string(),
            ));
        }
        let t = window.time()?;
        let interval = mean(beats.windows(2).map(|w| t[w[1].top_idx] - t[w[0].top_idx]));
        Ok(1.0 / interval)
    }
}

/// Mean calcium at the start of each beat
pub struct DiastolicCalcium;

impl Biomarker for DiastolicCalcium {
    fn name(&self) -> &str {
        "Cai_Diastolic"
    }

    fn required_channels(&self) -> ChannelSet {
        required()
    }

    fn unit_category(&self) -> UnitCategory {
        UnitCategory::Molar
    }

    fn compute(&self, window: &SignalWindow) -> Result<f64, ComputeError> {
        let beats = window.calcium_beats()?;
        let ca = window.channel(Channel::Calcium)?;
        Ok(mean(beats.iter().map(|b| ca[b.start])))
    }
}

/// Mean rise from each beat's diastolic level to its peak
pub struct CalciumAmplitude;

impl Biomarker for CalciumAmplitude {
    fn name(&self) -> &str {
        "Cai_Amplitude"
    }

    fn required_channels(&self) -> ChannelSet {
        required()
    }

    fn unit_category(&self) -> UnitCategory {
        UnitCategory::Molar
    }

    fn compute(&self, window: &SignalWindow) -> Result<f64, ComputeError> {
        let beats = window.calcium_beats()?;
        let ca = window.channel(Channel::Calcium)?;
        Ok(mean(beats.iter().map(|b| ca[b.top_idx] - ca[b.start])))
    }
}
