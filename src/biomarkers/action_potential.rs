//! Action-potential biomarkers
//!
//! All of these segment the potential trace into beats and average a per-beat
//! quantity. Durations use sub-sample crossing times; each beat's APD{N} is
//! remembered on the beat so ratio biomarkers can reuse it.

use super::{channel_set, Biomarker, PERCENT_LEVELS};
use crate::error::ComputeError;
use crate::signal::peaks::{interpolate_crossing, mean};
use crate::signal::{Beat, SignalWindow};
use crate::types::{Channel, ChannelSet};
use crate::units::UnitCategory;

/// Every action-potential biomarker in registration order
pub fn all() -> Vec<Box<dyn Biomarker>> {
    let mut biomarkers: Vec<Box<dyn Biomarker>> =
        vec![Box::new(MaximumDiastolicPotential), Box::new(CycleLength)];
    for percent in PERCENT_LEVELS {
        biomarkers.push(Box::new(ActionPotentialDuration::new(percent)));
    }
    biomarkers.push(Box::new(MaxUpstrokeVelocity));
    biomarkers.push(Box::new(ActionPotentialAmplitude));
    biomarkers.push(Box::new(PeakPotential));
    biomarkers.push(Box::new(BeatRate));
    biomarkers.push(Box::new(RepolarizationRatio));
    biomarkers
}

fn required() -> ChannelSet {
    channel_set(&[Channel::Time, Channel::Potential])
}

fn optional() -> ChannelSet {
    channel_set(&[Channel::Stimulus])
}

pub fn apd_name(percent: u32) -> String {
    format!("APD{percent}")
}

fn mdp(window: &SignalWindow) -> Result<f64, ComputeError> {
    let beats = window.action_potential_beats()?;
    let v = window.channel(Channel::Potential)?;
    Ok(mean(beats.iter().map(|b| v[b.start])))
}

fn cycle_length(window: &SignalWindow) -> Result<f64, ComputeError> {
    let beats = window.action_potential_beats()?;
    let t = window.time()?;
    Ok(mean(beats.iter().map(|b| t[b.end] - t[b.start])))
}

/// APD{N} of one beat, reusing a value already remembered on the beat
pub(crate) fn beat_apd(window: &SignalWindow, beat: &Beat, percent: u32) -> Result<f64, ComputeError> {
    let key = apd_name(percent);
    if let Some(value) = beat.recall(&key) {
        return Ok(value);
    }

    let t = window.time()?;
    let v = window.channel(Channel::Potential)?;
    window.record_apd_search();
    let value = apd_crossing_search(t, v, beat, percent);
    beat.remember(&key, value);
    Ok(value)
}

/// Time between the interpolated up- and down-crossings of the N% level.
///
/// NaN when the beat has no onset, no amplitude, or never crosses the level.
fn apd_crossing_search(t: &[f64], v: &[f64], beat: &Beat, percent: u32) -> f64 {
    let Some(bot) = beat.bot_idx() else {
        return f64::NAN;
    };

    let bottom = v[bot];
    let amplitude = v[beat.top_idx] - bottom;
    if !(amplitude > 0.0) {
        return f64::NAN;
    }
    let height = bottom + (1.0 - percent as f64 / 100.0) * amplitude;

    let mut above = beat.range().filter(|&i| v[i] > height);
    let Some(first) = above.next() else {
        return f64::NAN;
    };
    let last = above.last().unwrap_or(first);

    let t_up = if first > beat.start {
        interpolate_crossing(t[first - 1], v[first - 1], t[first], v[first], height)
    } else {
        t[first]
    };
    // `last < end` and `end` is a valid sample, so `last + 1` is in bounds
    let t_down = interpolate_crossing(t[last], v[last], t[last + 1], v[last + 1], height);

    t_down - t_up
}

/// Mean of each beat's first (valley) potential
pub struct MaximumDiastolicPotential;

impl Biomarker for MaximumDiastolicPotential {
    fn name(&self) -> &str {
        "MDP"
    }

    fn required_channels(&self) -> ChannelSet {
        required()
    }

    fn optional_channels(&self) -> ChannelSet {
        optional()
    }

    fn unit_category(&self) -> UnitCategory {
        UnitCategory::Potential
    }

    fn compute(&self, window: &SignalWindow) -> Result<f64, ComputeError> {
        mdp(window)
    }
}

/// Mean beat duration
pub struct CycleLength;

impl Biomarker for CycleLength {
    fn name(&self) -> &str {
        "CL"
    }

    fn required_channels(&self) -> ChannelSet {
        required()
    }

    fn optional_channels(&self) -> ChannelSet {
        optional()
    }

    fn unit_category(&self) -> UnitCategory {
        UnitCategory::Time
    }

    fn compute(&self, window: &SignalWindow) -> Result<f64, ComputeError> {
        cycle_length(window)
    }
}

/// Action-potential duration at N% repolarization
pub struct ActionPotentialDuration {
    percent: u32,
    name: String,
}

impl ActionPotentialDuration {
    pub fn new(percent: u32) -> Self {
        Self {
            percent,
            name: apd_name(percent),
        }
    }
}

impl Biomarker for ActionPotentialDuration {
    fn name(&self) -> &str {
        &self.name
    }

    fn required_channels(&self) -> ChannelSet {
        required()
    }

    fn optional_channels(&self) -> ChannelSet {
        optional()
    }

    fn unit_category(&self) -> UnitCategory {
        UnitCategory::Time
    }

    fn compute(&self, window: &SignalWindow) -> Result<f64, ComputeError> {
        let beats = window.action_potential_beats()?;
        let mut durations = Vec::with_capacity(beats.len());
        for beat in beats.iter() {
            durations.push(beat_apd(window, beat, self.percent)?);
        }
        Ok(mean(durations))
    }
}

/// Mean of each beat's steepest potential slope
pub struct MaxUpstrokeVelocity;

impl Biomarker for MaxUpstrokeVelocity {
    fn name(&self) -> &str {
        "dVdtMax"
    }

    fn required_channels(&self) -> ChannelSet {
        required()
    }

    fn optional_channels(&self) -> ChannelSet {
        optional()
    }

    fn unit_category(&self) -> UnitCategory {
        UnitCategory::VoltPerSecond
    }

    fn compute(&self, window: &SignalWindow) -> Result<f64, ComputeError> {
        let beats = window.action_potential_beats()?;
        let t = window.time()?;
        let v = window.channel(Channel::Potential)?;

        Ok(mean(beats.iter().map(|b| {
            (b.start..b.end - 1)
                .map(|i| (v[i + 1] - v[i]) / (t[i + 1] - t[i]))
                .fold(f64::NEG_INFINITY, f64::max)
        })))
    }
}

/// Highest potential over all beats above the mean diastolic potential
pub struct ActionPotentialAmplitude;

impl Biomarker for ActionPotentialAmplitude {
    fn name(&self) -> &str {
        "APA"
    }

    fn required_channels(&self) -> ChannelSet {
        required()
    }

    fn optional_channels(&self) -> ChannelSet {
        optional()
    }

    fn unit_category(&self) -> UnitCategory {
        UnitCategory::Potential
    }

    fn compute(&self, window: &SignalWindow) -> Result<f64, ComputeError> {
        let beats = window.action_potential_beats()?;
        let v = window.channel(Channel::Potential)?;
        let highest = beats
            .iter()
            .flat_map(|b| b.range())
            .map(|i| v[i])
            .fold(f64::NEG_INFINITY, f64::max);
        Ok(highest - mdp(window)?)
    }
}

/// Mean of each beat's maximum potential
pub struct PeakPotential;

impl Biomarker for PeakPotential {
    fn name(&self) -> &str {
        "Peak"
    }

    fn required_channels(&self) -> ChannelSet {
        required()
    }

    fn optional_channels(&self) -> ChannelSet {
        optional()
    }

    fn unit_category(&self) -> UnitCategory {
        UnitCategory::Potential
    }

    fn compute(&self, window: &SignalWindow) -> Result<f64, ComputeError> {
        let beats = window.action_potential_beats()?;
        let v = window.channel(Channel::Potential)?;
        Ok(mean(beats.iter().map(|b| {
            b.range().map(|i| v[i]).fold(f64::NEG_INFINITY, f64::max)
        })))
    }
}

/// Beats per second, from the cycle length
pub struct BeatRate;

impl Biomarker for BeatRate {
    fn name(&self) -> &str {
        "Rate_AP"
    }

    fn required_channels(&self) -> ChannelSet {
        required()
    }

    fn optional_channels(&self) -> ChannelSet {
        optional()
    }

    fn unit_category(&self) -> UnitCategory {
        UnitCategory::Frequency
    }

    fn compute(&self, window: &SignalWindow) -> Result<f64, ComputeError> {
        Ok(1.0 / cycle_length(window)?)
    }
}

/// Early over late repolarization speed: `(APD30 - APD40) / (APD70 - APD80)`
pub struct RepolarizationRatio;

impl Biomarker for RepolarizationRatio {
    fn name(&self) -> &str {
        "RAPP_APD"
    }

    fn required_channels(&self) -> ChannelSet {
        required()
    }

    fn optional_channels(&self) -> ChannelSet {
        optional()
    }

    fn unit_category(&self) -> UnitCategory {
        UnitCategory::Unitless
    }

    fn compute(&self, window: &SignalWindow) -> Result<f64, ComputeError> {
        let beats = window.action_potential_beats()?;
        let mut ratios = Vec::with_capacity(beats.len());
        for beat in beats.iter() {
            let early = beat_apd(window, beat, 30)? - beat_apd(window, beat, 40)?;
            let late = beat_apd(window, beat, 70)? - beat_apd(window, beat, 80)?;
            ratios.push(early / late);
        }
        Ok(mean(ratios))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{paced_traces, spontaneous_action_potentials, STIM_DT, STIM_MDP, STIM_PERIOD};
    use crate::types::TraceSet;

    fn paced_window() -> SignalWindow {
        SignalWindow::with_defaults(paced_traces(6))
    }

    #[test]
    fn test_mdp_and_cycle_length() {
        let window = paced_window();
        let mdp = MaximumDiastolicPotential.compute(&window).unwrap();
        assert!((mdp - STIM_MDP).abs() < 1e-9);

        let beats = window.action_potential_beats().unwrap();
        let t = window.time().unwrap();
        for beat in beats.iter() {
            assert_eq!(t[beat.end] - t[beat.start], STIM_PERIOD as f64 * STIM_DT);
        }
        let cl = CycleLength.compute(&window).unwrap();
        assert_eq!(cl, STIM_PERIOD as f64 * STIM_DT);

        let rate = BeatRate.compute(&window).unwrap();
        assert!((rate - 1.024).abs() < 1e-12);
        assert_eq!(window.segmentations_run(), 1);
    }

    #[test]
    fn test_apd_is_monotonic_in_percent() {
        let window = paced_window();
        let apd10 = ActionPotentialDuration::new(10).compute(&window).unwrap();
        let apd50 = ActionPotentialDuration::new(50).compute(&window).unwrap();
        let apd90 = ActionPotentialDuration::new(90).compute(&window).unwrap();
        assert!(apd10 > 0.0);
        assert!(apd90 >= apd50, "APD90 {apd90} < APD50 {apd50}");
        assert!(apd50 >= apd10, "APD50 {apd50} < APD10 {apd10}");
    }

    #[test]
    fn test_apd_interpolates_between_samples() {
        // One triangular beat: onset 0.0 V, top 1.0 V, 50% level crossed mid-sample
        let t = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let v = [-0.1, 0.0, 0.2, 1.0, 0.7, 0.2, -0.1];
        let mut beat = Beat::new(0, 6, 3);
        beat.onset_idx = Some(1);

        let apd = apd_crossing_search(&t, &v, &beat, 50);
        // up: 2 + 0.3/0.8 = 2.375, down: 4 + 0.2/0.5 = 4.4
        assert!((apd - 2.025).abs() < 1e-12);
    }

    #[test]
    fn test_apd_zero_amplitude_is_nan() {
        let t = [0.0, 1.0, 2.0, 3.0];
        let v = [0.0, 0.0, 0.0, 0.0];
        let mut beat = Beat::new(0, 3, 1);
        beat.onset_idx = Some(1);
        assert!(apd_crossing_search(&t, &v, &beat, 90).is_nan());

        let no_onset = Beat::new(0, 3, 1);
        assert!(apd_crossing_search(&t, &v, &no_onset, 90).is_nan());
    }

    #[test]
    fn test_apd_values_are_remembered_per_beat() {
        let window = paced_window();
        let apd90 = ActionPotentialDuration::new(90).compute(&window).unwrap();

        let beats = window.action_potential_beats().unwrap();
        let remembered = mean(beats.iter().map(|b| b.recall("APD90").unwrap()));
        assert_eq!(remembered, apd90);
        assert_eq!(window.apd_searches(), beats.len());

        // A second request for the same level is served from the beats
        ActionPotentialDuration::new(90).compute(&window).unwrap();
        assert_eq!(window.apd_searches(), beats.len());
    }

    #[test]
    fn test_rapp_reuses_memoized_apd() {
        let window = paced_window();
        for percent in [30, 40, 70, 80] {
            ActionPotentialDuration::new(percent).compute(&window).unwrap();
        }
        let searches = window.apd_searches();
        assert_eq!(searches, 4 * window.beat_depth());

        let ratio = RepolarizationRatio.compute(&window).unwrap();
        assert!(ratio.is_finite());
        assert_eq!(window.apd_searches(), searches);
    }

    #[test]
    fn test_rapp_computes_missing_apd() {
        let window = paced_window();
        RepolarizationRatio.compute(&window).unwrap();
        assert_eq!(window.apd_searches(), 4 * window.beat_depth());

        let beats = window.action_potential_beats().unwrap();
        assert!(beats[0].recall("APD70").is_some());
        assert!(beats[0].recall("APD90").is_none());
    }

    #[test]
    fn test_amplitude_and_peak() {
        let window = paced_window();
        let peak = PeakPotential.compute(&window).unwrap();
        assert!((peak - 0.030).abs() < 1e-9);

        let apa = ActionPotentialAmplitude.compute(&window).unwrap();
        assert!((apa - 0.110).abs() < 1e-9);
    }

    #[test]
    fn test_upstroke_velocity() {
        let window = paced_window();
        let dvdt = MaxUpstrokeVelocity.compute(&window).unwrap();
        // The first upstroke step jumps from -80 mV to -69 mV in one sample
        assert!((dvdt - 0.011 / STIM_DT).abs() < 1e-6);
    }

    #[test]
    fn test_spontaneous_beats() {
        let (time, vm) = spontaneous_action_potentials(6);
        let traces = TraceSet::from_time(time)
            .and_then(|t| t.with_channel(Channel::Potential, vm))
            .unwrap();
        let window = SignalWindow::with_defaults(traces);

        let apd50 = ActionPotentialDuration::new(50).compute(&window).unwrap();
        assert!(apd50 > 0.0);
        let beats = window.action_potential_beats().unwrap();
        assert!(beats.iter().all(|b| !b.stimulated));
        assert!(!window.channels_read().contains(Channel::Stimulus));
    }

    #[test]
    fn test_flat_potential_is_insufficient() {
        let time: Vec<f64> = (0..2000).map(|i| i as f64 * 1e-3).collect();
        let traces = TraceSet::from_time(time)
            .and_then(|t| t.with_channel(Channel::Potential, vec![-0.08; 2000]))
            .unwrap();
        let window = SignalWindow::with_defaults(traces);
        assert!(matches!(
            ActionPotentialDuration::new(90).compute(&window),
            Err(ComputeError::DataInsufficiency(_))
        ));
    }
}
