//! Synthetic recordings shared by unit tests

use crate::types::{Channel, TraceSet};
use std::f64::consts::PI;

/// Samples per paced beat
pub const STIM_PERIOD: usize = 1000;
/// Power-of-two sample interval so beat periods are exact in binary
pub const STIM_DT: f64 = 1.0 / 1024.0;
/// Known valley potential of the paced trace (V)
pub const STIM_MDP: f64 = -0.080;

/// Samples per spontaneous beat
pub const SPONT_PERIOD: usize = 500;
pub const SPONT_DT: f64 = 1e-3;

/// Samples per calcium transient
pub const CA_PERIOD: usize = 1000;
pub const CA_DT: f64 = 1e-3;
pub const CA_BASELINE: f64 = 1e-7;
pub const CA_AMPLITUDE: f64 = 9e-7;
/// Decay constant of the transient in samples
pub const CA_TAU: f64 = 100.0;

fn paced_potential(p: usize) -> f64 {
    match p {
        0..=100 => -0.075 - 0.005 * p as f64 / 100.0,
        101..=110 => STIM_MDP + 0.110 * (p - 100) as f64 / 10.0,
        _ => -0.075 + 0.105 * 0.5 * (1.0 + (PI * (p - 110) as f64 / 890.0).cos()),
    }
}

/// Paced action potentials: valley at phase 100 (-80 mV), stimulus pulse on
/// phases 101..104, peak (+30 mV) at phase 110, cosine repolarization.
pub fn stimulated_action_potentials(periods: usize) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let n = periods * STIM_PERIOD;
    let time = (0..n).map(|i| i as f64 * STIM_DT).collect();
    let vm = (0..n).map(|i| paced_potential(i % STIM_PERIOD)).collect();
    let stim = (0..n)
        .map(|i| match i % STIM_PERIOD {
            101..=103 => -50.0,
            _ => 0.0,
        })
        .collect();
    (time, vm, stim)
}

fn pacemaker_potential(p: usize) -> f64 {
    match p {
        0..=299 => -0.065 + 0.00005 * p as f64,
        300..=320 => {
            let u = (p - 300) as f64 / 20.0;
            -0.050 + 0.080 * u * u
        }
        _ => 0.030 - 0.095 * (p - 320) as f64 / 180.0,
    }
}

/// Spontaneous action potentials: linear diastolic depolarization, quadratic
/// upstroke from phase 300, peak at phase 320, linear repolarization.
pub fn spontaneous_action_potentials(periods: usize) -> (Vec<f64>, Vec<f64>) {
    let n = periods * SPONT_PERIOD;
    let time = (0..n).map(|i| i as f64 * SPONT_DT).collect();
    let vm = (0..n).map(|i| pacemaker_potential(i % SPONT_PERIOD)).collect();
    (time, vm)
}

/// Calcium level at phase `p` of a transient train
pub fn calcium_level(p: usize) -> f64 {
    let decay = |samples: f64| CA_BASELINE + CA_AMPLITUDE * (-samples / CA_TAU).exp();
    match p {
        0..=49 => decay((p + CA_PERIOD - 80) as f64),
        50..=80 => CA_BASELINE + CA_AMPLITUDE * (p - 50) as f64 / 30.0,
        _ => decay((p - 80) as f64),
    }
}

/// Calcium transients: valley at phase 50, linear rise to the peak at phase
/// 80, exponential decay.
pub fn calcium_train(periods: usize) -> (Vec<f64>, Vec<f64>) {
    let n = periods * CA_PERIOD;
    let time = (0..n).map(|i| i as f64 * CA_DT).collect();
    let ca = (0..n).map(|i| calcium_level(i % CA_PERIOD)).collect();
    (time, ca)
}

/// Twitch tension and sarcomere shortening sharing the calcium timing
pub fn mechanics_train(periods: usize) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let (time, ca) = calcium_train(periods);
    // 20 kPa peak tension, 1.9 um resting sarcomere length
    let force = ca
        .iter()
        .map(|c| 20_000.0 * (c - CA_BASELINE) / CA_AMPLITUDE)
        .collect();
    let sl = ca
        .iter()
        .map(|c| 1.9e-6 - 0.2e-6 * (c - CA_BASELINE) / CA_AMPLITUDE)
        .collect();
    (time, force, sl)
}

/// Paced recording with potential and stimulus
pub fn paced_traces(periods: usize) -> TraceSet {
    let (time, vm, stim) = stimulated_action_potentials(periods);
    TraceSet::from_time(time)
        .and_then(|t| t.with_channel(Channel::Potential, vm))
        .and_then(|t| t.with_channel(Channel::Stimulus, stim))
        .unwrap()
}

/// Recording carrying every channel, all with aligned beat timing
pub fn full_traces(periods: usize) -> TraceSet {
    let (_, vm, stim) = stimulated_action_potentials(periods);
    let (time, ca) = calcium_train(periods);
    let (_, force, sl) = mechanics_train(periods);
    TraceSet::from_time(time)
        .and_then(|t| t.with_channel(Channel::Potential, vm))
        .and_then(|t| t.with_channel(Channel::Stimulus, stim))
        .and_then(|t| t.with_channel(Channel::Calcium, ca))
        .and_then(|t| t.with_channel(Channel::Force, force))
        .and_then(|t| t.with_channel(Channel::SarcomereLength, sl))
        .unwrap()
}
