//! Compute a biomarker table for two synthetic paced cells
//!
//! Run with `cargo run --example synthetic_beats`.

use beatmark::input::UnitRecording;
use beatmark::{BiomarkerEngine, Channel, RecordingSet, RunConfig, TableFormat};
use std::f64::consts::PI;

const PERIOD: usize = 1000;
const DT_MS: f64 = 1.0;

/// Paced action potential in mV: resting drift, 10 ms upstroke, cosine repolarization
fn potential(p: usize, peak_mv: f64) -> f64 {
    match p {
        0..=100 => -75.0 - 5.0 * p as f64 / 100.0,
        101..=110 => -80.0 + (peak_mv + 80.0) * (p - 100) as f64 / 10.0,
        _ => -75.0 + (peak_mv + 75.0) * 0.5 * (1.0 + (PI * (p - 110) as f64 / 890.0).cos()),
    }
}

/// Calcium transient in nmol: linear rise to the peak, exponential decay
fn calcium(p: usize) -> f64 {
    let decay = |samples: f64| 100.0 + 900.0 * (-samples / 100.0).exp();
    match p {
        0..=49 => decay((p + PERIOD - 80) as f64),
        50..=80 => 100.0 + 900.0 * (p - 50) as f64 / 30.0,
        _ => decay((p - 80) as f64),
    }
}

fn cell(id: &str, beats: usize, peak_mv: f64) -> UnitRecording {
    let n = beats * PERIOD;
    let time = (0..n).map(|i| i as f64 * DT_MS).collect();
    let vm = (0..n).map(|i| potential(i % PERIOD, peak_mv)).collect();
    let stim = (0..n)
        .map(|i| if (101..=103).contains(&(i % PERIOD)) { -50.0 } else { 0.0 })
        .collect();
    let ca = (0..n).map(|i| calcium(i % PERIOD)).collect();

    UnitRecording::new(id)
        .with_channel(Channel::Time, "ms", time)
        .with_channel(Channel::Potential, "mV", vm)
        .with_channel(Channel::Stimulus, "unitless", stim)
        .with_channel(Channel::Calcium, "nmol", ca)
}

fn main() {
    let config = RunConfig::for_biomarkers(&[
        "MDP", "CL", "APD50", "APD90", "dVdtMax", "RAPP_APD", "CTD50", "DT9010", "Rate_Cai",
    ]);

    let engine = match BiomarkerEngine::new(&config) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Error: {e}");
            return;
        }
    };

    let recordings = RecordingSet {
        units: vec![cell("cell-1", 6, 30.0), cell("cell-2", 6, 20.0)],
    };

    match engine.process_recordings(recordings) {
        Ok(table) => print!("{}", table.to_delimited(&TableFormat::default())),
        Err(e) => eprintln!("Error: {e}"),
    }
}
