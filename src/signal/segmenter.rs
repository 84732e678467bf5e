//! Beat segmentation
//!
//! A beat is the index range between two consecutive valleys of the segmenting
//! channel. Only the last `beat_depth + 1` valleys are used, so a recording
//! that has settled into steady state is characterised by its final beats.
//!
//! Action-potential beats carry a peak and a depolarization onset; calcium
//! beats carry a peak and a mid-cycle point (MCP).

use crate::config::SegmentationConfig;
use crate::error::ComputeError;
use crate::signal::peaks::{
    argmax, find_valleys, first_index_where, last_index_where, linear_fit, local_maxima,
};
use std::cell::RefCell;
use std::collections::HashMap;
use std::ops::Range;

/// One cycle of activity with its landmark indices
#[derive(Debug, Clone, PartialEq)]
pub struct Beat {
    /// First sample (a valley of the segmenting channel)
    pub start: usize,
    /// Exclusive end; also the first sample of the following beat
    pub end: usize,
    /// Peak of the segmenting channel
    pub top_idx: usize,
    /// Depolarization onset, action-potential beats only. May equal `start`
    /// when the stimulus switches on at the valley.
    pub onset_idx: Option<usize>,
    /// Mid-cycle point, calcium beats only
    pub mcp_idx: Option<usize>,
    /// Whether the onset came from the stimulus channel
    pub stimulated: bool,
    /// Values other calculators stored for this beat, keyed by biomarker name.
    /// Lives as long as the owning window.
    scratch: RefCell<HashMap<String, f64>>,
}

impl Beat {
    pub(crate) fn new(start: usize, end: usize, top_idx: usize) -> Self {
        Self {
            start,
            end,
            top_idx,
            onset_idx: None,
            mcp_idx: None,
            stimulated: false,
            scratch: RefCell::new(HashMap::new()),
        }
    }

    /// Repolarization baseline index used for amplitude computations
    pub fn bot_idx(&self) -> Option<usize> {
        self.onset_idx
    }

    /// Samples owned by this beat
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    /// Samples of this beat plus the first sample of the next one
    pub fn stitched_range(&self) -> Range<usize> {
        self.start..self.end + 1
    }

    /// Read a value previously stored for this beat
    pub fn recall(&self, key: &str) -> Option<f64> {
        self.scratch.borrow().get(key).copied()
    }

    /// Store a value for later calculators on the same window
    pub fn remember(&self, key: &str, value: f64) {
        self.scratch.borrow_mut().insert(key.to_string(), value);
    }
}

/// Whether the stimulus trace takes more than one distinct value
pub fn is_stimulated(stimulus: &[f64]) -> bool {
    match stimulus.first() {
        Some(&first) => stimulus.iter().any(|&s| s != first),
        None => false,
    }
}

/// Splits traces into beats according to a [`SegmentationConfig`]
pub struct BeatSegmenter<'a> {
    config: &'a SegmentationConfig,
}

impl<'a> BeatSegmenter<'a> {
    pub fn new(config: &'a SegmentationConfig) -> Self {
        Self { config }
    }

    /// Beats delimited by potential valleys
    pub fn action_potential_beats(
        &self,
        time: &[f64],
        potential: &[f64],
        stimulus: Option<&[f64]>,
    ) -> Result<Vec<Beat>, ComputeError> {
        let stimulus = stimulus.filter(|s| is_stimulated(s));
        let ranges = self.beat_ranges(potential, "potential")?;

        let mut beats = Vec::with_capacity(ranges.len());
        for (start, end) in ranges {
            let top_idx = local_maxima(&potential[start..=end])
                .first()
                .map(|&i| start + i)
                .ok_or_else(|| {
                    ComputeError::DetectionFailure(format!(
                        "no potential maximum in beat [{start}, {end})"
                    ))
                })?;

            let mut beat = Beat::new(start, end, top_idx);
            match stimulus {
                Some(stim) => {
                    beat.onset_idx = Some(stimulus_onset(stim, start, end)?);
                    beat.stimulated = true;
                }
                None => {
                    beat.onset_idx = Some(spontaneous_onset(
                        time,
                        potential,
                        start,
                        end,
                        self.config.diastolic_threshold,
                    )?);
                }
            }
            beats.push(beat);
        }

        log::debug!(
            "segmented {} action-potential beats ({})",
            beats.len(),
            if stimulus.is_some() { "stimulated" } else { "spontaneous" }
        );
        Ok(beats)
    }

    /// Beats delimited by calcium valleys
    pub fn calcium_beats(&self, calcium: &[f64]) -> Result<Vec<Beat>, ComputeError> {
        let ranges = self.beat_ranges(calcium, "calcium")?;

        let mut beats = Vec::with_capacity(ranges.len());
        for (start, end) in ranges {
            let top_idx = argmax(calcium, start..end)
                .filter(|&top| top > start)
                .ok_or_else(|| {
                    ComputeError::DetectionFailure(format!(
                        "no calcium rise in beat [{start}, {end})"
                    ))
                })?;

            let mcp_idx = mid_cycle_point(
                calcium,
                start,
                top_idx,
                self.config.mcp_lag,
                self.config.mcp_ratio,
            )
            .ok_or_else(|| {
                ComputeError::DetectionFailure(format!(
                    "no mid-cycle point in beat [{start}, {end})"
                ))
            })?;

            let mut beat = Beat::new(start, end, top_idx);
            beat.mcp_idx = Some(mcp_idx);
            beats.push(beat);
        }

        log::debug!("segmented {} calcium beats", beats.len());
        Ok(beats)
    }

    /// `(start, end)` pairs for the last `beat_depth` beats of `signal`
    fn beat_ranges(&self, signal: &[f64], name: &str) -> Result<Vec<(usize, usize)>, ComputeError> {
        let depth = self.config.beat_depth;
        let valleys = find_valleys(signal, &self.config.valley_filter);

        if valleys.len() < depth + 1 {
            return Err(ComputeError::DataInsufficiency(format!(
                "{} {name} valleys found, {} needed for {depth} beats",
                valleys.len(),
                depth + 1
            )));
        }

        let recent = &valleys[valleys.len() - (depth + 1)..];
        Ok(recent.windows(2).map(|w| (w[0], w[1])).collect())
    }
}

/// First sample after a rising edge of stimulus magnitude inside the beat.
///
/// The valley sample itself counts: simulators often switch the stimulus on
/// exactly at the valley.
fn stimulus_onset(stimulus: &[f64], start: usize, end: usize) -> Result<usize, ComputeError> {
    first_index_where(start.max(1)..end, |j| stimulus[j].abs() > stimulus[j - 1].abs()).ok_or_else(
        || ComputeError::DetectionFailure(format!("no stimulus edge in beat [{start}, {end})")),
    )
}

/// Onset of a spontaneous beat by extrapolating diastolic depolarization.
///
/// The diastolic-depolarization point is the first sample above
/// `threshold`. A line fitted to the first two thirds of the samples before it
/// is evaluated at that point's time; the onset is the last earlier sample
/// still at or below the extrapolated potential.
fn spontaneous_onset(
    time: &[f64],
    potential: &[f64],
    start: usize,
    end: usize,
    threshold: f64,
) -> Result<usize, ComputeError> {
    let ddp = first_index_where(start + 1..end, |i| potential[i] > threshold).ok_or_else(|| {
        ComputeError::DetectionFailure(format!(
            "potential never exceeds {threshold} V in beat [{start}, {end})"
        ))
    })?;

    let fit_end = start + 2 * (ddp - start) / 3;
    let (slope, intercept) = linear_fit(&time[start..fit_end], &potential[start..fit_end])
        .ok_or_else(|| {
            ComputeError::DetectionFailure(format!(
                "too few diastolic samples to fit in beat [{start}, {end})"
            ))
        })?;

    let threshold_potential = slope * time[ddp] + intercept;

    last_index_where(start + 1..ddp, |i| potential[i] <= threshold_potential).ok_or_else(|| {
        ComputeError::DetectionFailure(format!(
            "no sample below extrapolated threshold in beat [{start}, {end})"
        ))
    })
}

/// First index where calcium has risen by `ratio` over its value `lag` samples earlier
fn mid_cycle_point(calcium: &[f64], start: usize, top: usize, lag: usize, ratio: f64) -> Option<usize> {
    first_index_where(start + lag..top + 1, |i| calcium[i] >= calcium[i - lag] * ratio)
}
