//! Per-unit signal window
//!
//! A [`SignalWindow`] owns one unit's traces for the duration of a run and
//! hands out beats on demand. Each of the two segmentations is performed at
//! most once; the outcome (beats or the error) is cached and shared by every
//! biomarker computed on the window.

use crate::config::{MechanicsConfig, SegmentationConfig};
use crate::error::ComputeError;
use crate::signal::segmenter::{Beat, BeatSegmenter};
use crate::types::{Channel, ChannelSet, TraceSet};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Beats shared between the window and the calculators reading them
pub type Beats = Rc<Vec<Beat>>;

#[derive(Debug, Default)]
enum Segmentation {
    #[default]
    Uninitialized,
    Computed(Result<Beats, ComputeError>),
}

/// One unit's traces plus lazily segmented beats
#[derive(Debug)]
pub struct SignalWindow {
    traces: TraceSet,
    segmentation: SegmentationConfig,
    mechanics: MechanicsConfig,
    action_potential: RefCell<Segmentation>,
    calcium: RefCell<Segmentation>,
    segmentations_run: Cell<usize>,
    apd_searches: Cell<usize>,
    channels_read: Cell<ChannelSet>,
}

impl SignalWindow {
    pub fn new(
        traces: TraceSet,
        segmentation: SegmentationConfig,
        mechanics: MechanicsConfig,
    ) -> Self {
        Self {
            traces,
            segmentation,
            mechanics,
            action_potential: RefCell::new(Segmentation::Uninitialized),
            calcium: RefCell::new(Segmentation::Uninitialized),
            segmentations_run: Cell::new(0),
            apd_searches: Cell::new(0),
            channels_read: Cell::new(ChannelSet::default()),
        }
    }

    /// Window with default segmentation and mechanics settings
    pub fn with_defaults(traces: TraceSet) -> Self {
        Self::new(traces, SegmentationConfig::default(), MechanicsConfig::default())
    }

    pub fn traces(&self) -> &TraceSet {
        &self.traces
    }

    pub fn segmentation_config(&self) -> &SegmentationConfig {
        &self.segmentation
    }

    pub fn mechanics_config(&self) -> &MechanicsConfig {
        &self.mechanics
    }

    /// Configured beat depth
    pub fn beat_depth(&self) -> usize {
        self.segmentation.beat_depth
    }

    /// Samples of a channel the caller cannot do without
    pub fn channel(&self, channel: Channel) -> Result<&[f64], ComputeError> {
        self.note_read(channel);
        self.traces
            .get(channel)
            .ok_or(ComputeError::ChannelMissing(channel))
    }

    /// Samples of a channel that is used only when recorded
    pub fn optional_channel(&self, channel: Channel) -> Option<&[f64]> {
        let samples = self.traces.get(channel);
        if samples.is_some() {
            self.note_read(channel);
        }
        samples
    }

    pub fn time(&self) -> Result<&[f64], ComputeError> {
        self.channel(Channel::Time)
    }

    /// Beats delimited by potential valleys, segmented on first use
    pub fn action_potential_beats(&self) -> Result<Beats, ComputeError> {
        // Reads are logged on every call so that cached results still count
        // against the caller's declared channels.
        let time = self.time()?;
        let potential = self.channel(Channel::Potential)?;
        let stimulus = self.optional_channel(Channel::Stimulus);

        self.cached(&self.action_potential, || {
            BeatSegmenter::new(&self.segmentation).action_potential_beats(time, potential, stimulus)
        })
    }

    /// Beats delimited by calcium valleys, segmented on first use
    pub fn calcium_beats(&self) -> Result<Beats, ComputeError> {
        self.time()?;
        let calcium = self.channel(Channel::Calcium)?;

        self.cached(&self.calcium, || {
            BeatSegmenter::new(&self.segmentation).calcium_beats(calcium)
        })
    }

    fn cached(
        &self,
        slot: &RefCell<Segmentation>,
        segment: impl FnOnce() -> Result<Vec<Beat>, ComputeError>,
    ) -> Result<Beats, ComputeError> {
        if let Segmentation::Computed(result) = &*slot.borrow() {
            return result.clone();
        }

        self.segmentations_run.set(self.segmentations_run.get() + 1);
        let result = segment().map(Rc::new);
        *slot.borrow_mut() = Segmentation::Computed(result.clone());
        result
    }

    fn note_read(&self, channel: Channel) {
        let mut read = self.channels_read.get();
        read.insert(channel);
        self.channels_read.set(read);
    }

    pub(crate) fn record_apd_search(&self) {
        self.apd_searches.set(self.apd_searches.get() + 1);
    }

    /// Number of segmentations actually performed
    pub fn segmentations_run(&self) -> usize {
        self.segmentations_run.get()
    }

    /// Number of APD threshold-crossing searches performed
    pub fn apd_searches(&self) -> usize {
        self.apd_searches.get()
    }

    /// Channels read through this window so far
    pub fn channels_read(&self) -> ChannelSet {
        self.channels_read.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{calcium_train, full_traces, paced_traces};

    #[test]
    fn test_segmentation_runs_once() {
        let window = SignalWindow::with_defaults(paced_traces(6));
        assert_eq!(window.segmentations_run(), 0);

        let first = window.action_potential_beats().unwrap();
        let second = window.action_potential_beats().unwrap();
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(window.segmentations_run(), 1);
    }

    #[test]
    fn test_failed_segmentation_is_cached() {
        // 3 periods cannot supply 5 valleys
        let window = SignalWindow::with_defaults(paced_traces(3));
        let first = window.action_potential_beats();
        let second = window.action_potential_beats();
        assert!(matches!(first, Err(ComputeError::DataInsufficiency(_))));
        assert_eq!(first, second);
        assert_eq!(window.segmentations_run(), 1);
    }

    #[test]
    fn test_independent_segmentations() {
        let window = SignalWindow::with_defaults(full_traces(6));
        window.action_potential_beats().unwrap();
        window.calcium_beats().unwrap();
        window.calcium_beats().unwrap();
        assert_eq!(window.segmentations_run(), 2);
    }

    #[test]
    fn test_missing_channel() {
        let (time, _) = calcium_train(2);
        let window = SignalWindow::with_defaults(TraceSet::from_time(time).unwrap());
        assert_eq!(
            window.calcium_beats().unwrap_err(),
            ComputeError::ChannelMissing(Channel::Calcium)
        );
        assert_eq!(window.segmentations_run(), 0);
    }

    #[test]
    fn test_channel_access_log() {
        let window = SignalWindow::with_defaults(paced_traces(6));
        assert_eq!(window.channels_read(), ChannelSet::default());

        assert!(window.optional_channel(Channel::Force).is_none());
        window.action_potential_beats().unwrap();
        assert_eq!(
            window.channels_read().iter().collect::<Vec<_>>(),
            vec![Channel::Time, Channel::Potential, Channel::Stimulus]
        );
    }
}
