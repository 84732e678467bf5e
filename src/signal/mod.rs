//! Signal processing: extrema primitives, beat segmentation and the per-unit
//! window that caches segmentations.

pub mod peaks;
pub mod segmenter;
pub mod window;

pub use segmenter::{is_stimulated, Beat, BeatSegmenter};
pub use window::{Beats, SignalWindow};
