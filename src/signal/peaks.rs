//! Extrema and crossing primitives
//!
//! Local extrema follow the usual plateau convention: a flat top is reported
//! at its midpoint, and the first and last samples are never extrema.

use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Optional gates applied to detected peaks
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeakFilter {
    /// Minimum peak value
    pub height: Option<f64>,
    /// Minimum vertical distance to both neighbouring samples
    pub threshold: Option<f64>,
}

impl PeakFilter {
    pub fn none() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Copy)]
struct Plateau {
    mid: usize,
    left: usize,
    right: usize,
}

fn plateau_maxima(x: &[f64]) -> Vec<Plateau> {
    let n = x.len();
    let mut found = Vec::new();
    if n < 3 {
        return found;
    }

    let mut i = 1;
    while i < n - 1 {
        if x[i - 1] < x[i] {
            let mut ahead = i + 1;
            while ahead < n - 1 && x[ahead] == x[i] {
                ahead += 1;
            }
            if x[ahead] < x[i] {
                let right = ahead - 1;
                found.push(Plateau {
                    mid: (i + right) / 2,
                    left: i,
                    right,
                });
                i = ahead;
                continue;
            }
        }
        i += 1;
    }

    found
}

/// Indices of all local maxima
pub fn local_maxima(x: &[f64]) -> Vec<usize> {
    plateau_maxima(x).into_iter().map(|p| p.mid).collect()
}

/// Local maxima passing the height and threshold gates
pub fn find_peaks(x: &[f64], filter: &PeakFilter) -> Vec<usize> {
    plateau_maxima(x)
        .into_iter()
        .filter(|p| filter.height.map_or(true, |h| x[p.mid] >= h))
        .filter(|p| {
            filter.threshold.map_or(true, |th| {
                let rise = x[p.mid] - x[p.left - 1];
                let fall = x[p.mid] - x[p.right + 1];
                rise.min(fall) >= th
            })
        })
        .map(|p| p.mid)
        .collect()
}

/// Local minima, gated on the negated signal
pub fn find_valleys(x: &[f64], filter: &PeakFilter) -> Vec<usize> {
    let negated: Vec<f64> = x.iter().map(|v| -v).collect();
    find_peaks(&negated, filter)
}

/// First index in `range` satisfying `pred`
pub fn first_index_where(range: Range<usize>, mut pred: impl FnMut(usize) -> bool) -> Option<usize> {
    range.into_iter().find(|&i| pred(i))
}

/// Last index in `range` satisfying `pred`
pub fn last_index_where(range: Range<usize>, mut pred: impl FnMut(usize) -> bool) -> Option<usize> {
    range.into_iter().rev().find(|&i| pred(i))
}

/// Time at which the segment `(t0, v0) → (t1, v1)` crosses `level`
pub fn interpolate_crossing(t0: f64, v0: f64, t1: f64, v1: f64, level: f64) -> f64 {
    t0 + (level - v0) * (t1 - t0) / (v1 - v0)
}

/// Least-squares line `y = slope * x + intercept`.
///
/// Returns `None` for fewer than two points or a degenerate x spread.
pub fn linear_fit(xs: &[f64], ys: &[f64]) -> Option<(f64, f64)> {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return None;
    }

    let nf = n as f64;
    let mean_x = xs[..n].iter().sum::<f64>() / nf;
    let mean_y = ys[..n].iter().sum::<f64>() / nf;

    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for (x, y) in xs[..n].iter().zip(&ys[..n]) {
        sxx += (x - mean_x) * (x - mean_x);
        sxy += (x - mean_x) * (y - mean_y);
    }

    if sxx == 0.0 {
        return None;
    }

    let slope = sxy / sxx;
    Some((slope, mean_y - slope * mean_x))
}

/// Index of the maximum value in `range` (first on ties)
pub fn argmax(x: &[f64], range: Range<usize>) -> Option<usize> {
    range.into_iter().fold(None, |best, i| match best {
        Some(b) if x[b] >= x[i] => Some(b),
        _ => Some(i),
    })
}

/// Index of the minimum value in `range` (first on ties)
pub fn argmin(x: &[f64], range: Range<usize>) -> Option<usize> {
    range.into_iter().fold(None, |best, i| match best {
        Some(b) if x[b] <= x[i] => Some(b),
        _ => Some(i),
    })
}

/// Arithmetic mean, NaN for an empty input
pub fn mean<I: IntoIterator<Item = f64>>(values: I) -> f64 {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_maxima_simple_and_plateau() {
        let x = [0.0, 1.0, 0.0, 2.0, 2.0, 2.0, 1.0, 3.0];
        assert_eq!(local_maxima(&x), vec![1, 4]);
    }

    #[test]
    fn test_edges_are_not_extrema() {
        let rising = [0.0, 1.0, 2.0, 3.0];
        assert!(local_maxima(&rising).is_empty());
        let flat = [1.0; 8];
        assert!(local_maxima(&flat).is_empty());
        assert!(find_valleys(&flat, &PeakFilter::none()).is_empty());
    }

    #[test]
    fn test_unfinished_plateau_is_not_a_peak() {
        let x = [0.0, 1.0, 1.0, 1.0];
        assert!(local_maxima(&x).is_empty());
    }

    #[test]
    fn test_find_peaks_gates() {
        let x = [0.0, 5.0, 4.5, 4.8, 0.0, 1.0, 0.0];
        assert_eq!(find_peaks(&x, &PeakFilter::none()), vec![1, 3, 5]);

        let tall = PeakFilter {
            height: Some(2.0),
            threshold: None,
        };
        assert_eq!(find_peaks(&x, &tall), vec![1, 3]);

        let sharp = PeakFilter {
            height: None,
            threshold: Some(0.9),
        };
        assert_eq!(find_peaks(&x, &sharp), vec![5]);
    }

    #[test]
    fn test_find_valleys() {
        let x = [0.0, -1.0, 0.5, -3.0, 2.0];
        assert_eq!(find_valleys(&x, &PeakFilter::none()), vec![1, 3]);

        let deep = PeakFilter {
            height: Some(2.0),
            threshold: None,
        };
        assert_eq!(find_valleys(&x, &deep), vec![3]);
    }

    #[test]
    fn test_index_searches() {
        let x = [1.0, 3.0, 5.0, 3.0, 1.0];
        assert_eq!(first_index_where(0..5, |i| x[i] > 2.0), Some(1));
        assert_eq!(last_index_where(0..5, |i| x[i] > 2.0), Some(3));
        assert_eq!(first_index_where(0..5, |i| x[i] > 9.0), None);
    }

    #[test]
    fn test_interpolate_crossing() {
        let t = interpolate_crossing(1.0, -2.0, 2.0, 2.0, 0.0);
        assert!((t - 1.5).abs() < 1e-12);
        let t = interpolate_crossing(4.0, 10.0, 5.0, 0.0, 7.5);
        assert!((t - 4.25).abs() < 1e-12);
    }

    #[test]
    fn test_linear_fit() {
        let xs = [0.0, 1.0, 2.0, 3.0];
        let ys = [1.0, 3.0, 5.0, 7.0];
        let (slope, intercept) = linear_fit(&xs, &ys).unwrap();
        assert!((slope - 2.0).abs() < 1e-12);
        assert!((intercept - 1.0).abs() < 1e-12);
        assert!(linear_fit(&[1.0], &[1.0]).is_none());
        assert!(linear_fit(&[1.0, 1.0], &[0.0, 2.0]).is_none());
    }

    #[test]
    fn test_argmax_argmin_first_on_ties() {
        let x = [2.0, 7.0, 7.0, -1.0, -1.0];
        assert_eq!(argmax(&x, 0..5), Some(1));
        assert_eq!(argmin(&x, 0..5), Some(3));
        assert_eq!(argmax(&x, 2..2), None);
    }

    #[test]
    fn test_mean() {
        assert!((mean([1.0, 2.0, 6.0]) - 3.0).abs() < 1e-12);
        assert!(mean(std::iter::empty()).is_nan());
    }
}
