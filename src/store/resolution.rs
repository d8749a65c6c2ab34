//! Reduced-resolution views for plotting long ranges.

use super::range::Sample;

/// Ladder of minimum separations between kept changes, in seconds.
pub const RESOLUTIONS: [f64; 14] = [
    0.1, 0.2, 0.4, 0.6, 0.8, 1.0, 1.5, 2.0, 2.5, 3.0, 3.5, 4.0, 4.5, 5.0,
];

/// Smallest ladder step at least `desired` seconds wide.
///
/// Returns 0.0 (full resolution) for non-positive input and the coarsest step
/// when `desired` is past the end of the ladder.
pub fn nearest_resolution(desired: f64) -> f64 {
    if desired.is_nan() || desired <= 0.0 {
        return 0.0;
    }
    RESOLUTIONS
        .iter()
        .copied()
        .find(|step| *step >= desired)
        .unwrap_or(RESOLUTIONS[RESOLUTIONS.len() - 1])
}

/// Walk newest to oldest, keeping a sample only when it is more than
/// `min_separation` older than the last kept one.
pub(crate) fn decimate(samples: &[Sample], min_separation: f64) -> Vec<Sample> {
    let mut kept = Vec::new();
    let mut last = f64::INFINITY;
    for sample in samples.iter().rev() {
        if last - sample.timestamp > min_separation {
            kept.push(sample.clone());
            last = sample.timestamp;
        }
    }
    kept.reverse();
    kept
}
