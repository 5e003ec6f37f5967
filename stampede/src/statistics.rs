//! Latency statistics over a collected sample. Nothing here mutates its input.
use std::time::Duration;

/// Nearest-rank percentile: the element at `floor(n * p / 100)` of the sorted sample, clamped to
/// the last element. No interpolation.
///
/// `p` is clamped to `0..=100`. Returns `None` for an empty sample.
#[must_use]
pub fn percentile(durations: &[Duration], p: f64) -> Option<Duration> {
    let mut sorted = durations.to_vec();
    sorted.sort_unstable();
    percentile_sorted(&sorted, p)
}

/// Like [`percentile`], for a sample that is already sorted ascending.
#[must_use]
pub fn percentile_sorted(sorted: &[Duration], p: f64) -> Option<Duration> {
    let last = sorted.len().checked_sub(1)?;
    let p = if p.is_nan() { 0.0 } else { p.clamp(0.0, 100.0) };
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    let index = (sorted.len() as f64 * p / 100.0).floor() as usize;
    sorted.get(index.min(last)).copied()
}

#[must_use]
pub fn mean(durations: &[Duration]) -> Option<Duration> {
    if durations.is_empty() {
        return None;
    }
    let total: u128 = durations.iter().map(Duration::as_nanos).sum();
    let avg = total / durations.len() as u128;
    Some(Duration::from_nanos(u64::try_from(avg).unwrap_or(u64::MAX)))
}

/// Population standard deviation (divides by `n`), computed in seconds.
#[must_use]
pub fn std_deviation(durations: &[Duration]) -> Option<Duration> {
    if durations.is_empty() {
        return None;
    }
    #[allow(clippy::cast_precision_loss)]
    let n = durations.len() as f64;
    let mean = durations.iter().map(Duration::as_secs_f64).sum::<f64>() / n;
    let variance = durations
        .iter()
        .map(|d| {
            let diff = d.as_secs_f64() - mean;
            diff * diff
        })
        .sum::<f64>()
        / n;
    Some(Duration::from_secs_f64(variance.sqrt()))
}
