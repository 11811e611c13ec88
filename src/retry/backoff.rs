//! Exponential backoff
//!
//! `delay = base * max(factor, 1) ^ attempts`, where `attempts` is the number
//! of attempts already recorded against the model about to be retried.

use std::time::Duration;

/// Compute the wait before retrying a model.
///
/// A missing, non-finite or sub-1 `factor` means no growth. Results that do
/// not fit in a `Duration` saturate instead of panicking.
pub fn backoff_delay(base: Duration, factor: Option<f64>, attempts: u32) -> Duration {
    let factor = factor.filter(|f| f.is_finite()).unwrap_or(1.0).max(1.0);
    let growth = factor.powi(attempts.min(i32::MAX as u32) as i32);
    let nanos = base.as_nanos() as f64 * growth;

    if !nanos.is_finite() || nanos >= u64::MAX as f64 {
        return Duration::from_nanos(u64::MAX);
    }
    Duration::from_nanos(nanos.round() as u64)
}
