//! Percent-complete and ETA estimation from sampled progress.

/// ETA is withheld until progress passes this percentage.
const ETA_MIN_PERCENT: f64 = 1.0;

/// A best-effort progress estimate. Not monotonic: samples jitter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    /// Percent complete, 0 to 100.
    pub percent: f64,
    /// Remaining wall-clock time in milliseconds, once it can be estimated.
    pub eta_ms: Option<u64>,
}

/// Estimates progress for one file.
///
/// Returns `None` for media without a duration (images, zero-length input).
pub fn estimate(
    sample_elapsed_ms: u64,
    total_duration_ms: u64,
    wall_elapsed_ms: u64,
) -> Option<Progress> {
    if total_duration_ms == 0 {
        return None;
    }

    let percent =
        (sample_elapsed_ms as f64 / total_duration_ms as f64 * 100.0).clamp(0.0, 100.0);

    let eta_ms = if percent > ETA_MIN_PERCENT {
        let eta = wall_elapsed_ms as f64 / percent * (100.0 - percent);
        Some(eta.round() as u64)
    } else {
        None
    };

    Some(Progress { percent, eta_ms })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_halfway() {
        let progress = estimate(30_000, 60_000, 10_000).unwrap();
        assert_eq!(progress.percent, 50.0);
        assert_eq!(progress.eta_ms, Some(10_000));
    }

    #[test]
    fn test_no_eta_below_threshold() {
        let progress = estimate(500, 60_000, 2_000).unwrap();
        assert!(progress.percent < 1.0);
        assert_eq!(progress.eta_ms, None);
    }

    #[test]
    fn test_overshoot_is_clamped() {
        let progress = estimate(61_000, 60_000, 20_000).unwrap();
        assert_eq!(progress.percent, 100.0);
        assert_eq!(progress.eta_ms, Some(0));
    }

    #[test]
    fn test_zero_duration_has_no_estimate() {
        assert!(estimate(1_000, 0, 1_000).is_none());
    }

    #[test]
    fn test_quarter_way_eta() {
        // 25% after 5s -> 15s remaining
        let progress = estimate(15_000, 60_000, 5_000).unwrap();
        assert_eq!(progress.percent, 25.0);
        assert_eq!(progress.eta_ms, Some(15_000));
    }
}
