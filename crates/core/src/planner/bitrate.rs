//! Bitrate budget derived from a target file size.

/// Audio bitrates the split snaps down to, highest first.
const AUDIO_LADDER_KBPS: [u64; 6] = [192, 128, 96, 64, 32, 24];

/// Bitrate split for a size-capped encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitrateBudget {
    /// Total bitrate the file may use.
    pub max_kbps: u64,
    /// Audio share, one of the ladder values.
    pub audio_kbps: u64,
    /// Video share, used for both `-maxrate` and `-bufsize`.
    pub video_kbps: u64,
}

/// Splits a file-size budget into audio and video bitrates.
///
/// Returns `None` when the duration is zero, since no rate can be derived.
pub fn estimate(max_size_kb: u64, duration_ms: u64) -> Option<BitrateBudget> {
    if duration_ms == 0 {
        return None;
    }

    // Rounding the duration up keeps the cap strict.
    let duration_secs = duration_ms.div_ceil(1000);
    let max_kbps = max_size_kb.saturating_mul(8) / duration_secs;

    let audio_kbps = snap_audio(max_kbps / 3);
    let video_kbps = max_kbps.saturating_sub(audio_kbps).max(1);

    Some(BitrateBudget {
        max_kbps,
        audio_kbps,
        video_kbps,
    })
}

fn snap_audio(limit_kbps: u64) -> u64 {
    AUDIO_LADDER_KBPS
        .iter()
        .copied()
        .find(|rate| *rate <= limit_kbps)
        .unwrap_or(AUDIO_LADDER_KBPS[AUDIO_LADDER_KBPS.len() - 1])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thousand_kb_over_ten_seconds() {
        let budget = estimate(1000, 10_000).unwrap();
        assert_eq!(budget.max_kbps, 800);
        assert_eq!(budget.audio_kbps, 192);
        assert_eq!(budget.video_kbps, 608);
    }

    #[test]
    fn test_partial_second_rounds_duration_up() {
        // 10.2s counts as 11s: 8000 / 11 = 727
        let budget = estimate(1000, 10_200).unwrap();
        assert_eq!(budget.max_kbps, 727);
        assert_eq!(budget.audio_kbps, 192);
        assert_eq!(budget.video_kbps, 535);
    }

    #[test]
    fn test_audio_snaps_down_the_ladder() {
        // 300 kbps total, a third is 100 -> 96
        let budget = estimate(300, 8_000).unwrap();
        assert_eq!(budget.max_kbps, 300);
        assert_eq!(budget.audio_kbps, 96);
        assert_eq!(budget.video_kbps, 204);
    }

    #[test]
    fn test_tiny_budget_keeps_minimum_audio() {
        let budget = estimate(10, 60_000).unwrap();
        assert_eq!(budget.max_kbps, 1);
        assert_eq!(budget.audio_kbps, 24);
        assert_eq!(budget.video_kbps, 1);
    }

    #[test]
    fn test_zero_duration() {
        assert!(estimate(1000, 0).is_none());
    }
}
