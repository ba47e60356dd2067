//! Alpha classification shared by the labeling and rewrite passes

use crate::config::AlphaThreshold;

/// Whether a pixel with the given alpha counts as foreground
#[inline]
#[must_use]
pub fn is_opaque(alpha: u8, threshold: AlphaThreshold) -> bool {
    alpha >= threshold.get()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_is_inclusive() {
        let threshold = AlphaThreshold::new(128);
        assert!(is_opaque(128, threshold));
        assert!(is_opaque(255, threshold));
        assert!(!is_opaque(127, threshold));
        assert!(!is_opaque(0, threshold));
    }

    #[test]
    fn test_extreme_thresholds() {
        assert!((0..=255).all(|a| is_opaque(a, AlphaThreshold::new(0))));
        assert!((0..=254).all(|a| !is_opaque(a, AlphaThreshold::new(255))));
        assert!(is_opaque(255, AlphaThreshold::new(255)));
    }
}
