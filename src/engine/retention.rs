//! Region retention policy

use super::labeling::{Region, NO_LABEL};
use crate::config::RetentionPolicy;

/// Set of labels that keep their pixels
///
/// Labels are dense (`1..=region_count`), so membership is a lookup table
/// indexed by label.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Survivors {
    keep: Vec<bool>,
    count: usize,
}

impl Survivors {
    fn with_capacity(max_label: u32) -> Self {
        Self {
            keep: vec![false; max_label as usize + 1],
            count: 0,
        }
    }

    fn insert(&mut self, label: u32) {
        if let Some(slot) = self.keep.get_mut(label as usize) {
            if label != NO_LABEL && !*slot {
                *slot = true;
                self.count += 1;
            }
        }
    }

    /// Whether pixels carrying `label` survive
    #[must_use]
    pub fn contains(&self, label: u32) -> bool {
        self.keep.get(label as usize).copied().unwrap_or(false)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.count
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Surviving labels in ascending order
    pub fn labels(&self) -> impl Iterator<Item = u32> + '_ {
        self.keep
            .iter()
            .enumerate()
            .filter(|&(_, &keep)| keep)
            .map(|(label, _)| label as u32)
    }
}

/// The largest region; ties go to the first region in discovery order
#[must_use]
pub fn largest_region(regions: &[Region]) -> Option<Region> {
    regions.iter().copied().fold(None, |best, region| match best {
        Some(current) if current.size >= region.size => Some(current),
        _ => Some(region),
    })
}

/// Minimum size a secondary region needs under `policy`, if any may survive
#[must_use]
pub fn size_cutoff(policy: &RetentionPolicy, total_pixels: u64) -> Option<f64> {
    match *policy {
        RetentionPolicy::KeepLargestOnly => None,
        RetentionPolicy::KeepLargestAndAboveRelativeSize { fraction, floor } => {
            Some(f64::from(floor).max(fraction * total_pixels as f64))
        },
    }
}

/// Decide which labels survive
///
/// `total_pixels` is the grid's full pixel count (opaque or not), the base
/// of the relative size cut-off.
#[must_use]
pub fn select_survivors(
    regions: &[Region],
    policy: &RetentionPolicy,
    total_pixels: u64,
) -> Survivors {
    let Some(largest) = largest_region(regions) else {
        return Survivors::default();
    };

    let max_label = regions.iter().map(|r| r.label).max().unwrap_or(NO_LABEL);
    let mut survivors = Survivors::with_capacity(max_label);
    survivors.insert(largest.label);

    if let Some(cutoff) = size_cutoff(policy, total_pixels) {
        for region in regions {
            if f64::from(region.size) >= cutoff {
                survivors.insert(region.label);
            }
        }
    }

    survivors
}

#[cfg(test)]
mod tests {
    use super::*;

    fn regions(sizes: &[u32]) -> Vec<Region> {
        sizes
            .iter()
            .enumerate()
            .map(|(i, &size)| Region {
                label: i as u32 + 1,
                size,
            })
            .collect()
    }

    #[test]
    fn test_largest_prefers_first_on_tie() {
        let r = regions(&[3, 7, 7, 2]);
        assert_eq!(largest_region(&r), Some(Region { label: 2, size: 7 }));
        assert_eq!(largest_region(&[]), None);
    }

    #[test]
    fn test_keep_largest_only() {
        let r = regions(&[5, 40, 39]);
        let survivors = select_survivors(&r, &RetentionPolicy::KeepLargestOnly, 1000);
        assert_eq!(survivors.labels().collect::<Vec<_>>(), vec![2]);
        assert!(!survivors.contains(3));
        assert!(!survivors.contains(NO_LABEL));
    }

    #[test]
    fn test_relative_policy_uses_max_of_floor_and_fraction() {
        let r = regions(&[100, 500, 99, 250]);
        // fraction * total = 0.1 * 2000 = 200 beats the floor of 100
        let policy = RetentionPolicy::KeepLargestAndAboveRelativeSize {
            fraction: 0.1,
            floor: 100,
        };
        let survivors = select_survivors(&r, &policy, 2000);
        assert_eq!(survivors.labels().collect::<Vec<_>>(), vec![2, 4]);

        // floor dominates when the image is small
        let survivors = select_survivors(&r, &policy, 100);
        assert_eq!(survivors.labels().collect::<Vec<_>>(), vec![1, 2, 4]);
    }

    #[test]
    fn test_cutoff_is_inclusive() {
        let r = regions(&[20, 10]);
        let policy = RetentionPolicy::KeepLargestAndAboveRelativeSize {
            fraction: 0.5,
            floor: 0,
        };
        let survivors = select_survivors(&r, &policy, 20);
        assert_eq!(survivors.len(), 2);
    }

    #[test]
    fn test_largest_survives_even_below_cutoff() {
        let r = regions(&[1, 1]);
        let policy = RetentionPolicy::KeepLargestAndAboveRelativeSize {
            fraction: 0.5,
            floor: 1000,
        };
        let survivors = select_survivors(&r, &policy, 25);
        assert_eq!(survivors.labels().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_empty_regions_give_empty_survivors() {
        let survivors = select_survivors(&[], &RetentionPolicy::relative_default(), 0);
        assert!(survivors.is_empty());
        assert!(!survivors.contains(1));
    }
}
