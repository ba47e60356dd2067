//! Connected-component labeling of opaque pixels
//!
//! Regions are 4-connected (up, down, left, right) groups of pixels whose
//! alpha passes the classifier. Labels start at 1 and are handed out in
//! row-major order of each region's first pixel, so the result depends only
//! on the grid contents and the threshold.

use super::classifier::is_opaque;
use crate::config::AlphaThreshold;
use crate::grid::PixelGrid;
use std::collections::VecDeque;

/// Label value for pixels that belong to no region
pub const NO_LABEL: u32 = 0;

/// One connected region of opaque pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Region {
    /// Positive label, equal to the region's discovery rank
    pub label: u32,
    /// Number of pixels carrying the label
    pub size: u32,
}

/// Per-pixel region labels, parallel to the grid
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelMap {
    width: u32,
    height: u32,
    labels: Vec<u32>,
}

impl LabelMap {
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Label at flat index `index`; [`NO_LABEL`] outside the map
    #[must_use]
    pub fn get(&self, index: usize) -> u32 {
        self.labels.get(index).copied().unwrap_or(NO_LABEL)
    }

    /// Label at `(x, y)`, or `None` outside the map
    #[must_use]
    pub fn at(&self, x: u32, y: u32) -> Option<u32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.labels
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[u32] {
        &self.labels
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Output of the labeling pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segmentation {
    pub labels: LabelMap,
    /// Regions in discovery order (ascending label)
    pub regions: Vec<Region>,
}

impl Segmentation {
    /// Total number of labelled (opaque) pixels
    #[must_use]
    pub fn opaque_pixel_count(&self) -> u64 {
        self.regions.iter().map(|r| u64::from(r.size)).sum()
    }
}

/// Label every 4-connected region of opaque pixels
#[must_use]
pub fn label_regions(grid: &PixelGrid, threshold: AlphaThreshold) -> Segmentation {
    flood_label(grid, threshold, None)
}

/// Like [`label_regions`], also returning each region's flat pixel indices
///
/// `members[i]` holds the pixels of `regions[i]`, in traversal order.
#[must_use]
pub fn label_regions_with_members(
    grid: &PixelGrid,
    threshold: AlphaThreshold,
) -> (Segmentation, Vec<Vec<u32>>) {
    let mut members = Vec::new();
    let segmentation = flood_label(grid, threshold, Some(&mut members));
    (segmentation, members)
}

// Indices are always below `total`, which equals the length of every buffer here.
#[allow(clippy::indexing_slicing)]
fn flood_label(
    grid: &PixelGrid,
    threshold: AlphaThreshold,
    mut members: Option<&mut Vec<Vec<u32>>>,
) -> Segmentation {
    let width = grid.width() as usize;
    let height = grid.height() as usize;
    let total = grid.pixel_count();

    let mut visited = vec![false; total];
    let mut labels = vec![NO_LABEL; total];
    let mut regions = Vec::new();
    let mut queue: VecDeque<usize> = VecDeque::new();
    let mut next_label = NO_LABEL;

    for seed in 0..total {
        if visited[seed] {
            continue;
        }
        if !is_opaque(grid.alpha(seed), threshold) {
            visited[seed] = true;
            continue;
        }

        next_label += 1;
        let label = next_label;
        let mut size = 0u32;
        let mut collected = members.is_some().then(Vec::new);

        // Pixels are marked when enqueued so each enters the queue once.
        visited[seed] = true;
        queue.push_back(seed);

        while let Some(index) = queue.pop_front() {
            labels[index] = label;
            size += 1;
            if let Some(collected) = collected.as_mut() {
                collected.push(index as u32);
            }

            let x = index % width;
            let y = index / width;
            let mut visit = |neighbor: usize| {
                if !visited[neighbor] && is_opaque(grid.alpha(neighbor), threshold) {
                    visited[neighbor] = true;
                    queue.push_back(neighbor);
                }
            };

            if y > 0 {
                visit(index - width);
            }
            if y + 1 < height {
                visit(index + width);
            }
            if x > 0 {
                visit(index - 1);
            }
            if x + 1 < width {
                visit(index + 1);
            }
        }

        regions.push(Region { label, size });
        if let (Some(all), Some(collected)) = (members.as_deref_mut(), collected) {
            all.push(collected);
        }
    }

    Segmentation {
        labels: LabelMap {
            width: grid.width(),
            height: grid.height(),
            labels,
        },
        regions,
    }
}
