//! Alpha rewrite pass

use super::classifier::is_opaque;
use super::labeling::LabelMap;
use super::retention::Survivors;
use crate::config::AlphaThreshold;
use crate::grid::{PixelGrid, ALPHA_OFFSET};

/// Result of the rewrite pass
#[derive(Debug)]
pub struct Rewritten {
    pub grid: PixelGrid,
    /// Opaque pixels erased because their region did not survive
    pub erased_fragment_pixels: u64,
    /// Sub-threshold pixels whose non-zero alpha was forced to 0
    pub cleared_background_pixels: u64,
}

/// Zero the alpha of every sub-threshold pixel and every pixel outside `survivors`
///
/// The grid is consumed and returned; colour channels are never touched.
#[must_use]
pub fn apply_retention(
    mut grid: PixelGrid,
    labels: &LabelMap,
    survivors: &Survivors,
    threshold: AlphaThreshold,
) -> Rewritten {
    let mut erased_fragment_pixels = 0u64;
    let mut cleared_background_pixels = 0u64;

    for (index, pixel) in grid.pixels_mut().enumerate() {
        let Some(alpha) = pixel.get_mut(ALPHA_OFFSET) else {
            continue;
        };
        if !is_opaque(*alpha, threshold) {
            if *alpha != 0 {
                cleared_background_pixels += 1;
                *alpha = 0;
            }
        } else if !survivors.contains(labels.get(index)) {
            erased_fragment_pixels += 1;
            *alpha = 0;
        }
    }

    Rewritten {
        grid,
        erased_fragment_pixels,
        cleared_background_pixels,
    }
}
