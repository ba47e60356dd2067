//! Fragment filtering engine
//!
//! Runs classifier → labeling → retention → rewrite over a [`PixelGrid`],
//! keeping the dominant foreground object and erasing disconnected specks.
//! Each run owns all of its intermediate buffers; nothing is shared between
//! runs, so separate grids can be filtered on separate threads freely.

pub mod classifier;
pub mod labeling;
pub mod retention;
pub mod rewrite;

pub use classifier::is_opaque;
pub use labeling::{label_regions, label_regions_with_members, LabelMap, Region, Segmentation};
pub use retention::{largest_region, select_survivors, Survivors};
pub use rewrite::apply_retention;

use crate::config::{AlphaThreshold, CleanupConfig, RetentionPolicy};
use crate::error::Result;
use crate::grid::PixelGrid;
use serde::Serialize;
use tracing::{debug, info, span, Level};

/// Summary of one filter run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterReport {
    /// Number of connected regions found
    pub region_count: usize,
    /// The region treated as the main object
    pub largest: Option<RegionSummary>,
    /// Number of regions kept
    pub survivor_count: usize,
    /// Pixels at or above the threshold before filtering
    pub opaque_pixels: u64,
    /// Opaque pixels erased because their region was dropped
    pub erased_fragment_pixels: u64,
    /// Faint sub-threshold pixels forced fully transparent
    pub cleared_background_pixels: u64,
}

/// Serializable view of a [`Region`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RegionSummary {
    pub label: u32,
    pub size: u32,
}

impl From<Region> for RegionSummary {
    fn from(region: Region) -> Self {
        Self {
            label: region.label,
            size: region.size,
        }
    }
}

/// Filtered grid plus its run summary
#[derive(Debug)]
pub struct FilterOutcome {
    pub grid: PixelGrid,
    pub report: FilterReport,
}

/// Keeps the largest opaque region of a grid (and, depending on the
/// policy, other large regions) and makes everything else transparent
///
/// # Examples
/// ```rust
/// use bgremove_fragments::{AlphaThreshold, FragmentFilter, PixelGrid, RetentionPolicy};
///
/// // 3x1 strip: opaque, transparent, opaque
/// let pixels = vec![9, 9, 9, 255, 0, 0, 0, 0, 9, 9, 9, 255];
/// let grid = PixelGrid::new(3, 1, pixels)?;
///
/// let filter = FragmentFilter::new(AlphaThreshold::DEFAULT, RetentionPolicy::KeepLargestOnly)?;
/// let outcome = filter.run(grid)?;
/// assert_eq!(outcome.report.region_count, 2);
/// assert_eq!(outcome.grid.alphas().collect::<Vec<_>>(), vec![255, 0, 0]);
/// # Ok::<(), bgremove_fragments::FragmentError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FragmentFilter {
    threshold: AlphaThreshold,
    policy: RetentionPolicy,
}

impl FragmentFilter {
    /// Create a filter
    ///
    /// # Errors
    /// - Invalid retention policy parameters
    pub fn new(threshold: AlphaThreshold, policy: RetentionPolicy) -> Result<Self> {
        policy.validate()?;
        Ok(Self { threshold, policy })
    }

    /// Create a filter from a cleanup configuration
    ///
    /// # Errors
    /// - Invalid retention policy parameters
    pub fn from_config(config: &CleanupConfig) -> Result<Self> {
        Self::new(config.alpha_threshold, config.retention)
    }

    #[must_use]
    pub fn threshold(&self) -> AlphaThreshold {
        self.threshold
    }

    #[must_use]
    pub fn policy(&self) -> &RetentionPolicy {
        &self.policy
    }

    /// Run all stages over `grid`
    ///
    /// A grid without any opaque pixel is returned unchanged.
    ///
    /// # Errors
    /// Grids are validated on construction, so this only fails if that
    /// invariant is broken; it is kept fallible for callers that build
    /// grids from untrusted parts.
    pub fn run(&self, grid: PixelGrid) -> Result<FilterOutcome> {
        let (width, height) = grid.dimensions();
        let _span = span!(
            Level::DEBUG,
            "fragment_filter",
            width = %width,
            height = %height,
            threshold = %self.threshold,
            policy = %self.policy.mode_name()
        )
        .entered();

        let segmentation = label_regions(&grid, self.threshold);
        let opaque_pixels = segmentation.opaque_pixel_count();
        let Some(largest) = largest_region(&segmentation.regions) else {
            debug!("No opaque regions found, leaving image unchanged");
            return Ok(FilterOutcome {
                grid,
                report: FilterReport::default(),
            });
        };

        let survivors = select_survivors(
            &segmentation.regions,
            &self.policy,
            grid.pixel_count() as u64,
        );
        info!(
            regions = segmentation.regions.len(),
            largest_size = largest.size,
            survivors = survivors.len(),
            "Found {} regions, largest has {} pixels",
            segmentation.regions.len(),
            largest.size
        );

        let rewritten = apply_retention(grid, &segmentation.labels, &survivors, self.threshold);
        debug!(
            erased = rewritten.erased_fragment_pixels,
            cleared = rewritten.cleared_background_pixels,
            "Alpha rewrite complete"
        );

        Ok(FilterOutcome {
            grid: rewritten.grid,
            report: FilterReport {
                region_count: segmentation.regions.len(),
                largest: Some(largest.into()),
                survivor_count: survivors.len(),
                opaque_pixels,
                erased_fragment_pixels: rewritten.erased_fragment_pixels,
                cleared_background_pixels: rewritten.cleared_background_pixels,
            },
        })
    }
}

impl Default for FragmentFilter {
    fn default() -> Self {
        Self {
            threshold: AlphaThreshold::DEFAULT,
            policy: RetentionPolicy::KeepLargestOnly,
        }
    }
}

/// Validate a raw RGBA buffer and filter it in one call
///
/// # Errors
/// - `MalformedGrid` when `pixels.len() != width * height * 4`
/// - Invalid retention policy parameters
pub fn filter_rgba(
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    threshold: AlphaThreshold,
    policy: RetentionPolicy,
) -> Result<FilterOutcome> {
    let grid = PixelGrid::new(width, height, pixels)?;
    FragmentFilter::new(threshold, policy)?.run(grid)
}
