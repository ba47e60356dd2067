//! End-to-end behaviour of the fragment filter on small hand-built grids

use bgremove_fragments::{
    engine::label_regions, filter_rgba, AlphaThreshold, FragmentError, FragmentFilter, PixelGrid,
    RetentionPolicy,
};

const INK: [u8; 3] = [40, 80, 120];

/// Build a grid from rows of alpha values, all sharing the same colour
fn grid_from_alphas(rows: &[&[u8]]) -> PixelGrid {
    let height = rows.len() as u32;
    let width = rows.first().map_or(0, |r| r.len()) as u32;
    let pixels = rows
        .iter()
        .flat_map(|row| row.iter())
        .flat_map(|&a| [INK[0], INK[1], INK[2], a])
        .collect();
    PixelGrid::new(width, height, pixels).unwrap()
}

fn alphas(grid: &PixelGrid) -> Vec<u8> {
    grid.alphas().collect()
}

/// 5x5 grid: 3x3 block in the top-left corner, single pixel at (4, 4)
fn block_and_corner() -> PixelGrid {
    grid_from_alphas(&[
        &[255, 255, 255, 0, 0],
        &[255, 255, 255, 0, 0],
        &[255, 255, 255, 0, 0],
        &[0, 0, 0, 0, 0],
        &[0, 0, 0, 0, 255],
    ])
}

#[test]
fn test_fully_opaque_grid_is_unchanged() {
    let grid = PixelGrid::filled(4, 4, [1, 2, 3, 255]).unwrap();
    let original = grid.clone();

    let outcome = FragmentFilter::default().run(grid).unwrap();

    assert_eq!(outcome.report.region_count, 1);
    assert_eq!(outcome.report.largest.map(|r| r.size), Some(16));
    assert_eq!(outcome.grid, original);
}

#[test]
fn test_isolated_corner_pixel_is_erased() {
    let outcome = FragmentFilter::new(AlphaThreshold::new(128), RetentionPolicy::KeepLargestOnly)
        .unwrap()
        .run(block_and_corner())
        .unwrap();

    assert_eq!(outcome.report.region_count, 2);
    assert_eq!(outcome.report.survivor_count, 1);
    assert_eq!(outcome.report.erased_fragment_pixels, 1);
    assert_eq!(outcome.grid.pixel(4, 4), Some([INK[0], INK[1], INK[2], 0]));
    for y in 0..3 {
        for x in 0..3 {
            assert_eq!(outcome.grid.pixel(x, y), Some([INK[0], INK[1], INK[2], 255]));
        }
    }
}

#[test]
fn test_relative_cutoff_still_removes_small_region() {
    // cutoff = max(1, 0.5 * 25) = 12.5; the 1-pixel region falls short
    let policy = RetentionPolicy::KeepLargestAndAboveRelativeSize {
        fraction: 0.5,
        floor: 1,
    };
    let outcome = FragmentFilter::new(AlphaThreshold::new(128), policy)
        .unwrap()
        .run(block_and_corner())
        .unwrap();

    assert_eq!(outcome.report.survivor_count, 1);
    let kept = alphas(&outcome.grid).iter().filter(|&&a| a == 255).count();
    assert_eq!(kept, 9);
    assert_eq!(outcome.grid.pixel(4, 4).map(|p| p[3]), Some(0));
}

#[test]
fn test_relative_cutoff_keeps_secondary_region_above_floor() {
    // 4x3 grid: a 4-pixel bar, a gap row, then a 3-pixel bar
    let grid = grid_from_alphas(&[
        &[255, 255, 255, 255],
        &[0, 0, 0, 0],
        &[255, 255, 255, 0],
    ]);
    let policy = RetentionPolicy::KeepLargestAndAboveRelativeSize {
        fraction: 0.0,
        floor: 3,
    };
    let outcome = FragmentFilter::new(AlphaThreshold::DEFAULT, policy)
        .unwrap()
        .run(grid.clone())
        .unwrap();

    // Size 3 equals the cutoff, which is inclusive
    assert_eq!(outcome.report.survivor_count, 2);
    assert_eq!(outcome.grid, grid);
}

#[test]
fn test_transparent_grid_has_no_regions() {
    let grid = PixelGrid::filled(6, 3, [9, 9, 9, 0]).unwrap();
    let original = grid.clone();

    let outcome = FragmentFilter::default().run(grid).unwrap();

    assert_eq!(outcome.report.region_count, 0);
    assert!(outcome.report.largest.is_none());
    assert_eq!(outcome.grid, original);
}

#[test]
fn test_faint_only_grid_is_returned_untouched() {
    // Nothing reaches the threshold, so there is no object to protect
    let grid = PixelGrid::filled(3, 3, [9, 9, 9, 60]).unwrap();
    let original = grid.clone();

    let outcome = FragmentFilter::default().run(grid).unwrap();

    assert_eq!(outcome.report.region_count, 0);
    assert_eq!(outcome.grid, original);
}

#[test]
fn test_equal_size_tie_keeps_first_discovered() {
    // Two 2-pixel regions: the top one is found first in row-major order
    let grid = grid_from_alphas(&[&[0, 255, 255], &[0, 0, 0], &[255, 255, 0]]);

    let outcome = FragmentFilter::default().run(grid).unwrap();

    assert_eq!(outcome.report.largest.map(|r| r.label), Some(1));
    assert_eq!(alphas(&outcome.grid), vec![0, 255, 255, 0, 0, 0, 0, 0, 0]);
}

#[test]
fn test_threshold_is_inclusive() {
    // alpha == threshold counts as opaque, threshold - 1 does not
    let grid = grid_from_alphas(&[&[200, 199, 200]]);
    let segmentation = label_regions(&grid, AlphaThreshold::new(200));
    assert_eq!(segmentation.regions.len(), 2);

    let outcome = FragmentFilter::new(AlphaThreshold::new(200), RetentionPolicy::KeepLargestOnly)
        .unwrap()
        .run(grid)
        .unwrap();
    // 199 is faint background and cleared; the right pixel loses the tie
    assert_eq!(alphas(&outcome.grid), vec![200, 0, 0]);
    assert_eq!(outcome.report.cleared_background_pixels, 1);
    assert_eq!(outcome.report.erased_fragment_pixels, 1);
}

#[test]
fn test_faint_halo_around_object_is_cleared() {
    let grid = grid_from_alphas(&[&[30, 30, 30], &[30, 255, 30], &[30, 30, 0]]);

    let outcome = FragmentFilter::default().run(grid).unwrap();

    assert_eq!(alphas(&outcome.grid), vec![0, 0, 0, 0, 255, 0, 0, 0, 0]);
    assert_eq!(outcome.report.cleared_background_pixels, 7);
}

#[test]
fn test_colour_channels_survive_erasure() {
    let mut grid = block_and_corner();
    grid.set_pixel(4, 4, [250, 1, 2, 255]);

    let outcome = FragmentFilter::default().run(grid).unwrap();

    assert_eq!(outcome.grid.pixel(4, 4), Some([250, 1, 2, 0]));
}

#[test]
fn test_malformed_buffer_is_rejected() {
    let result = filter_rgba(
        5,
        5,
        vec![0; 99],
        AlphaThreshold::DEFAULT,
        RetentionPolicy::KeepLargestOnly,
    );
    match result {
        Err(FragmentError::MalformedGrid { width, height, .. }) => {
            assert_eq!((width, height), (5, 5));
        },
        other => panic!("expected MalformedGrid, got {other:?}"),
    }
}

#[test]
fn test_zero_sized_grid() {
    let outcome = filter_rgba(
        0,
        7,
        Vec::new(),
        AlphaThreshold::DEFAULT,
        RetentionPolicy::KeepLargestOnly,
    )
    .unwrap();
    assert_eq!(outcome.report.region_count, 0);
    assert_eq!(outcome.grid.pixel_count(), 0);
}
