//! File and byte pipelines through the cleanup processor

use bgremove_fragments::{
    remove_small_fragments, CleanupConfig, CleanupProcessor, ForegroundExtractor, FragmentError,
    ImageIOService, OutputFormat, PixelGrid, Result, RetentionPolicy,
};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;
use std::sync::Arc;
use tempfile::TempDir;

/// 10x10 cutout: a 4x4 subject, a 2-pixel speck and a faint halo pixel
fn cutout() -> RgbaImage {
    let mut img = RgbaImage::from_pixel(10, 10, Rgba([0, 0, 0, 0]));
    for y in 2..6 {
        for x in 2..6 {
            img.put_pixel(x, y, Rgba([220, 180, 140, 255]));
        }
    }
    img.put_pixel(8, 8, Rgba([220, 180, 140, 240]));
    img.put_pixel(9, 8, Rgba([220, 180, 140, 240]));
    img.put_pixel(1, 1, Rgba([220, 180, 140, 40]));
    img
}

fn png_bytes(img: &RgbaImage) -> Vec<u8> {
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

/// Extractor that marks every bright pixel as foreground
struct BrightnessMatte;

impl ForegroundExtractor for BrightnessMatte {
    fn name(&self) -> &'static str {
        "brightness"
    }

    fn extract(&self, image: DynamicImage) -> Result<RgbaImage> {
        let mut rgba = image.into_rgba8();
        for px in rgba.pixels_mut() {
            px[3] = if px[0] > 128 { 255 } else { 0 };
        }
        Ok(rgba)
    }
}

#[test]
fn test_process_file_and_save_png() -> Result<()> {
    let dir = TempDir::new()?;
    let input = dir.path().join("cutout.png");
    let output = dir.path().join("nested").join("cutout_clean.png");
    cutout().save(&input)?;

    let processor = CleanupProcessor::new(CleanupConfig::default())?;
    let mut result = processor.process_file(&input)?;
    result.save(&output, OutputFormat::Png)?;

    assert_eq!(result.report.region_count, 2);
    assert_eq!(result.report.erased_fragment_pixels, 2);
    assert_eq!(result.report.cleared_background_pixels, 1);
    assert!(result.timings.encode_ms.is_some());

    let cleaned = image::open(&output)?.into_rgba8();
    assert_eq!(cleaned.get_pixel(3, 3)[3], 255);
    assert_eq!(cleaned.get_pixel(8, 8)[3], 0);
    assert_eq!(cleaned.get_pixel(1, 1)[3], 0);
    Ok(())
}

#[test]
fn test_relative_policy_keeps_speck_above_floor() -> Result<()> {
    let config = CleanupConfig::builder()
        .retention(RetentionPolicy::KeepLargestAndAboveRelativeSize {
            fraction: 0.0,
            floor: 2,
        })
        .build()?;
    let processor = CleanupProcessor::new(config)?;
    let result = processor.process_bytes(&png_bytes(&cutout()))?;

    assert_eq!(result.report.survivor_count, 2);
    assert_eq!(result.grid.pixel(8, 8).map(|p| p[3]), Some(240));
    Ok(())
}

#[test]
fn test_tiff_and_raw_outputs() -> Result<()> {
    let processor = CleanupProcessor::new(CleanupConfig::default())?;
    let mut result = processor.process_bytes(&png_bytes(&cutout()))?;

    let raw = result.to_bytes(OutputFormat::Rgba8)?;
    assert_eq!(raw.len(), 10 * 10 * 4);
    assert_eq!(raw, result.grid.as_bytes());

    let tiff = result.to_bytes(OutputFormat::Tiff)?;
    let decoded = ImageIOService::decode(&tiff)?;
    assert_eq!(decoded, result.grid);
    Ok(())
}

#[test]
fn test_custom_extractor_runs_before_filter() -> Result<()> {
    // Opaque input; only the extractor's matte decides what is foreground
    let mut img = RgbaImage::from_pixel(6, 3, Rgba([10, 10, 10, 255]));
    for x in 0..3 {
        img.put_pixel(x, 1, Rgba([250, 10, 10, 255]));
    }
    img.put_pixel(5, 2, Rgba([250, 10, 10, 255]));

    let processor =
        CleanupProcessor::with_extractor(CleanupConfig::default(), Arc::new(BrightnessMatte))?;
    let result = processor.process_image(DynamicImage::ImageRgba8(img))?;

    assert_eq!(result.report.region_count, 2);
    let alphas: Vec<u8> = result.grid.alphas().collect();
    assert_eq!(alphas.iter().filter(|&&a| a == 255).count(), 3);
    assert_eq!(result.grid.pixel(5, 2).map(|p| p[3]), Some(0));
    Ok(())
}

#[test]
fn test_missing_file_is_io_error() {
    let processor = CleanupProcessor::new(CleanupConfig::default()).unwrap();
    let err = processor
        .process_file("/definitely/not/here.png")
        .unwrap_err();
    match err {
        FragmentError::Io(io) => assert_eq!(io.kind(), std::io::ErrorKind::NotFound),
        other => panic!("expected Io error, got {other:?}"),
    }
    assert!(!FragmentError::Io(std::io::Error::other("x")).is_client_error());
}

#[test]
fn test_convenience_function_matches_processor() -> Result<()> {
    let bytes = png_bytes(&cutout());
    let direct = remove_small_fragments(&bytes, &CleanupConfig::default())?;

    let processor = CleanupProcessor::new(CleanupConfig::default())?;
    let via_processor = processor.process_bytes(&bytes)?.grid;

    assert_eq!(ImageIOService::decode(&direct)?, via_processor);
    Ok(())
}

#[test]
fn test_rgb_input_is_fully_opaque() -> Result<()> {
    // No alpha channel means a single region covering the whole image
    let rgb = image::RgbImage::from_pixel(5, 4, image::Rgb([1, 2, 3]));
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(rgb).write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;

    let grid: PixelGrid = ImageIOService::decode(&bytes)?;
    let processor = CleanupProcessor::new(CleanupConfig::default())?;
    let result = processor.process_grid(grid.clone())?;

    assert_eq!(result.report.region_count, 1);
    assert_eq!(result.grid, grid);
    Ok(())
}
