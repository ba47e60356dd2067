use super::ForegroundExtractor;
use crate::error::Result;
use image::{DynamicImage, RgbaImage};

/// Uses the input's own alpha channel as the foreground matte
///
/// Inputs without alpha come out fully opaque, so filtering them keeps
/// the whole image as a single region.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlphaPassthrough;

impl ForegroundExtractor for AlphaPassthrough {
    fn name(&self) -> &'static str {
        "passthrough"
    }

    fn extract(&self, image: DynamicImage) -> Result<RgbaImage> {
        Ok(image.into_rgba8())
    }
}
