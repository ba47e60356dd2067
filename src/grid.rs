//! RGBA pixel grid handed between pipeline stages

use crate::error::{FragmentError, Result};
use image::{DynamicImage, RgbaImage};

/// Bytes per RGBA pixel
pub const CHANNELS: usize = 4;
/// Offset of the alpha byte inside a pixel
pub const ALPHA_OFFSET: usize = 3;

/// Decoded RGBA raster with a validated buffer length
///
/// The buffer always holds exactly `width * height * 4` bytes in R,G,B,A
/// order, and the pixel count always fits in `u32`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelGrid {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl PixelGrid {
    /// Wrap an RGBA buffer
    ///
    /// # Errors
    /// - `MalformedGrid` when `pixels.len() != width * height * 4`
    /// - `GridTooLarge` when `width * height` exceeds `u32::MAX`
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        let pixel_count = u64::from(width) * u64::from(height);
        if pixel_count > u64::from(u32::MAX) {
            return Err(FragmentError::GridTooLarge { width, height });
        }
        let expected = usize::try_from(pixel_count)
            .ok()
            .and_then(|count| count.checked_mul(CHANNELS));
        if expected != Some(pixels.len()) {
            return Err(FragmentError::malformed_grid(width, height, pixels.len()));
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Grid filled with a single RGBA value
    ///
    /// # Errors
    /// - `GridTooLarge` when `width * height` exceeds `u32::MAX`
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Result<Self> {
        let pixel_count = u64::from(width) * u64::from(height);
        if pixel_count > u64::from(u32::MAX) {
            return Err(FragmentError::GridTooLarge { width, height });
        }
        let pixels = rgba
            .iter()
            .copied()
            .cycle()
            .take(pixel_count as usize * CHANNELS)
            .collect();
        Self::new(width, height, pixels)
    }

    /// Convert an `image` RGBA buffer
    ///
    /// # Errors
    /// - `GridTooLarge` for images with more than `u32::MAX` pixels
    pub fn from_rgba_image(image: RgbaImage) -> Result<Self> {
        let (width, height) = image.dimensions();
        Self::new(width, height, image.into_raw())
    }

    /// Convert any decoded image, adding an opaque alpha channel if it has none
    ///
    /// # Errors
    /// - `GridTooLarge` for images with more than `u32::MAX` pixels
    pub fn from_dynamic(image: DynamicImage) -> Result<Self> {
        Self::from_rgba_image(image.into_rgba8())
    }

    /// Convert back into an `image` RGBA buffer
    #[must_use]
    pub fn into_rgba_image(self) -> RgbaImage {
        // Length invariant is checked at construction
        RgbaImage::from_raw(self.width, self.height, self.pixels)
            .unwrap_or_else(|| RgbaImage::new(0, 0))
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Number of pixels (`width * height`)
    #[must_use]
    pub fn pixel_count(&self) -> usize {
        self.pixels.len() / CHANNELS
    }

    /// Raw RGBA bytes
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.pixels
    }

    /// Take ownership of the raw RGBA bytes
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.pixels
    }

    /// Alpha byte of the pixel at flat index `index`
    ///
    /// # Panics
    /// Panics if `index >= pixel_count()`.
    #[must_use]
    #[allow(clippy::indexing_slicing)]
    pub fn alpha(&self, index: usize) -> u8 {
        self.pixels[index * CHANNELS + ALPHA_OFFSET]
    }

    /// Iterator over the alpha channel in row-major order
    pub fn alphas(&self) -> impl Iterator<Item = u8> + '_ {
        self.pixels.chunks_exact(CHANNELS).map(|px| px[ALPHA_OFFSET])
    }

    /// RGBA value at `(x, y)`, or `None` outside the grid
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let start = (y as usize * self.width as usize + x as usize) * CHANNELS;
        let px = self.pixels.get(start..start + CHANNELS)?;
        <[u8; 4]>::try_from(px).ok()
    }

    /// Overwrite the RGBA value at `(x, y)`; ignored outside the grid
    pub fn set_pixel(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        if x >= self.width || y >= self.height {
            return;
        }
        let start = (y as usize * self.width as usize + x as usize) * CHANNELS;
        if let Some(px) = self.pixels.get_mut(start..start + CHANNELS) {
            px.copy_from_slice(&rgba);
        }
    }

    /// Mutable pixel chunks, 4 bytes each, in row-major order
    pub(crate) fn pixels_mut(&mut self) -> std::slice::ChunksExactMut<'_, u8> {
        self.pixels.chunks_exact_mut(CHANNELS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_validates_length() {
        assert!(PixelGrid::new(2, 2, vec![0; 16]).is_ok());
        assert!(PixelGrid::new(0, 0, Vec::new()).is_ok());

        let err = PixelGrid::new(2, 2, vec![0; 15]).unwrap_err();
        assert!(matches!(
            err,
            FragmentError::MalformedGrid {
                width: 2,
                height: 2,
                expected: 16,
                len: 15
            }
        ));
        assert!(PixelGrid::new(3, 1, vec![0; 16]).is_err());
    }

    #[test]
    fn test_rejects_oversized_dimensions() {
        let err = PixelGrid::new(u32::MAX, 2, Vec::new()).unwrap_err();
        assert!(matches!(err, FragmentError::GridTooLarge { .. }));
    }

    #[test]
    fn test_pixel_access() {
        let mut grid = PixelGrid::filled(3, 2, [10, 20, 30, 40]).unwrap();
        assert_eq!(grid.pixel_count(), 6);
        assert_eq!(grid.pixel(2, 1), Some([10, 20, 30, 40]));
        assert_eq!(grid.pixel(3, 0), None);

        grid.set_pixel(1, 1, [1, 2, 3, 4]);
        assert_eq!(grid.alpha(4), 4);
        assert_eq!(grid.alphas().filter(|&a| a == 40).count(), 5);
    }

    #[test]
    fn test_image_conversion_adds_alpha() {
        let rgb = image::RgbImage::from_pixel(2, 3, image::Rgb([5, 6, 7]));
        let grid = PixelGrid::from_dynamic(DynamicImage::ImageRgb8(rgb)).unwrap();
        assert_eq!(grid.dimensions(), (2, 3));
        assert!(grid.alphas().all(|a| a == 255));

        let image = grid.clone().into_rgba_image();
        assert_eq!(image.get_pixel(1, 2).0, [5, 6, 7, 255]);
        assert_eq!(PixelGrid::from_rgba_image(image).unwrap(), grid);
    }
}
