//! Model input preparation and mask mapping
//!
//! Inputs are resized with their aspect ratio preserved, centred on a square
//! canvas and normalised into an NCHW tensor. Masks coming back from the
//! model are mapped through the inverse of the same transform.

use crate::error::{FragmentError, Result};
use image::{DynamicImage, ImageBuffer, RgbImage};
use ndarray::Array4;

/// Canvas placement of the resized input
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    /// Scale from original to canvas coordinates
    pub scale: f32,
    pub offset_x: u32,
    pub offset_y: u32,
    pub scaled_width: u32,
    pub scaled_height: u32,
}

impl Letterbox {
    /// Placement of a `width` x `height` image on a `target_size` square
    ///
    /// # Errors
    /// - Zero-sized input
    pub fn compute(width: u32, height: u32, target_size: u32) -> Result<Self> {
        if width == 0 || height == 0 || target_size == 0 {
            return Err(FragmentError::processing(format!(
                "Cannot letterbox {width}x{height} image into {target_size}px canvas"
            )));
        }

        let target = target_size as f32;
        let scale = (target / width as f32).min(target / height as f32);
        let scaled_width = ((width as f32 * scale).round() as u32).clamp(1, target_size);
        let scaled_height = ((height as f32 * scale).round() as u32).clamp(1, target_size);

        Ok(Self {
            scale,
            offset_x: (target_size - scaled_width) / 2,
            offset_y: (target_size - scaled_height) / 2,
            scaled_width,
            scaled_height,
        })
    }

    /// Canvas coordinates of original pixel `(x, y)`
    #[must_use]
    pub fn to_canvas(&self, x: u32, y: u32) -> (u32, u32) {
        let cx = ((x as f32 + 0.5) * self.scale).floor() as u32;
        let cy = ((y as f32 + 0.5) * self.scale).floor() as u32;
        (
            cx.min(self.scaled_width.saturating_sub(1)) + self.offset_x,
            cy.min(self.scaled_height.saturating_sub(1)) + self.offset_y,
        )
    }
}

/// Resize, pad and normalise `image` into a `[1, 3, size, size]` tensor
///
/// # Errors
/// - Zero-sized input
pub fn preprocess(
    image: &DynamicImage,
    target_size: u32,
    mean: [f32; 3],
    std: [f32; 3],
) -> Result<(Array4<f32>, Letterbox)> {
    let rgb_image = image.to_rgb8();
    let (width, height) = rgb_image.dimensions();
    let letterbox = Letterbox::compute(width, height, target_size)?;

    let resized = image::imageops::resize(
        &rgb_image,
        letterbox.scaled_width,
        letterbox.scaled_height,
        image::imageops::FilterType::Triangle,
    );

    let mut canvas: RgbImage =
        ImageBuffer::from_pixel(target_size, target_size, image::Rgb([255, 255, 255]));
    image::imageops::replace(
        &mut canvas,
        &resized,
        i64::from(letterbox.offset_x),
        i64::from(letterbox.offset_y),
    );

    Ok((canvas_to_tensor(&canvas, mean, std), letterbox))
}

fn canvas_to_tensor(canvas: &RgbImage, mean: [f32; 3], std: [f32; 3]) -> Array4<f32> {
    let (width, height) = canvas.dimensions();
    let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));

    for (x, y, pixel) in canvas.enumerate_pixels() {
        for (channel, ((&value, m), s)) in pixel.0.iter().zip(mean).zip(std).enumerate() {
            if let Some(slot) = tensor.get_mut([0, channel, y as usize, x as usize]) {
                *slot = (f32::from(value) / 255.0 - m) / s;
            }
        }
    }

    tensor
}

/// Map a `[1, 1, H, W]` mask back onto the original image as alpha bytes
///
/// Values are clamped to `[0, 1]` and scaled to `0..=255`; pixels that map
/// outside the mask get 0.
///
/// # Errors
/// - Mask is not single-channel with batch size 1
pub fn mask_to_alpha(
    mask: &Array4<f32>,
    original_dimensions: (u32, u32),
    letterbox: &Letterbox,
) -> Result<Vec<u8>> {
    let &[batch, channels, mask_height, mask_width] = mask.shape() else {
        return Err(FragmentError::extraction("Mask must be 4-dimensional"));
    };
    if batch != 1 || channels != 1 {
        return Err(FragmentError::extraction(format!(
            "Expected mask shape [1, 1, H, W], got [{batch}, {channels}, {mask_height}, {mask_width}]"
        )));
    }

    let (width, height) = original_dimensions;
    let mut alpha = Vec::with_capacity(width as usize * height as usize);
    for y in 0..height {
        for x in 0..width {
            let (cx, cy) = letterbox.to_canvas(x, y);
            let value = mask
                .get([0, 0, cy as usize, cx as usize])
                .copied()
                .unwrap_or(0.0);
            alpha.push((value.clamp(0.0, 1.0) * 255.0).round() as u8);
        }
    }
    Ok(alpha)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MEAN: [f32; 3] = [0.5, 0.5, 0.5];
    const STD: [f32; 3] = [1.0, 1.0, 1.0];

    #[test]
    fn test_letterbox_wide_image() {
        let lb = Letterbox::compute(200, 100, 64).unwrap();
        assert_eq!((lb.scaled_width, lb.scaled_height), (64, 32));
        assert_eq!((lb.offset_x, lb.offset_y), (0, 16));
        assert_eq!(lb.to_canvas(0, 0), (0, 16));
        assert_eq!(lb.to_canvas(199, 99), (63, 47));
        assert!(Letterbox::compute(0, 10, 64).is_err());
    }

    #[test]
    fn test_preprocess_shape_and_padding() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(40, 20, image::Rgb([0, 0, 0])));
        let (tensor, lb) = preprocess(&image, 32, MEAN, STD).unwrap();
        assert_eq!(tensor.shape(), &[1, 3, 32, 32]);
        assert_eq!(lb.offset_y, 8);
        // white padding above the image, black content in the middle
        assert!((tensor[[0, 0, 0, 0]] - 0.5).abs() < 1e-6);
        assert!((tensor[[0, 2, 16, 16]] + 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_mask_maps_back_to_original() {
        // Left half of the canvas is foreground
        let mut mask = Array4::<f32>::zeros((1, 1, 8, 8));
        for y in 0..8 {
            for x in 0..4 {
                mask[[0, 0, y, x]] = 1.0;
            }
        }
        let lb = Letterbox::compute(4, 4, 8).unwrap();
        let alpha = mask_to_alpha(&mask, (4, 4), &lb).unwrap();
        assert_eq!(alpha.len(), 16);
        for row in alpha.chunks(4) {
            assert_eq!(row, &[255, 255, 0, 0]);
        }
    }

    #[test]
    fn test_mask_rejects_multichannel() {
        let mask = Array4::<f32>::zeros((1, 3, 8, 8));
        let lb = Letterbox::compute(8, 8, 8).unwrap();
        assert!(mask_to_alpha(&mask, (8, 8), &lb).is_err());
    }
}
