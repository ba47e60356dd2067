//! Image I/O operations service
//!
//! Decoding and encoding live here so the engine only ever sees
//! [`PixelGrid`] values.

use crate::{
    config::OutputFormat,
    error::{FragmentError, Result},
    grid::PixelGrid,
};
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use std::path::Path;

/// Service for handling image encoding, decoding and file operations
pub struct ImageIOService;

impl ImageIOService {
    /// Decode an encoded image (PNG, JPEG, ...) into an RGBA grid
    ///
    /// Images without an alpha channel come out fully opaque.
    ///
    /// # Examples
    /// ```rust,no_run
    /// use bgremove_fragments::services::ImageIOService;
    ///
    /// let bytes = std::fs::read("cutout.png")?;
    /// let grid = ImageIOService::decode(&bytes)?;
    /// println!("{}x{}", grid.width(), grid.height());
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn decode(bytes: &[u8]) -> Result<PixelGrid> {
        PixelGrid::from_dynamic(Self::load_from_bytes(bytes)?)
    }

    /// Decode bytes into a [`DynamicImage`] without converting it
    pub fn load_from_bytes(bytes: &[u8]) -> Result<DynamicImage> {
        let image = image::load_from_memory(bytes)?;
        log::debug!(
            "Decoded {} byte image: {}x{} {:?}",
            bytes.len(),
            image.width(),
            image.height(),
            image.color()
        );
        Ok(image)
    }

    /// Encode a grid in the requested output format
    ///
    /// # Errors
    /// - Encoder failures from the `image` crate
    pub fn encode(grid: &PixelGrid, format: OutputFormat) -> Result<Vec<u8>> {
        let image_format = match format {
            OutputFormat::Png => ImageFormat::Png,
            OutputFormat::Tiff => ImageFormat::Tiff,
            OutputFormat::Rgba8 => return Ok(grid.as_bytes().to_vec()),
        };

        let rgba = DynamicImage::ImageRgba8(grid.clone().into_rgba_image());
        let mut buffer = Vec::new();
        rgba.write_to(&mut Cursor::new(&mut buffer), image_format)
            .map_err(|e| {
                FragmentError::processing_stage_error(
                    "encode",
                    &format!("Failed to encode {format}: {e}"),
                    Some(&format!("{}x{} RGBA", grid.width(), grid.height())),
                )
            })?;
        log::debug!("Encoded {} bytes as {}", buffer.len(), format);
        Ok(buffer)
    }

    /// Load an image from a file path
    ///
    /// Format detection goes by extension first and falls back to sniffing
    /// the file contents.
    pub fn load_image<P: AsRef<Path>>(path: P) -> Result<DynamicImage> {
        let path_ref = path.as_ref();

        if !path_ref.exists() {
            return Err(FragmentError::file_io_error(
                "read image file",
                path_ref,
                &std::io::Error::new(std::io::ErrorKind::NotFound, "file does not exist"),
            ));
        }

        match image::open(path_ref) {
            Ok(img) => Ok(img),
            Err(e) => {
                log::debug!(
                    "Extension-based loading failed for {}: {}. Attempting content-based detection.",
                    path_ref.display(),
                    e
                );

                let data = std::fs::read(path_ref).map_err(|io_err| {
                    FragmentError::file_io_error("read image data", path_ref, &io_err)
                })?;

                image::load_from_memory(&data).map_err(|content_err| {
                    let extension = path_ref
                        .extension()
                        .and_then(|s| s.to_str())
                        .unwrap_or("unknown");

                    FragmentError::processing_stage_error(
                        "image loading",
                        &format!(
                            "Failed to load image with both extension-based ({extension}) and content-based detection. Extension error: {e}. Content error: {content_err}"
                        ),
                        Some(&format!(
                            "path: {}, size: {} bytes",
                            path_ref.display(),
                            data.len()
                        )),
                    )
                })
            },
        }
    }

    /// Load a file straight into a grid
    pub fn load_grid<P: AsRef<Path>>(path: P) -> Result<PixelGrid> {
        PixelGrid::from_dynamic(Self::load_image(path)?)
    }

    /// Encode a grid and write it to `path`, creating parent directories
    pub fn save_grid<P: AsRef<Path>>(grid: &PixelGrid, path: P, format: OutputFormat) -> Result<()> {
        let path_ref = path.as_ref();

        if let Some(parent) = path_ref.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                FragmentError::file_io_error("create output directory", parent, &e)
            })?;
        }

        let bytes = Self::encode(grid, format)?;
        std::fs::write(path_ref, &bytes)
            .map_err(|e| FragmentError::file_io_error("write output image", path_ref, &e))?;
        log::debug!("Saved {} ({} bytes)", path_ref.display(), bytes.len());
        Ok(())
    }

    /// Check if a file path has a supported image extension
    pub fn is_supported_format<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_lowercase)
            .is_some_and(|ext| {
                matches!(
                    ext.as_str(),
                    "png" | "jpg" | "jpeg" | "tiff" | "tif" | "bmp" | "gif" | "webp"
                )
            })
    }

    /// Read an encoded image from an async reader and decode it
    pub async fn decode_from_reader<R: tokio::io::AsyncRead + Unpin>(
        mut reader: R,
    ) -> Result<PixelGrid> {
        use tokio::io::AsyncReadExt;

        let mut buffer = Vec::new();
        reader.read_to_end(&mut buffer).await?;
        Self::decode(&buffer)
    }

    /// Encode a grid and write it to an async writer, returning the byte count
    pub async fn encode_to_writer<W: tokio::io::AsyncWrite + Unpin>(
        grid: &PixelGrid,
        mut writer: W,
        format: OutputFormat,
    ) -> Result<u64> {
        use tokio::io::AsyncWriteExt;

        let bytes = Self::encode(grid, format)?;
        writer.write_all(&bytes).await?;
        writer.flush().await?;
        Ok(bytes.len() as u64)
    }
}
