#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]

//! # Background Removal Fragment Filter
//!
//! Post-processing for background removal cutouts. A segmentation model
//! produces an RGBA image whose alpha channel marks the foreground, but the
//! mask usually carries stray specks and halos next to the real subject.
//! This crate keeps the dominant foreground object and erases everything
//! that is not connected to it.
//!
//! ## Features
//!
//! - **Connected-component filtering**: 4-connected labeling of the opaque
//!   pixels, deterministic row-major label order
//! - **Retention policies**: keep only the largest region, or also keep
//!   regions above a size cutoff relative to the image
//! - **Foreground extraction**: optional pure Rust ONNX inference (Tract) in
//!   front of the filter, or pass-through of an existing alpha channel
//! - **CLI Integration**: single files, directories and stdin (`cli` feature)
//! - **HTTP Service**: upload endpoint plus health check (`server` feature)
//!
//! ## Quick Start
//!
//! Filter a raw RGBA buffer:
//!
//! ```rust
//! use bgremove_fragments::{filter_rgba, AlphaThreshold, RetentionPolicy};
//!
//! // 4x1 strip: two opaque pixels, a gap, one opaque speck
//! let pixels = vec![
//!     10, 20, 30, 255,  10, 20, 30, 255,  0, 0, 0, 0,  10, 20, 30, 200,
//! ];
//! let outcome = filter_rgba(4, 1, pixels, AlphaThreshold::DEFAULT, RetentionPolicy::KeepLargestOnly)?;
//!
//! assert_eq!(outcome.report.region_count, 2);
//! assert_eq!(outcome.grid.alphas().collect::<Vec<_>>(), vec![255, 255, 0, 0]);
//! # Ok::<(), bgremove_fragments::FragmentError>(())
//! ```
//!
//! Clean an encoded image:
//!
//! ```rust,no_run
//! use bgremove_fragments::{CleanupConfig, CleanupProcessor, OutputFormat, RetentionPolicy};
//!
//! # fn example() -> anyhow::Result<()> {
//! let config = CleanupConfig::builder()
//!     .alpha_threshold(200)
//!     .retention(RetentionPolicy::relative_default())
//!     .output_format(OutputFormat::Png)
//!     .build()?;
//!
//! let processor = CleanupProcessor::new(config)?;
//! let mut result = processor.process_file("cutout.png")?;
//! println!("{} regions found", result.report.region_count);
//! result.save("cutout_clean.png", OutputFormat::Png)?;
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod extractor;
pub mod grid;
pub mod processor;
#[cfg(feature = "server")]
pub mod server;
pub mod services;
#[cfg(feature = "cli")]
pub mod tracing_config;
pub mod types;

// Public API exports
pub use config::{AlphaThreshold, CleanupConfig, OutputFormat, RetentionPolicy, ServerConfig};
pub use engine::{filter_rgba, FilterOutcome, FilterReport, FragmentFilter, RegionSummary};
pub use error::{FragmentError, Result};
pub use extractor::{create_extractor, AlphaPassthrough, ExtractorKind, ForegroundExtractor};
#[cfg(feature = "tract")]
pub use extractor::{ExtractorModelConfig, TractExtractor};
pub use grid::PixelGrid;
pub use processor::CleanupProcessor;
pub use services::ImageIOService;
pub use types::{CleanupResult, ProcessingTimings};

#[cfg(feature = "cli")]
pub use tracing_config::{
    events, init_cli_tracing, spans, TracingConfig, TracingFormat, TracingGuard, TracingOutput,
};

/// Remove small fragments from an encoded image and re-encode it
///
/// Bytes-in, bytes-out entry point for web handlers and other in-memory
/// callers. The image's existing alpha channel is filtered as-is; no model
/// runs. The result is encoded in `config.output_format`.
///
/// # Examples
/// ```rust,no_run
/// use bgremove_fragments::{remove_small_fragments, CleanupConfig};
///
/// # fn example(upload: Vec<u8>) -> anyhow::Result<()> {
/// let png = remove_small_fragments(&upload, &CleanupConfig::default())?;
/// std::fs::write("clean.png", png)?;
/// # Ok(())
/// # }
/// ```
pub fn remove_small_fragments(image_bytes: &[u8], config: &CleanupConfig) -> Result<Vec<u8>> {
    let processor = CleanupProcessor::new(config.clone())?;
    let mut result = processor.process_bytes(image_bytes)?;
    result.to_bytes(config.output_format)
}

/// Async variant of [`remove_small_fragments`] reading from a stream
///
/// Filtering runs on the blocking thread pool.
pub async fn remove_small_fragments_from_reader<R: tokio::io::AsyncRead + Unpin>(
    reader: R,
    config: &CleanupConfig,
) -> Result<Vec<u8>> {
    let grid = ImageIOService::decode_from_reader(reader).await?;
    let processor = CleanupProcessor::new(config.clone())?;
    let format = config.output_format;
    tokio::task::spawn_blocking(move || {
        let mut result = processor.process_grid(grid)?;
        result.to_bytes(format)
    })
    .await
    .map_err(|e| FragmentError::processing(format!("Filter task failed: {e}")))?
}
