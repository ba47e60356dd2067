//! Cleanup processor
//!
//! Ties decoding, foreground extraction and fragment filtering together.
//! The CLI and the HTTP service both go through [`CleanupProcessor`] so
//! they behave the same way.

use crate::{
    config::CleanupConfig,
    engine::FragmentFilter,
    error::Result,
    extractor::{AlphaPassthrough, ForegroundExtractor},
    grid::PixelGrid,
    services::ImageIOService,
    types::{elapsed_ms, CleanupResult, ProcessingTimings},
};
use image::DynamicImage;
use instant::Instant;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, instrument, span, Level};

/// Runs extraction and fragment filtering with one configuration
///
/// Cloning is cheap; the extractor is shared.
#[derive(Clone)]
pub struct CleanupProcessor {
    config: CleanupConfig,
    filter: FragmentFilter,
    extractor: Arc<dyn ForegroundExtractor>,
}

impl std::fmt::Debug for CleanupProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CleanupProcessor")
            .field("config", &self.config)
            .field("extractor", &self.extractor.name())
            .finish()
    }
}

impl CleanupProcessor {
    /// Processor that trusts the input alpha channel
    ///
    /// # Errors
    /// - Invalid configuration
    pub fn new(config: CleanupConfig) -> Result<Self> {
        Self::with_extractor(config, Arc::new(AlphaPassthrough))
    }

    /// Processor with a custom foreground extractor
    ///
    /// # Errors
    /// - Invalid configuration
    pub fn with_extractor(
        config: CleanupConfig,
        extractor: Arc<dyn ForegroundExtractor>,
    ) -> Result<Self> {
        let filter = FragmentFilter::from_config(&config)?;
        Ok(Self {
            config,
            filter,
            extractor,
        })
    }

    #[must_use]
    pub fn config(&self) -> &CleanupConfig {
        &self.config
    }

    #[must_use]
    pub fn extractor(&self) -> &Arc<dyn ForegroundExtractor> {
        &self.extractor
    }

    /// Decode, extract and filter an encoded image
    ///
    /// # Errors
    /// - Undecodable input
    /// - Extraction failures
    pub fn process_bytes(&self, bytes: &[u8]) -> Result<CleanupResult> {
        let start = Instant::now();
        let image = {
            let _span = span!(Level::DEBUG, "decode", bytes = bytes.len()).entered();
            ImageIOService::load_from_bytes(bytes)?
        };
        let decode_ms = elapsed_ms(start);

        let mut result = self.process_image(image)?;
        result.timings.decode_ms = decode_ms;
        result.timings.total_ms = elapsed_ms(start);
        Ok(result)
    }

    /// Load, extract and filter an image file
    ///
    /// # Errors
    /// - File missing or unreadable
    /// - Extraction failures
    pub fn process_file<P: AsRef<Path>>(&self, input_path: P) -> Result<CleanupResult> {
        let start = Instant::now();
        let image = ImageIOService::load_image(input_path.as_ref())?;
        let decode_ms = elapsed_ms(start);

        let mut result = self.process_image(image)?;
        result.timings.decode_ms = decode_ms;
        result.timings.total_ms = elapsed_ms(start);
        Ok(result)
    }

    /// Extract and filter a decoded image
    ///
    /// # Errors
    /// - Extraction failures
    /// - Extractor output with wrong dimensions
    #[instrument(
        skip(self, image),
        fields(
            extractor = self.extractor.name(),
            dimensions = %format!("{}x{}", image.width(), image.height())
        )
    )]
    pub fn process_image(&self, image: DynamicImage) -> Result<CleanupResult> {
        let start = Instant::now();
        let dimensions = (image.width(), image.height());

        let cutout = {
            let _span = span!(Level::DEBUG, "extraction").entered();
            self.extractor.extract(image)?
        };
        if cutout.dimensions() != dimensions {
            return Err(crate::error::FragmentError::processing_stage_error(
                "extraction",
                &format!(
                    "extractor '{}' returned {}x{} for a {}x{} input",
                    self.extractor.name(),
                    cutout.width(),
                    cutout.height(),
                    dimensions.0,
                    dimensions.1
                ),
                None,
            ));
        }
        let extraction_ms = elapsed_ms(start);

        let mut result = self.process_grid(PixelGrid::from_rgba_image(cutout)?)?;
        result.timings.extraction_ms = extraction_ms;
        result.timings.total_ms = elapsed_ms(start);
        Ok(result)
    }

    /// Filter an already matted grid, skipping extraction
    ///
    /// # Errors
    /// - Filter failures
    pub fn process_grid(&self, grid: PixelGrid) -> Result<CleanupResult> {
        let start = Instant::now();
        let outcome = self.filter.run(grid)?;
        let filter_ms = elapsed_ms(start);

        if self.config.debug {
            debug!(report = ?outcome.report, "Filter report");
        }
        info!(
            regions = outcome.report.region_count,
            erased = outcome.report.erased_fragment_pixels,
            filter_ms,
            "Cleanup finished"
        );

        Ok(CleanupResult {
            grid: outcome.grid,
            report: outcome.report,
            timings: ProcessingTimings {
                filter_ms,
                total_ms: filter_ms,
                ..ProcessingTimings::default()
            },
        })
    }
}
