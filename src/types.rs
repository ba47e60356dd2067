//! Result and timing types returned by the processor

use crate::{
    config::OutputFormat,
    engine::FilterReport,
    error::Result,
    grid::PixelGrid,
    services::ImageIOService,
};
use instant::Instant;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Timing breakdown of one cleanup run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingTimings {
    /// Image decoding from bytes or file
    pub decode_ms: u64,
    /// Foreground extraction (zero for passthrough)
    pub extraction_ms: u64,
    /// Labeling, retention and alpha rewrite
    pub filter_ms: u64,
    /// Output encoding, when the result was encoded
    pub encode_ms: Option<u64>,
    /// Total end-to-end time
    pub total_ms: u64,
}

impl ProcessingTimings {
    /// Time not attributed to any measured stage
    #[must_use]
    pub fn other_overhead_ms(&self) -> u64 {
        let measured =
            self.decode_ms + self.extraction_ms + self.filter_ms + self.encode_ms.unwrap_or(0);
        self.total_ms.saturating_sub(measured)
    }

    /// One-line summary for logs and CLI output
    #[must_use]
    pub fn summary(&self) -> String {
        let mut summary = format!(
            "Total: {}ms | Decode: {}ms | Extract: {}ms | Filter: {}ms",
            self.total_ms, self.decode_ms, self.extraction_ms, self.filter_ms
        );
        if let Some(encode_ms) = self.encode_ms {
            summary.push_str(&format!(" | Encode: {encode_ms}ms"));
        }
        summary
    }
}

pub(crate) fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

/// Cleaned image together with what happened to it
#[derive(Debug)]
pub struct CleanupResult {
    pub grid: PixelGrid,
    pub report: FilterReport,
    pub timings: ProcessingTimings,
}

impl CleanupResult {
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.grid.dimensions()
    }

    /// Encode the cleaned image, recording the encode time
    ///
    /// # Errors
    /// - Encoder failures
    pub fn to_bytes(&mut self, format: OutputFormat) -> Result<Vec<u8>> {
        let start = Instant::now();
        let bytes = ImageIOService::encode(&self.grid, format)?;
        self.record_encode(elapsed_ms(start));
        Ok(bytes)
    }

    /// Encode and write the cleaned image to `path`
    ///
    /// # Errors
    /// - Encoder failures
    /// - File system errors
    pub fn save<P: AsRef<Path>>(&mut self, path: P, format: OutputFormat) -> Result<()> {
        let start = Instant::now();
        ImageIOService::save_grid(&self.grid, path, format)?;
        self.record_encode(elapsed_ms(start));
        Ok(())
    }

    fn record_encode(&mut self, encode_ms: u64) {
        self.timings.encode_ms = Some(encode_ms);
        self.timings.total_ms += encode_ms;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overhead_never_underflows() {
        let timings = ProcessingTimings {
            decode_ms: 5,
            extraction_ms: 10,
            filter_ms: 3,
            encode_ms: Some(4),
            total_ms: 20,
        };
        assert_eq!(timings.other_overhead_ms(), 0);
        assert!(timings.summary().contains("Encode: 4ms"));

        let timings = ProcessingTimings {
            total_ms: 30,
            ..timings
        };
        assert_eq!(timings.other_overhead_ms(), 8);
    }

    #[test]
    fn test_to_bytes_records_encode_time() {
        let mut result = CleanupResult {
            grid: PixelGrid::filled(2, 2, [0, 0, 0, 255]).unwrap(),
            report: FilterReport::default(),
            timings: ProcessingTimings::default(),
        };
        let bytes = result.to_bytes(OutputFormat::Rgba8).unwrap();
        assert_eq!(bytes.len(), 16);
        assert!(result.timings.encode_ms.is_some());
        assert!(!result.timings.summary().is_empty());
    }
}
