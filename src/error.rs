//! Error types for fragment filtering and the surrounding pipeline

use thiserror::Error;

/// Result type alias for fragment filtering operations
pub type Result<T> = std::result::Result<T, FragmentError>;

/// Error types for the fragment filter and its collaborators
#[derive(Error, Debug)]
pub enum FragmentError {
    /// Pixel buffer length does not equal `width * height * 4`
    #[error("Malformed grid: {width}x{height} RGBA needs {expected} bytes, got {len}")]
    MalformedGrid {
        width: u32,
        height: u32,
        expected: u64,
        len: usize,
    },

    /// Grid has more pixels than a `u32` label space can address
    #[error("Grid too large: {width}x{height} exceeds {max} pixels", max = u32::MAX)]
    GridTooLarge { width: u32, height: u32 },

    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decoding or encoding errors
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Foreground extraction (model) errors
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// Pipeline stage errors
    #[error("Processing error: {0}")]
    Processing(String),
}

impl FragmentError {
    /// Create a malformed grid error
    pub fn malformed_grid(width: u32, height: u32, len: usize) -> Self {
        Self::MalformedGrid {
            width,
            height,
            expected: u64::from(width) * u64::from(height) * 4,
            len,
        }
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new extraction error
    pub fn extraction<S: Into<String>>(msg: S) -> Self {
        Self::Extraction(msg.into())
    }

    /// Create a new processing error
    pub fn processing<S: Into<String>>(msg: S) -> Self {
        Self::Processing(msg.into())
    }

    /// Create file I/O error with operation context
    pub fn file_io_error<P: AsRef<std::path::Path>>(
        operation: &str,
        path: P,
        error: &std::io::Error,
    ) -> Self {
        let path_display = path.as_ref().display();
        Self::Io(std::io::Error::new(
            error.kind(),
            format!("Failed to {} '{}': {}", operation, path_display, error),
        ))
    }

    /// Create configuration error with valid ranges
    pub fn config_value_error<T: std::fmt::Display>(
        parameter: &str,
        value: T,
        valid_range: &str,
        recommended: Option<T>,
    ) -> Self {
        let recommendation = match recommended {
            Some(rec) => format!(" Recommended: {}", rec),
            None => String::new(),
        };

        Self::InvalidConfig(format!(
            "Invalid {}: {} (valid range: {}).{}",
            parameter, value, valid_range, recommendation
        ))
    }

    /// Create processing error with stage context
    pub fn processing_stage_error(stage: &str, details: &str, input_info: Option<&str>) -> Self {
        let input_context = match input_info {
            Some(info) => format!(" (input: {})", info),
            None => String::new(),
        };

        Self::Processing(format!(
            "Processing failed at stage '{}'{}: {}",
            stage, input_context, details
        ))
    }

    /// Whether the error was caused by the caller's input rather than by the service
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::MalformedGrid { .. }
                | Self::GridTooLarge { .. }
                | Self::InvalidConfig(_)
                | Self::Image(_)
        )
    }
}
