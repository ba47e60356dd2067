//! Configuration types for fragment filtering

use crate::error::{FragmentError, Result};
use serde::{Deserialize, Serialize};

/// Alpha value at or above which a pixel counts as opaque foreground
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlphaThreshold(pub u8);

impl AlphaThreshold {
    pub const DEFAULT: Self = Self(128);

    #[must_use]
    pub const fn new(value: u8) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }
}

impl Default for AlphaThreshold {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<u8> for AlphaThreshold {
    fn from(value: u8) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for AlphaThreshold {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which regions survive besides the largest one
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RetentionPolicy {
    /// Keep exactly one region, the largest
    #[serde(rename = "largest")]
    KeepLargestOnly,
    /// Keep the largest region and every region of at least
    /// `max(floor, fraction * total_pixels)` pixels
    #[serde(rename = "relative")]
    KeepLargestAndAboveRelativeSize {
        /// Fraction of the total pixel count, in `[0, 1]`
        fraction: f64,
        /// Absolute minimum region size in pixels
        floor: u32,
    },
}

impl RetentionPolicy {
    /// Default fraction of the image a secondary region must cover (0.05%)
    pub const DEFAULT_FRACTION: f64 = 0.0005;
    /// Default minimum size of a secondary region in pixels
    pub const DEFAULT_FLOOR: u32 = 100;

    /// Relative policy with the default fraction and floor
    #[must_use]
    pub fn relative_default() -> Self {
        Self::KeepLargestAndAboveRelativeSize {
            fraction: Self::DEFAULT_FRACTION,
            floor: Self::DEFAULT_FLOOR,
        }
    }

    /// Short name used on the command line and in HTTP requests
    #[must_use]
    pub fn mode_name(&self) -> &'static str {
        match self {
            Self::KeepLargestOnly => "largest",
            Self::KeepLargestAndAboveRelativeSize { .. } => "relative",
        }
    }

    /// Validate policy parameters
    ///
    /// # Errors
    /// - Fraction is NaN, infinite, or outside `[0, 1]`
    pub fn validate(&self) -> Result<()> {
        if let Self::KeepLargestAndAboveRelativeSize { fraction, .. } = *self {
            if !fraction.is_finite() || !(0.0..=1.0).contains(&fraction) {
                return Err(FragmentError::config_value_error(
                    "min_region_fraction",
                    fraction,
                    "0.0-1.0",
                    Some(Self::DEFAULT_FRACTION),
                ));
            }
        }
        Ok(())
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::KeepLargestOnly
    }
}

impl std::fmt::Display for RetentionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::KeepLargestOnly => write!(f, "largest"),
            Self::KeepLargestAndAboveRelativeSize { fraction, floor } => {
                write!(f, "relative(fraction={fraction}, floor={floor})")
            },
        }
    }
}

/// Output image format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// PNG with alpha channel transparency
    Png,
    /// TIFF with alpha channel transparency and lossless compression
    Tiff,
    /// Raw RGBA8 pixel data (4 bytes per pixel)
    Rgba8,
}

impl OutputFormat {
    /// File extension (without the dot)
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Tiff => "tiff",
            Self::Rgba8 => "raw",
        }
    }

    /// MIME type for HTTP responses
    #[must_use]
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Tiff => "image/tiff",
            Self::Rgba8 => "application/octet-stream",
        }
    }
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::Png
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Png => write!(f, "png"),
            Self::Tiff => write!(f, "tiff"),
            Self::Rgba8 => write!(f, "rgba8"),
        }
    }
}

/// Configuration for one cleanup run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupConfig {
    /// Alpha threshold separating foreground from background
    pub alpha_threshold: AlphaThreshold,

    /// Region retention policy
    pub retention: RetentionPolicy,

    /// Output format
    pub output_format: OutputFormat,

    /// Enable debug mode (additional logging)
    pub debug: bool,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            alpha_threshold: AlphaThreshold::DEFAULT,
            retention: RetentionPolicy::KeepLargestOnly,
            output_format: OutputFormat::Png,
            debug: false,
        }
    }
}

impl CleanupConfig {
    /// Create a new configuration builder
    ///
    /// # Examples
    /// ```rust
    /// use bgremove_fragments::{CleanupConfig, RetentionPolicy};
    ///
    /// let config = CleanupConfig::builder()
    ///     .alpha_threshold(200)
    ///     .retention(RetentionPolicy::relative_default())
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.alpha_threshold.get(), 200);
    /// ```
    #[must_use]
    pub fn builder() -> CleanupConfigBuilder {
        CleanupConfigBuilder::new()
    }

    /// Validate the configuration
    ///
    /// # Errors
    /// - Invalid retention policy parameters
    pub fn validate(&self) -> Result<()> {
        self.retention.validate()
    }
}

/// Builder for [`CleanupConfig`]
#[derive(Debug, Default)]
pub struct CleanupConfigBuilder {
    config: CleanupConfig,
}

impl CleanupConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn alpha_threshold(mut self, threshold: impl Into<AlphaThreshold>) -> Self {
        self.config.alpha_threshold = threshold.into();
        self
    }

    #[must_use]
    pub fn retention(mut self, policy: RetentionPolicy) -> Self {
        self.config.retention = policy;
        self
    }

    #[must_use]
    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.config.output_format = format;
        self
    }

    #[must_use]
    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    /// Build the configuration
    ///
    /// # Errors
    /// - Retention fraction outside `[0, 1]` or not finite
    pub fn build(self) -> Result<CleanupConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Configuration for the HTTP service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind
    pub bind: String,
    /// TCP port
    pub port: u16,
    /// Directory holding the built frontend
    pub static_dir: std::path::PathBuf,
    /// Maximum accepted request body size in bytes
    pub max_upload_bytes: usize,
    /// Maximum number of uploads processed at the same time
    pub max_concurrent_jobs: usize,
    /// Cleanup settings applied when a request does not override them
    pub cleanup: CleanupConfig,
}

impl ServerConfig {
    pub const DEFAULT_PORT: u16 = 3000;
    pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

    /// Defaults overridden by `PORT`, `BGREMOVE_STATIC_DIR` and `BGREMOVE_MAX_JOBS`
    ///
    /// # Errors
    /// - An environment variable is set but cannot be parsed
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(port) = std::env::var("PORT") {
            config.port = port.parse().map_err(|_| {
                FragmentError::config_value_error("PORT", port.as_str(), "1-65535", None)
            })?;
        }
        if let Ok(dir) = std::env::var("BGREMOVE_STATIC_DIR") {
            config.static_dir = dir.into();
        }
        if let Ok(jobs) = std::env::var("BGREMOVE_MAX_JOBS") {
            config.max_concurrent_jobs = jobs.parse().map_err(|_| {
                FragmentError::config_value_error("BGREMOVE_MAX_JOBS", jobs.as_str(), ">= 1", None)
            })?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    ///
    /// # Errors
    /// - Zero job limit or upload limit
    /// - Invalid default cleanup configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_jobs == 0 {
            return Err(FragmentError::invalid_config(
                "max_concurrent_jobs must be at least 1",
            ));
        }
        if self.max_upload_bytes == 0 {
            return Err(FragmentError::invalid_config(
                "max_upload_bytes must be at least 1",
            ));
        }
        self.cleanup.validate()
    }

    /// Socket address string for binding
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        let parallelism = std::thread::available_parallelism()
            .map(std::num::NonZeroUsize::get)
            .unwrap_or(1);
        Self {
            bind: "0.0.0.0".to_string(),
            port: Self::DEFAULT_PORT,
            static_dir: "dist".into(),
            max_upload_bytes: Self::DEFAULT_MAX_UPLOAD_BYTES,
            max_concurrent_jobs: parallelism,
            cleanup: CleanupConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CleanupConfig::default();
        assert_eq!(config.alpha_threshold, AlphaThreshold(128));
        assert_eq!(config.retention, RetentionPolicy::KeepLargestOnly);
        assert_eq!(config.output_format, OutputFormat::Png);

        match RetentionPolicy::relative_default() {
            RetentionPolicy::KeepLargestAndAboveRelativeSize { fraction, floor } => {
                assert!((fraction - 0.0005).abs() < f64::EPSILON);
                assert_eq!(floor, 100);
            },
            RetentionPolicy::KeepLargestOnly => panic!("expected relative policy"),
        }
    }

    #[test]
    fn test_builder_rejects_bad_fraction() {
        for fraction in [-0.1, 1.5, f64::NAN, f64::INFINITY] {
            let result = CleanupConfig::builder()
                .retention(RetentionPolicy::KeepLargestAndAboveRelativeSize { fraction, floor: 1 })
                .build();
            assert!(matches!(result, Err(FragmentError::InvalidConfig(_))));
        }

        let config = CleanupConfig::builder()
            .retention(RetentionPolicy::KeepLargestAndAboveRelativeSize {
                fraction: 1.0,
                floor: 0,
            })
            .build();
        assert!(config.is_ok());
    }

    #[test]
    fn test_retention_serialization() {
        let json = serde_json::to_string(&RetentionPolicy::KeepLargestOnly).unwrap();
        assert_eq!(json, r#"{"mode":"largest"}"#);

        let policy: RetentionPolicy =
            serde_json::from_str(r#"{"mode":"relative","fraction":0.5,"floor":1}"#).unwrap();
        assert_eq!(
            policy,
            RetentionPolicy::KeepLargestAndAboveRelativeSize {
                fraction: 0.5,
                floor: 1
            }
        );
    }

    #[test]
    fn test_cleanup_config_partial_json() {
        let config: CleanupConfig = serde_json::from_str(r#"{"alpha_threshold":200}"#).unwrap();
        assert_eq!(config.alpha_threshold.get(), 200);
        assert_eq!(config.retention, RetentionPolicy::KeepLargestOnly);
    }

    #[test]
    fn test_server_config_validation() {
        let mut config = ServerConfig::default();
        assert_eq!(config.port, 3000);
        assert_eq!(config.max_upload_bytes, 50 * 1024 * 1024);
        assert!(config.validate().is_ok());

        config.max_concurrent_jobs = 0;
        assert!(config.validate().is_err());
        assert_eq!(ServerConfig::default().address(), "0.0.0.0:3000");
    }
}
