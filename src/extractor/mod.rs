//! Foreground extraction ahead of fragment filtering
//!
//! An extractor turns a decoded photo into an RGBA cutout whose alpha
//! channel marks the foreground. Fragment filtering then cleans that alpha.

mod passthrough;
#[cfg(feature = "tract")]
pub mod preprocessing;
#[cfg(feature = "tract")]
mod tract;

pub use passthrough::AlphaPassthrough;
#[cfg(feature = "tract")]
pub use tract::{ExtractorModelConfig, TractExtractor};

use crate::error::{FragmentError, Result};
use image::{DynamicImage, RgbaImage};
use std::path::PathBuf;
use std::sync::Arc;

/// Produces an alpha-matted RGBA image from a decoded input
pub trait ForegroundExtractor: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Produce the RGBA cutout for `image`
    ///
    /// The output must have the same dimensions as the input.
    ///
    /// # Errors
    /// - Model inference failures
    fn extract(&self, image: DynamicImage) -> Result<RgbaImage>;
}

/// Which extractor to build
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ExtractorKind {
    /// Trust the alpha channel already present in the input
    #[default]
    Passthrough,
    /// Run an ONNX segmentation model with tract
    Tract {
        model_path: PathBuf,
        /// Optional JSON file with input size and normalisation
        model_config: Option<PathBuf>,
    },
}

impl std::str::FromStr for ExtractorKind {
    type Err = FragmentError;

    /// Parses `passthrough` or `tract:<model path>`
    fn from_str(s: &str) -> Result<Self> {
        match s.split_once(':') {
            None if s.eq_ignore_ascii_case("passthrough") => Ok(Self::Passthrough),
            Some((kind, path)) if kind.eq_ignore_ascii_case("tract") && !path.is_empty() => {
                Ok(Self::Tract {
                    model_path: PathBuf::from(path),
                    model_config: None,
                })
            },
            _ => Err(FragmentError::config_value_error(
                "extractor",
                s,
                "passthrough | tract:<model.onnx>",
                Some("passthrough"),
            )),
        }
    }
}

/// Build the extractor described by `kind`
///
/// # Errors
/// - Model file missing or not a loadable ONNX graph
/// - Model config file unreadable or invalid
/// - `Tract` requested in a build without the `tract` feature
pub fn create_extractor(kind: &ExtractorKind) -> Result<Arc<dyn ForegroundExtractor>> {
    match kind {
        ExtractorKind::Passthrough => Ok(Arc::new(AlphaPassthrough)),
        #[cfg(feature = "tract")]
        ExtractorKind::Tract {
            model_path,
            model_config,
        } => {
            let config = match model_config {
                Some(path) => ExtractorModelConfig::from_json_file(path, model_path.clone())?,
                None => ExtractorModelConfig::new(model_path.clone()),
            };
            Ok(Arc::new(TractExtractor::load(config)?))
        },
        #[cfg(not(feature = "tract"))]
        ExtractorKind::Tract { .. } => Err(FragmentError::invalid_config(
            "Model-based extraction requires the 'tract' feature",
        )),
    }
}
