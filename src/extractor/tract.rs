//! ONNX segmentation model run with tract (pure Rust inference)

use super::preprocessing::{mask_to_alpha, preprocess};
use super::ForegroundExtractor;
use crate::error::{FragmentError, Result};
use image::{DynamicImage, RgbaImage};
use instant::Instant;
use ndarray::Array4;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tract_onnx::prelude::*;

type TractModel = RunnableModel<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Model file plus the preprocessing it expects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorModelConfig {
    pub model_path: PathBuf,
    /// Square input edge in pixels
    pub input_size: u32,
    /// Per-channel mean subtracted after scaling to `[0, 1]`
    pub mean: [f32; 3],
    /// Per-channel standard deviation
    pub std: [f32; 3],
}

impl Default for ExtractorModelConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::new(),
            input_size: 1024,
            mean: [0.5, 0.5, 0.5],
            std: [1.0, 1.0, 1.0],
        }
    }
}

impl ExtractorModelConfig {
    #[must_use]
    pub fn new(model_path: PathBuf) -> Self {
        Self {
            model_path,
            ..Self::default()
        }
    }

    /// Read preprocessing settings from a JSON file; `model_path` always wins
    /// over a path stored in the file
    ///
    /// # Errors
    /// - File unreadable or not valid JSON
    /// - Zero input size or zero standard deviation
    pub fn from_json_file(config_path: &Path, model_path: PathBuf) -> Result<Self> {
        let text = std::fs::read_to_string(config_path)
            .map_err(|e| FragmentError::file_io_error("read model config", config_path, &e))?;
        let mut config: Self = serde_json::from_str(&text).map_err(|e| {
            FragmentError::invalid_config(format!(
                "Invalid model config {}: {e}",
                config_path.display()
            ))
        })?;
        config.model_path = model_path;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    /// - Zero input size or a non-positive standard deviation
    pub fn validate(&self) -> Result<()> {
        if self.input_size == 0 {
            return Err(FragmentError::config_value_error(
                "input_size",
                self.input_size,
                ">= 1",
                Some(1024),
            ));
        }
        if self.std.iter().any(|&s| !(s > 0.0)) {
            return Err(FragmentError::invalid_config(
                "Model std values must be positive",
            ));
        }
        Ok(())
    }
}

/// Foreground extractor backed by an ONNX segmentation model
pub struct TractExtractor {
    model: TractModel,
    config: ExtractorModelConfig,
}

impl std::fmt::Debug for TractExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TractExtractor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl TractExtractor {
    /// Load and optimise the model
    ///
    /// # Errors
    /// - Model file missing or unreadable
    /// - Graph cannot be loaded, typed or optimised
    pub fn load(config: ExtractorModelConfig) -> Result<Self> {
        config.validate()?;
        let start = Instant::now();
        let size = config.input_size as usize;

        let model_data = std::fs::read(&config.model_path)
            .map_err(|e| FragmentError::file_io_error("read model", &config.model_path, &e))?;

        let model = onnx()
            .model_for_read(&mut std::io::Cursor::new(model_data))
            .map_err(|e| FragmentError::extraction(format!("Failed to load ONNX model: {e}")))?
            .with_input_fact(0, f32::fact([1, 3, size, size]).into())
            .map_err(|e| FragmentError::extraction(format!("Failed to set model input: {e}")))?
            .into_optimized()
            .map_err(|e| FragmentError::extraction(format!("Failed to optimize model: {e}")))?
            .into_runnable()
            .map_err(|e| {
                FragmentError::extraction(format!("Failed to create runnable model: {e}"))
            })?;

        log::info!(
            "Loaded model {} in {}ms",
            config.model_path.display(),
            start.elapsed().as_millis()
        );
        Ok(Self { model, config })
    }

    #[must_use]
    pub fn config(&self) -> &ExtractorModelConfig {
        &self.config
    }

    fn infer(&self, input: &Array4<f32>) -> Result<Array4<f32>> {
        let data = input
            .as_slice()
            .ok_or_else(|| FragmentError::extraction("Input tensor is not contiguous"))?;
        let tensor = Tensor::from_shape(input.shape(), data)
            .map_err(|e| FragmentError::extraction(format!("Failed to build input tensor: {e}")))?;

        let outputs = self
            .model
            .run(tvec![tensor.into()])
            .map_err(|e| FragmentError::extraction(format!("Tract inference failed: {e}")))?;
        let output = outputs
            .first()
            .ok_or_else(|| FragmentError::extraction("No output tensor found"))?;
        let view = output.to_array_view::<f32>().map_err(|e| {
            FragmentError::extraction(format!("Failed to convert output tensor: {e}"))
        })?;

        let shape = match *view.shape() {
            [n, c, h, w] => (n, c, h, w),
            [c, h, w] => (1, c, h, w),
            [h, w] => (1, 1, h, w),
            ref other => {
                return Err(FragmentError::extraction(format!(
                    "Unexpected output tensor shape {other:?}"
                )))
            },
        };
        Array4::from_shape_vec(shape, view.iter().copied().collect()).map_err(|e| {
            FragmentError::extraction(format!("Failed to reshape output tensor: {e}"))
        })
    }
}

impl ForegroundExtractor for TractExtractor {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn extract(&self, image: DynamicImage) -> Result<RgbaImage> {
        let dimensions = (image.width(), image.height());
        let (input, letterbox) = preprocess(
            &image,
            self.config.input_size,
            self.config.mean,
            self.config.std,
        )?;

        let start = Instant::now();
        let mask = self.infer(&input)?;
        log::debug!(
            "Inference on {}x{} input took {}ms",
            dimensions.0,
            dimensions.1,
            start.elapsed().as_millis()
        );

        let alpha = mask_to_alpha(&mask, dimensions, &letterbox)?;
        let mut rgba = image.into_rgba8();
        for (pixel, a) in rgba.pixels_mut().zip(alpha) {
            pixel.0[3] = a;
        }
        Ok(rgba)
    }
}
