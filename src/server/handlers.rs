use super::AppState;
use crate::{
    config::{AlphaThreshold, CleanupConfig, OutputFormat, RetentionPolicy},
    error::FragmentError,
    processor::CleanupProcessor,
};
use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{SecondsFormat, Utc};
use instant::Instant;
use serde_json::json;
use tracing::{error, info, warn};

/// Error answered as `{"error": "..."}` with a status code
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(message: impl std::fmt::Display) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: format!("Background removal failed: {message}"),
        }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<FragmentError> for ApiError {
    fn from(err: FragmentError) -> Self {
        if err.is_client_error() {
            Self::bad_request(err.to_string())
        } else {
            Self::internal(err)
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        Self {
            status: err.status(),
            message: err.body_text(),
        }
    }
}

/// Per-request overrides read from the multipart form
#[derive(Debug, Default)]
struct RemovalParams {
    alpha_threshold: Option<AlphaThreshold>,
    retention: Option<String>,
    min_region_size: Option<u32>,
    min_region_fraction: Option<f64>,
}

impl RemovalParams {
    fn set(&mut self, name: &str, value: &str) -> Result<(), ApiError> {
        let value = value.trim();
        match name {
            "alphaThreshold" => {
                let threshold = value.parse::<u8>().map_err(|_| {
                    ApiError::bad_request(format!(
                        "Invalid alphaThreshold '{value}': expected an integer 0-255"
                    ))
                })?;
                self.alpha_threshold = Some(AlphaThreshold::new(threshold));
            },
            "retention" => self.retention = Some(value.to_ascii_lowercase()),
            "minRegionSize" => {
                self.min_region_size = Some(value.parse().map_err(|_| {
                    ApiError::bad_request(format!(
                        "Invalid minRegionSize '{value}': expected a non-negative integer"
                    ))
                })?);
            },
            "minRegionFraction" => {
                self.min_region_fraction = Some(value.parse().map_err(|_| {
                    ApiError::bad_request(format!(
                        "Invalid minRegionFraction '{value}': expected a number 0-1"
                    ))
                })?);
            },
            other => warn!(field = other, "Ignoring unknown form field"),
        }
        Ok(())
    }

    /// Merge with the server defaults
    ///
    /// A size or fraction without an explicit `retention` selects the
    /// relative policy.
    fn resolve(self, defaults: &CleanupConfig) -> Result<CleanupConfig, ApiError> {
        let relative_requested = self.min_region_size.is_some() || self.min_region_fraction.is_some();
        let retention = match self.retention.as_deref() {
            Some("largest") if relative_requested => {
                return Err(ApiError::bad_request(
                    "minRegionSize/minRegionFraction require retention=relative",
                ))
            },
            Some("largest") => RetentionPolicy::KeepLargestOnly,
            Some("relative") => self.relative_policy(defaults.retention),
            None if relative_requested => self.relative_policy(defaults.retention),
            None => defaults.retention,
            Some(other) => {
                return Err(ApiError::bad_request(format!(
                    "Invalid retention '{other}': expected 'largest' or 'relative'"
                )))
            },
        };

        let mut builder = CleanupConfig::builder()
            .retention(retention)
            .output_format(OutputFormat::Png)
            .debug(defaults.debug)
            .alpha_threshold(defaults.alpha_threshold);
        if let Some(threshold) = self.alpha_threshold {
            builder = builder.alpha_threshold(threshold);
        }
        builder.build().map_err(ApiError::from)
    }

    fn relative_policy(&self, default: RetentionPolicy) -> RetentionPolicy {
        let (fraction, floor) = match default {
            RetentionPolicy::KeepLargestAndAboveRelativeSize { fraction, floor } => (fraction, floor),
            RetentionPolicy::KeepLargestOnly => (
                RetentionPolicy::DEFAULT_FRACTION,
                RetentionPolicy::DEFAULT_FLOOR,
            ),
        };
        RetentionPolicy::KeepLargestAndAboveRelativeSize {
            fraction: self.min_region_fraction.unwrap_or(fraction),
            floor: self.min_region_size.unwrap_or(floor),
        }
    }
}

/// `POST /api/remove-bg`
pub(super) async fn remove_background(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let start = Instant::now();
    let mut upload: Option<(String, axum::body::Bytes)> = None;
    let mut params = RemovalParams::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "image" {
            let file_name = field.file_name().unwrap_or("upload").to_string();
            upload = Some((file_name, field.bytes().await?));
        } else {
            let value = field.text().await?;
            params.set(&name, &value)?;
        }
    }

    let Some((file_name, bytes)) = upload.filter(|(_, bytes)| !bytes.is_empty()) else {
        return Err(ApiError::bad_request("Please upload an image"));
    };
    let config = params.resolve(&state.defaults)?;
    info!(
        file = %file_name,
        size = bytes.len(),
        alpha_threshold = %config.alpha_threshold,
        retention = %config.retention,
        "Received image"
    );

    let processor = CleanupProcessor::with_extractor(config, state.extractor.clone())?;
    let _permit = state
        .jobs
        .clone()
        .acquire_owned()
        .await
        .map_err(ApiError::internal)?;

    let png = tokio::task::spawn_blocking(move || {
        let mut result = processor.process_bytes(&bytes)?;
        let png = result.to_bytes(OutputFormat::Png)?;
        info!(timings = %result.timings.summary(), "Fragments removed, final size: {} bytes", png.len());
        Ok::<_, FragmentError>(png)
    })
    .await
    .map_err(|e| {
        error!("Processing task failed: {e}");
        ApiError::internal(e)
    })?
    .map_err(|e| {
        if !e.is_client_error() {
            error!("Background removal failed: {e}");
        }
        ApiError::from(e)
    })?;

    let elapsed_ms = start.elapsed().as_millis();
    info!("Total processing time: {elapsed_ms}ms");

    let mut response = (
        [(header::CONTENT_TYPE, OutputFormat::Png.mime_type())],
        png,
    )
        .into_response();
    if let Ok(value) = HeaderValue::from_str(&elapsed_ms.to_string()) {
        response.headers_mut().insert("x-processing-time-ms", value);
    }
    Ok(response)
}

/// `GET /api/health`
pub(super) async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    }))
}
