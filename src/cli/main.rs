//! Fragment cleanup CLI
//!
//! Cleans alpha-matted images in place of a background-removal service, or
//! runs that service with `--serve`.

use super::config::CliConfigBuilder;
use crate::{
    config::OutputFormat,
    extractor::create_extractor,
    processor::CleanupProcessor,
    services::ImageIOService,
    tracing_config::{events, init_cli_tracing, spans},
};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Extensions picked up when scanning directories
const IMAGE_EXTENSIONS: [&str; 8] = ["png", "jpg", "jpeg", "tiff", "tif", "bmp", "gif", "webp"];

/// Remove small disconnected fragments from background-removed images
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "bgremove-fragments")]
pub struct Cli {
    /// Input images or directories (use "-" for stdin)
    #[arg(value_name = "INPUT", required_unless_present = "serve")]
    pub input: Vec<String>,

    /// Output file (single input) or directory (batch). Use "-" for stdout.
    #[arg(short, long, value_name = "OUTPUT")]
    pub output: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = CliOutputFormat::Png)]
    pub format: CliOutputFormat,

    /// Alpha at or above which a pixel counts as foreground (0-255)
    #[arg(short = 't', long, default_value_t = 128)]
    pub alpha_threshold: u8,

    /// Which regions to keep
    #[arg(long, value_enum, default_value_t = CliRetention::Largest)]
    pub retention: CliRetention,

    /// Minimum secondary region size in pixels (relative retention)
    #[arg(long, value_name = "PIXELS")]
    pub min_region_size: Option<u32>,

    /// Minimum secondary region size as a fraction of the image (relative retention)
    #[arg(long, value_name = "FRACTION")]
    pub min_region_fraction: Option<f64>,

    /// ONNX segmentation model used to matte inputs before cleanup
    #[arg(short, long, value_name = "MODEL")]
    pub model: Option<PathBuf>,

    /// JSON file with the model's input size and normalisation
    #[arg(long, value_name = "JSON")]
    pub model_config: Option<PathBuf>,

    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Process directories recursively
    #[arg(short, long)]
    pub recursive: bool,

    /// File name pattern for directory inputs (e.g. "*.png")
    #[arg(long)]
    pub pattern: Option<String>,

    /// Run the HTTP service instead of processing files
    #[arg(long)]
    pub serve: bool,

    /// Port for --serve [default: $PORT or 3000]
    #[arg(long)]
    pub port: Option<u16>,

    /// Bind address for --serve [default: 0.0.0.0]
    #[arg(long)]
    pub bind: Option<String>,

    /// Frontend directory for --serve [default: dist]
    #[arg(long, value_name = "DIR")]
    pub static_dir: Option<PathBuf>,

    /// Maximum concurrent jobs for --serve [default: CPU count]
    #[arg(long)]
    pub max_jobs: Option<usize>,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
pub enum CliOutputFormat {
    Png,
    Tiff,
    Rgba8,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
pub enum CliRetention {
    /// Keep only the largest region
    Largest,
    /// Also keep regions above the size cut-off
    Relative,
}

/// CLI entry point
///
/// # Errors
/// - Invalid arguments
/// - Every input failed
/// - Server failed to start
pub async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _tracing = init_cli_tracing(cli.verbose).context("Failed to initialize tracing")?;

    CliConfigBuilder::validate_cli(&cli).context("Invalid CLI arguments")?;
    let extractor = create_extractor(&CliConfigBuilder::extractor_kind(&cli))
        .context("Failed to create foreground extractor")?;

    if cli.serve {
        #[cfg(feature = "server")]
        {
            let config = CliConfigBuilder::server_config(&cli)?;
            crate::server::serve(config, extractor)
                .await
                .context("Server failed")?;
            return Ok(());
        }
        #[cfg(not(feature = "server"))]
        anyhow::bail!("--serve requires the 'server' feature");
    }

    let config = CliConfigBuilder::from_cli(&cli)?;
    info!(
        alpha_threshold = %config.alpha_threshold,
        retention = %config.retention,
        extractor = extractor.name(),
        "Starting fragment cleanup"
    );
    let processor = CleanupProcessor::with_extractor(config, extractor)?;

    let start = Instant::now();
    let processed = tokio::task::block_in_place(|| process_inputs(&cli, &processor))?;
    info!(
        "Processed {} file(s) in {:.2}s",
        processed,
        start.elapsed().as_secs_f64()
    );
    Ok(())
}

fn process_inputs(cli: &Cli, processor: &CleanupProcessor) -> Result<usize> {
    if cli.input.len() == 1 && cli.input.first().is_some_and(|s| s == "-") {
        return process_stdin(cli.output.as_deref(), processor);
    }

    let mut all_files = Vec::new();
    for input in &cli.input {
        let path = PathBuf::from(input);
        if path.is_file() {
            if is_image_file(&path) {
                all_files.push(path);
            } else {
                warn!("Skipping unsupported file: {}", path.display());
            }
        } else if path.is_dir() {
            all_files.extend(find_image_files(
                &path,
                cli.recursive,
                cli.pattern.as_deref(),
            )?);
        } else {
            anyhow::bail!(
                "Input path does not exist or is not accessible: {}",
                path.display()
            );
        }
    }

    if all_files.is_empty() {
        warn!("No supported image files found in the provided inputs");
        return Ok(0);
    }
    all_files.sort();
    let file_count = all_files.len();
    let format = processor.config().output_format;
    let output_dir = prepare_output_dir(cli.output.as_deref(), file_count)?;

    let _batch = spans::batch_processing(file_count, processor.extractor().name()).entered();
    let progress = (file_count > 1).then(|| batch_progress_bar(file_count));

    let mut processed_count = 0;
    let mut failed_count = 0;
    for input_file in &all_files {
        if let Some(pb) = &progress {
            pb.set_message(format!("{}", input_file.display()));
        }

        let output_target = match (&output_dir, file_count) {
            (Some(dir), _) => OutputTarget::File(output_path_in_dir(input_file, dir, format)),
            (None, 1) => match cli.output.as_deref() {
                Some("-") => OutputTarget::Stdout,
                Some(path) => OutputTarget::File(PathBuf::from(path)),
                None => OutputTarget::File(default_output_path(input_file, format)),
            },
            (None, _) => OutputTarget::File(default_output_path(input_file, format)),
        };

        match process_single_file(processor, input_file, &output_target) {
            Ok(()) => processed_count += 1,
            Err(e) => {
                error!("Failed to process {}: {:#}", input_file.display(), e);
                failed_count += 1;
            },
        }

        if let Some(pb) = &progress {
            pb.inc(1);
        }
    }

    if let Some(pb) = progress {
        pb.finish_with_message(format!(
            "Completed! Processed: {processed_count}, Failed: {failed_count}"
        ));
    }

    if failed_count > 0 {
        events::warning_with_recommendation(
            &format!("Some files failed. Processed: {processed_count}, Failed: {failed_count}"),
            "rerun with -v for per-stage details",
        );
        if processed_count == 0 {
            anyhow::bail!("All {failed_count} input(s) failed");
        }
    }
    Ok(processed_count)
}

enum OutputTarget {
    File(PathBuf),
    Stdout,
}

fn process_single_file(
    processor: &CleanupProcessor,
    input_path: &Path,
    target: &OutputTarget,
) -> Result<()> {
    let _span = spans::file_processing(input_path).entered();
    let format = processor.config().output_format;

    let mut result = processor
        .process_file(input_path)
        .with_context(|| format!("Failed to clean {}", input_path.display()))?;

    match target {
        OutputTarget::Stdout => write_stdout(&result.to_bytes(format)?)?,
        OutputTarget::File(path) => {
            result.save(path, format)?;
            info!(
                "{} -> {} ({} regions, {} fragment pixels erased)",
                input_path.display(),
                path.display(),
                result.report.region_count,
                result.report.erased_fragment_pixels
            );
        },
    }
    events::performance_metric("file", result.timings.total_ms);
    debug!("{}", result.timings.summary());
    Ok(())
}

fn process_stdin(output_target: Option<&str>, processor: &CleanupProcessor) -> Result<usize> {
    info!("Reading image from stdin");
    let image_data = read_stdin()?;
    let format = processor.config().output_format;

    let mut result = processor.process_bytes(&image_data).map_err(|e| {
        events::error_with_context(&e, "stdin");
        anyhow::Error::from(e)
    })?;

    match output_target {
        None | Some("-") => write_stdout(&result.to_bytes(format)?)?,
        Some(path) => {
            result.save(path, format)?;
            info!("Saved result to {path}");
        },
    }
    debug!("{}", result.timings.summary());
    Ok(1)
}

fn read_stdin() -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    io::stdin()
        .read_to_end(&mut buffer)
        .context("Failed to read image data from stdin")?;

    if buffer.is_empty() {
        anyhow::bail!("No data received from stdin");
    }
    Ok(buffer)
}

fn write_stdout(data: &[u8]) -> Result<()> {
    let mut stdout = io::stdout().lock();
    stdout
        .write_all(data)
        .context("Failed to write image data to stdout")?;
    stdout.flush().context("Failed to flush stdout")?;
    Ok(())
}

fn batch_progress_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}

/// Output directory for batch runs; `None` writes next to each input
fn prepare_output_dir(output: Option<&str>, file_count: usize) -> Result<Option<PathBuf>> {
    let Some(output) = output else {
        return Ok(None);
    };
    if file_count == 1 && !Path::new(output).is_dir() {
        return Ok(None);
    }
    if output == "-" {
        anyhow::bail!("Cannot use stdout (-) as output when processing multiple files");
    }

    let output_path = PathBuf::from(output);
    if output_path.is_file() {
        anyhow::bail!(
            "Output path exists and is a file, not a directory: {}",
            output_path.display()
        );
    }
    std::fs::create_dir_all(&output_path).with_context(|| {
        format!(
            "Failed to create output directory: {}",
            output_path.display()
        )
    })?;
    Ok(Some(output_path))
}

fn find_image_files(dir: &Path, recursive: bool, pattern: Option<&str>) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    if recursive {
        for entry in walkdir::WalkDir::new(dir) {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type().is_file() && is_image_file(path) && matches_pattern(path, pattern)
            {
                files.push(path.to_path_buf());
            }
        }
    } else {
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type()?.is_file() && is_image_file(&path) && matches_pattern(&path, pattern)
            {
                files.push(path);
            }
        }
    }
    Ok(files)
}

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
}

fn matches_pattern(path: &Path, pattern: Option<&str>) -> bool {
    let Some(pattern) = pattern else {
        return true;
    };
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| glob::Pattern::new(pattern).is_ok_and(|p| p.matches(name)))
}

fn output_file_name(input_path: &Path, format: OutputFormat) -> String {
    let stem = input_path.file_stem().unwrap_or_default();
    format!("{}_clean.{}", stem.to_string_lossy(), format.extension())
}

/// `<stem>_clean.<ext>` next to the input
fn default_output_path(input_path: &Path, format: OutputFormat) -> PathBuf {
    let dir = input_path.parent().unwrap_or(Path::new("."));
    dir.join(output_file_name(input_path, format))
}

fn output_path_in_dir(input_path: &Path, output_dir: &Path, format: OutputFormat) -> PathBuf {
    output_dir.join(output_file_name(input_path, format))
}
