//! Conversion from CLI arguments to library configuration

use crate::cli::main_impl::{Cli, CliOutputFormat, CliRetention};
use crate::{
    config::{CleanupConfig, OutputFormat, RetentionPolicy, ServerConfig},
    extractor::ExtractorKind,
};
use anyhow::{Context, Result};

pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Build the cleanup configuration from CLI arguments
    pub(crate) fn from_cli(cli: &Cli) -> Result<CleanupConfig> {
        let output_format = match cli.format {
            CliOutputFormat::Png => OutputFormat::Png,
            CliOutputFormat::Tiff => OutputFormat::Tiff,
            CliOutputFormat::Rgba8 => OutputFormat::Rgba8,
        };

        CleanupConfig::builder()
            .alpha_threshold(cli.alpha_threshold)
            .retention(Self::retention(cli))
            .output_format(output_format)
            .debug(cli.verbose >= 2)
            .build()
            .context("Invalid configuration")
    }

    fn retention(cli: &Cli) -> RetentionPolicy {
        match cli.retention {
            CliRetention::Largest => RetentionPolicy::KeepLargestOnly,
            CliRetention::Relative => RetentionPolicy::KeepLargestAndAboveRelativeSize {
                fraction: cli
                    .min_region_fraction
                    .unwrap_or(RetentionPolicy::DEFAULT_FRACTION),
                floor: cli.min_region_size.unwrap_or(RetentionPolicy::DEFAULT_FLOOR),
            },
        }
    }

    /// Which foreground extractor the arguments ask for
    pub(crate) fn extractor_kind(cli: &Cli) -> ExtractorKind {
        match &cli.model {
            Some(model_path) => ExtractorKind::Tract {
                model_path: model_path.clone(),
                model_config: cli.model_config.clone(),
            },
            None => ExtractorKind::Passthrough,
        }
    }

    /// Server configuration: environment first, then explicit flags
    pub(crate) fn server_config(cli: &Cli) -> Result<ServerConfig> {
        let mut config = ServerConfig::from_env().context("Invalid server environment")?;
        if let Some(port) = cli.port {
            config.port = port;
        }
        if let Some(bind) = &cli.bind {
            config.bind.clone_from(bind);
        }
        if let Some(dir) = &cli.static_dir {
            config.static_dir.clone_from(dir);
        }
        if let Some(jobs) = cli.max_jobs {
            config.max_concurrent_jobs = jobs;
        }
        config.cleanup = Self::from_cli(cli)?;
        config.validate().context("Invalid server configuration")?;
        Ok(config)
    }

    /// Validate CLI arguments for consistency
    pub(crate) fn validate_cli(cli: &Cli) -> Result<()> {
        let relative_flags = cli.min_region_size.is_some() || cli.min_region_fraction.is_some();
        if relative_flags && cli.retention == CliRetention::Largest {
            anyhow::bail!("--min-region-size/--min-region-fraction require --retention relative");
        }
        if cli.model_config.is_some() && cli.model.is_none() {
            anyhow::bail!("--model-config requires --model");
        }
        if !cli.serve && cli.input.is_empty() {
            anyhow::bail!("At least one input is required");
        }
        Self::from_cli(cli).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::path::PathBuf;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("bgremove-fragments").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn test_cli_config_conversion() {
        let cli = parse(&["in.png"]);
        let config = CliConfigBuilder::from_cli(&cli).unwrap();

        assert_eq!(config, CleanupConfig::default());
        assert_eq!(
            CliConfigBuilder::extractor_kind(&cli),
            ExtractorKind::Passthrough
        );
        assert!(CliConfigBuilder::validate_cli(&cli).is_ok());
    }

    #[test]
    fn test_relative_retention_flags() {
        let cli = parse(&[
            "--retention",
            "relative",
            "--min-region-size",
            "25",
            "--alpha-threshold",
            "200",
            "-f",
            "tiff",
            "in.png",
        ]);
        let config = CliConfigBuilder::from_cli(&cli).unwrap();
        assert_eq!(config.alpha_threshold.get(), 200);
        assert_eq!(config.output_format, OutputFormat::Tiff);
        assert_eq!(
            config.retention,
            RetentionPolicy::KeepLargestAndAboveRelativeSize {
                fraction: RetentionPolicy::DEFAULT_FRACTION,
                floor: 25
            }
        );
    }

    #[test]
    fn test_cli_validation() {
        let cli = parse(&["--min-region-size", "25", "in.png"]);
        assert!(CliConfigBuilder::validate_cli(&cli).is_err());

        let cli = parse(&["--retention", "relative", "--min-region-fraction", "1.5", "in.png"]);
        assert!(CliConfigBuilder::validate_cli(&cli).is_err());

        let cli = parse(&["--model-config", "m.json", "in.png"]);
        assert!(CliConfigBuilder::validate_cli(&cli).is_err());

        let cli = parse(&["--serve"]);
        assert!(CliConfigBuilder::validate_cli(&cli).is_ok());
    }

    #[test]
    fn test_model_selects_tract() {
        let cli = parse(&["--model", "isnet.onnx", "--model-config", "isnet.json", "in.png"]);
        assert_eq!(
            CliConfigBuilder::extractor_kind(&cli),
            ExtractorKind::Tract {
                model_path: PathBuf::from("isnet.onnx"),
                model_config: Some(PathBuf::from("isnet.json")),
            }
        );
    }

    #[test]
    fn test_rejects_out_of_range_threshold() {
        let result = Cli::try_parse_from(["bgremove-fragments", "--alpha-threshold", "256", "x.png"]);
        assert!(result.is_err());
    }
}
