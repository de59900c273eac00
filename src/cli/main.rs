//! Image enhancement CLI tool
//!
//! `enhance <source-image-path> [<detect-faces: true|false>]`

use super::config::CliConfigBuilder;
use crate::{
    config::DetectorBackend,
    error::{EnhanceError, EXIT_PROCESSING_FAILURE},
    processor::EnhanceProcessor,
    tracing_config::{events, init_cli_tracing, spans, TracingFormat},
    types::EnhancementResult,
};
use anyhow::{Context, Result};
use clap::{error::ErrorKind, Parser, ValueEnum};
use log::info;
use std::path::PathBuf;
use tracing::debug;

/// Convert an image to grayscale TIFF, optionally masking faces first
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "enhance")]
pub struct Cli {
    /// Source image (JPEG, PNG, TIFF or BMP, detected from content)
    #[arg(value_name = "SOURCE")]
    pub input: Option<PathBuf>,

    /// Detect and mask faces before conversion: "true" enables, anything else disables
    #[arg(value_name = "DETECT_FACES")]
    pub detect_faces: Option<String>,

    /// Haar cascade XML used for face detection [default: search next to the executable, ./assets and OpenCV data directories]
    #[arg(long, value_name = "PATH", env = "ENHANCE_CASCADE")]
    pub cascade: Option<PathBuf>,

    /// Engine that evaluates the cascade
    #[arg(long, value_enum, default_value_t = CliDetector::Native, env = "ENHANCE_DETECTOR")]
    pub detector: CliDetector,

    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Log output format
    #[arg(long, value_enum, default_value_t = CliLogFormat::Console)]
    pub log_format: CliLogFormat,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliLogFormat {
    Console,
    Compact,
    #[cfg(feature = "tracing-json")]
    Json,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliDetector {
    Native,
    #[cfg(feature = "opencv")]
    Opencv,
}

impl From<CliDetector> for DetectorBackend {
    fn from(detector: CliDetector) -> Self {
        match detector {
            CliDetector::Native => Self::Native,
            #[cfg(feature = "opencv")]
            CliDetector::Opencv => Self::OpenCv,
        }
    }
}

impl From<CliLogFormat> for TracingFormat {
    fn from(format: CliLogFormat) -> Self {
        match format {
            CliLogFormat::Console => Self::Console,
            CliLogFormat::Compact => Self::Compact,
            #[cfg(feature = "tracing-json")]
            CliLogFormat::Json => Self::Json,
        }
    }
}

pub fn main() -> Result<()> {
    let cli = parse_args()?;

    let session_id = init_cli_tracing(cli.verbose, cli.log_format.into())
        .context("Failed to initialize tracing")?;
    let mode = CliConfigBuilder::mode(&cli);
    let _session = spans::session(&session_id, &mode.to_string()).entered();
    debug!(?cli, "Parsed arguments");

    match run(&cli) {
        Ok(result) => {
            info!("Image saved with name {}", result.output_path.display());
            debug!(
                "Timings: sniff {}ms, decode {}ms, enhance {}ms, save {}ms",
                result.timings.sniff_ms,
                result.timings.decode_ms,
                result.timings.enhance_ms,
                result.timings.save_ms
            );
            println!("{}", result.output_path.display());
            Ok(())
        },
        Err(err) => {
            if let Some(root) = enhance_error(&err) {
                events::error_with_context(root, &format!("{err:#}"), root.exit_code());
            }
            Err(err)
        },
    }
}

/// Validate arguments, build the processor and enhance the source image
pub fn run(cli: &Cli) -> Result<EnhancementResult> {
    let input = CliConfigBuilder::input_path(cli).context("Invalid CLI arguments")?;
    let config = CliConfigBuilder::from_cli(cli).context("Invalid CLI arguments")?;

    let processor =
        EnhanceProcessor::new(config).context("Failed to create enhancement processor")?;
    processor
        .process_file(input)
        .with_context(|| format!("Failed to enhance {}", input.display()))
}

/// Exit status for an error returned by [`main`]
pub fn exit_code_for(err: &anyhow::Error) -> u8 {
    enhance_error(err).map_or(EXIT_PROCESSING_FAILURE, EnhanceError::exit_code)
}

fn enhance_error(err: &anyhow::Error) -> Option<&EnhanceError> {
    err.chain().find_map(|cause| cause.downcast_ref::<EnhanceError>())
}

/// Parse arguments, letting clap print help and version itself
fn parse_args() -> Result<Cli> {
    match Cli::try_parse() {
        Ok(cli) => Ok(cli),
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(e) => Err(EnhanceError::invalid_config(e.to_string().trim_end().to_string()).into()),
    }
}
