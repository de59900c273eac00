//! Configuration conversion utilities for CLI arguments

use crate::cli::main_impl::Cli;
use crate::{
    config::{CascadeSource, EnhanceConfig, EnhanceMode},
    error::{EnhanceError, Result},
};
use std::path::Path;

/// Convert CLI arguments to an [`EnhanceConfig`]
pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Build the enhancement configuration from CLI arguments
    pub(crate) fn from_cli(cli: &Cli) -> Result<EnhanceConfig> {
        let cascade = match &cli.cascade {
            Some(path) => CascadeSource::File(path.clone()),
            None => CascadeSource::Auto,
        };
        EnhanceConfig::builder()
            .mode(Self::mode(cli))
            .cascade(cascade)
            .backend(cli.detector.into())
            .build()
    }

    /// Enhancer selected by the second positional argument
    pub(crate) fn mode(cli: &Cli) -> EnhanceMode {
        EnhanceMode::from_flag(cli.detect_faces.as_deref())
    }

    /// Source image path, which must be present
    pub(crate) fn input_path(cli: &Cli) -> Result<&Path> {
        match cli.input.as_deref() {
            Some(path) if !path.as_os_str().is_empty() => Ok(path),
            _ => Err(EnhanceError::missing_argument("source image path")),
        }
    }
}
