//! Configuration types for enhancement operations

use crate::detection::bundled_cascade;
use crate::error::{EnhanceError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name of the frontal-face cascade looked up when no explicit path is given
pub const DEFAULT_CASCADE_FILE: &str = "haarcascade_frontalface_alt_tree.xml";

/// Directories searched for [`DEFAULT_CASCADE_FILE`] after the executable's own directory
const SYSTEM_CASCADE_DIRS: &[&str] = &[
    "assets",
    "/usr/share/opencv4/haarcascades",
    "/usr/local/share/opencv4/haarcascades",
    "/usr/share/opencv/haarcascades",
    "/usr/local/share/opencv/haarcascades",
];

/// Which enhancer a run uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EnhanceMode {
    /// Average the RGB channels of every pixel
    #[default]
    Grayscale,
    /// Detect and mask faces, sharpen, then convert to grayscale
    FaceMask,
}

impl EnhanceMode {
    /// Interpret the optional detect-faces argument: only `true` (any case) enables face masking
    pub fn from_flag(flag: Option<&str>) -> Self {
        match flag {
            Some(value) if value.eq_ignore_ascii_case("true") => Self::FaceMask,
            _ => Self::Grayscale,
        }
    }
}

impl std::fmt::Display for EnhanceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Grayscale => write!(f, "grayscale"),
            Self::FaceMask => write!(f, "face-mask"),
        }
    }
}

/// Which engine evaluates the cascade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectorBackend {
    /// Built-in Viola-Jones evaluator
    #[default]
    Native,
    /// OpenCV's `CascadeClassifier`, available with the `opencv` feature
    OpenCv,
}

impl DetectorBackend {
    /// Whether this build can construct the backend
    pub fn is_available(self) -> bool {
        match self {
            Self::Native => true,
            Self::OpenCv => cfg!(feature = "opencv"),
        }
    }
}

impl std::fmt::Display for DetectorBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Native => write!(f, "native"),
            Self::OpenCv => write!(f, "opencv"),
        }
    }
}

impl std::str::FromStr for DetectorBackend {
    type Err = EnhanceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "native" => Ok(Self::Native),
            "opencv" => Ok(Self::OpenCv),
            other => Err(EnhanceError::invalid_config(format!(
                "unknown detector backend '{other}' (expected native or opencv)"
            ))),
        }
    }
}

/// Where the Haar cascade definition comes from
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CascadeSource {
    /// Search the executable directory, `./assets` and the usual OpenCV data
    /// directories, then fall back to the copy compiled into the binary
    #[default]
    Auto,
    /// Use this file
    File(PathBuf),
}

impl CascadeSource {
    /// Candidate locations, in search order
    pub fn candidates(&self) -> Vec<PathBuf> {
        match self {
            Self::File(path) => vec![path.clone()],
            Self::Auto => {
                let mut candidates = Vec::new();
                if let Some(exe_dir) = std::env::current_exe()
                    .ok()
                    .and_then(|exe| exe.parent().map(Path::to_path_buf))
                {
                    candidates.push(exe_dir.join(DEFAULT_CASCADE_FILE));
                    candidates.push(exe_dir.join("assets").join(DEFAULT_CASCADE_FILE));
                }
                candidates.extend(
                    SYSTEM_CASCADE_DIRS
                        .iter()
                        .map(|dir| Path::new(dir).join(DEFAULT_CASCADE_FILE)),
                );
                candidates
            },
        }
    }

    /// Resolve to an existing file or the bundled definition
    ///
    /// # Errors
    /// - `DetectorLoadFailure` when no candidate exists and nothing was bundled
    pub fn resolve(&self) -> Result<CascadeLocation> {
        let candidates = self.candidates();
        if let Some(found) = candidates.iter().find(|path| path.is_file()) {
            return Ok(CascadeLocation::File(found.clone()));
        }
        // An explicit file never falls back
        if matches!(self, Self::Auto) && bundled_cascade().is_some() {
            return Ok(CascadeLocation::Bundled);
        }

        let requested = match self {
            Self::File(path) => path.clone(),
            Self::Auto => PathBuf::from(DEFAULT_CASCADE_FILE),
        };
        let searched = candidates
            .iter()
            .map(|path| path.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        Err(EnhanceError::detector_load(
            requested,
            format!("cascade file not found (searched: {searched})"),
        ))
    }
}

/// A cascade definition that [`CascadeSource::resolve`] found
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CascadeLocation {
    File(PathBuf),
    /// Compiled in from `assets/` at build time
    Bundled,
}

impl CascadeLocation {
    /// Path used in log lines and error messages
    pub fn display_path(&self) -> PathBuf {
        match self {
            Self::File(path) => path.clone(),
            Self::Bundled => PathBuf::from(format!("<bundled>/{DEFAULT_CASCADE_FILE}")),
        }
    }
}

/// Configuration for an enhancement run
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EnhanceConfig {
    /// Enhancer selection
    pub mode: EnhanceMode,

    /// Cascade definition used by the face-masking path
    pub cascade: CascadeSource,

    /// Engine that evaluates the cascade
    #[serde(default)]
    pub backend: DetectorBackend,
}

impl EnhanceConfig {
    /// Create a new configuration builder
    ///
    /// # Examples
    /// ```rust
    /// use image_enhance::{EnhanceConfig, EnhanceMode};
    ///
    /// let config = EnhanceConfig::builder()
    ///     .mode(EnhanceMode::FaceMask)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.mode, EnhanceMode::FaceMask);
    /// ```
    #[must_use]
    pub fn builder() -> EnhanceConfigBuilder {
        EnhanceConfigBuilder::default()
    }

    /// Validate the configuration
    ///
    /// # Errors
    /// - `InvalidConfig` when an explicit cascade path is empty or is a directory,
    ///   or the selected backend was not compiled in
    pub fn validate(&self) -> Result<()> {
        if !self.backend.is_available() {
            return Err(EnhanceError::invalid_config(format!(
                "detector backend '{}' is not available in this build",
                self.backend
            )));
        }
        if let CascadeSource::File(path) = &self.cascade {
            if path.as_os_str().is_empty() {
                return Err(EnhanceError::invalid_config("cascade path is empty"));
            }
            if path.is_dir() {
                return Err(EnhanceError::invalid_config(format!(
                    "cascade path '{}' is a directory",
                    path.display()
                )));
            }
        }
        Ok(())
    }
}

/// Builder for [`EnhanceConfig`]
#[derive(Debug, Default)]
pub struct EnhanceConfigBuilder {
    config: EnhanceConfig,
}

impl EnhanceConfigBuilder {
    #[must_use]
    pub fn mode(mut self, mode: EnhanceMode) -> Self {
        self.config.mode = mode;
        self
    }

    /// Use an explicit cascade file
    #[must_use]
    pub fn cascade_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.config.cascade = CascadeSource::File(path.into());
        self
    }

    #[must_use]
    pub fn cascade(mut self, cascade: CascadeSource) -> Self {
        self.config.cascade = cascade;
        self
    }

    #[must_use]
    pub fn backend(mut self, backend: DetectorBackend) -> Self {
        self.config.backend = backend;
        self
    }

    /// Build and validate
    ///
    /// # Errors
    /// - `InvalidConfig` from [`EnhanceConfig::validate`]
    pub fn build(self) -> Result<EnhanceConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
