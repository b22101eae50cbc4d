//! Tool settings shared by every skillkit binary.
//!
//! Credentials never live here: they are read from the environment by the
//! individual clients. This file only covers the knobs that are safe to keep
//! in a static YAML file, such as which `pandoc` to run and how long to wait
//! for it.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Environment variable naming a settings file when `--config` is not given.
pub const CONFIG_ENV: &str = "SKILLKIT_CONFIG";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config YAML: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// External binaries the converters shell out to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Binaries {
    pub pandoc: PathBuf,
    pub markitdown: PathBuf,
    pub pdftotext: PathBuf,
    pub curl: PathBuf,
}

impl Default for Binaries {
    fn default() -> Self {
        Self {
            pandoc: PathBuf::from("pandoc"),
            markitdown: PathBuf::from("markitdown"),
            pdftotext: PathBuf::from("pdftotext"),
            curl: PathBuf::from("curl"),
        }
    }
}

/// Timeouts in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    pub pandoc_secs: u64,
    pub pandoc_fragment_secs: u64,
    pub pandoc_docx_secs: u64,
    pub markitdown_secs: u64,
    pub pdftotext_secs: u64,
    pub download_secs: u64,
    pub http_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            pandoc_secs: 120,
            pandoc_fragment_secs: 30,
            pandoc_docx_secs: 60,
            markitdown_secs: 300,
            pdftotext_secs: 60,
            download_secs: 60,
            http_secs: 120,
        }
    }
}

impl Timeouts {
    pub fn http(&self) -> Duration {
        Duration::from_secs(self.http_secs)
    }
}

/// Image generation defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageSettings {
    pub model: String,
    pub location: String,
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            model: "gemini-3-pro-image-preview".to_string(),
            location: "global".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub binaries: Binaries,
    pub timeouts: Timeouts,
    pub image: ImageSettings,
}

impl Settings {
    pub fn trace_loaded(&self) {
        info!(
            pandoc = %self.binaries.pandoc.display(),
            markitdown = %self.binaries.markitdown.display(),
            http_timeout_secs = self.timeouts.http_secs,
            image_model = %self.image.model,
            "Loaded Settings"
        );
        debug!(?self, "Settings loaded (full debug)");
    }

    /// Parses a YAML settings file. Every key is optional.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        info!(config_path = ?path_ref, "Loading settings from file");

        let content = fs::read_to_string(path_ref).map_err(|e| {
            debug!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            ConfigError::Read {
                path: path_ref.to_path_buf(),
                source: e,
            }
        })?;

        // An empty file is valid YAML `null`; treat it as all defaults.
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let settings: Settings = serde_yaml::from_str(&content).map_err(|e| {
            debug!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            ConfigError::Parse(e)
        })?;
        Ok(settings)
    }

    /// Resolves settings from an explicit path, then `SKILLKIT_CONFIG`, else defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let settings = match explicit {
            Some(path) => Self::from_file(path)?,
            None => match std::env::var_os(CONFIG_ENV).filter(|v| !v.is_empty()) {
                Some(path) => Self::from_file(PathBuf::from(path))?,
                None => Self::default(),
            },
        };
        settings.trace_loaded();
        Ok(settings)
    }
}
