//! TOML configuration file support.
//!
//! Codec settings can be kept in a config file instead of repeated flags:
//!
//! ```toml
//! # dsff.toml
//! [codec]
//! target = "class"
//! missing = "NA"
//! exclude = ["hash", "realpath"]
//! primary_index = 0
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use dsff::CodecOptions;

/// Root configuration structure for dsff.toml files.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Codec settings; omitted keys keep their defaults.
    #[serde(default)]
    pub codec: CodecOptions,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse TOML configuration")
    }

    /// Codec options with command-line overrides applied
    pub fn codec_options(self, target: Option<String>, missing: Option<String>) -> CodecOptions {
        let mut options = self.codec;
        if let Some(target) = target {
            options.target = target;
        }
        if let Some(missing) = missing {
            options.missing = missing;
        }
        options
    }
}
