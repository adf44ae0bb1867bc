// SPDX-License-Identifier: GPL-3.0-only
//! Library settings applied at startup
//!
//! Read from `$XDG_CONFIG_HOME/ddcutil-adapter/config.toml`. Every setting is
//! optional; anything left out keeps the library's own default.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::library::Ddcutil;
use crate::types::{OutputLevel, RetryType};

pub const CONFIG_DIR: &str = "ddcutil-adapter";
pub const CONFIG_FILE: &str = "config.toml";

/// Try limits per category of DDC exchange
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    pub write_only: Option<u8>,
    pub write_read: Option<u8>,
    pub multi_part: Option<u8>,
}

impl RetryConfig {
    fn entries(&self) -> impl Iterator<Item = (RetryType, u8)> {
        [
            (RetryType::WriteOnly, self.write_only),
            (RetryType::WriteRead, self.write_read),
            (RetryType::MultiPart, self.multi_part),
        ]
        .into_iter()
        .filter_map(|(retry_type, tries)| tries.map(|t| (retry_type, t)))
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct Config {
    pub retries: RetryConfig,
    /// Read back and compare every write
    pub verify: Option<bool>,
    pub output_level: Option<OutputLevel>,
    /// Let the library print DDC protocol errors
    pub report_ddc_errors: Option<bool>,
}

impl Config {
    /// Default location of the configuration file
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Load from the default location, falling back to defaults when absent
    pub fn load() -> Result<Self> {
        match Self::path() {
            Some(path) => Self::load_from(&path),
            None => {
                warn!("No configuration directory, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load from `path`; a missing file yields the defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };

        info!("Loading config from {}", path.display());
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Forward every configured setting to the library
    pub fn apply(&self, lib: &Ddcutil) -> Result<()> {
        for (retry_type, tries) in self.retries.entries() {
            debug!("max tries {:?} = {}", retry_type, tries);
            lib.set_max_tries(retry_type, i32::from(tries))?;
        }
        if let Some(verify) = self.verify {
            lib.enable_verify(verify);
        }
        if let Some(level) = self.output_level {
            lib.set_output_level(level);
        }
        if let Some(report) = self.report_ddc_errors {
            lib.enable_report_ddc_errors(report);
        }
        Ok(())
    }
}
