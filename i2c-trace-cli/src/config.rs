//! Configuration loading and merging
//!
//! Settings come from an optional TOML file and from the command line; values
//! given on the command line win.

use anyhow::{bail, Context, Result};
use i2c_trace_decoder::{parse_address, DecoderConfig, RepeatedStartPolicy};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main application configuration (loaded from a TOML file)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub decoder: DecoderSection,
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DecoderSection {
    pub address: Option<AddressValue>,
    pub timeout: Option<f64>,
    pub repeated_start: Option<RepeatedStartPolicy>,
}

/// Device address written either as a number or as a string like `"0x20"`
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum AddressValue {
    Number(u32),
    Text(String),
}

impl AddressValue {
    pub fn resolve(&self) -> Result<u32> {
        match self {
            AddressValue::Number(address) => Ok(*address),
            AddressValue::Text(text) => parse_address(text)
                .with_context(|| format!("Invalid device address in config: {:?}", text)),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct InputConfig {
    #[serde(default)]
    pub files: Vec<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OutputConfig {
    pub format: Option<OutputFormat>,
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub keep_going: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One transaction line per surfaced transaction
    #[default]
    Text,
    /// One JSON object per surfaced transaction
    Json,
}

/// Command-line overrides, already parsed
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub files: Vec<PathBuf>,
    pub address: Option<u32>,
    pub timeout: Option<f64>,
    pub repeated_start: Option<RepeatedStartPolicy>,
    pub format: Option<OutputFormat>,
    pub output: Option<PathBuf>,
    pub keep_going: bool,
}

/// Fully resolved settings for one run
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub files: Vec<PathBuf>,
    pub decoder: DecoderConfig,
    pub format: OutputFormat,
    pub output: Option<PathBuf>,
    pub keep_going: bool,
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    Ok(config)
}

impl AppConfig {
    /// Merge command-line overrides into this configuration
    pub fn resolve(self, overrides: Overrides) -> Result<RunSettings> {
        let address = match overrides.address {
            Some(address) => address,
            None => match &self.decoder.address {
                Some(value) => value.resolve()?,
                None => bail!("No device address given (use --address or [decoder] address)"),
            },
        };

        let mut decoder = DecoderConfig::new(address);
        if let Some(timeout) = overrides.timeout.or(self.decoder.timeout) {
            if timeout.is_nan() {
                bail!("Timeout must be a number of seconds");
            }
            decoder = decoder.with_timeout(timeout);
        }
        if let Some(policy) = overrides.repeated_start.or(self.decoder.repeated_start) {
            decoder = decoder.with_repeated_start(policy);
        }

        let files = if overrides.files.is_empty() {
            self.input.files
        } else {
            overrides.files
        };
        if files.is_empty() {
            bail!("No trace files given");
        }

        Ok(RunSettings {
            files,
            decoder,
            format: overrides.format.or(self.output.format).unwrap_or_default(),
            output: overrides.output.or(self.output.path),
            keep_going: overrides.keep_going || self.output.keep_going,
        })
    }
}
