//! Application configuration.
//!
//! Settings are layered: built-in defaults, then an optional YAML file, then
//! `REAP_`-prefixed environment variables (`REAP_PURGE__CONCURRENCY=12`,
//! `REAP_NETWORK__TIMEOUT=60`). Command-line flags are applied on top by the
//! binary.

use crate::client::ClientConfig;
use crate::error::{ReapError, Result};
use config::{Config as ConfigRs, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;


/// Prefix of environment variables read as configuration.
pub const ENV_PREFIX: &str = "REAP";

/// Root configuration structure.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Config {
    #[serde(default)]
    pub output: Output,
    #[serde(default)]
    pub network: Network,
    #[serde(default)]
    pub purge: Purge,
}

impl Config {
    /// Parses a `Config` from a YAML string.
    pub fn from_yaml_str(s: &str) -> Result<Self> {
        let builder = Self::defaults()?.add_source(File::from_str(s, FileFormat::Yaml));

        Self::from_builder(builder)
    }

    /// Loads a `Config` from an optional file path and the process environment.
    ///
    /// A given path must exist; without one only defaults and the environment
    /// apply.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, None)
    }

    /// Same as [`Config::load`], reading variables from `env` instead of the
    /// process environment when given.
    pub fn load_with_env(
        path: Option<&Path>,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self> {
        let mut builder = Self::defaults()?;

        if let Some(p) = path {
            if !p.exists() {
                return Err(ReapError::config(
                    "Configuration file not found".to_string(),
                    Some(p.display().to_string()),
                ));
            }
            builder = builder.add_source(File::from(p).format(FileFormat::Yaml).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .source(env),
        );

        Self::from_builder(builder)
    }

    /// Returns the HTTP client settings derived from this configuration.
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new()
            .with_timeout(self.network.timeout)
            .with_max_idle_per_host(self.network.max_idle_per_host)
    }

    fn defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>> {
        let defaults = ConfigRs::try_from(&Config::default()).map_err(|e| {
            ReapError::config_with_source("Failed to build default configuration", None, e)
        })?;
        Ok(ConfigRs::builder().add_source(defaults))
    }

    /// Creates a `Config` from a `config::ConfigBuilder`.
    fn from_builder(builder: config::ConfigBuilder<config::builder::DefaultState>) -> Result<Self> {
        let config: Self = builder
            .build()
            .and_then(|cfg| cfg.try_deserialize())
            .map_err(|e| {
                ReapError::config_with_source("Failed to deserialize configuration", None, e)
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Rejects values no purge can run with.
    pub fn validate(&self) -> Result<()> {
        if self.purge.concurrency == 0 {
            return Err(ReapError::config("purge.concurrency must be at least 1", None));
        }
        if self.network.timeout == 0 {
            return Err(ReapError::config("network.timeout must be at least 1 second", None));
        }
        Ok(())
    }
}

/// Output formatting settings.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Output {
    #[serde(default)]
    pub format: OutputFormat,

    #[serde(default)]
    pub color: ColorChoice,
}

/// Enum for output formats.
#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Pretty,

    Json,
}

/// Enum for color output choices.
#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ColorChoice {
    #[default]
    Auto,

    Always,

    Never,
}

/// Network settings.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Network {
    /// Request timeout in seconds
    #[serde(default = "default_network_timeout")]
    pub timeout: u64,

    #[serde(default = "default_max_idle_per_host")]
    pub max_idle_per_host: usize,
}

impl Default for Network {
    fn default() -> Self {
        Self {
            timeout: default_network_timeout(),
            max_idle_per_host: default_max_idle_per_host(),
        }
    }
}

fn default_network_timeout() -> u64 {
    30
}

fn default_max_idle_per_host() -> usize {
    10
}

/// Purge defaults, overridable per invocation.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Purge {
    /// Number of deletion workers
    #[serde(default = "default_purge_concurrency")]
    pub concurrency: usize,

    /// Also delete dangling manifests
    #[serde(default)]
    pub untagged: bool,
}

impl Default for Purge {
    fn default() -> Self {
        Self {
            concurrency: default_purge_concurrency(),
            untagged: false,
        }
    }
}

fn default_purge_concurrency() -> usize {
    6
}
