//! Application context that holds resolved configuration
//!
//! The context is built following the precedence order:
//! 1. Default values
//! 2. Config file values
//! 3. Environment variables (`REAP_*`)
//! 4. CLI flags
//!
//! Once built, the context is passed as read-only throughout the application.

use crate::format::{ColorChoice, OutputFormat};
use libreap::Config;
use std::env;
use std::path::{Path, PathBuf};

/// Verbosity selected with repeated `-v` flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum VerbosityLevel {
    /// Warnings and errors only
    Normal,
    /// Per-repository progress (-v)
    Verbose,
    /// Per-page and per-job details (-vv)
    Debug,
    /// Everything, including HTTP internals (-vvv)
    Trace,
}

impl VerbosityLevel {
    pub fn from_count(count: u8) -> Self {
        match count {
            0 => VerbosityLevel::Normal,
            1 => VerbosityLevel::Verbose,
            2 => VerbosityLevel::Debug,
            _ => VerbosityLevel::Trace,
        }
    }

    /// `EnvFilter` directive used when `RUST_LOG` is not set.
    pub fn filter_directive(self) -> String {
        match self {
            VerbosityLevel::Normal => "warn".to_string(),
            VerbosityLevel::Verbose => "warn,libreap=info,reap=info".to_string(),
            VerbosityLevel::Debug => "warn,libreap=debug,reap=debug".to_string(),
            VerbosityLevel::Trace => "trace".to_string(),
        }
    }
}

/// Application context with resolved configuration and runtime state
#[derive(Debug)]
pub struct AppContext {
    /// Resolved configuration
    pub config: Config,
    /// Effective color mode
    pub color: ColorChoice,
}

impl AppContext {
    /// Build context with precedence: defaults > config file > env vars > CLI flags
    pub fn build(
        cli_config: Option<&Path>,
        cli_color: Option<ColorChoice>,
    ) -> Result<Self, String> {
        let path = config_path(cli_config);
        let config = Config::load(path.as_deref()).map_err(|e| e.to_string())?;

        // Only an explicit --color beats the configured value
        let color = cli_color.unwrap_or_else(|| ColorChoice::from(config.output.color));

        Ok(Self { config, color })
    }

    /// Output format from the flag, falling back to the configuration.
    pub fn output_format(&self, cli_format: Option<OutputFormat>) -> OutputFormat {
        cli_format.unwrap_or_else(|| OutputFormat::from(self.config.output.format))
    }
}

/// Resolves which configuration file to read, if any.
///
/// An explicit path must exist; `REAP_CONFIG` comes next; the default
/// location (`~/.config/reap/config.yaml`) is only used when present.
pub fn config_path(cli_config: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_config {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = env::var("REAP_CONFIG") {
        return Some(PathBuf::from(path));
    }

    default_config_path().filter(|p| p.exists())
}

/// `~/.config/reap/config.yaml` on Linux, the platform equivalent elsewhere.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("reap").join("config.yaml"))
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
