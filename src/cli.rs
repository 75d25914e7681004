//! CLI command implementations for Dyncpr.

pub(crate) mod batch;
pub(crate) mod config;
pub(crate) mod project;
pub(crate) mod run;
pub(crate) mod summary;

mod output;

use clap::{Args, ValueEnum};
use dyncpr::{ConfigError, DynamicRegime, EngineError, GameConfig, SinkError};
use std::error::Error;
use std::fmt;
use std::path::PathBuf;

/// Output format for the `run`, `project` and `summary` commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// Machine-readable JSON output.
    Json,
}

/// Output format for the `batch` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum BatchFormat {
    /// Human-readable text output.
    Text,
    /// Machine-readable JSON output.
    Json,
    /// CSV format.
    Csv,
}

/// Dynamic regime as a command-line value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum RegimeArg {
    /// Timer-driven ticks over a fixed window.
    Continuous,
    /// A fixed number of decision periods.
    Discrete,
}

impl From<RegimeArg> for DynamicRegime {
    fn from(arg: RegimeArg) -> Self {
        match arg {
            RegimeArg::Continuous => Self::Continuous,
            RegimeArg::Discrete => Self::Discrete,
        }
    }
}

/// Configuration file plus the overrides of the configure dialog.
#[derive(Args, Debug, Clone)]
pub(crate) struct Setup {
    /// JSON configuration file (default: built-in parameters)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Dynamic regime
    #[arg(long)]
    regime: Option<RegimeArg>,

    /// Number of discrete periods
    #[arg(long)]
    periods: Option<u32>,

    /// Length of the continuous window in seconds
    #[arg(long)]
    duration: Option<u64>,

    /// Trial part (not paid)
    #[arg(long)]
    trial: bool,
}

impl Setup {
    /// Load the configuration and apply the overrides.
    pub(crate) fn load(&self) -> Result<GameConfig, CliError> {
        let mut config = match &self.config {
            Some(path) => GameConfig::load(path)?,
            None => GameConfig::default(),
        };
        if let Some(regime) = self.regime {
            config.regime = regime.into();
        }
        if let Some(periods) = self.periods {
            config.num_periods = periods;
        }
        if let Some(secs) = self.duration {
            config.continuous_duration_ms = secs.saturating_mul(1_000);
        }
        if self.trial {
            config.trial = true;
        }
        config.validate()?;
        Ok(config)
    }
}

/// Seed from the clock when none is given.
pub(crate) fn seed_or_random(seed: Option<u64>) -> u64 {
    seed.unwrap_or_else(|| {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_nanos() & u128::from(u64::MAX)).unwrap_or(42))
            .unwrap_or(42)
    })
}

/// CLI error type.
#[derive(Debug)]
pub(crate) struct CliError {
    message: String,
}

impl CliError {
    /// Create a new CLI error.
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for CliError {}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        Self::new(e.to_string())
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        Self::new(format!("invalid configuration: {e}"))
    }
}

impl From<EngineError> for CliError {
    fn from(e: EngineError) -> Self {
        Self::new(e.to_string())
    }
}

impl From<SinkError> for CliError {
    fn from(e: SinkError) -> Self {
        Self::new(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::new(format!("JSON serialization failed: {e}"))
    }
}
