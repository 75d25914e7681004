//! Error types for configuration, the dynamics engine and the record sinks.

use std::io;

use thiserror::Error;

use crate::engine::Phase;
use crate::model::PlayerId;

/// Invalid or unreadable game configuration.
///
/// Always fatal: surfaced before a sequence starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Groups must contain at least one player.
    #[error("group size must be positive, got {0}")]
    InvalidGroupSize(usize),

    /// Extraction bounds are empty or inverted.
    #[error("invalid extraction bounds [{min}, {max}]")]
    InvalidBounds {
        /// Lower bound.
        min: f64,
        /// Upper bound.
        max: f64,
    },

    /// Extraction step must be strictly positive.
    #[error("extraction step must be positive, got {0}")]
    InvalidStep(f64),

    /// A parameter that must be a finite non-negative number is not.
    #[error("parameter `{name}` must be finite and non-negative, got {value}")]
    NegativeParameter {
        /// Parameter name as it appears in the configuration file.
        name: &'static str,
        /// Offending value.
        value: f64,
    },

    /// A duration parameter is zero where a positive duration is required.
    #[error("duration `{0}` must be positive")]
    ZeroDuration(&'static str),

    /// The discrete discount base `1 - r * tau` is not in `(0, 1]`.
    #[error("discount rate {rate} with tau {tau} gives a non-positive discount base")]
    InvalidDiscount {
        /// Discount rate `r`.
        rate: f64,
        /// Model time per tick.
        tau: f64,
    },

    /// The player count cannot be split into full groups.
    #[error("{players} players cannot be split into groups of {group_size}")]
    PlayersNotDivisible {
        /// Number of players connected.
        players: usize,
        /// Configured group size.
        group_size: usize,
    },

    /// Reading the configuration file failed.
    #[error("failed to read configuration: {0}")]
    Io(#[from] io::Error),

    /// The configuration file is not valid JSON for [`crate::GameConfig`].
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Failure of a persistence hook.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Writing or reading the backing store failed.
    #[error("record store I/O failed: {0}")]
    Io(#[from] io::Error),

    /// A record could not be encoded or decoded.
    #[error("record encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Errors raised by a group's dynamics engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The player is not a member of this group.
    #[error("player {0} is not a member of this group")]
    UnknownPlayer(PlayerId),

    /// The operation is not allowed in the engine's current phase.
    #[error("operation `{operation}` not allowed in phase {phase:?}")]
    WrongPhase {
        /// Operation that was attempted.
        operation: &'static str,
        /// Phase the engine was in.
        phase: Phase,
    },

    /// The extraction lies outside the configured bounds.
    #[error("extraction {value} outside [{min}, {max}]")]
    ExtractionOutOfBounds {
        /// Submitted value.
        value: f64,
        /// Lower bound.
        min: f64,
        /// Upper bound.
        max: f64,
    },

    /// The extraction is NaN or infinite.
    #[error("extraction must be finite, got {0}")]
    NonFiniteExtraction(f64),

    /// The persistence hook rejected a record.
    #[error(transparent)]
    Sink(#[from] SinkError),

    /// A group could not be configured.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
