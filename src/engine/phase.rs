//! Lifecycle phases of a group engine.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Where a group stands in its sequence.
///
/// Phases only move forward:
/// `AwaitingInitialExtraction -> Running -> Finalizing -> Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Waiting for every player's initial extraction.
    AwaitingInitialExtraction,
    /// Ticks or periods are being played.
    Running,
    /// Time is up; the outcome has not been computed yet.
    Finalizing,
    /// Outcome computed. Nothing changes any more.
    Closed,
}

impl Phase {
    /// Whether submissions arriving now are silently dropped.
    #[must_use]
    pub const fn drops_submissions(self) -> bool {
        matches!(self, Self::Finalizing | Self::Closed)
    }

    /// Stable lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AwaitingInitialExtraction => "awaiting_initial_extraction",
            Self::Running => "running",
            Self::Finalizing => "finalizing",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
