// Allow unwrap and unreadable literals in tests (test code is not production)
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::unreadable_literal))]
//! Dyncpr: a dynamic common-pool-resource extraction game for economics
//! experiments.
//!
//! Players of a group repeatedly choose how much to extract from a shared,
//! renewable resource. The crate tracks the stock, aggregates the choices,
//! and computes instantaneous, cumulative and infinite-horizon payoffs under
//! a continuous-time or a discrete-time dynamic.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │   Part (sequences, groups, hooks)   │
//! ├─────────────────────────────────────┤
//! │   Group engine (ticks, phases)      │
//! ├─────────────────────────────────────┤
//! │   Model (stock, payoff, horizon)    │
//! └─────────────────────────────────────┘
//! ```
//!
//! The host platform (sessions, transport, GUI) plugs in through
//! [`part::DecisionSource`], [`part::RecordSink`] and [`part::DisplaySink`].

pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod part;

pub use config::{
    CostRule, DynamicRegime, ExtractionBounds, GameConfig, GrowthModel, MissingSubmission,
    OverdraftPolicy, ProjectionMethod,
};
pub use error::{ConfigError, EngineError, EngineResult, SinkError};

// Re-export key engine and part types at crate root for convenience
pub use engine::{GroupEngine, GroupOutcome, Phase, SubmitOutcome, TickRecord};
pub use model::{GroupId, PayoffModel, PayoffParams, PlayerId, ResourceStock};
pub use part::{CprPart, DecisionSource, PartPayoff, PartReport};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_debug() {
        let debug = format!("{:?}", Phase::AwaitingInitialExtraction);
        assert!(debug.contains("AwaitingInitialExtraction"));
        assert_eq!(Phase::Closed.to_string(), "closed");
    }
}
