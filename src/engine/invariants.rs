//! Tick invariants - sanity checks that detect bugs.
//!
//! A correct engine never triggers these. They run after every tick in
//! debug builds.

use std::collections::BTreeMap;

use crate::config::{CostRule, GameConfig, OverdraftPolicy};
use crate::engine::TickRecord;
use crate::model::PlayerId;

/// Relative slack for floating-point comparisons.
const TOLERANCE: f64 = 1e-9;

/// Invariant violation error.
#[derive(Debug, Clone)]
pub struct InvariantViolation {
    /// Description of the violated invariant.
    pub message: String,
}

impl std::fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Invariant violation: {}", self.message)
    }
}

impl std::error::Error for InvariantViolation {}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= TOLERANCE * a.abs().max(b.abs()).max(1.0)
}

/// Check one tick record against the cumulative payoffs before it.
///
/// Returns the violations found, empty if all invariants hold.
#[must_use]
pub fn check_tick(
    config: &GameConfig,
    record: &TickRecord,
    previous: &BTreeMap<PlayerId, f64>,
) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();

    if !(record.stock_after.is_finite() && record.stock_after >= 0.0) {
        violations.push(InvariantViolation {
            message: format!("Stock {} after tick {} is negative", record.stock_after, record.tick),
        });
    }

    let sum: f64 = record.players.iter().map(|p| p.extraction).sum();
    if !close(sum, record.group_extraction) {
        violations.push(InvariantViolation {
            message: format!(
                "Group extraction {} differs from the sum of extractions {sum}",
                record.group_extraction
            ),
        });
    }

    if record.overdraft && config.overdraft == OverdraftPolicy::ZeroAndReplay && sum > 0.0 {
        violations.push(InvariantViolation {
            message: format!("Voided tick {} still extracts {sum}", record.tick),
        });
    }

    for p in &record.players {
        let before = previous.get(&p.player).copied().unwrap_or(0.0);
        if !close(before + p.discounted, p.cumulative) {
            violations.push(InvariantViolation {
                message: format!(
                    "Player {} cumulative {} != {before} + {}",
                    p.player, p.cumulative, p.discounted
                ),
            });
        }

        if config.cost_rule == CostRule::Floored && p.cost < 0.0 {
            violations.push(InvariantViolation {
                message: format!("Player {} has negative floored cost {}", p.player, p.cost),
            });
        }
    }

    violations
}

/// Assert all tick invariants hold, panicking if any are violated.
///
/// Only active in debug builds. No-op in release builds.
///
/// # Panics
///
/// Panics with detailed message if any invariant is violated.
#[cfg(debug_assertions)]
pub fn assert_invariants(
    config: &GameConfig,
    record: &TickRecord,
    previous: &BTreeMap<PlayerId, f64>,
) {
    let violations = check_tick(config, record, previous);
    if !violations.is_empty() {
        let messages: Vec<_> = violations.iter().map(|v| v.message.as_str()).collect();
        panic!("Tick invariant violations:\n  - {}", messages.join("\n  - "));
    }
}

/// No-op in release builds.
#[cfg(not(debug_assertions))]
pub fn assert_invariants(
    _config: &GameConfig,
    _record: &TickRecord,
    _previous: &BTreeMap<PlayerId, f64>,
) {
}
