//! Shared resource stock.

use serde::{Deserialize, Serialize};

use crate::config::GrowthModel;

/// Level of the common resource.
///
/// The level is never negative: every update clamps at zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceStock {
    level: f64,
}

impl ResourceStock {
    /// Create a stock at `level` (clamped to zero).
    #[must_use]
    pub fn new(level: f64) -> Self {
        Self {
            level: level.max(0.0),
        }
    }

    /// Current level.
    #[must_use]
    pub const fn level(&self) -> f64 {
        self.level
    }

    /// Level after this tick's regeneration, before any extraction.
    ///
    /// This is what the group can draw from during the tick.
    #[must_use]
    pub fn available_after_growth(&self, growth: GrowthModel) -> f64 {
        match growth {
            GrowthModel::Additive { amount } => self.level + amount,
            GrowthModel::Multiplicative { rate } => self.level * (1.0 + rate),
        }
    }

    /// Apply one tick of regeneration and depletion, returning the new level.
    ///
    /// - additive: `max(0, R + amount - G)`
    /// - multiplicative: `max(0, R * (1 + rate) - G)`
    pub fn grow_and_deplete(&mut self, growth: GrowthModel, total_extraction: f64) -> f64 {
        // f64::max drops a NaN operand, so a NaN extraction also lands on zero.
        self.level = (self.available_after_growth(growth) - total_extraction).max(0.0);
        self.level
    }
}

/// Net change of the stock per tick at `level` under group extraction `group`.
///
/// Positive means the resource grows, negative means it is being depleted.
#[must_use]
pub fn drift(growth: GrowthModel, level: f64, group: f64) -> f64 {
    match growth {
        GrowthModel::Additive { amount } => amount - group,
        GrowthModel::Multiplicative { rate } => rate * level - group,
    }
}
