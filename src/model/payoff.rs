//! Payoff function and discounting.
//!
//! # Payoff Model
//!
//! For an own extraction `e` and a stock `R`:
//!
//! - benefit: `a*e - (b/2)*e^2`
//! - cost: `e*(c0 - c1*R)`, floored at zero unless [`CostRule::Unclamped`]
//! - instantaneous payoff: benefit - cost
//!
//! Extraction becomes free once the stock reaches the break-even level
//! `c0 / c1`.
//!
//! # Discounting
//!
//! Tick `k` covers `tau` units of model time. Its contribution to the
//! cumulative payoff is `factor(k) * payoff * tau` with
//! `factor(k) = (1 - r*tau)^k` (discrete) or `exp(-r*k*tau)` (continuous).

use serde::{Deserialize, Serialize};

use crate::config::{CostRule, GameConfig};

/// Parameters of the payoff function.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PayoffParams {
    /// Linear benefit coefficient.
    pub a: f64,
    /// Quadratic benefit coefficient.
    pub b: f64,
    /// Unit cost at an empty stock.
    pub c0: f64,
    /// Cost reduction per unit of stock.
    pub c1: f64,
}

impl Default for PayoffParams {
    fn default() -> Self {
        Self {
            a: 2.5,
            b: 1.8,
            c0: 2.0,
            c1: 0.1,
        }
    }
}

impl PayoffParams {
    /// Stock level at which extraction becomes free (`c0 / c1`).
    ///
    /// Infinite when `c1` is zero: the cost never vanishes.
    #[must_use]
    pub fn threshold(&self) -> f64 {
        if self.c1 > 0.0 {
            self.c0 / self.c1
        } else {
            f64::INFINITY
        }
    }
}

/// Discount scheme of a dynamic regime.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Discounting {
    /// `exp(-r * t)` with `t = k * tau`.
    Continuous {
        /// Discount rate per unit of model time.
        rate: f64,
        /// Model time per tick.
        tau: f64,
    },
    /// `(1 - r * tau)^k`.
    Discrete {
        /// Discount rate per unit of model time.
        rate: f64,
        /// Model time per period.
        tau: f64,
    },
}

impl Discounting {
    /// Discount rate `r`.
    #[must_use]
    pub const fn rate(&self) -> f64 {
        match *self {
            Self::Continuous { rate, .. } | Self::Discrete { rate, .. } => rate,
        }
    }

    /// Model time per tick.
    #[must_use]
    pub const fn tau(&self) -> f64 {
        match *self {
            Self::Continuous { tau, .. } | Self::Discrete { tau, .. } => tau,
        }
    }

    /// Discount factor applied to tick `tick`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn factor(&self, tick: u64) -> f64 {
        match *self {
            Self::Continuous { rate, tau } => (-rate * tau * tick as f64).exp(),
            Self::Discrete { rate, tau } => (1.0 - rate * tau).powf(tick as f64),
        }
    }
}

/// Benefit, cost and payoff of one player for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PayoffBreakdown {
    /// `a*e - (b/2)*e^2`.
    pub benefit: f64,
    /// Extraction cost at the tick's stock.
    pub cost: f64,
    /// `benefit - cost`.
    pub payoff: f64,
}

/// Payoff function bound to a configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PayoffModel {
    /// Payoff parameters.
    pub params: PayoffParams,
    /// Cost flooring rule.
    pub cost_rule: CostRule,
    /// Discount scheme.
    pub discounting: Discounting,
}

impl PayoffModel {
    /// Create a payoff model.
    #[must_use]
    pub const fn new(params: PayoffParams, cost_rule: CostRule, discounting: Discounting) -> Self {
        Self {
            params,
            cost_rule,
            discounting,
        }
    }

    /// Payoff model of a configuration.
    #[must_use]
    pub fn from_config(config: &GameConfig) -> Self {
        Self::new(config.payoff, config.cost_rule, config.discounting())
    }

    /// `a*e - (b/2)*e^2`.
    #[must_use]
    pub fn benefit(&self, extraction: f64) -> f64 {
        let p = &self.params;
        p.a * extraction - (p.b / 2.0) * extraction * extraction
    }

    /// Cost of extracting `extraction` when the stock is `stock`.
    #[must_use]
    pub fn cost(&self, extraction: f64, stock: f64) -> f64 {
        let raw = extraction * (self.params.c0 - self.params.c1 * stock);
        match self.cost_rule {
            CostRule::Floored => raw.max(0.0),
            CostRule::Unclamped => raw,
        }
    }

    /// Benefit, cost and payoff of one tick.
    #[must_use]
    pub fn instantaneous(&self, extraction: f64, stock: f64) -> PayoffBreakdown {
        let benefit = self.benefit(extraction);
        let cost = self.cost(extraction, stock);
        PayoffBreakdown {
            benefit,
            cost,
            payoff: benefit - cost,
        }
    }

    /// Contribution of tick `tick` to the cumulative payoff.
    #[must_use]
    pub fn discounted(&self, tick: u64, payoff: f64) -> f64 {
        self.discounting.factor(tick) * payoff * self.discounting.tau()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(cost_rule: CostRule) -> PayoffModel {
        PayoffModel::new(
            PayoffParams::default(),
            cost_rule,
            Discounting::Discrete {
                rate: 0.1,
                tau: 1.0,
            },
        )
    }

    #[test]
    fn test_reference_payoff() {
        let b = model(CostRule::Floored).instantaneous(1.0, 9.56);
        assert!((b.benefit - 1.6).abs() < 1e-12);
        assert!((b.cost - 1.044).abs() < 1e-12);
        assert!((b.payoff - 0.556).abs() < 1e-12);
    }

    #[test]
    fn test_cost_floor() {
        let floored = model(CostRule::Floored);
        assert!(floored.cost(3.0, 50.0).abs() < f64::EPSILON);

        let unclamped = model(CostRule::Unclamped);
        assert!((unclamped.cost(3.0, 50.0) + 9.0).abs() < 1e-12);
    }

    #[test]
    fn test_threshold() {
        assert!((PayoffParams::default().threshold() - 20.0).abs() < 1e-12);
        let free = PayoffParams {
            c1: 0.0,
            ..PayoffParams::default()
        };
        assert!(free.threshold().is_infinite());
    }

    #[test]
    fn test_discount_factors() {
        let discrete = Discounting::Discrete {
            rate: 0.1,
            tau: 1.0,
        };
        assert!((discrete.factor(0) - 1.0).abs() < 1e-12);
        assert!((discrete.factor(2) - 0.81).abs() < 1e-12);

        let continuous = Discounting::Continuous {
            rate: 0.1,
            tau: 0.5,
        };
        assert!((continuous.factor(4) - (-0.2f64).exp()).abs() < 1e-12);
    }

    #[test]
    fn test_discounted_contribution_scales_with_tau() {
        let m = PayoffModel::new(
            PayoffParams::default(),
            CostRule::Floored,
            Discounting::Discrete {
                rate: 0.0,
                tau: 0.1,
            },
        );
        assert!((m.discounted(7, 2.0) - 0.2).abs() < 1e-12);
    }
}
