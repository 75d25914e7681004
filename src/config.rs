//! Game configuration.
//!
//! A [`GameConfig`] is built once, validated, and then shared immutably by
//! every group of a sequence. Deserialization goes through an unchecked
//! mirror struct so that a configuration file that parses is also a
//! configuration that the engine can run.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::model::{Discounting, PayoffParams};

/// How time advances in the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DynamicRegime {
    /// A periodic timer recomputes the state while players move freely.
    Continuous,
    /// A fixed number of periods with one decision each.
    Discrete,
}

impl DynamicRegime {
    /// Stable lowercase name (logs, CSV output).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Continuous => "continuous",
            Self::Discrete => "discrete",
        }
    }
}

/// Regeneration rule of the shared resource.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GrowthModel {
    /// `R' = R + amount - G`.
    Additive {
        /// Units regenerated per tick.
        amount: f64,
    },
    /// `R' = R * (1 + rate) - G`.
    Multiplicative {
        /// Relative regeneration per tick.
        rate: f64,
    },
}

/// Whether the extraction cost may become negative above the break-even stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostRule {
    /// `max(0, e * (c0 - c1 * R))`.
    Floored,
    /// `e * (c0 - c1 * R)`, a gain when `R > c0 / c1`.
    Unclamped,
}

/// What happens when the group asks for more than the stock can provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverdraftPolicy {
    /// Extractions stand; the stock is clamped to zero.
    ClampStock,
    /// Every extraction of the tick is voided; the stock only grows.
    ZeroAndReplay,
}

/// Value used for a player who did not submit before a tick closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingSubmission {
    /// Last known value, zero if the player never submitted.
    KeepLast,
    /// Zero extraction.
    Zero,
}

/// How the end-of-game continuation value is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectionMethod {
    /// Closed-form discounted value of the stationary payoff stream.
    ClosedForm,
    /// Quadratic regression of the continuation value on the final stock.
    Fitted,
}

/// Allowed extraction range and granularity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExtractionBounds {
    /// Smallest allowed extraction.
    pub min: f64,
    /// Largest allowed extraction.
    pub max: f64,
    /// Grid step; submissions are snapped to `min + k * step`.
    pub step: f64,
}

/// Slack used when checking a submission against the bounds.
const BOUNDS_TOLERANCE: f64 = 1e-9;

impl ExtractionBounds {
    /// Whether `value` lies within the bounds (with a tiny tolerance).
    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min - BOUNDS_TOLERANCE && value <= self.max + BOUNDS_TOLERANCE
    }

    /// Snap `value` onto the step grid, staying inside the bounds.
    #[must_use]
    pub fn snap(&self, value: f64) -> f64 {
        let steps = ((value - self.min) / self.step).round();
        (self.min + steps * self.step).clamp(self.min, self.max)
    }

    /// Number of grid values in `[min, max)`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn grid_len(&self) -> u64 {
        (((self.max - self.min) / self.step).round() as u64).max(1)
    }

    /// Grid value at index `i`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn grid_value(&self, i: u64) -> f64 {
        self.snap(self.min + i as f64 * self.step)
    }
}

impl Default for ExtractionBounds {
    fn default() -> Self {
        Self {
            min: 0.0,
            max: 20.0,
            step: 0.01,
        }
    }
}

/// Complete, validated configuration of the part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawGameConfig")]
pub struct GameConfig {
    /// Continuous or discrete dynamic.
    pub regime: DynamicRegime,
    /// Trial parts pay nothing.
    pub trial: bool,
    /// Number of decision periods (discrete regime).
    pub num_periods: u32,
    /// Time a player has to decide in a period (discrete regime).
    pub decision_time_ms: u64,
    /// Length of the continuous-time window.
    pub continuous_duration_ms: u64,
    /// Wall-clock interval between two ticks (continuous regime).
    pub tick_interval_ms: u64,
    /// Players per group.
    pub group_size: usize,
    /// Extraction range and step.
    pub extraction: ExtractionBounds,
    /// Stock at the start of each sequence.
    pub initial_stock: f64,
    /// Regeneration rule.
    pub growth: GrowthModel,
    /// Payoff function parameters.
    pub payoff: PayoffParams,
    /// Discount rate `r` per unit of model time.
    pub discount_rate: f64,
    /// Model time represented by one tick or period.
    pub tau: f64,
    /// Cost flooring rule.
    pub cost_rule: CostRule,
    /// Overdraft handling.
    pub overdraft: OverdraftPolicy,
    /// Default for silent players.
    pub missing_submission: MissingSubmission,
    /// Continuation value method.
    pub projection: ProjectionMethod,
    /// Whether the part payoff adds the discounted continuation value.
    pub include_projection: bool,
    /// Ecus to euros.
    pub conversion_rate: f64,
    /// Label of the experimental currency.
    pub currency: String,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            regime: DynamicRegime::Continuous,
            trial: false,
            num_periods: 2,
            decision_time_ms: 30_000,
            continuous_duration_ms: 60_000,
            tick_interval_ms: 1_000,
            group_size: 2,
            extraction: ExtractionBounds::default(),
            initial_stock: 500.0,
            growth: GrowthModel::Additive { amount: 25.0 },
            payoff: PayoffParams::default(),
            discount_rate: 0.01,
            tau: 0.1,
            cost_rule: CostRule::Floored,
            overdraft: OverdraftPolicy::ClampStock,
            missing_submission: MissingSubmission::KeepLast,
            projection: ProjectionMethod::ClosedForm,
            include_projection: true,
            conversion_rate: 1.0,
            currency: "ecu".to_string(),
        }
    }
}

impl GameConfig {
    /// Parse and validate a JSON configuration.
    ///
    /// Missing fields take their default value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON and the matching
    /// validation error for inconsistent values.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let raw: RawGameConfig = serde_json::from_str(json)?;
        Self::try_from(raw)
    }

    /// Load and validate a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is invalid.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Pretty JSON rendering of the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check every cross-field constraint.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.group_size == 0 {
            return Err(ConfigError::InvalidGroupSize(self.group_size));
        }

        let bounds = &self.extraction;
        if !bounds.min.is_finite()
            || !bounds.max.is_finite()
            || bounds.min < 0.0
            || bounds.max <= bounds.min
        {
            return Err(ConfigError::InvalidBounds {
                min: bounds.min,
                max: bounds.max,
            });
        }
        if !(bounds.step.is_finite() && bounds.step > 0.0) {
            return Err(ConfigError::InvalidStep(bounds.step));
        }

        let growth = match self.growth {
            GrowthModel::Additive { amount } => ("growth.amount", amount),
            GrowthModel::Multiplicative { rate } => ("growth.rate", rate),
        };
        let p = &self.payoff;
        for (name, value) in [
            ("initial_stock", self.initial_stock),
            growth,
            ("payoff.a", p.a),
            ("payoff.b", p.b),
            ("payoff.c0", p.c0),
            ("payoff.c1", p.c1),
            ("discount_rate", self.discount_rate),
            ("conversion_rate", self.conversion_rate),
        ] {
            non_negative(name, value)?;
        }

        if !(self.tau.is_finite() && self.tau > 0.0) {
            return Err(ConfigError::NegativeParameter {
                name: "tau",
                value: self.tau,
            });
        }
        if self.discount_rate * self.tau >= 1.0 {
            return Err(ConfigError::InvalidDiscount {
                rate: self.discount_rate,
                tau: self.tau,
            });
        }

        if self.tick_interval_ms == 0 {
            return Err(ConfigError::ZeroDuration("tick_interval_ms"));
        }
        if self.regime == DynamicRegime::Continuous && self.continuous_duration_ms == 0 {
            return Err(ConfigError::ZeroDuration("continuous_duration_ms"));
        }

        Ok(())
    }

    /// Discounting scheme of the configured regime.
    #[must_use]
    pub fn discounting(&self) -> Discounting {
        match self.regime {
            DynamicRegime::Continuous => Discounting::Continuous {
                rate: self.discount_rate,
                tau: self.tau,
            },
            DynamicRegime::Discrete => Discounting::Discrete {
                rate: self.discount_rate,
                tau: self.tau,
            },
        }
    }

    /// Wall-clock interval between ticks.
    #[must_use]
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Length of the continuous window.
    #[must_use]
    pub const fn continuous_duration(&self) -> Duration {
        Duration::from_millis(self.continuous_duration_ms)
    }

    /// Decision time limit of a discrete period.
    #[must_use]
    pub const fn decision_time(&self) -> Duration {
        Duration::from_millis(self.decision_time_ms)
    }

    /// Number of timer ticks after the initial tick in the continuous window.
    #[must_use]
    pub const fn continuous_ticks(&self) -> u64 {
        self.continuous_duration_ms / self.tick_interval_ms
    }
}

fn non_negative(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NegativeParameter { name, value })
    }
}

/// Unchecked mirror of [`GameConfig`] used for deserialization.
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawGameConfig {
    regime: DynamicRegime,
    trial: bool,
    num_periods: u32,
    decision_time_ms: u64,
    continuous_duration_ms: u64,
    tick_interval_ms: u64,
    group_size: usize,
    extraction: ExtractionBounds,
    initial_stock: f64,
    growth: GrowthModel,
    payoff: PayoffParams,
    discount_rate: f64,
    tau: f64,
    cost_rule: CostRule,
    overdraft: OverdraftPolicy,
    missing_submission: MissingSubmission,
    projection: ProjectionMethod,
    include_projection: bool,
    conversion_rate: f64,
    currency: String,
}

impl Default for RawGameConfig {
    fn default() -> Self {
        let d = GameConfig::default();
        Self {
            regime: d.regime,
            trial: d.trial,
            num_periods: d.num_periods,
            decision_time_ms: d.decision_time_ms,
            continuous_duration_ms: d.continuous_duration_ms,
            tick_interval_ms: d.tick_interval_ms,
            group_size: d.group_size,
            extraction: d.extraction,
            initial_stock: d.initial_stock,
            growth: d.growth,
            payoff: d.payoff,
            discount_rate: d.discount_rate,
            tau: d.tau,
            cost_rule: d.cost_rule,
            overdraft: d.overdraft,
            missing_submission: d.missing_submission,
            projection: d.projection,
            include_projection: d.include_projection,
            conversion_rate: d.conversion_rate,
            currency: d.currency,
        }
    }
}

impl TryFrom<RawGameConfig> for GameConfig {
    type Error = ConfigError;

    fn try_from(raw: RawGameConfig) -> Result<Self, Self::Error> {
        let config = Self {
            regime: raw.regime,
            trial: raw.trial,
            num_periods: raw.num_periods,
            decision_time_ms: raw.decision_time_ms,
            continuous_duration_ms: raw.continuous_duration_ms,
            tick_interval_ms: raw.tick_interval_ms,
            group_size: raw.group_size,
            extraction: raw.extraction,
            initial_stock: raw.initial_stock,
            growth: raw.growth,
            payoff: raw.payoff,
            discount_rate: raw.discount_rate,
            tau: raw.tau,
            cost_rule: raw.cost_rule,
            overdraft: raw.overdraft,
            missing_submission: raw.missing_submission,
            projection: raw.projection,
            include_projection: raw.include_projection,
            conversion_rate: raw.conversion_rate,
            currency: raw.currency,
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(GameConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = GameConfig::from_json_str(r#"{"regime": "discrete", "num_periods": 5}"#)
            .unwrap();
        assert_eq!(config.regime, DynamicRegime::Discrete);
        assert_eq!(config.num_periods, 5);
        assert_eq!(config.group_size, 2);
        assert!((config.initial_stock - 500.0).abs() < 1e-12);
    }

    #[test]
    fn test_json_roundtrip() {
        let config = GameConfig {
            growth: GrowthModel::Multiplicative { rate: 0.05 },
            overdraft: OverdraftPolicy::ZeroAndReplay,
            ..GameConfig::default()
        };
        let json = config.to_json_pretty().unwrap();
        let back = GameConfig::from_json_str(&json).unwrap();
        assert_eq!(config, back);
    }

    #[test]
    fn test_zero_group_size_rejected() {
        let err = GameConfig::from_json_str(r#"{"group_size": 0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidGroupSize(0)));
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        let err =
            GameConfig::from_json_str(r#"{"extraction": {"min": 5, "max": 1, "step": 0.1}}"#)
                .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBounds { .. }));
    }

    #[test]
    fn test_negative_parameter_rejected() {
        let err = GameConfig::from_json_str(
            r#"{"payoff": {"a": 2.5, "b": 1.8, "c0": -1, "c1": 0.1}}"#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::NegativeParameter { name: "payoff.c0", .. }
        ));
    }

    #[test]
    fn test_discount_base_must_stay_positive() {
        let err = GameConfig::from_json_str(r#"{"discount_rate": 10, "tau": 0.1}"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDiscount { .. }));
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(GameConfig::from_json_str(r#"{"NOMBRE_PERIODES": 3}"#).is_err());
    }

    #[test]
    fn test_snap_to_grid() {
        let bounds = ExtractionBounds {
            min: 0.0,
            max: 20.0,
            step: 0.5,
        };
        assert!((bounds.snap(1.26) - 1.5).abs() < 1e-12);
        assert!((bounds.snap(1.24) - 1.0).abs() < 1e-12);
        assert!((bounds.snap(25.0) - 20.0).abs() < 1e-12);
        assert!(bounds.contains(20.0));
        assert!(!bounds.contains(20.1));
        assert_eq!(bounds.grid_len(), 40);
    }

    #[test]
    fn test_continuous_ticks() {
        let config = GameConfig::default();
        assert_eq!(config.continuous_ticks(), 60);
        assert_eq!(config.tick_interval(), Duration::from_secs(1));
    }
}
