//! Infinite-horizon continuation value.
//!
//! At the end of a game the payoff stream is projected forward assuming the
//! own extraction `e` and the group extraction `G` stay at their final
//! levels forever. The stock then follows a known path (linear for additive
//! growth, exponential for multiplicative growth, clamped at zero), so the
//! discounted value has a closed form once the time axis is cut at the
//! instants where the stock crosses the break-even level `c0 / c1` and where
//! it runs out.
//!
//! Four cases come out of the sign of the drift and the side of the
//! threshold the stock starts on:
//!
//! | stock vs threshold | drift      | regions                         |
//! |--------------------|------------|---------------------------------|
//! | above              | `>= 0`     | free forever                    |
//! | above              | `< 0`      | free, costly, exhausted         |
//! | below              | `> 0`      | costly, free                    |
//! | below              | `<= 0`     | costly, exhausted (or costly)   |
//!
//! The continuous regime integrates `exp(-r s)` over model time from now;
//! the discrete regime sums `(1 - r*tau)^k * tau` over the periods `k >= 1`
//! still to come. A zero discount rate has no finite value unless the
//! long-run payoff flow is zero; the limit (`+inf`, `-inf` or the finite
//! transient) is returned instead of a NaN.

use serde::{Deserialize, Serialize};

use crate::config::{CostRule, DynamicRegime, GrowthModel};
use crate::model::stock::drift;
use crate::model::{Discounting, PayoffModel};

/// Slack when turning a real crossing time into a period index.
const INDEX_EPSILON: f64 = 1e-9;

/// Long-run payoff flows smaller than this count as zero.
const FLOW_EPSILON: f64 = 1e-12;

/// Below this, `1 - p` is treated as zero in geometric sums.
const RATIO_EPSILON: f64 = 1e-12;

/// Final state the projection starts from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HorizonInputs {
    /// Player's final extraction.
    pub own_extraction: f64,
    /// Group's final total extraction.
    pub group_extraction: f64,
    /// Final stock.
    pub stock: f64,
}

/// Which closed form applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HorizonCase {
    /// Stock at or above the threshold and not declining: no cost ever.
    AboveNonDeclining,
    /// Stock at or above the threshold and declining.
    AboveDeclining,
    /// Stock below the threshold and growing.
    BelowGrowing,
    /// Stock below the threshold and not growing.
    BelowNonGrowing,
}

/// Result of an infinite-horizon projection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    /// Closed form that applied.
    pub case: HorizonCase,
    /// Discounted value at the current instant.
    pub value: f64,
    /// When the stock crosses the threshold (model time, or period offset).
    pub threshold_at: Option<f64>,
    /// When the stock runs out (model time, or period offset).
    pub exhausted_at: Option<f64>,
}

/// Project the payoff of a player whose choices stay frozen.
#[must_use]
pub fn project(model: &PayoffModel, growth: GrowthModel, inputs: HorizonInputs) -> Projection {
    let kernel = Kernel::new(model.discounting);
    let path = StockPath::new(growth, model.discounting, inputs);
    let threshold = model.params.threshold();
    let floored = model.cost_rule == CostRule::Floored;
    let drift = drift(growth, inputs.stock, inputs.group_extraction);
    let origin = kernel.origin();

    let reach_zero = || {
        path.crossing(0.0)
            .map_or(f64::INFINITY, |s| kernel.first_reaching(s))
            .max(origin)
    };

    let mut segments = Segments::default();
    let (case, threshold_at, exhausted_at) = if inputs.stock >= threshold {
        if drift >= 0.0 {
            let region = if floored { Region::Free } else { Region::Costly };
            segments.push(origin, f64::INFINITY, region);
            (HorizonCase::AboveNonDeclining, None, None)
        } else {
            let below = path
                .crossing(threshold)
                .map_or(origin, |s| kernel.first_below(s))
                .max(origin);
            let empty = reach_zero();
            if floored {
                segments.push(origin, below, Region::Free);
                segments.push(below, empty, Region::Costly);
            } else {
                segments.push(origin, empty, Region::Costly);
            }
            segments.push(empty, f64::INFINITY, Region::Exhausted);
            (HorizonCase::AboveDeclining, Some(below), finite(empty))
        }
    } else if drift > 0.0 {
        let reached = path
            .crossing(threshold)
            .map_or(f64::INFINITY, |s| kernel.first_reaching(s))
            .max(origin);
        if floored {
            segments.push(origin, reached, Region::Costly);
            segments.push(reached, f64::INFINITY, Region::Free);
        } else {
            segments.push(origin, f64::INFINITY, Region::Costly);
        }
        (HorizonCase::BelowGrowing, finite(reached), None)
    } else {
        let empty = if drift < 0.0 { reach_zero() } else { f64::INFINITY };
        segments.push(origin, empty, Region::Costly);
        segments.push(empty, f64::INFINITY, Region::Exhausted);
        (HorizonCase::BelowNonGrowing, None, finite(empty))
    };

    let evaluator = Evaluator {
        model,
        kernel,
        path,
        extraction: inputs.own_extraction,
    };

    Projection {
        case,
        value: evaluator.value(&segments.0),
        threshold_at,
        exhausted_at,
    }
}

/// Regression of the continuation value on the final stock.
///
/// Coefficients fitted on simulated optimal play for the default parameters;
/// only meaningful for that calibration.
#[must_use]
pub fn fitted_continuation(regime: DynamicRegime, stock: f64) -> f64 {
    let h = stock;
    match regime {
        DynamicRegime::Discrete => 2_887.505_958 + 5.024_172_262 * h + 0.001_545_865_057 * h * h,
        DynamicRegime::Continuous => 2_894.217_061 + 5.048_322_591 * h + 0.011_953_794_25 * h * h,
    }
}

fn finite(t: f64) -> Option<f64> {
    t.is_finite().then_some(t)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Region {
    /// Stock at or above the threshold under the floored rule.
    Free,
    /// Stock strictly between zero and the threshold (or anywhere positive
    /// under the unclamped rule).
    Costly,
    /// Stock at zero: full unit cost `c0`.
    Exhausted,
}

#[derive(Debug, Clone, Copy)]
struct Segment {
    start: f64,
    end: f64,
    region: Region,
}

#[derive(Debug, Default)]
struct Segments(Vec<Segment>);

impl Segments {
    fn push(&mut self, start: f64, end: f64, region: Region) {
        if start < end {
            self.0.push(Segment { start, end, region });
        }
    }
}

/// Discounted moments over the time axis of a regime.
#[derive(Debug, Clone, Copy)]
enum Kernel {
    /// `integral of exp(-r s) ds`, s in model time.
    Continuous { rate: f64 },
    /// `tau * sum of base^k`, k in periods.
    Discrete { base: f64, tau: f64 },
}

impl Kernel {
    fn new(discounting: Discounting) -> Self {
        match discounting {
            Discounting::Continuous { rate, .. } => Self::Continuous { rate },
            Discounting::Discrete { rate, tau } => Self::Discrete {
                base: 1.0 - rate * tau,
                tau,
            },
        }
    }

    /// First instant still to come.
    const fn origin(self) -> f64 {
        match self {
            Self::Continuous { .. } => 0.0,
            Self::Discrete { .. } => 1.0,
        }
    }

    /// Whether an infinite constant flow has a finite value.
    fn summable(self) -> bool {
        match self {
            Self::Continuous { rate } => rate > 0.0,
            Self::Discrete { base, .. } => base < 1.0,
        }
    }

    /// Discounted length of `[a, b)`.
    fn flow(self, a: f64, b: f64) -> f64 {
        match self {
            Self::Continuous { rate } => {
                if rate <= 0.0 {
                    b - a
                } else {
                    ((-rate * a).exp() - (-rate * b).exp()) / rate
                }
            }
            Self::Discrete { base, tau } => {
                if base >= 1.0 {
                    tau * (b - a)
                } else {
                    let pow = |s: f64| if s.is_infinite() { 0.0 } else { base.powf(s) };
                    tau * (pow(a) - pow(b)) / (1.0 - base)
                }
            }
        }
    }

    /// Discounted integral of `s` over `[a, b)`.
    fn ramp(self, a: f64, b: f64) -> f64 {
        match self {
            Self::Continuous { rate } => {
                if rate <= 0.0 {
                    (b * b - a * a) / 2.0
                } else {
                    let tail = |s: f64| {
                        if s.is_infinite() {
                            0.0
                        } else {
                            (s + 1.0 / rate) * (-rate * s).exp()
                        }
                    };
                    (tail(a) - tail(b)) / rate
                }
            }
            Self::Discrete { base, tau } => {
                if base >= 1.0 {
                    tau * (b * (b - 1.0) - a * (a - 1.0)) / 2.0
                } else {
                    let one_minus = 1.0 - base;
                    let tail = |n: f64| {
                        if n.is_infinite() {
                            0.0
                        } else {
                            base.powf(n) * (n / one_minus + base / (one_minus * one_minus))
                        }
                    };
                    tau * (tail(a) - tail(b))
                }
            }
        }
    }

    /// Discounted integral of `exp(log_growth * s)` over `[a, b)`.
    fn geometric(self, a: f64, b: f64, log_growth: f64) -> f64 {
        match self {
            Self::Continuous { rate } => {
                let k = log_growth - rate;
                if k.abs() < RATIO_EPSILON {
                    return b - a;
                }
                let at = |s: f64| {
                    if s.is_infinite() {
                        if k < 0.0 { 0.0 } else { f64::INFINITY }
                    } else {
                        (k * s).exp()
                    }
                };
                (at(b) - at(a)) / k
            }
            Self::Discrete { base, tau } => {
                let p = base * log_growth.exp();
                if (1.0 - p).abs() < RATIO_EPSILON {
                    return tau * (b - a);
                }
                let pow = |s: f64| {
                    if s.is_infinite() {
                        if p < 1.0 { 0.0 } else { f64::INFINITY }
                    } else {
                        p.powf(s)
                    }
                };
                tau * (pow(a) - pow(b)) / (1.0 - p)
            }
        }
    }

    /// First instant strictly past a downward crossing at `s`.
    fn first_below(self, s: f64) -> f64 {
        match self {
            Self::Continuous { .. } => s,
            Self::Discrete { .. } => (s + INDEX_EPSILON).floor() + 1.0,
        }
    }

    /// First instant at or past a crossing at `s`.
    fn first_reaching(self, s: f64) -> f64 {
        match self {
            Self::Continuous { .. } => s,
            Self::Discrete { .. } => (s - INDEX_EPSILON).ceil(),
        }
    }
}

/// Unclamped stock trajectory under frozen extraction.
#[derive(Debug, Clone, Copy)]
enum StockPath {
    /// `R(s) = start + slope * s`.
    Linear { start: f64, slope: f64 },
    /// `R(s) = scale * exp(log_growth * s) + offset`.
    Geometric {
        scale: f64,
        log_growth: f64,
        offset: f64,
    },
}

impl StockPath {
    fn new(growth: GrowthModel, discounting: Discounting, inputs: HorizonInputs) -> Self {
        let group = inputs.group_extraction;
        // Continuous time runs in model time; a tick lasts `tau`.
        let per_unit = |per_tick: f64| match discounting {
            Discounting::Continuous { tau, .. } => per_tick / tau,
            Discounting::Discrete { .. } => per_tick,
        };
        match growth {
            GrowthModel::Additive { amount } => Self::Linear {
                start: inputs.stock,
                slope: per_unit(amount - group),
            },
            GrowthModel::Multiplicative { rate } if rate > 0.0 => {
                let offset = group / rate;
                let log_growth = match discounting {
                    Discounting::Continuous { tau, .. } => rate / tau,
                    Discounting::Discrete { .. } => rate.ln_1p(),
                };
                Self::Geometric {
                    scale: inputs.stock - offset,
                    log_growth,
                    offset,
                }
            }
            GrowthModel::Multiplicative { .. } => Self::Linear {
                start: inputs.stock,
                slope: per_unit(-group),
            },
        }
    }

    /// When the path reaches `level`, if it ever does.
    fn crossing(&self, level: f64) -> Option<f64> {
        match *self {
            Self::Linear { start, slope } => {
                if slope == 0.0 {
                    None
                } else {
                    let s = (level - start) / slope;
                    (s >= 0.0 && s.is_finite()).then_some(s)
                }
            }
            Self::Geometric {
                scale,
                log_growth,
                offset,
            } => {
                let x = (level - offset) / scale;
                if scale == 0.0 || !x.is_finite() || x <= 0.0 {
                    return None;
                }
                let s = x.ln() / log_growth;
                (s >= 0.0 && s.is_finite()).then_some(s)
            }
        }
    }

    /// Discounted integral of the stock over `[a, b)`.
    fn integral(&self, kernel: Kernel, a: f64, b: f64) -> f64 {
        match *self {
            Self::Linear { start, slope } => {
                let ramp = if slope == 0.0 {
                    0.0
                } else {
                    slope * kernel.ramp(a, b)
                };
                start * kernel.flow(a, b) + ramp
            }
            Self::Geometric {
                scale,
                log_growth,
                offset,
            } => {
                let curve = if scale == 0.0 {
                    0.0
                } else {
                    scale * kernel.geometric(a, b, log_growth)
                };
                offset * kernel.flow(a, b) + curve
            }
        }
    }

    /// Constant trajectory (zero drift).
    fn is_constant(&self) -> bool {
        match *self {
            Self::Linear { slope, .. } => slope == 0.0,
            Self::Geometric { scale, .. } => scale == 0.0,
        }
    }

    /// Grows without bound.
    fn is_unbounded(&self) -> bool {
        match *self {
            Self::Linear { slope, .. } => slope > 0.0,
            Self::Geometric { scale, .. } => scale > 0.0,
        }
    }

    fn start(&self) -> f64 {
        match *self {
            Self::Linear { start, .. } => start,
            Self::Geometric { scale, offset, .. } => scale + offset,
        }
    }
}

struct Evaluator<'a> {
    model: &'a PayoffModel,
    kernel: Kernel,
    path: StockPath,
    extraction: f64,
}

impl Evaluator<'_> {
    fn value(&self, segments: &[Segment]) -> f64 {
        let mut total = 0.0;
        for segment in segments {
            if segment.end.is_infinite() && !self.kernel.summable() {
                let rate = self.tail_rate(segment.region);
                if rate > FLOW_EPSILON {
                    return f64::INFINITY;
                }
                if rate < -FLOW_EPSILON {
                    return f64::NEG_INFINITY;
                }
                // A zero long-run flow adds nothing.
                continue;
            }
            total += self.segment_value(segment);
        }
        total
    }

    fn segment_value(&self, segment: &Segment) -> f64 {
        let Segment { start, end, region } = *segment;
        let p = &self.model.params;
        let e = self.extraction;
        let benefit = self.model.benefit(e);
        let flow = self.kernel.flow(start, end);

        match region {
            Region::Free => benefit * flow,
            Region::Exhausted => (benefit - e * p.c0) * flow,
            Region::Costly => {
                if e <= 0.0 {
                    return benefit * flow;
                }
                let stock_term = if p.c1 > 0.0 {
                    p.c1 * self.path.integral(self.kernel, start, end)
                } else {
                    0.0
                };
                benefit * flow - e * (p.c0 * flow - stock_term)
            }
        }
    }

    /// Payoff per unit of time once the segment has run for a long time.
    fn tail_rate(&self, region: Region) -> f64 {
        let p = &self.model.params;
        let e = self.extraction;
        let benefit = self.model.benefit(e);
        match region {
            Region::Free => benefit,
            Region::Exhausted => benefit - e * p.c0,
            Region::Costly => {
                if self.path.is_constant() {
                    benefit - e * (p.c0 - p.c1 * self.path.start())
                } else if self.path.is_unbounded() && e * p.c1 > 0.0 {
                    f64::INFINITY
                } else {
                    benefit - e * p.c0
                }
            }
        }
    }
}
