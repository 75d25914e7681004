#![no_main]

//! Infinite-horizon projection fuzzer.
//!
//! The projection must never panic and must classify every input, for any
//! combination of stock, extraction levels and growth.

use arbitrary::Arbitrary;
use dyncpr::model::{HorizonInputs, project};
use dyncpr::{CostRule, GameConfig, GrowthModel, PayoffModel};
use libfuzzer_sys::fuzz_target;

/// Structured input for projection fuzzing.
#[derive(Arbitrary, Debug)]
struct ProjectionInput {
    own: u16,
    others: u16,
    stock: u32,
    growth: u16,
    multiplicative: bool,
    unclamped: bool,
    continuous: bool,
}

fuzz_target!(|input: ProjectionInput| {
    let growth = if input.multiplicative {
        GrowthModel::Multiplicative {
            rate: f64::from(input.growth % 100) / 100.0,
        }
    } else {
        GrowthModel::Additive {
            amount: f64::from(input.growth) / 100.0,
        }
    };
    let config = GameConfig {
        regime: if input.continuous {
            dyncpr::DynamicRegime::Continuous
        } else {
            dyncpr::DynamicRegime::Discrete
        },
        cost_rule: if input.unclamped {
            CostRule::Unclamped
        } else {
            CostRule::Floored
        },
        growth,
        ..GameConfig::default()
    };
    let model = PayoffModel::from_config(&config);

    let own = f64::from(input.own % 2001) / 100.0;
    let group = own + f64::from(input.others % 6001) / 100.0;
    let projection = project(
        &model,
        growth,
        HorizonInputs {
            own_extraction: own,
            group_extraction: group,
            stock: f64::from(input.stock) / 100.0,
        },
    );

    assert!(!projection.value.is_nan(), "{input:?} -> {projection:?}");
    if let (Some(t), Some(e)) = (projection.threshold_at, projection.exhausted_at) {
        assert!(t <= e, "{input:?} -> {projection:?}");
    }
});
