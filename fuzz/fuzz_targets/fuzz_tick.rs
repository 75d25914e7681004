#![no_main]

//! Group engine fuzzer.
//!
//! Drives a group through arbitrary submissions and tick closures and checks
//! every closed tick against the engine invariants:
//! 1. The stock stays finite and non-negative
//! 2. The group extraction is the sum of the counted extractions
//! 3. Cumulative payoffs grow by the discounted contribution only
//!
//! Invalid submissions must come back as errors, never as panics.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use arbitrary::Arbitrary;
use dyncpr::engine::check_tick;
use dyncpr::{
    DynamicRegime, GameConfig, GroupEngine, GrowthModel, MissingSubmission, OverdraftPolicy,
    Phase, TickRecord,
};
use libfuzzer_sys::fuzz_target;

/// A fuzzer-generated action on the engine.
#[derive(Arbitrary, Debug, Clone)]
enum FuzzAction {
    /// Submit a choice, possibly out of bounds or from a stranger.
    Submit {
        player: u8,
        extraction: f64,
        timestamp: f64,
    },
    /// Close the current tick.
    Close,
}

/// Structured input for engine fuzzing.
#[derive(Arbitrary, Debug)]
struct TickInput {
    /// Starting stock (scaled down).
    initial_stock: u16,
    /// Growth per tick, additive or multiplicative.
    growth: u16,
    multiplicative: bool,
    continuous: bool,
    replay: bool,
    zero_missing: bool,
    /// Initial extraction of each of the three players, in hundredths.
    initial: [u16; 3],
    /// Actions after the initial tick.
    actions: Vec<FuzzAction>,
}

fn check(config: &GameConfig, record: &TickRecord, previous: &mut BTreeMap<u32, f64>) {
    let violations = check_tick(config, record, previous);
    assert!(violations.is_empty(), "{violations:?}");
    for p in &record.players {
        previous.insert(p.player, p.cumulative);
    }
}

fuzz_target!(|input: TickInput| {
    let growth = if input.multiplicative {
        GrowthModel::Multiplicative {
            rate: f64::from(input.growth % 100) / 100.0,
        }
    } else {
        GrowthModel::Additive {
            amount: f64::from(input.growth) / 100.0,
        }
    };
    let config = Arc::new(GameConfig {
        regime: if input.continuous {
            DynamicRegime::Continuous
        } else {
            DynamicRegime::Discrete
        },
        num_periods: 20,
        continuous_duration_ms: 20_000,
        tick_interval_ms: 1_000,
        initial_stock: f64::from(input.initial_stock) / 10.0,
        growth,
        overdraft: if input.replay {
            OverdraftPolicy::ZeroAndReplay
        } else {
            OverdraftPolicy::ClampStock
        },
        missing_submission: if input.zero_missing {
            MissingSubmission::Zero
        } else {
            MissingSubmission::KeepLast
        },
        ..GameConfig::default()
    });

    let mut engine = match GroupEngine::new(Arc::clone(&config), 1, 0, [1, 2, 3]) {
        Ok(e) => e,
        Err(_) => return,
    };
    let mut previous: BTreeMap<u32, f64> = BTreeMap::new();

    for (player, hundredths) in (1u32..).zip(input.initial) {
        let extraction = f64::from(hundredths % 2001) / 100.0;
        if let Ok(Some(record)) = engine.submit_initial(player, extraction) {
            check(&config, &record, &mut previous);
        }
    }

    let mut tick = 0u64;
    for action in input.actions.into_iter().take(200) {
        match action {
            FuzzAction::Submit {
                player,
                extraction,
                timestamp,
            } => {
                let _ = engine.submit(u32::from(player % 5), extraction, timestamp);
            }
            FuzzAction::Close => {
                if engine.phase() != Phase::Running {
                    break;
                }
                tick += 1;
                if let Ok(record) = engine.close_tick(Duration::from_secs(tick)) {
                    check(&config, &record, &mut previous);
                }
            }
        }
    }

    if engine.phase() == Phase::Finalizing {
        if let Ok(outcome) = engine.finalize() {
            for p in &outcome.players {
                assert!(p.cumulative.is_finite());
            }
        }
    }
});
