//! Simulated players for unattended sessions.

use std::collections::BTreeMap;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::{ExtractionBounds, GameConfig};
use crate::engine::SubmissionInbox;
use crate::model::{GroupId, PlayerId};
use crate::part::{Decision, DecisionSource};

/// Seconds between two continuous updates of a simulated player.
const UPDATE_GAP_SECS: (f64, f64) = (2.0, 10.0);

/// Players that pick uniformly from the extraction grid.
///
/// Continuous updates arrive every 2 to 10 seconds per player. Seeded, so a
/// session replays identically.
#[derive(Debug, Clone)]
pub struct SimulatedPlayers {
    rng: StdRng,
    bounds: ExtractionBounds,
    decision_time: Duration,
    timeout_rate: f64,
    next_update: BTreeMap<PlayerId, f64>,
}

impl SimulatedPlayers {
    /// Simulated players for `config`.
    #[must_use]
    pub fn new(config: &GameConfig, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            bounds: config.extraction,
            decision_time: config.decision_time(),
            timeout_rate: 0.0,
            next_update: BTreeMap::new(),
        }
    }

    /// Let a share of discrete decisions miss the time limit.
    #[must_use]
    pub fn with_timeouts(mut self, rate: f64) -> Self {
        self.timeout_rate = rate.clamp(0.0, 1.0);
        self
    }

    fn draw_extraction(&mut self) -> f64 {
        let index = self.rng.gen_range(0..self.bounds.grid_len());
        self.bounds.grid_value(index)
    }

    fn draw_decision_time(&mut self) -> Duration {
        let limit = u64::try_from(self.decision_time.as_millis()).unwrap_or(u64::MAX);
        Duration::from_millis(self.rng.gen_range(0..=limit))
    }

    fn draw_gap(&mut self) -> f64 {
        self.rng.gen_range(UPDATE_GAP_SECS.0..=UPDATE_GAP_SECS.1)
    }
}

impl DecisionSource for SimulatedPlayers {
    fn initial_extraction(&mut self, _group: GroupId, player: PlayerId) -> Decision {
        let first = self.draw_gap();
        self.next_update.insert(player, first);
        Decision {
            extraction: self.draw_extraction(),
            decision_time: self.draw_decision_time(),
        }
    }

    fn period_decision(
        &mut self,
        _group: GroupId,
        _player: PlayerId,
        _period: u32,
    ) -> Option<Decision> {
        if self.timeout_rate > 0.0 && self.rng.gen_bool(self.timeout_rate) {
            return None;
        }
        Some(Decision {
            extraction: self.draw_extraction(),
            decision_time: self.draw_decision_time(),
        })
    }

    fn continuous_updates(
        &mut self,
        _group: GroupId,
        roster: &[PlayerId],
        until: f64,
        inbox: &SubmissionInbox,
    ) {
        for &player in roster {
            let mut at = match self.next_update.get(&player) {
                Some(&at) => at,
                None => self.draw_gap(),
            };
            while at <= until {
                let extraction = self.draw_extraction();
                inbox.push(player, extraction, at);
                at += self.draw_gap();
            }
            self.next_update.insert(player, at);
        }
    }
}
