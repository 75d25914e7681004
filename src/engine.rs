//! Dynamics engine of one group.
//!
//! A [`GroupEngine`] owns the shared stock of a group, the players' latest
//! choices and their cumulative payoffs. It is a plain state machine driven
//! from outside:
//!
//! ```text
//! AwaitingInitialExtraction --(all initial choices, tick 0)--> Running
//! Running --(close_tick ... last period / end of window)--> Finalizing
//! Finalizing --(finalize)--> Closed
//! ```
//!
//! Every closed tick yields an immutable [`TickRecord`]. The engine never
//! reads a clock; the caller passes the elapsed time of each tick, usually
//! from a [`TickSource`].

mod inbox;
mod invariants;
mod phase;
mod record;
mod scheduler;

pub use inbox::SubmissionInbox;
pub use invariants::{InvariantViolation, assert_invariants, check_tick};
pub use phase::Phase;
pub use record::{GroupOutcome, PlayerOutcome, PlayerTick, TickRecord};
pub use scheduler::{TickSource, VirtualClock, WallClock};

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::{DynamicRegime, GameConfig, OverdraftPolicy, ProjectionMethod};
use crate::error::{ConfigError, EngineError, EngineResult};
use crate::model::{
    ExtractionAggregator, GroupId, HorizonInputs, PayoffModel, PlayerId, ResourceStock,
    TickSnapshot, fitted_continuation, project,
};

/// What happened to a submission.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SubmitOutcome {
    /// Recorded for the current tick.
    Accepted {
        /// Group total including the new choice.
        group_total: f64,
    },
    /// Arrived after the end of play and was ignored.
    Dropped,
}

/// State of one group for one sequence.
#[derive(Debug, Clone)]
pub struct GroupEngine {
    config: Arc<GameConfig>,
    model: PayoffModel,
    sequence: u32,
    group: GroupId,
    phase: Phase,
    stock: ResourceStock,
    aggregator: ExtractionAggregator,
    cumulative: BTreeMap<PlayerId, f64>,
    /// Choices frozen at the last tick, before any overdraft voiding.
    last_choices: Option<TickSnapshot>,
    next_tick: u64,
}

impl GroupEngine {
    /// Create the engine of `group` for sequence `sequence`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] if the configuration is invalid or
    /// the roster is empty.
    pub fn new(
        config: Arc<GameConfig>,
        sequence: u32,
        group: GroupId,
        roster: impl IntoIterator<Item = PlayerId>,
    ) -> EngineResult<Self> {
        config.validate()?;
        let aggregator = ExtractionAggregator::new(roster);
        if aggregator.roster().is_empty() {
            return Err(ConfigError::InvalidGroupSize(0).into());
        }

        let cumulative = aggregator.roster().iter().map(|&p| (p, 0.0)).collect();
        debug!(sequence, group, players = aggregator.roster().len(), "group engine created");

        Ok(Self {
            model: PayoffModel::from_config(&config),
            stock: ResourceStock::new(config.initial_stock),
            config,
            sequence,
            group,
            phase: Phase::AwaitingInitialExtraction,
            aggregator,
            cumulative,
            last_choices: None,
            next_tick: 0,
        })
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// Group identifier.
    #[must_use]
    pub const fn group(&self) -> GroupId {
        self.group
    }

    /// Sequence number.
    #[must_use]
    pub const fn sequence(&self) -> u32 {
        self.sequence
    }

    /// Shared configuration.
    #[must_use]
    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Payoff model in use.
    #[must_use]
    pub const fn model(&self) -> &PayoffModel {
        &self.model
    }

    /// Members in ascending order.
    #[must_use]
    pub fn roster(&self) -> &[PlayerId] {
        self.aggregator.roster()
    }

    /// Current stock.
    #[must_use]
    pub const fn stock(&self) -> f64 {
        self.stock.level()
    }

    /// Running group total of the latest choices.
    #[must_use]
    pub fn group_total(&self) -> f64 {
        self.aggregator.group_total()
    }

    /// Latest choice of `player`.
    #[must_use]
    pub fn latest(&self, player: PlayerId) -> Option<f64> {
        self.aggregator.latest(player)
    }

    /// Cumulative payoff of `player` so far.
    #[must_use]
    pub fn cumulative(&self, player: PlayerId) -> Option<f64> {
        self.cumulative.get(&player).copied()
    }

    /// Index of the next tick to close.
    #[must_use]
    pub const fn next_tick(&self) -> u64 {
        self.next_tick
    }

    /// Whether every member chose since the last tick boundary.
    #[must_use]
    pub fn all_submitted(&self) -> bool {
        self.aggregator.all_submitted()
    }

    /// Record an initial extraction.
    ///
    /// Once the whole roster has chosen, tick 0 is closed and returned.
    ///
    /// # Errors
    ///
    /// Fails outside [`Phase::AwaitingInitialExtraction`], for a stranger,
    /// or for an invalid extraction.
    pub fn submit_initial(
        &mut self,
        player: PlayerId,
        extraction: f64,
    ) -> EngineResult<Option<TickRecord>> {
        self.require(Phase::AwaitingInitialExtraction, "submit_initial")?;
        let extraction = self.checked_extraction(player, extraction)?;
        self.aggregator.record(player, extraction, 0.0);

        if !self.aggregator.all_submitted() {
            return Ok(None);
        }

        let record = self.close_current(0);
        self.phase = if self.play_over(0, 0) {
            Phase::Finalizing
        } else {
            Phase::Running
        };
        info!(sequence = self.sequence, group = self.group, stock = record.stock_after, "initial extraction closed");
        Ok(Some(record))
    }

    /// Record a choice made `timestamp` seconds into the sequence.
    ///
    /// Submissions after the end of play are dropped, as are continuous
    /// submissions stamped past the end of the window.
    ///
    /// # Errors
    ///
    /// Fails before the initial tick, for a stranger, or for an invalid
    /// extraction.
    pub fn submit(
        &mut self,
        player: PlayerId,
        extraction: f64,
        timestamp: f64,
    ) -> EngineResult<SubmitOutcome> {
        if self.phase.drops_submissions() {
            warn!(group = self.group, player, phase = %self.phase, "submission after end of play dropped");
            return Ok(SubmitOutcome::Dropped);
        }
        self.require(Phase::Running, "submit")?;

        if self.config.regime == DynamicRegime::Continuous
            && timestamp > self.config.continuous_duration().as_secs_f64()
        {
            warn!(group = self.group, player, timestamp, "submission past the continuous deadline dropped");
            return Ok(SubmitOutcome::Dropped);
        }

        let extraction = self.checked_extraction(player, extraction)?;
        let group_total = self.aggregator.record(player, extraction, timestamp);
        Ok(SubmitOutcome::Accepted { group_total })
    }

    /// Feed everything queued in `inbox` into the current tick.
    ///
    /// Invalid submissions are logged and skipped. Returns the number of
    /// accepted submissions.
    pub fn drain_inbox(&mut self, inbox: &SubmissionInbox) -> usize {
        let mut accepted = 0;
        for s in inbox.drain() {
            match self.submit(s.player, s.extraction, s.timestamp) {
                Ok(SubmitOutcome::Accepted { .. }) => accepted += 1,
                Ok(SubmitOutcome::Dropped) => {}
                Err(e) => warn!(group = self.group, player = s.player, error = %e, "submission rejected"),
            }
        }
        accepted
    }

    /// Close the current tick at `elapsed` since the start of the sequence.
    ///
    /// Moves to [`Phase::Finalizing`] after the last period (discrete) or
    /// at the end of the window (continuous).
    ///
    /// # Errors
    ///
    /// Fails outside [`Phase::Running`].
    pub fn close_tick(&mut self, elapsed: Duration) -> EngineResult<TickRecord> {
        self.require(Phase::Running, "close_tick")?;
        let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        let tick = self.next_tick;
        let record = self.close_current(elapsed_ms);

        if self.play_over(tick, elapsed_ms) {
            self.phase = Phase::Finalizing;
            info!(sequence = self.sequence, group = self.group, tick, "play over");
        }
        Ok(record)
    }

    /// Compute final payoffs, including the continuation value.
    ///
    /// # Errors
    ///
    /// Fails outside [`Phase::Finalizing`].
    pub fn finalize(&mut self) -> EngineResult<GroupOutcome> {
        self.require(Phase::Finalizing, "finalize")?;

        let stock = self.stock.level();
        let choices = self.last_choices.clone().unwrap_or_else(|| TickSnapshot {
            extractions: BTreeMap::new(),
            substituted: Vec::new(),
        });
        let group_extraction = choices.group_total();
        let last_tick = self.next_tick.saturating_sub(1);
        let factor = self.model.discounting.factor(last_tick);

        let players = self
            .aggregator
            .roster()
            .iter()
            .map(|&player| {
                let own = choices.get(player);
                let projection = project(
                    &self.model,
                    self.config.growth,
                    HorizonInputs {
                        own_extraction: own,
                        group_extraction,
                        stock,
                    },
                );
                let continuation = if self.config.include_projection {
                    let value = match self.config.projection {
                        ProjectionMethod::ClosedForm => projection.value,
                        ProjectionMethod::Fitted => {
                            fitted_continuation(self.config.regime, stock)
                        }
                    };
                    factor * value
                } else {
                    0.0
                };
                let cumulative = self.cumulative.get(&player).copied().unwrap_or(0.0);
                PlayerOutcome {
                    player,
                    final_extraction: own,
                    cumulative,
                    projection,
                    continuation,
                    total: cumulative + continuation,
                }
            })
            .collect();

        self.phase = Phase::Closed;
        info!(sequence = self.sequence, group = self.group, final_stock = stock, "group closed");

        Ok(GroupOutcome {
            sequence: self.sequence,
            group: self.group,
            ticks: self.next_tick,
            final_stock: stock,
            final_group_extraction: group_extraction,
            players,
        })
    }

    fn require(&self, expected: Phase, operation: &'static str) -> EngineResult<()> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(EngineError::WrongPhase {
                operation,
                phase: self.phase,
            })
        }
    }

    fn checked_extraction(&self, player: PlayerId, value: f64) -> EngineResult<f64> {
        if !self.aggregator.is_member(player) {
            return Err(EngineError::UnknownPlayer(player));
        }
        if !value.is_finite() {
            return Err(EngineError::NonFiniteExtraction(value));
        }
        let bounds = &self.config.extraction;
        if !bounds.contains(value) {
            return Err(EngineError::ExtractionOutOfBounds {
                value,
                min: bounds.min,
                max: bounds.max,
            });
        }
        Ok(bounds.snap(value))
    }

    fn play_over(&self, tick: u64, elapsed_ms: u64) -> bool {
        match self.config.regime {
            DynamicRegime::Discrete => tick >= u64::from(self.config.num_periods),
            DynamicRegime::Continuous => {
                elapsed_ms >= self.config.continuous_duration_ms
                    || tick >= self.config.continuous_ticks()
            }
        }
    }

    /// Freeze choices, update the stock and credit payoffs.
    fn close_current(&mut self, elapsed_ms: u64) -> TickRecord {
        let tick = self.next_tick;
        let growth = self.config.growth;
        let choices = self.aggregator.close_tick(self.config.missing_submission);

        let stock_before = self.stock.level();
        let requested = choices.group_total();
        let overdraft = requested > self.stock.available_after_growth(growth);
        let counted = if overdraft && self.config.overdraft == OverdraftPolicy::ZeroAndReplay {
            choices.voided()
        } else {
            choices.clone()
        };

        let group_extraction = counted.group_total();
        let stock_after = self.stock.grow_and_deplete(growth, group_extraction);
        let previous = self.cumulative.clone();

        let players = counted
            .extractions
            .iter()
            .map(|(&player, &extraction)| {
                let breakdown = self.model.instantaneous(extraction, stock_after);
                let discounted = self.model.discounted(tick, breakdown.payoff);
                let cumulative = self.cumulative.entry(player).or_insert(0.0);
                *cumulative += discounted;
                PlayerTick {
                    player,
                    extraction,
                    benefit: breakdown.benefit,
                    cost: breakdown.cost,
                    payoff: breakdown.payoff,
                    discounted,
                    cumulative: *cumulative,
                    substituted: counted.substituted.contains(&player),
                }
            })
            .collect();

        #[allow(clippy::cast_precision_loss)]
        let model_time = tick as f64 * self.config.tau;
        let record = TickRecord {
            sequence: self.sequence,
            group: self.group,
            tick,
            model_time,
            elapsed_ms,
            group_extraction,
            stock_before,
            stock_after,
            overdraft,
            players,
        };

        if overdraft {
            warn!(group = self.group, tick, requested, policy = ?self.config.overdraft, "overdraft");
        }
        debug!(group = self.group, tick, stock = stock_after, group_extraction, "tick closed");
        assert_invariants(&self.config, &record, &previous);

        self.last_choices = Some(choices);
        self.next_tick += 1;
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GrowthModel, MissingSubmission};

    fn discrete(periods: u32) -> Arc<GameConfig> {
        Arc::new(GameConfig {
            regime: DynamicRegime::Discrete,
            num_periods: periods,
            initial_stock: 10.0,
            growth: GrowthModel::Additive { amount: 0.56 },
            ..GameConfig::default()
        })
    }

    fn started(config: Arc<GameConfig>) -> GroupEngine {
        let mut engine = GroupEngine::new(config, 1, 0, [1, 2]).unwrap();
        assert!(engine.submit_initial(1, 0.5).unwrap().is_none());
        assert!(engine.submit_initial(2, 0.5).unwrap().is_some());
        engine
    }

    #[test]
    fn test_initial_tick_reference_values() {
        let mut engine = GroupEngine::new(discrete(2), 1, 0, [1, 2]).unwrap();
        assert_eq!(engine.phase(), Phase::AwaitingInitialExtraction);
        engine.submit_initial(1, 0.5).unwrap();
        let record = engine.submit_initial(2, 0.5).unwrap().unwrap();

        assert_eq!(record.tick, 0);
        assert!((record.group_extraction - 1.0).abs() < 1e-12);
        assert!((record.stock_after - 9.56).abs() < 1e-12);
        let p1 = record.player(1).unwrap();
        assert!((p1.payoff - 0.503).abs() < 1e-9);
        // Tick 0 is undiscounted and lasts tau = 0.1.
        assert!((p1.discounted - 0.0503).abs() < 1e-9);
        assert_eq!(engine.phase(), Phase::Running);
    }

    #[test]
    fn test_out_of_phase_calls_rejected() {
        let mut engine = GroupEngine::new(discrete(2), 1, 0, [1, 2]).unwrap();
        assert!(matches!(
            engine.submit(1, 1.0, 0.0),
            Err(EngineError::WrongPhase { operation: "submit", .. })
        ));
        assert!(matches!(
            engine.close_tick(Duration::ZERO),
            Err(EngineError::WrongPhase { .. })
        ));
        assert!(engine.finalize().is_err());

        let mut engine = started(discrete(2));
        assert!(matches!(
            engine.submit_initial(1, 1.0),
            Err(EngineError::WrongPhase { .. })
        ));
    }

    #[test]
    fn test_invalid_submissions() {
        let mut engine = started(discrete(2));
        assert!(matches!(engine.submit(9, 1.0, 1.0), Err(EngineError::UnknownPlayer(9))));
        assert!(matches!(
            engine.submit(1, f64::NAN, 1.0),
            Err(EngineError::NonFiniteExtraction(_))
        ));
        assert!(matches!(
            engine.submit(1, 20.5, 1.0),
            Err(EngineError::ExtractionOutOfBounds { .. })
        ));
        assert!(matches!(
            engine.submit(1, -1.0, 1.0),
            Err(EngineError::ExtractionOutOfBounds { .. })
        ));
    }

    #[test]
    fn test_submission_snapped_to_step() {
        let mut engine = started(discrete(2));
        engine.submit(1, 1.234_56, 1.0).unwrap();
        assert!((engine.latest(1).unwrap() - 1.23).abs() < 1e-9);
    }

    #[test]
    fn test_discrete_periods_then_finalize() {
        let mut engine = started(discrete(2));
        for period in 1..=2u64 {
            engine.submit(1, 1.0, 0.0).unwrap();
            engine.submit(2, 1.0, 0.0).unwrap();
            assert!(engine.all_submitted());
            let record = engine.close_tick(Duration::from_secs(period * 10)).unwrap();
            assert_eq!(record.tick, period);
        }
        assert_eq!(engine.phase(), Phase::Finalizing);
        assert_eq!(engine.submit(1, 1.0, 99.0).unwrap(), SubmitOutcome::Dropped);

        let outcome = engine.finalize().unwrap();
        assert_eq!(engine.phase(), Phase::Closed);
        assert_eq!(outcome.ticks, 3);
        let p = outcome.player(1).unwrap();
        assert!((p.final_extraction - 1.0).abs() < 1e-12);
        assert!((p.total - (p.cumulative + p.continuation)).abs() < 1e-12);
        assert!(p.continuation.is_finite());
        assert!(engine.finalize().is_err());
    }

    #[test]
    fn test_projection_can_be_disabled() {
        let config = Arc::new(GameConfig {
            include_projection: false,
            ..(*discrete(1)).clone()
        });
        let mut engine = started(config);
        engine.close_tick(Duration::from_secs(1)).unwrap();
        let outcome = engine.finalize().unwrap();
        for p in &outcome.players {
            assert!(p.continuation.abs() < f64::EPSILON);
            assert!((p.total - p.cumulative).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn test_missing_submission_keeps_last() {
        let mut engine = started(discrete(3));
        engine.submit(1, 2.0, 1.0).unwrap();
        let record = engine.close_tick(Duration::from_secs(30)).unwrap();
        let p2 = record.player(2).unwrap();
        assert!(p2.substituted);
        assert!((p2.extraction - 0.5).abs() < 1e-12);
        assert!((record.group_extraction - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_missing_submission_zero() {
        let config = Arc::new(GameConfig {
            missing_submission: MissingSubmission::Zero,
            ..(*discrete(3)).clone()
        });
        let mut engine = started(config);
        engine.submit(1, 2.0, 1.0).unwrap();
        let record = engine.close_tick(Duration::from_secs(30)).unwrap();
        assert!(record.player(2).unwrap().extraction.abs() < f64::EPSILON);
        assert!((record.group_extraction - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_and_replay_voids_overdraft() {
        let config = Arc::new(GameConfig {
            regime: DynamicRegime::Discrete,
            num_periods: 3,
            initial_stock: 5.0,
            growth: GrowthModel::Additive { amount: 1.0 },
            overdraft: OverdraftPolicy::ZeroAndReplay,
            ..GameConfig::default()
        });
        let mut engine = GroupEngine::new(config, 1, 0, [1, 2]).unwrap();
        engine.submit_initial(1, 10.0).unwrap();
        let record = engine.submit_initial(2, 10.0).unwrap().unwrap();
        assert!(record.overdraft);
        assert!(record.group_extraction.abs() < f64::EPSILON);
        assert!((record.stock_after - 6.0).abs() < 1e-12);

        // Choices are replayed into the next tick and voided again.
        let record = engine.close_tick(Duration::from_secs(30)).unwrap();
        assert!(record.overdraft);
        assert!((record.stock_after - 7.0).abs() < 1e-12);
        assert!((engine.latest(1).unwrap() - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_clamp_stock_overdraft() {
        let config = Arc::new(GameConfig {
            initial_stock: 5.0,
            growth: GrowthModel::Additive { amount: 1.0 },
            ..(*discrete(2)).clone()
        });
        let mut engine = GroupEngine::new(config, 1, 0, [1, 2]).unwrap();
        engine.submit_initial(1, 10.0).unwrap();
        let record = engine.submit_initial(2, 10.0).unwrap().unwrap();
        assert!(record.overdraft);
        assert!((record.group_extraction - 20.0).abs() < 1e-12);
        assert!(record.stock_after.abs() < f64::EPSILON);
    }

    #[test]
    fn test_continuous_window() {
        let config = Arc::new(GameConfig {
            regime: DynamicRegime::Continuous,
            continuous_duration_ms: 3_000,
            tick_interval_ms: 1_000,
            ..GameConfig::default()
        });
        let mut engine = started(config);
        let mut clock = VirtualClock::new(engine.config().tick_interval());
        engine.submit(1, 3.0, 0.4).unwrap();

        let mut ticks = Vec::new();
        while engine.phase() == Phase::Running {
            let record = engine.close_tick(clock.next_tick()).unwrap();
            ticks.push((record.tick, record.elapsed_ms));
        }
        assert_eq!(ticks, vec![(1, 1_000), (2, 2_000), (3, 3_000)]);
        assert_eq!(engine.submit(2, 1.0, 3.5).unwrap(), SubmitOutcome::Dropped);
    }

    #[test]
    fn test_continuous_deadline_drops_late_stamp() {
        let config = Arc::new(GameConfig {
            regime: DynamicRegime::Continuous,
            continuous_duration_ms: 3_000,
            tick_interval_ms: 1_000,
            ..GameConfig::default()
        });
        let mut engine = started(config);
        assert_eq!(engine.submit(1, 1.0, 3.2).unwrap(), SubmitOutcome::Dropped);
        assert!(matches!(
            engine.submit(1, 1.0, 2.9).unwrap(),
            SubmitOutcome::Accepted { .. }
        ));
    }

    #[test]
    fn test_drain_inbox_skips_invalid() {
        let mut engine = started(discrete(2));
        let inbox = SubmissionInbox::new();
        inbox.push(1, 1.0, 0.1);
        inbox.push(7, 1.0, 0.2);
        inbox.push(2, f64::INFINITY, 0.3);
        assert_eq!(engine.drain_inbox(&inbox), 1);
        assert!(inbox.is_empty());
    }

    #[test]
    fn test_empty_roster_rejected() {
        let err = GroupEngine::new(discrete(2), 1, 0, Vec::<PlayerId>::new()).unwrap_err();
        assert!(matches!(err, EngineError::Config(ConfigError::InvalidGroupSize(0))));
    }
}
