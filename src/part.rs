//! Part orchestration: groups, sequences and the lifecycle hooks of the host.
//!
//! A [`CprPart`] runs one repetition ("sequence") of the game for every
//! group of a session:
//!
//! 1. [`CprPart::start_sequence`] forms the groups and resets all state.
//! 2. [`CprPart::collect_initial_extractions`] gathers everyone's initial
//!    choice and closes period 0.
//! 3. Discrete: for each period, [`CprPart::new_period`],
//!    [`CprPart::display_decision`] and [`CprPart::compute_period_payoff`].
//!    Continuous: [`CprPart::run_continuous`] ticks until the window ends.
//! 4. [`CprPart::display_summary`] finalizes every group.
//! 5. [`CprPart::compute_part_payoff`] converts the result to euros.
//!
//! [`CprPart::run`] drives all of it in order.

mod history;
mod simulated;
mod sink;

pub use history::{DisplaySink, GroupSeries, History, NullDisplay};
pub use simulated::SimulatedPlayers;
pub use sink::{JsonLinesSink, MemorySink, NullSink, RecordSink, read_json_lines};

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{DynamicRegime, GameConfig};
use crate::engine::{
    GroupEngine, GroupOutcome, Phase, SubmissionInbox, TickRecord, TickSource,
};
use crate::error::{ConfigError, EngineError, EngineResult};
use crate::model::{GroupId, PlayerId};

/// A choice returned by a [`DecisionSource`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    /// Chosen extraction.
    pub extraction: f64,
    /// Time the player took to decide.
    pub decision_time: Duration,
}

/// The players' side of the game, as seen by the part.
pub trait DecisionSource {
    /// Initial extraction of `player`.
    fn initial_extraction(&mut self, group: GroupId, player: PlayerId) -> Decision;

    /// Decision of `player` for a discrete period, `None` if no answer came.
    fn period_decision(&mut self, group: GroupId, player: PlayerId, period: u32)
    -> Option<Decision>;

    /// Queue the continuous updates made up to `until` seconds into the
    /// sequence.
    fn continuous_updates(
        &mut self,
        group: GroupId,
        roster: &[PlayerId],
        until: f64,
        inbox: &SubmissionInbox,
    );

    /// The summary screen was shown to `player`.
    fn acknowledge_summary(&mut self, _player: PlayerId) {}
}

/// One row of a player's history table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeriodEntry {
    /// Period (discrete) or tick (continuous).
    pub period: u64,
    /// Extraction counted.
    pub decision: f64,
    /// Time taken to decide, in milliseconds.
    pub decision_time_ms: u64,
    /// Instantaneous payoff.
    pub period_payoff: f64,
    /// Cumulative payoff.
    pub cumulative: f64,
}

/// Earnings of one player for the part.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PartPayoff {
    /// Player.
    pub player: PlayerId,
    /// Earnings in experimental currency.
    pub ecus: f64,
    /// Earnings in euros.
    pub euros: f64,
}

/// Everything a finished sequence produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartReport {
    /// Sequence number.
    pub sequence: u32,
    /// Regime played.
    pub regime: DynamicRegime,
    /// Trial part (not paid).
    pub trial: bool,
    /// Currency label of `ecus`.
    pub currency: String,
    /// Per-group outcomes.
    pub outcomes: Vec<GroupOutcome>,
    /// Per-player earnings.
    pub payoffs: Vec<PartPayoff>,
    /// Per-player history tables.
    pub history: BTreeMap<PlayerId, Vec<PeriodEntry>>,
}

/// Split `players` into consecutive groups of `group_size`.
///
/// # Errors
///
/// Fails if `group_size` is zero or does not divide the player count.
pub fn form_groups(
    players: &[PlayerId],
    group_size: usize,
) -> Result<Vec<Vec<PlayerId>>, ConfigError> {
    if group_size == 0 {
        return Err(ConfigError::InvalidGroupSize(group_size));
    }
    if players.is_empty() || players.len() % group_size != 0 {
        return Err(ConfigError::PlayersNotDivisible {
            players: players.len(),
            group_size,
        });
    }
    Ok(players.chunks(group_size).map(<[PlayerId]>::to_vec).collect())
}

/// One part of a session.
#[derive(Debug)]
pub struct CprPart<R: RecordSink, D: DisplaySink> {
    config: Arc<GameConfig>,
    players: Vec<PlayerId>,
    sequence: u32,
    period: u32,
    groups: Vec<GroupEngine>,
    outcomes: Vec<GroupOutcome>,
    history: BTreeMap<PlayerId, Vec<PeriodEntry>>,
    decision_times: BTreeMap<PlayerId, Duration>,
    records: R,
    display: D,
}

impl<R: RecordSink, D: DisplaySink> CprPart<R, D> {
    /// Create a part for `players`.
    ///
    /// # Errors
    ///
    /// Fails if the configuration is invalid.
    pub fn new(
        config: GameConfig,
        players: Vec<PlayerId>,
        records: R,
        display: D,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            players,
            sequence: 0,
            period: 0,
            groups: Vec::new(),
            outcomes: Vec::new(),
            history: BTreeMap::new(),
            decision_times: BTreeMap::new(),
            records,
            display,
        })
    }

    /// Replace the configuration before the next sequence.
    ///
    /// # Errors
    ///
    /// Fails if the configuration is invalid; the current one is kept.
    pub fn configure(&mut self, config: GameConfig) -> Result<(), ConfigError> {
        config.validate()?;
        info!(
            regime = config.regime.as_str(),
            trial = config.trial,
            periods = config.num_periods,
            duration_ms = config.continuous_duration_ms,
            "part configured"
        );
        self.config = Arc::new(config);
        Ok(())
    }

    /// Configuration in force.
    #[must_use]
    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Current sequence number (0 before the first one).
    #[must_use]
    pub const fn sequence(&self) -> u32 {
        self.sequence
    }

    /// Current period.
    #[must_use]
    pub const fn period(&self) -> u32 {
        self.period
    }

    /// Engines of the current sequence.
    #[must_use]
    pub fn groups(&self) -> &[GroupEngine] {
        &self.groups
    }

    /// History table of `player`.
    #[must_use]
    pub fn history(&self, player: PlayerId) -> &[PeriodEntry] {
        self.history.get(&player).map(Vec::as_slice).unwrap_or_default()
    }

    /// Persistence hook.
    #[must_use]
    pub const fn records(&self) -> &R {
        &self.records
    }

    /// Presentation hook.
    #[must_use]
    pub const fn display(&self) -> &D {
        &self.display
    }

    /// Give back the hooks.
    #[must_use]
    pub fn into_sinks(self) -> (R, D) {
        (self.records, self.display)
    }

    /// Form groups and reset all state for a new sequence.
    ///
    /// # Errors
    ///
    /// Fails if the players cannot be split into full groups. The sequence
    /// number is left unchanged in that case.
    pub fn start_sequence(&mut self) -> EngineResult<u32> {
        let rosters = form_groups(&self.players, self.config.group_size)?;
        let sequence = self.sequence + 1;

        self.groups = rosters
            .into_iter()
            .zip(0..)
            .map(|(roster, group)| GroupEngine::new(Arc::clone(&self.config), sequence, group, roster))
            .collect::<EngineResult<_>>()?;
        self.sequence = sequence;
        self.period = 0;
        self.outcomes.clear();
        self.history.clear();
        self.decision_times.clear();
        self.display.start_sequence(sequence);

        info!(sequence, groups = self.groups.len(), "sequence started");
        Ok(sequence)
    }

    /// Enter period `period` (0 is the initial extraction).
    pub fn new_period(&mut self, period: u32) {
        self.period = period;
        self.decision_times.clear();
        info!(sequence = self.sequence, period, "period started");
    }

    /// Ask every player for an initial extraction and close period 0.
    ///
    /// # Errors
    ///
    /// Fails on an invalid choice or a sink failure.
    pub fn collect_initial_extractions(
        &mut self,
        source: &mut impl DecisionSource,
    ) -> EngineResult<Vec<TickRecord>> {
        let mut closed = Vec::new();
        for engine in &mut self.groups {
            let group = engine.group();
            let roster = engine.roster().to_vec();
            for player in roster {
                let decision = source.initial_extraction(group, player);
                self.decision_times.insert(player, decision.decision_time);
                if let Some(record) = engine.submit_initial(player, decision.extraction)? {
                    closed.push(record);
                }
            }
        }
        for record in &closed {
            self.emit(record)?;
        }
        Ok(closed)
    }

    /// Collect the decisions of the current discrete period.
    ///
    /// Answers slower than the decision time limit count as missing, and so
    /// do invalid extractions. Returns the longest decision time, which is
    /// when the period closes.
    ///
    /// # Errors
    ///
    /// Fails if a group is not running.
    pub fn display_decision(&mut self, source: &mut impl DecisionSource) -> EngineResult<Duration> {
        let limit = self.config.decision_time();
        let mut slowest = Duration::ZERO;
        for engine in &mut self.groups {
            let group = engine.group();
            let roster = engine.roster().to_vec();
            for player in roster {
                match source.period_decision(group, player, self.period) {
                    Some(decision) if decision.decision_time <= limit => {
                        slowest = slowest.max(decision.decision_time);
                        self.decision_times.insert(player, decision.decision_time);
                        let timestamp = decision.decision_time.as_secs_f64();
                        match engine.submit(player, decision.extraction, timestamp) {
                            Ok(_) => {}
                            Err(
                                e @ (EngineError::UnknownPlayer(_)
                                | EngineError::NonFiniteExtraction(_)
                                | EngineError::ExtractionOutOfBounds { .. }),
                            ) => {
                                warn!(
                                    group,
                                    player,
                                    period = self.period,
                                    error = %e,
                                    "decision rejected, counted as missing"
                                );
                            }
                            Err(e) => return Err(e),
                        }
                    }
                    _ => {
                        slowest = limit;
                        self.decision_times.insert(player, limit);
                        debug!(group, player, period = self.period, "no decision before the time limit");
                    }
                }
            }
        }
        Ok(slowest)
    }

    /// Close the current tick of every running group.
    ///
    /// # Errors
    ///
    /// Fails if a group is not running or a sink fails.
    pub fn compute_period_payoff(&mut self, elapsed: Duration) -> EngineResult<Vec<TickRecord>> {
        let mut closed = Vec::with_capacity(self.groups.len());
        for engine in &mut self.groups {
            if engine.phase() == Phase::Running {
                closed.push(engine.close_tick(elapsed)?);
            }
        }
        for record in &closed {
            self.emit(record)?;
        }
        Ok(closed)
    }

    /// Play the continuous window, one tick per `clock` boundary.
    ///
    /// # Errors
    ///
    /// Fails if a group is not running or a sink fails.
    pub fn run_continuous(
        &mut self,
        source: &mut impl DecisionSource,
        clock: &mut impl TickSource,
    ) -> EngineResult<()> {
        let inbox = SubmissionInbox::new();
        self.new_period(1);
        while self.groups.iter().any(|g| g.phase() == Phase::Running) {
            let now = clock.next_tick();
            for engine in &mut self.groups {
                source.continuous_updates(engine.group(), engine.roster(), now.as_secs_f64(), &inbox);
                engine.drain_inbox(&inbox);
            }
            self.compute_period_payoff(now)?;
        }
        Ok(())
    }

    /// Finalize every group and show the summary.
    ///
    /// # Errors
    ///
    /// Fails if a group is not ready to finalize or a sink fails.
    pub fn display_summary(
        &mut self,
        source: &mut impl DecisionSource,
    ) -> EngineResult<&[GroupOutcome]> {
        self.records.flush()?;
        self.outcomes = self
            .groups
            .iter_mut()
            .map(GroupEngine::finalize)
            .collect::<EngineResult<_>>()?;
        for outcome in &self.outcomes {
            self.display.finish(outcome);
            for p in &outcome.players {
                source.acknowledge_summary(p.player);
            }
        }
        Ok(&self.outcomes)
    }

    /// Earnings of every player for the finished sequence.
    ///
    /// A trial part pays nothing.
    #[must_use]
    pub fn compute_part_payoff(&self) -> Vec<PartPayoff> {
        let payoffs: Vec<PartPayoff> = self
            .outcomes
            .iter()
            .flat_map(|o| &o.players)
            .map(|p| {
                let ecus = if self.config.trial { 0.0 } else { p.total };
                PartPayoff {
                    player: p.player,
                    ecus,
                    euros: ecus * self.config.conversion_rate,
                }
            })
            .collect();
        for p in &payoffs {
            info!(sequence = self.sequence, player = p.player, ecus = p.ecus, euros = p.euros, "part payoff");
        }
        payoffs
    }

    /// Run a whole sequence.
    ///
    /// # Errors
    ///
    /// Propagates the first failure of any step.
    pub fn run(
        &mut self,
        source: &mut impl DecisionSource,
        clock: &mut impl TickSource,
    ) -> EngineResult<PartReport> {
        self.start_sequence()?;
        clock.restart();
        self.new_period(0);
        self.collect_initial_extractions(source)?;

        match self.config.regime {
            DynamicRegime::Continuous => self.run_continuous(source, clock)?,
            DynamicRegime::Discrete => {
                for period in 1..=self.config.num_periods {
                    self.new_period(period);
                    let waited = self.display_decision(source)?;
                    let elapsed = clock.advance(waited);
                    self.compute_period_payoff(elapsed)?;
                }
            }
        }

        self.display_summary(source)?;
        let payoffs = self.compute_part_payoff();
        Ok(PartReport {
            sequence: self.sequence,
            regime: self.config.regime,
            trial: self.config.trial,
            currency: self.config.currency.clone(),
            outcomes: self.outcomes.clone(),
            payoffs,
            history: self.history.clone(),
        })
    }

    fn emit(&mut self, record: &TickRecord) -> EngineResult<()> {
        self.records.append(record)?;
        self.display.push(record);
        for p in &record.players {
            let decision_time = self.decision_times.get(&p.player).copied().unwrap_or_default();
            self.history.entry(p.player).or_default().push(PeriodEntry {
                period: record.tick,
                decision: p.extraction,
                decision_time_ms: u64::try_from(decision_time.as_millis()).unwrap_or(u64::MAX),
                period_payoff: p.payoff,
                cumulative: p.cumulative,
            });
        }
        Ok(())
    }
}
