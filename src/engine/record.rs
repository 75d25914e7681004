//! Records produced by a group engine.

use serde::{Deserialize, Serialize};

use crate::model::{GroupId, PlayerId, Projection};

/// One player's payoff for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayerTick {
    /// Player.
    pub player: PlayerId,
    /// Extraction counted for the tick.
    pub extraction: f64,
    /// `a*e - (b/2)*e^2`.
    pub benefit: f64,
    /// Extraction cost at the tick's stock.
    pub cost: f64,
    /// Instantaneous payoff.
    pub payoff: f64,
    /// Discounted contribution to the cumulative payoff.
    pub discounted: f64,
    /// Cumulative payoff including this tick.
    pub cumulative: f64,
    /// The extraction came from the missing-submission default.
    pub substituted: bool,
}

/// Everything that happened to a group at one tick.
///
/// Append-only: a record is never changed once emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickRecord {
    /// Sequence number, starting at 1.
    pub sequence: u32,
    /// Group.
    pub group: GroupId,
    /// Tick (continuous) or period (discrete) index; 0 is the initial tick.
    pub tick: u64,
    /// `tick * tau`.
    pub model_time: f64,
    /// Wall-clock milliseconds since the start of the sequence.
    pub elapsed_ms: u64,
    /// Sum of the counted extractions.
    pub group_extraction: f64,
    /// Stock when the tick started.
    pub stock_before: f64,
    /// Stock after growth and depletion.
    pub stock_after: f64,
    /// The group asked for more than the stock could give.
    pub overdraft: bool,
    /// Per-player payoffs, ascending player order.
    pub players: Vec<PlayerTick>,
}

impl TickRecord {
    /// Payoff row of `player`.
    #[must_use]
    pub fn player(&self, player: PlayerId) -> Option<&PlayerTick> {
        self.players.iter().find(|p| p.player == player)
    }
}

/// Final result of one player.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayerOutcome {
    /// Player.
    pub player: PlayerId,
    /// Last extraction chosen.
    pub final_extraction: f64,
    /// Cumulative payoff over the ticks played.
    pub cumulative: f64,
    /// Closed-form continuation at the end of play.
    pub projection: Projection,
    /// Continuation value added to the cumulative payoff (discounted to the
    /// start of the sequence). Zero when the projection is disabled.
    pub continuation: f64,
    /// `cumulative + continuation`.
    pub total: f64,
}

/// Final result of a group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupOutcome {
    /// Sequence number.
    pub sequence: u32,
    /// Group.
    pub group: GroupId,
    /// Number of ticks closed, including the initial tick.
    pub ticks: u64,
    /// Stock at the end of play.
    pub final_stock: f64,
    /// Group extraction at the end of play.
    pub final_group_extraction: f64,
    /// Per-player results, ascending player order.
    pub players: Vec<PlayerOutcome>,
}

impl GroupOutcome {
    /// Result of `player`.
    #[must_use]
    pub fn player(&self, player: PlayerId) -> Option<&PlayerOutcome> {
        self.players.iter().find(|p| p.player == player)
    }
}
