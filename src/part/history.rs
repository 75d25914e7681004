//! Presentation hooks: live curves shown to the players.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::engine::{GroupOutcome, TickRecord};
use crate::model::{GroupId, PlayerId};

/// Receives each tick as it closes and each group's outcome at the end.
pub trait DisplaySink {
    /// A new sequence started; curves of the previous one are stale.
    fn start_sequence(&mut self, _sequence: u32) {}

    /// A tick closed.
    fn push(&mut self, record: &TickRecord);

    /// A group finished play.
    fn finish(&mut self, _outcome: &GroupOutcome) {}
}

impl<D: DisplaySink + ?Sized> DisplaySink for &mut D {
    fn start_sequence(&mut self, sequence: u32) {
        (**self).start_sequence(sequence);
    }

    fn push(&mut self, record: &TickRecord) {
        (**self).push(record);
    }

    fn finish(&mut self, outcome: &GroupOutcome) {
        (**self).finish(outcome);
    }
}

/// Shows nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullDisplay;

impl DisplaySink for NullDisplay {
    fn push(&mut self, _record: &TickRecord) {}
}

/// Curves of one group.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GroupSeries {
    /// Model time of each point.
    pub time: Vec<f64>,
    /// Stock after each tick.
    pub resource: Vec<f64>,
    /// Group extraction of each tick.
    pub group_extraction: Vec<f64>,
    /// Own extraction per player.
    pub extraction: BTreeMap<PlayerId, Vec<f64>>,
    /// Instantaneous payoff per player.
    pub payoff: BTreeMap<PlayerId, Vec<f64>>,
    /// Cumulative payoff per player.
    pub cumulative: BTreeMap<PlayerId, Vec<f64>>,
    /// Final outcome, once play is over.
    pub outcome: Option<GroupOutcome>,
}

impl GroupSeries {
    /// Number of points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.time.len()
    }

    /// Whether no tick was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }
}

/// Keeps every curve of every group.
#[derive(Debug, Clone, Default)]
pub struct History {
    groups: BTreeMap<GroupId, GroupSeries>,
}

impl History {
    /// Create an empty history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Curves of `group`.
    #[must_use]
    pub fn group(&self, group: GroupId) -> Option<&GroupSeries> {
        self.groups.get(&group)
    }

    /// All groups, ascending.
    pub fn groups(&self) -> impl Iterator<Item = (GroupId, &GroupSeries)> {
        self.groups.iter().map(|(&g, s)| (g, s))
    }

    /// Drop everything (new sequence).
    pub fn clear(&mut self) {
        self.groups.clear();
    }
}

impl DisplaySink for History {
    fn start_sequence(&mut self, _sequence: u32) {
        self.clear();
    }

    fn push(&mut self, record: &TickRecord) {
        let series = self.groups.entry(record.group).or_default();
        series.time.push(record.model_time);
        series.resource.push(record.stock_after);
        series.group_extraction.push(record.group_extraction);
        for p in &record.players {
            series.extraction.entry(p.player).or_default().push(p.extraction);
            series.payoff.entry(p.player).or_default().push(p.payoff);
            series.cumulative.entry(p.player).or_default().push(p.cumulative);
        }
    }

    fn finish(&mut self, outcome: &GroupOutcome) {
        self.groups.entry(outcome.group).or_default().outcome = Some(outcome.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::PlayerTick;

    fn record(group: GroupId, tick: u64, stock: f64) -> TickRecord {
        #[allow(clippy::cast_precision_loss)]
        let model_time = tick as f64 * 0.1;
        TickRecord {
            sequence: 1,
            group,
            tick,
            model_time,
            elapsed_ms: tick * 1_000,
            group_extraction: 1.0,
            stock_before: stock + 1.0,
            stock_after: stock,
            overdraft: false,
            players: [1, 2]
                .into_iter()
                .map(|player| PlayerTick {
                    player,
                    extraction: 0.5,
                    benefit: 1.0,
                    cost: 0.5,
                    payoff: 0.5,
                    discounted: 0.05,
                    cumulative: 0.05,
                    substituted: false,
                })
                .collect(),
        }
    }

    #[test]
    fn test_series_per_group() {
        let mut history = History::new();
        history.push(&record(0, 0, 10.0));
        history.push(&record(0, 1, 9.0));
        history.push(&record(1, 0, 20.0));

        let g0 = history.group(0).unwrap();
        assert_eq!(g0.len(), 2);
        assert_eq!(g0.extraction[&1].len(), 2);
        assert!((g0.resource[1] - 9.0).abs() < f64::EPSILON);
        assert_eq!(history.groups().count(), 2);
    }

    #[test]
    fn test_clear() {
        let mut history = History::new();
        history.push(&record(0, 0, 10.0));
        history.clear();
        assert!(history.group(0).is_none());
    }

    #[test]
    fn test_new_sequence_drops_old_curves() {
        let mut history = History::new();
        history.push(&record(0, 0, 10.0));
        history.push(&record(0, 1, 9.0));
        history.start_sequence(2);
        history.push(&record(0, 0, 10.0));

        let g0 = history.group(0).unwrap();
        assert_eq!(g0.len(), 1);
        assert!(g0.time[0].abs() < f64::EPSILON);
    }
}
