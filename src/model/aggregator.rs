//! Aggregation of per-player extraction choices into a group total.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::config::MissingSubmission;
use crate::model::PlayerId;

/// One extraction choice sent by a player.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    /// Player who made the choice.
    pub player: PlayerId,
    /// Chosen extraction.
    pub extraction: f64,
    /// Seconds since the start of the sequence.
    pub timestamp: f64,
}

/// Extractions frozen at a tick boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickSnapshot {
    /// Extraction counted for each roster member.
    pub extractions: BTreeMap<PlayerId, f64>,
    /// Players whose value came from the missing-submission default.
    pub substituted: Vec<PlayerId>,
}

impl TickSnapshot {
    /// Sum of the extractions.
    #[must_use]
    pub fn group_total(&self) -> f64 {
        self.extractions.values().sum()
    }

    /// Extraction counted for `player` (zero if absent).
    #[must_use]
    pub fn get(&self, player: PlayerId) -> f64 {
        self.extractions.get(&player).copied().unwrap_or(0.0)
    }

    /// Same roster with every extraction set to zero.
    #[must_use]
    pub fn voided(&self) -> Self {
        Self {
            extractions: self.extractions.keys().map(|&p| (p, 0.0)).collect(),
            substituted: self.substituted.clone(),
        }
    }
}

/// Latest extraction per player for one group.
///
/// Keys are unique; a newer submission (by timestamp) replaces an older
/// one, so the group total does not depend on arrival order.
#[derive(Debug, Clone)]
pub struct ExtractionAggregator {
    roster: Vec<PlayerId>,
    latest: BTreeMap<PlayerId, Submission>,
    submitted: BTreeSet<PlayerId>,
}

impl ExtractionAggregator {
    /// Create an aggregator for a fixed roster.
    #[must_use]
    pub fn new(roster: impl IntoIterator<Item = PlayerId>) -> Self {
        let mut roster: Vec<PlayerId> = roster.into_iter().collect();
        roster.sort_unstable();
        roster.dedup();
        Self {
            roster,
            latest: BTreeMap::new(),
            submitted: BTreeSet::new(),
        }
    }

    /// Roster in ascending player order.
    #[must_use]
    pub fn roster(&self) -> &[PlayerId] {
        &self.roster
    }

    /// Whether `player` belongs to the roster.
    #[must_use]
    pub fn is_member(&self, player: PlayerId) -> bool {
        self.roster.binary_search(&player).is_ok()
    }

    /// Record a choice and return the updated group total.
    ///
    /// A submission older than the one already held for the player is
    /// ignored.
    pub fn record(&mut self, player: PlayerId, extraction: f64, timestamp: f64) -> f64 {
        let submission = Submission {
            player,
            extraction,
            timestamp,
        };
        match self.latest.get(&player) {
            Some(held) if held.timestamp > timestamp => {}
            _ => {
                self.latest.insert(player, submission);
            }
        }
        self.submitted.insert(player);
        self.group_total()
    }

    /// Sum of the latest extraction of every player.
    #[must_use]
    pub fn group_total(&self) -> f64 {
        self.latest.values().map(|s| s.extraction).sum()
    }

    /// Latest extraction of `player`, if any.
    #[must_use]
    pub fn latest(&self, player: PlayerId) -> Option<f64> {
        self.latest.get(&player).map(|s| s.extraction)
    }

    /// Whether `player` submitted since the last tick boundary.
    #[must_use]
    pub fn has_submitted(&self, player: PlayerId) -> bool {
        self.submitted.contains(&player)
    }

    /// Whether every roster member submitted since the last tick boundary.
    #[must_use]
    pub fn all_submitted(&self) -> bool {
        self.roster.iter().all(|p| self.submitted.contains(p))
    }

    /// Freeze the current tick and start a new one.
    ///
    /// Silent players get the value chosen by `policy`. Under
    /// [`MissingSubmission::Zero`] their held value is also reset, so the
    /// running total matches what was counted.
    pub fn close_tick(&mut self, policy: MissingSubmission) -> TickSnapshot {
        let mut extractions = BTreeMap::new();
        let mut substituted = Vec::new();

        for &player in &self.roster {
            let value = if self.submitted.contains(&player) {
                self.latest(player).unwrap_or(0.0)
            } else {
                substituted.push(player);
                match policy {
                    MissingSubmission::KeepLast => self.latest(player).unwrap_or(0.0),
                    MissingSubmission::Zero => {
                        self.latest.remove(&player);
                        0.0
                    }
                }
            };
            extractions.insert(player, value);
        }

        self.submitted.clear();
        TickSnapshot {
            extractions,
            substituted,
        }
    }

    /// Forget every choice (new sequence).
    pub fn reset(&mut self) {
        self.latest.clear();
        self.submitted.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_total_is_sum_of_latest() {
        let mut agg = ExtractionAggregator::new([1, 2]);
        assert!((agg.record(1, 0.5, 0.0) - 0.5).abs() < 1e-12);
        assert!((agg.record(2, 0.5, 0.1) - 1.0).abs() < 1e-12);
        assert!((agg.record(1, 2.0, 0.2) - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_stale_submission_ignored() {
        let mut agg = ExtractionAggregator::new([1]);
        agg.record(1, 3.0, 5.0);
        agg.record(1, 1.0, 4.0);
        assert!((agg.latest(1).unwrap() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_close_tick_keep_last() {
        let mut agg = ExtractionAggregator::new([1, 2]);
        agg.record(1, 1.0, 0.0);
        agg.record(2, 2.0, 0.0);
        let first = agg.close_tick(MissingSubmission::KeepLast);
        assert!(first.substituted.is_empty());

        agg.record(1, 4.0, 1.0);
        let second = agg.close_tick(MissingSubmission::KeepLast);
        assert_eq!(second.substituted, vec![2]);
        assert!((second.get(2) - 2.0).abs() < 1e-12);
        assert!((second.group_total() - 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_close_tick_zero_policy() {
        let mut agg = ExtractionAggregator::new([1, 2]);
        agg.record(1, 1.0, 0.0);
        agg.record(2, 2.0, 0.0);
        agg.close_tick(MissingSubmission::Zero);

        agg.record(1, 1.5, 1.0);
        let snap = agg.close_tick(MissingSubmission::Zero);
        assert!(snap.get(2).abs() < f64::EPSILON);
        assert!((snap.group_total() - 1.5).abs() < 1e-12);
        assert!((agg.group_total() - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_all_submitted_resets_at_boundary() {
        let mut agg = ExtractionAggregator::new([3, 1, 3]);
        assert_eq!(agg.roster(), &[1, 3]);
        agg.record(1, 1.0, 0.0);
        assert!(!agg.all_submitted());
        agg.record(3, 1.0, 0.0);
        assert!(agg.all_submitted());
        agg.close_tick(MissingSubmission::KeepLast);
        assert!(!agg.all_submitted());
        assert!(!agg.has_submitted(1));
    }

    #[test]
    fn test_voided_snapshot() {
        let mut agg = ExtractionAggregator::new([1, 2]);
        agg.record(1, 10.0, 0.0);
        agg.record(2, 10.0, 0.0);
        let snap = agg.close_tick(MissingSubmission::KeepLast).voided();
        assert!(snap.group_total().abs() < f64::EPSILON);
        assert_eq!(snap.extractions.len(), 2);
    }
}
