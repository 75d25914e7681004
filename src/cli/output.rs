//! Output formatting utilities for CLI.

use std::collections::BTreeMap;

use dyncpr::model::Projection;
use dyncpr::{PartReport, PlayerId, TickRecord};
use serde::Serialize;

/// Format a finished part as human-readable text.
pub(super) fn format_report_text(report: &PartReport, seed: u64) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "Sequence {} ({} regime, seed: {})\n",
        report.sequence,
        report.regime.as_str(),
        seed
    ));
    if report.trial {
        output.push_str("  Trial part: not paid\n");
    }
    output.push('\n');

    for outcome in &report.outcomes {
        output.push_str(&format!(
            "Group {}: {} ticks, final stock {:.2}, final group extraction {:.2}\n",
            outcome.group, outcome.ticks, outcome.final_stock, outcome.final_group_extraction
        ));
        for p in &outcome.players {
            output.push_str(&format!(
                "  Player {}: cumulative {:.3} + continuation {:.3} = {:.3} ({:?})\n",
                p.player, p.cumulative, p.continuation, p.total, p.projection.case
            ));
        }
    }

    output.push_str("\nPart payoffs:\n");
    for p in &report.payoffs {
        output.push_str(&format!(
            "  Player {}: {:.2} {} = {:.2} euros\n",
            p.player, p.ecus, report.currency, p.euros
        ));
    }

    output
}

/// Format a projection as human-readable text.
pub(super) fn format_projection_text(projection: &Projection, fitted: f64) -> String {
    let mut output = String::new();
    output.push_str(&format!("Case: {:?}\n", projection.case));
    output.push_str(&format!("Closed-form value: {:.6}\n", projection.value));
    if let Some(t) = projection.threshold_at {
        output.push_str(&format!("Threshold crossed at: {t:.3}\n"));
    }
    if let Some(t) = projection.exhausted_at {
        output.push_str(&format!("Stock exhausted at: {t:.3}\n"));
    }
    output.push_str(&format!("Fitted value: {fitted:.6}\n"));
    output
}

/// One row of a history table rebuilt from tick records.
#[derive(Debug, Serialize)]
pub(super) struct HistoryRow {
    /// Sequence number.
    pub(super) sequence: u32,
    /// Period or tick.
    pub(super) period: u64,
    /// Extraction counted.
    pub(super) decision: f64,
    /// Instantaneous payoff.
    pub(super) period_payoff: f64,
    /// Cumulative payoff.
    pub(super) cumulative: f64,
}

/// Group tick records into per-player history tables.
pub(super) fn history_from_records(records: &[TickRecord]) -> BTreeMap<PlayerId, Vec<HistoryRow>> {
    let mut history: BTreeMap<PlayerId, Vec<HistoryRow>> = BTreeMap::new();
    for record in records {
        for p in &record.players {
            history.entry(p.player).or_default().push(HistoryRow {
                sequence: record.sequence,
                period: record.tick,
                decision: p.extraction,
                period_payoff: p.payoff,
                cumulative: p.cumulative,
            });
        }
    }
    history
}

/// Format history tables as human-readable text.
pub(super) fn format_history_text(history: &BTreeMap<PlayerId, Vec<HistoryRow>>) -> String {
    let mut output = String::new();
    for (player, rows) in history {
        output.push_str(&format!("Player {player}\n"));
        output.push_str("  seq  period    decision      payoff  cumulative\n");
        for row in rows {
            output.push_str(&format!(
                "  {:>3}  {:>6}  {:>10.2}  {:>10.3}  {:>10.3}\n",
                row.sequence, row.period, row.decision, row.period_payoff, row.cumulative
            ));
        }
        output.push('\n');
    }
    output
}

/// Batch statistics aggregated over runs.
#[derive(Debug, Default)]
pub(super) struct BatchStats {
    /// Runs completed.
    pub(super) runs: u64,
    /// Runs that failed.
    pub(super) failures: u64,
    /// Runs where some group ended with an empty stock.
    pub(super) exhausted: u64,
    /// Total earnings per player slot.
    total_ecus: Vec<f64>,
    /// Earnings sum of squares for std dev calculation.
    ecus_sq_sums: Vec<f64>,
    /// Sum of final stocks over groups and runs.
    total_final_stock: f64,
    /// Number of groups behind `total_final_stock`.
    groups: u64,
}

impl BatchStats {
    /// Create new stats for n players.
    pub(super) fn new(num_players: usize) -> Self {
        Self {
            total_ecus: vec![0.0; num_players],
            ecus_sq_sums: vec![0.0; num_players],
            ..Self::default()
        }
    }

    /// Add a finished run.
    pub(super) fn add_report(&mut self, report: &PartReport) {
        self.runs += 1;
        for (i, p) in report.payoffs.iter().enumerate() {
            if i < self.total_ecus.len() {
                self.total_ecus[i] += p.ecus;
                self.ecus_sq_sums[i] += p.ecus * p.ecus;
            }
        }
        for outcome in &report.outcomes {
            self.total_final_stock += outcome.final_stock;
            self.groups += 1;
        }
        if report.outcomes.iter().any(|o| o.final_stock <= 0.0) {
            self.exhausted += 1;
        }
    }

    /// Record a failed run.
    pub(super) fn add_failure(&mut self) {
        self.failures += 1;
    }

    /// Merge another thread's stats.
    pub(super) fn merge(&mut self, other: &Self) {
        self.runs += other.runs;
        self.failures += other.failures;
        self.exhausted += other.exhausted;
        for (a, b) in self.total_ecus.iter_mut().zip(&other.total_ecus) {
            *a += b;
        }
        for (a, b) in self.ecus_sq_sums.iter_mut().zip(&other.ecus_sq_sums) {
            *a += b;
        }
        self.total_final_stock += other.total_final_stock;
        self.groups += other.groups;
    }

    /// Number of player slots.
    pub(super) fn players(&self) -> usize {
        self.total_ecus.len()
    }

    /// Average earnings of a player slot.
    #[allow(clippy::cast_precision_loss)]
    pub(super) fn avg_ecus(&self, idx: usize) -> f64 {
        if self.runs == 0 {
            return 0.0;
        }
        self.total_ecus.get(idx).copied().unwrap_or(0.0) / self.runs as f64
    }

    /// Earnings standard deviation of a player slot.
    #[allow(clippy::cast_precision_loss)]
    pub(super) fn ecus_std_dev(&self, idx: usize) -> f64 {
        if self.runs == 0 {
            return 0.0;
        }
        let n = self.runs as f64;
        let mean = self.avg_ecus(idx);
        let sq_sum = self.ecus_sq_sums.get(idx).copied().unwrap_or(0.0);
        ((sq_sum / n) - mean * mean).max(0.0).sqrt()
    }

    /// Average final stock per group.
    #[allow(clippy::cast_precision_loss)]
    pub(super) fn avg_final_stock(&self) -> f64 {
        if self.groups == 0 {
            return 0.0;
        }
        self.total_final_stock / self.groups as f64
    }
}

/// JSON-serializable batch result.
#[derive(Debug, Serialize)]
pub(super) struct JsonBatchResult {
    /// Runs completed.
    runs: u64,
    /// Runs that failed.
    failures: u64,
    /// Runs ending with an exhausted group.
    exhausted: u64,
    /// Average final stock per group.
    avg_final_stock: f64,
    /// Per-player statistics.
    players: Vec<JsonBatchPlayer>,
}

/// JSON-serializable per-player batch stats.
#[derive(Debug, Serialize)]
pub(super) struct JsonBatchPlayer {
    /// Player id.
    player: usize,
    /// Average earnings.
    avg_ecus: f64,
    /// Earnings standard deviation.
    ecus_std_dev: f64,
}

impl JsonBatchResult {
    /// Create from stats.
    pub(super) fn from_stats(stats: &BatchStats) -> Self {
        Self {
            runs: stats.runs,
            failures: stats.failures,
            exhausted: stats.exhausted,
            avg_final_stock: stats.avg_final_stock(),
            players: (0..stats.players())
                .map(|i| JsonBatchPlayer {
                    player: i + 1,
                    avg_ecus: stats.avg_ecus(i),
                    ecus_std_dev: stats.ecus_std_dev(i),
                })
                .collect(),
        }
    }
}

/// Format batch stats as human-readable text.
#[allow(clippy::cast_precision_loss)]
pub(super) fn format_batch_text(stats: &BatchStats, currency: &str) -> String {
    let mut output = String::new();

    output.push_str(&format!("Batch Results ({} runs)\n", stats.runs));
    output.push_str("========================================\n\n");

    output.push_str("Average Earnings:\n");
    for i in 0..stats.players() {
        output.push_str(&format!(
            "  Player {}: {:.2} {currency} (+/- {:.2})\n",
            i + 1,
            stats.avg_ecus(i),
            stats.ecus_std_dev(i)
        ));
    }

    let exhausted_share = if stats.runs == 0 {
        0.0
    } else {
        stats.exhausted as f64 / stats.runs as f64 * 100.0
    };
    output.push_str(&format!("\nAverage Final Stock: {:.2}\n", stats.avg_final_stock()));
    output.push_str(&format!(
        "Exhausted: {} runs ({exhausted_share:.1}%)\n",
        stats.exhausted
    ));
    if stats.failures > 0 {
        output.push_str(&format!("Failed: {} runs\n", stats.failures));
    }

    output
}

/// Format batch stats as CSV.
pub(super) fn format_batch_csv(stats: &BatchStats) -> String {
    let mut output = String::new();

    // Header
    output.push_str("player,avg_ecus,ecus_std_dev\n");

    // Data rows
    for i in 0..stats.players() {
        output.push_str(&format!(
            "{},{:.4},{:.4}\n",
            i + 1,
            stats.avg_ecus(i),
            stats.ecus_std_dev(i)
        ));
    }

    output
}
