//! Batch command implementation.

use super::output::{BatchStats, JsonBatchResult, format_batch_csv, format_batch_text};
use super::{BatchFormat, CliError, Setup, seed_or_random};
use dyncpr::engine::VirtualClock;
use dyncpr::part::{NullDisplay, NullSink, SimulatedPlayers, form_groups};
use dyncpr::{CprPart, GameConfig, PartReport, PlayerId};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::time::Instant;
use tracing::warn;

/// Execute the batch command.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the players cannot
/// be split into full groups.
pub(crate) fn execute(
    setup: &Setup,
    runs: u64,
    seed: Option<u64>,
    players: u32,
    threads: Option<usize>,
    format: BatchFormat,
    progress: bool,
) -> Result<(), CliError> {
    let config = setup.load()?;
    let roster: Vec<PlayerId> = (1..=players).collect();
    form_groups(&roster, config.group_size)?;

    // Set thread pool size if specified
    if let Some(num_threads) = threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build_global()
            .ok(); // Ignore error if already initialized
    }

    let base_seed = seed_or_random(seed);

    let pb = if progress {
        let pb = ProgressBar::new(runs);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} runs ({per_sec})")
        {
            pb.set_style(style.progress_chars("=>-"));
        }
        Some(pb)
    } else {
        None
    };

    let start = Instant::now();

    // Each thread folds into its own stats; merged at the end.
    let stats = (0..runs)
        .into_par_iter()
        .fold(
            || BatchStats::new(roster.len()),
            |mut local, i| {
                match simulate(&config, &roster, base_seed.wrapping_add(i)) {
                    Ok(report) => local.add_report(&report),
                    Err(e) => {
                        warn!(run = i, error = %e, "run failed");
                        local.add_failure();
                    }
                }
                if let Some(pb) = &pb {
                    pb.inc(1);
                }
                local
            },
        )
        .reduce(
            || BatchStats::new(roster.len()),
            |mut a, b| {
                a.merge(&b);
                a
            },
        );

    if let Some(pb) = pb {
        pb.finish_with_message("done");
    }

    let duration = start.elapsed();

    match format {
        BatchFormat::Text => {
            println!();
            print!("{}", format_batch_text(&stats, &config.currency));
            println!();
            println!("Duration: {:.2}s", duration.as_secs_f64());
        }
        BatchFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&JsonBatchResult::from_stats(&stats))?);
        }
        BatchFormat::Csv => {
            print!("{}", format_batch_csv(&stats));
        }
    }

    Ok(())
}

/// Play one part with simulated players on a virtual clock.
fn simulate(config: &GameConfig, roster: &[PlayerId], seed: u64) -> Result<PartReport, CliError> {
    let mut source = SimulatedPlayers::new(config, seed);
    let mut clock = VirtualClock::new(config.tick_interval());
    let mut part = CprPart::new(config.clone(), roster.to_vec(), NullSink, NullDisplay)?;
    Ok(part.run(&mut source, &mut clock)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::RegimeArg;

    fn defaults() -> Setup {
        Setup {
            config: None,
            regime: Some(RegimeArg::Discrete),
            periods: Some(2),
            duration: None,
            trial: false,
        }
    }

    #[test]
    fn test_rejects_players_outside_full_groups() {
        let result = execute(&defaults(), 1, Some(7), 3, None, BatchFormat::Csv, false);
        assert!(result.is_err_and(|e| e.to_string().contains("3 players cannot be split into groups of 2")));

        let result = execute(&defaults(), 1, Some(7), 0, None, BatchFormat::Csv, false);
        assert!(result.is_err());
    }

    #[test]
    fn test_full_groups_run() {
        assert!(execute(&defaults(), 2, Some(7), 4, None, BatchFormat::Csv, false).is_ok());
    }
}
