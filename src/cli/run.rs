//! Run command implementation.

use super::output::{format_history_text, format_report_text, history_from_records};
use super::{CliError, OutputFormat, Setup, seed_or_random};
use dyncpr::engine::{TickSource, VirtualClock, WallClock};
use dyncpr::part::{JsonLinesSink, MemorySink, NullDisplay, RecordSink, SimulatedPlayers};
use dyncpr::{CprPart, GameConfig, PartReport, PlayerId};
use std::path::PathBuf;
use tracing::info;

/// Execute the run command.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the part fails.
pub(crate) fn execute(
    setup: &Setup,
    seed: Option<u64>,
    players: u32,
    format: OutputFormat,
    records: Option<PathBuf>,
    realtime: bool,
) -> Result<(), CliError> {
    let config = setup.load()?;
    let seed = seed_or_random(seed);
    let roster: Vec<PlayerId> = (1..=players).collect();
    let mut source = SimulatedPlayers::new(&config, seed);

    info!(seed, players, regime = config.regime.as_str(), "running part");

    let mut clock: Box<dyn TickSource> = if realtime {
        Box::new(WallClock::start(config.tick_interval()))
    } else {
        Box::new(VirtualClock::new(config.tick_interval()))
    };

    let (report, memory) = match records {
        Some(path) => {
            let sink = JsonLinesSink::create(&path)?;
            let (report, mut sink) = play(config, roster, sink, &mut source, clock.as_mut())?;
            sink.flush()?;
            info!(path = %path.display(), records = sink.written(), "records saved");
            (report, None)
        }
        None => {
            let (report, sink) = play(config, roster, MemorySink::new(), &mut source, clock.as_mut())?;
            (report, Some(sink))
        }
    };

    match format {
        OutputFormat::Text => {
            print!("{}", format_report_text(&report, seed));
            if let Some(memory) = memory {
                println!();
                print!("{}", format_history_text(&history_from_records(memory.records())));
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

fn play<R: RecordSink>(
    config: GameConfig,
    roster: Vec<PlayerId>,
    sink: R,
    source: &mut SimulatedPlayers,
    clock: &mut dyn TickSource,
) -> Result<(PartReport, R), CliError> {
    let mut part = CprPart::new(config, roster, sink, NullDisplay)?;
    let report = part.run(source, &mut &mut *clock)?;
    let (sink, _) = part.into_sinks();
    Ok((report, sink))
}

