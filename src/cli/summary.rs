//! Summary command implementation.

use super::output::{format_history_text, history_from_records};
use super::{CliError, OutputFormat};
use dyncpr::part::read_json_lines;
use std::path::Path;

/// Execute the summary command.
///
/// # Errors
///
/// Returns an error if the record file cannot be read.
pub(crate) fn execute(records: &Path, format: OutputFormat) -> Result<(), CliError> {
    let records = read_json_lines(records)?;
    if records.is_empty() {
        return Err(CliError::new("record file is empty"));
    }
    let history = history_from_records(&records);

    match format {
        OutputFormat::Text => print!("{}", format_history_text(&history)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&history)?),
    }

    Ok(())
}
