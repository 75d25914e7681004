//! Config command implementation.

use super::CliError;
use dyncpr::GameConfig;
use std::path::PathBuf;

/// Execute the config command.
///
/// Without a file, prints the built-in configuration. With a file, loads
/// and validates it, then prints the normalized result.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is invalid.
pub(crate) fn execute(file: Option<PathBuf>) -> Result<(), CliError> {
    let config = match file {
        Some(path) => {
            let config = GameConfig::load(&path)?;
            eprintln!("{}: valid", path.display());
            config
        }
        None => GameConfig::default(),
    };
    println!("{}", config.to_json_pretty()?);
    Ok(())
}
