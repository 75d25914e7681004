//! Project command implementation.

use super::output::format_projection_text;
use super::{CliError, OutputFormat, Setup};
use dyncpr::PayoffModel;
use dyncpr::model::{HorizonInputs, fitted_continuation, project};
use serde_json::json;

/// Execute the project command.
///
/// # Errors
///
/// Returns an error if the configuration or the inputs are invalid.
pub(crate) fn execute(
    setup: &Setup,
    own: f64,
    group: f64,
    stock: f64,
    format: OutputFormat,
) -> Result<(), CliError> {
    let config = setup.load()?;
    for (name, value) in [("own", own), ("group", group), ("stock", stock)] {
        if !(value.is_finite() && value >= 0.0) {
            return Err(CliError::new(format!("{name} must be finite and non-negative, got {value}")));
        }
    }
    if own > group {
        return Err(CliError::new(format!("own extraction {own} exceeds group extraction {group}")));
    }

    let model = PayoffModel::from_config(&config);
    let projection = project(
        &model,
        config.growth,
        HorizonInputs {
            own_extraction: own,
            group_extraction: group,
            stock,
        },
    );
    let fitted = fitted_continuation(config.regime, stock);

    match format {
        OutputFormat::Text => print!("{}", format_projection_text(&projection, fitted)),
        OutputFormat::Json => {
            let value = json!({
                "regime": config.regime,
                "projection": projection,
                "fitted": fitted,
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
    }

    Ok(())
}
