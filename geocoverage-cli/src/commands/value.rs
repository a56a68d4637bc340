//! `value` and `matrix`: point and window queries.

use std::path::Path;

use geocoverage::coord::NativePoint;

use super::common::{format_value, load_config, open_source};
use crate::error::CliError;

pub fn run_value(
    config_path: Option<&Path>,
    x: f64,
    y: f64,
    precision: Option<f64>,
) -> Result<(), CliError> {
    let config = load_config(config_path)?;
    let source = open_source(&config)?;
    let coverage = source.for_precision(precision);

    let value = coverage.get_value(NativePoint::new(x, y))?;
    println!("{}", format_value(value.as_ref()));
    Ok(())
}

/// Prints the window row by row, top row first.
pub fn run_matrix(
    config_path: Option<&Path>,
    x: f64,
    y: f64,
    width: u32,
    height: u32,
    precision: Option<f64>,
) -> Result<(), CliError> {
    let config = load_config(config_path)?;
    let source = open_source(&config)?;
    let coverage = source.for_precision(precision);
    tracing::debug!(backend = coverage.backend().name(), "Matrix level");

    let matrix = coverage.get_matrix_of_values(NativePoint::new(x, y), width, height)?;
    println!(
        "origin {} ({} of {} cells have values)",
        matrix.origin,
        matrix.present(),
        matrix.values.len()
    );
    for row in 0..height {
        let line: Vec<String> = (0..width)
            .map(|col| format_value(matrix.get(col, row)))
            .collect();
        println!("{}", line.join("\t"));
    }

    if let Some(stats) = coverage.cache_stats() {
        tracing::debug!(
            hits = stats.hits,
            misses = stats.misses,
            entries = stats.entries,
            "Buffer cache"
        );
    }
    Ok(())
}
