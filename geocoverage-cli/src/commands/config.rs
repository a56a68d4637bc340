//! `config`: inspect the configuration file.

use std::path::Path;

use clap::Subcommand;
use geocoverage::config::{default_config_path, format_size};

use super::common::load_config;
use crate::error::CliError;

#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Show the configuration file path
    Path,
    /// Show the effective settings
    Show,
}

pub fn run(config_path: Option<&Path>, command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Path => {
            let path = config_path
                .map(Path::to_path_buf)
                .unwrap_or_else(default_config_path);
            println!("{}", path.display());
            Ok(())
        }
        ConfigCommands::Show => run_show(config_path),
    }
}

fn run_show(config_path: Option<&Path>) -> Result<(), CliError> {
    let config = load_config(config_path)?;

    println!("[backend]");
    println!("  kind = {}", config.backend.kind());
    println!("  locator = {}", config.locator);
    println!("  http_timeout = {}", config.http_timeout_secs);
    println!();
    println!("[coverage]");
    println!("  bands = {:?}", config.coverage.bands);
    println!("  axis_limit = {:?}", config.to_coverage_config().axis_limit);
    println!("  forced_no_data = {:?}", config.coverage.forced_no_data);
    println!();
    println!("[retry]");
    println!("  max_attempts = {}", config.retry.max_attempts);
    println!("  delay_ms = {}", config.retry.delay_ms);
    println!();
    println!("[cache]");
    println!("  buffer_ceiling = {}", format_size(config.cache.buffer_ceiling));
    println!("  capacity = {}", config.cache.capacity);
    println!("  trim_to = {}", config.cache.trim_to);
    println!();
    println!("[batch]");
    println!("  chunk_size = {}", config.batch.chunk_size);
    println!("  points_per_task = {}", config.batch.points_per_task);
    match config.batch.threads {
        Some(threads) => println!("  threads = {}", threads),
        None => println!("  threads = (global pool)"),
    }
    Ok(())
}
