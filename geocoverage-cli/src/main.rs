//! GeoCoverage CLI
//!
//! Probes values from a configured raster coverage: dataset description,
//! single points, windows around a point and batched point lists.

mod commands;
mod error;

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};
use geocoverage::logging::init_console_logging;

use commands::config::ConfigCommands;
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "geocoverage")]
#[command(version, about = "Probe values from raster coverages", long_about = None)]
struct Cli {
    /// Config file (default: ~/.geocoverage/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Describe the configured coverage
    Info,

    /// Value at a native coordinate
    Value {
        /// Native X coordinate
        #[arg(allow_hyphen_values = true)]
        x: f64,
        /// Native Y coordinate
        #[arg(allow_hyphen_values = true)]
        y: f64,
        /// Spatial precision in metres; picks a coarser overview when one exists
        #[arg(long)]
        precision: Option<f64>,
    },

    /// Window of values around a native coordinate
    Matrix {
        #[arg(allow_hyphen_values = true)]
        x: f64,
        #[arg(allow_hyphen_values = true)]
        y: f64,
        /// Window width in cells
        #[arg(long, default_value = "3")]
        width: u32,
        /// Window height in cells
        #[arg(long, default_value = "3")]
        height: u32,
        /// Spatial precision in metres; picks a coarser overview when one exists
        #[arg(long)]
        precision: Option<f64>,
    },

    /// Values for a list of points, one "x,y" per line
    Batch {
        /// Points file, or stdin when omitted
        file: Option<PathBuf>,
    },

    /// Configuration file commands
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Info => commands::info::run(config_path),
        Commands::Value { x, y, precision } => {
            commands::value::run_value(config_path, x, y, precision)
        }
        Commands::Matrix {
            x,
            y,
            width,
            height,
            precision,
        } => commands::value::run_matrix(config_path, x, y, width, height, precision),
        Commands::Batch { file } => commands::batch::run(config_path, file.as_deref()),
        Commands::Config { command } => commands::config::run(config_path, command),
    }
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    init_console_logging(level);

    if let Err(e) = run(cli) {
        e.exit();
    }
}
