pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use autoprice_core::config::{AppConfig, LogFormat};
use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "autoprice",
    about = "Autoprice operator CLI",
    long_about = "Price a product snapshot through the strategy trees and inspect effective configuration.",
    after_help = "Examples:\n  autoprice run --input snapshot.json\n  autoprice run --input snapshot.json --rounding-table rounding.json\n  autoprice config"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Price a JSON snapshot and write the priced table with its run report")]
    Run {
        #[arg(long, help = "Snapshot file: a JSON array of product rows")]
        input: PathBuf,
        #[arg(long, help = "Where to write the priced table (default: <input>.priced.json)")]
        output: Option<PathBuf>,
        #[arg(long, help = "Config file to load instead of autoprice.toml")]
        config: Option<PathBuf>,
        #[arg(long, help = "JSON rounding table; enables table rounding")]
        rounding_table: Option<PathBuf>,
        #[arg(long, help = "Resolve rows on the rayon thread pool")]
        parallel: bool,
    },
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config {
        #[arg(long, help = "Config file to inspect instead of autoprice.toml")]
        config: Option<PathBuf>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Run { input, output, config, rounding_table, parallel } => {
            commands::run::run(commands::run::RunArgs {
                input,
                output,
                config_path: config,
                rounding_table,
                parallel,
            })
        }
        Command::Config { config } => commands::CommandResult {
            exit_code: 0,
            output: commands::config::run(config.as_deref()),
        },
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

/// Installs the global subscriber once; later calls keep the first one.
///
/// Events go to stderr so stdout carries only the command outcome.
pub fn init_logging(config: &AppConfig) {
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);

    let _ = match config.logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
