use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use autoprice_core::config::{AppConfig, ConfigOverrides, LoadOptions, PricingConfig};
use autoprice_core::{PricingEngine, PricingError, ProductRow, RoundingTable};
use tracing::info;
use uuid::Uuid;

use crate::commands::{CommandResult, RunDetails};

const COMMAND: &str = "run";

#[derive(Clone, Debug, Default)]
pub struct RunArgs {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub config_path: Option<PathBuf>,
    pub rounding_table: Option<PathBuf>,
    pub parallel: bool,
}

pub fn run(args: RunArgs) -> CommandResult {
    let overrides = ConfigOverrides {
        use_price_rounder: args.rounding_table.as_ref().map(|_| true),
        rounding_table_path: args.rounding_table.clone(),
        parallel: args.parallel.then_some(true),
        ..ConfigOverrides::default()
    };
    let config = match AppConfig::load(LoadOptions {
        config_path: args.config_path.clone(),
        require_file: args.config_path.is_some(),
        overrides,
    }) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };
    crate::init_logging(&config);

    let rounding_table = match load_rounding_table(&config.pricing) {
        Ok(table) => table,
        Err(error) => {
            return CommandResult::failure(COMMAND, "rounding_table", format!("{error:#}"), 2);
        }
    };

    let rows = match read_snapshot(&args.input) {
        Ok(rows) => rows,
        Err(error) => {
            return CommandResult::failure(COMMAND, "input", format!("{error:#}"), 3);
        }
    };

    let engine = match PricingEngine::new(config.pricing, rounding_table) {
        Ok(engine) => engine,
        Err(error) => {
            return CommandResult::failure(COMMAND, error.error_class(), error.to_string(), 2);
        }
    };

    let run_id = Uuid::new_v4();
    let priced = match engine.run_with_id(rows, run_id) {
        Ok(priced) => priced,
        Err(error) => return pricing_failure(error, run_id),
    };

    let output_path = args.output.unwrap_or_else(|| default_output_path(&args.input));
    let written = serde_json::to_string_pretty(&priced)
        .context("could not serialize the priced table")
        .and_then(|body| {
            fs::write(&output_path, body)
                .with_context(|| format!("could not write `{}`", output_path.display()))
        });
    if let Err(error) = written {
        return CommandResult::failure_in_run(
            COMMAND,
            "output",
            format!("{error:#}"),
            3,
            RunDetails { run_id: Some(run_id.to_string()), ..RunDetails::default() },
        );
    }

    info!(
        event_name = "cli.run.output_written",
        correlation_id = %run_id,
        path = %output_path.display(),
        "priced table written"
    );

    let counts = priced.report.counts;
    CommandResult::priced(
        COMMAND,
        format!("priced {} rows into `{}`", counts.rows, output_path.display()),
        RunDetails {
            run_id: Some(run_id.to_string()),
            output_path: Some(output_path.display().to_string()),
            counts: Some(counts),
        },
    )
}

fn pricing_failure(error: PricingError, run_id: Uuid) -> CommandResult {
    let error_class = error.error_class();
    let interface = error.into_interface(run_id.to_string());
    CommandResult::failure_in_run(
        COMMAND,
        error_class,
        format!("{} {interface}", interface.user_message()),
        4,
        RunDetails {
            run_id: Some(interface.correlation_id().to_string()),
            ..RunDetails::default()
        },
    )
}

fn read_snapshot(path: &Path) -> Result<Vec<ProductRow>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("could not read snapshot `{}`", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("could not parse snapshot `{}`", path.display()))
}

fn load_rounding_table(pricing: &PricingConfig) -> Result<Option<RoundingTable>> {
    if !pricing.use_price_rounder {
        return Ok(None);
    }
    let Some(path) = pricing.rounding_table_path.as_deref() else {
        return Ok(None);
    };

    let raw = fs::read_to_string(path)
        .with_context(|| format!("could not read rounding table `{}`", path.display()))?;
    let table = RoundingTable::from_json(&raw)
        .with_context(|| format!("invalid rounding table `{}`", path.display()))?;
    Ok(Some(table))
}

fn default_output_path(input: &Path) -> PathBuf {
    let stem = input.file_stem().and_then(|stem| stem.to_str()).unwrap_or("snapshot");
    input.with_file_name(format!("{stem}.priced.json"))
}
