//! The pricing pipeline: resolve, clip, round, align lines, measure, explain.
//!
//! Every stage takes the table by value and hands it on with more columns
//! filled in, so each stage can be exercised on its own.

pub mod bounds;
pub mod lines;
pub mod metrics;
pub mod reason;
pub mod table;

use std::time::Instant;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::PricingConfig;
use crate::domain::row::{PriceSide, ProductRow};
use crate::domain::snapshot::{duplicate_keys, DuplicateKey};
use crate::errors::PricingError;
use crate::rounding::{PriceRounder, RoundingError, RoundingTable};
use crate::strategy::resolver::Resolution;
use crate::strategy::tree::StrategyTrees;

use self::bounds::{clip_prices, compute_individual_prices};
use self::lines::{assign_line_prices, determine_line_prices, LineAggregation, LinePrices};
use self::metrics::{add_metrics, compute_metrics, MetricsReport};
use self::reason::build_reasons;
use self::table::{PriceColumn, PricedRow};

/// Threshold settings echoed into every report.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdSettings {
    pub upper_margin_threshold: Decimal,
    pub lower_margin_threshold: Decimal,
    pub competitors_fm_filter_threshold: Decimal,
    pub competitors_price_filter_threshold: Decimal,
}

impl From<&PricingConfig> for ThresholdSettings {
    fn from(config: &PricingConfig) -> Self {
        Self {
            upper_margin_threshold: config.upper_margin_threshold,
            lower_margin_threshold: config.lower_margin_threshold,
            competitors_fm_filter_threshold: config.competitors_fm_filter_threshold,
            competitors_price_filter_threshold: config.competitors_price_filter_threshold,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounts {
    pub rows: usize,
    pub clipped: usize,
    pub rounded: usize,
    pub line_adjusted: usize,
    pub unpriced: usize,
    pub unknown_selectors: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub rounder: String,
    pub line_aggregation: LineAggregation,
    pub thresholds: ThresholdSettings,
    pub counts: RunCounts,
    pub duplicate_keys: Vec<DuplicateKey>,
    pub metrics: MetricsReport,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PricingRun {
    pub rows: Vec<PricedRow>,
    #[serde(serialize_with = "serialize_line_prices")]
    pub line_prices: LinePrices,
    pub report: RunReport,
}

/// JSON objects need string keys, so line prices are written as a list.
fn serialize_line_prices<S>(line_prices: &LinePrices, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    #[derive(Serialize)]
    struct Entry<'a> {
        region: &'a str,
        line: &'a str,
        price: Option<Decimal>,
    }

    serializer.collect_seq(line_prices.iter().map(|(key, price)| Entry {
        region: &key.region.0,
        line: &key.line,
        price: *price,
    }))
}

/// Prices snapshots with trees built once and shared read-only by every row.
#[derive(Clone, Debug)]
pub struct PricingEngine {
    config: PricingConfig,
    trees: StrategyTrees,
    rounder: PriceRounder,
}

impl PricingEngine {
    pub fn new(
        config: PricingConfig,
        rounding_table: Option<RoundingTable>,
    ) -> Result<Self, PricingError> {
        let rounder = match (config.use_price_rounder, rounding_table) {
            (true, Some(table)) => PriceRounder::Table(table),
            (true, None) => {
                return Err(PricingError::Configuration(
                    "use_price_rounder is enabled but no rounding table was provided".to_string(),
                ))
            }
            (false, _) => PriceRounder::NearestInteger,
        };
        let trees = StrategyTrees::standard(&config.priority_competitors_list);

        Ok(Self { config, trees, rounder })
    }

    /// Replaces the standard trees, e.g. with a narrower fallback chain.
    pub fn with_trees(mut self, trees: StrategyTrees) -> Self {
        self.trees = trees;
        self
    }

    pub fn config(&self) -> &PricingConfig {
        &self.config
    }

    pub fn trees(&self) -> &StrategyTrees {
        &self.trees
    }

    pub fn rounder(&self) -> &PriceRounder {
        &self.rounder
    }

    pub fn line_aggregation(&self) -> LineAggregation {
        LineAggregation::from_only_where_existed(self.config.agg_line_price_only_where_existed)
    }

    pub fn run(&self, rows: Vec<ProductRow>) -> Result<PricingRun, PricingError> {
        self.run_with_id(rows, Uuid::new_v4())
    }

    /// Runs the pipeline with a caller-chosen id, used as the log correlation id.
    pub fn run_with_id(
        &self,
        rows: Vec<ProductRow>,
        run_id: Uuid,
    ) -> Result<PricingRun, PricingError> {
        let correlation_id = run_id.to_string();
        let started = Instant::now();
        info!(
            event_name = "pricing.run.start",
            correlation_id = %correlation_id,
            rows = rows.len(),
            rounder = self.rounder.describe(),
            parallel = self.config.parallel,
            "starting pricing run"
        );

        let duplicates = duplicate_keys(&rows);
        for duplicate in &duplicates {
            warn!(
                event_name = "pricing.snapshot.duplicate_key",
                correlation_id = %correlation_id,
                region = %duplicate.region,
                product_id = %duplicate.product_id,
                occurrences = duplicate.occurrences,
                "snapshot key appears more than once"
            );
        }

        let table: Vec<PricedRow> = rows.into_iter().map(PricedRow::from).collect();

        let stage = Instant::now();
        let table = compute_individual_prices(table, &self.trees, self.config.parallel);
        let unknown_selectors = log_unknown_selectors(&table, &correlation_id);
        stage_completed(&correlation_id, "resolve", stage);

        let stage = Instant::now();
        let table = clip_prices(table);
        stage_completed(&correlation_id, "clip", stage);

        let stage = Instant::now();
        let table = round_prices(table, &self.rounder).map_err(|(priced, source)| {
            error!(
                event_name = "pricing.rounding.domain_gap",
                correlation_id = %correlation_id,
                region = %priced.row.region,
                product_id = %priced.row.product_id,
                error = %source,
                "price is not covered by the rounding table; aborting run"
            );
            PricingError::from(source)
        })?;
        stage_completed(&correlation_id, "round", stage);

        let stage = Instant::now();
        let line_prices =
            determine_line_prices(&table, PriceColumn::NewPriceFinal, self.line_aggregation());
        let table = assign_line_prices(table, PriceColumn::NewPriceFinal, &line_prices);
        stage_completed(&correlation_id, "lines", stage);

        let stage = Instant::now();
        let table = add_metrics(table);
        let metrics = compute_metrics(&table, self.config.top_n);
        for change in &metrics.top_price_changes {
            info!(
                event_name = "pricing.metrics.top_change",
                correlation_id = %correlation_id,
                region = %change.region,
                product_id = %change.product_id,
                current_price = %change.current_price,
                new_price = %change.new_price,
                "large price change"
            );
        }
        stage_completed(&correlation_id, "metrics", stage);

        let table = build_reasons(table);

        let counts = RunCounts {
            rows: table.len(),
            clipped: table.iter().filter(|priced| priced.clip_adjustment.is_some()).count(),
            rounded: table
                .iter()
                .filter(|priced| {
                    priced.price_after_rounding.is_some()
                        && priced.price_after_rounding != priced.price_after_clip
                })
                .count(),
            line_adjusted: table.iter().filter(|priced| priced.line_adjustment.is_some()).count(),
            unpriced: table.iter().filter(|priced| priced.new_price_final.is_none()).count(),
            unknown_selectors,
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            event_name = "pricing.run.finished",
            correlation_id = %correlation_id,
            rows = counts.rows,
            clipped = counts.clipped,
            rounded = counts.rounded,
            line_adjusted = counts.line_adjusted,
            unpriced = counts.unpriced,
            elapsed_ms,
            "pricing run finished"
        );

        let report = RunReport {
            run_id,
            rounder: self.rounder.describe().to_string(),
            line_aggregation: self.line_aggregation(),
            thresholds: ThresholdSettings::from(&self.config),
            counts,
            duplicate_keys: duplicates,
            metrics,
        };

        Ok(PricingRun { rows: table, line_prices, report })
    }
}

/// Rounds `new_price_final` in place and records `price_after_rounding`.
///
/// The first uncovered price aborts the stage, returning the offending row.
pub fn round_prices(
    mut rows: Vec<PricedRow>,
    rounder: &PriceRounder,
) -> Result<Vec<PricedRow>, (Box<PricedRow>, RoundingError)> {
    for index in 0..rows.len() {
        match rounder.round_value(rows[index].new_price_final) {
            Ok(rounded) => {
                rows[index].new_price_final = rounded;
                rows[index].price_after_rounding = rounded;
            }
            Err(error) => return Err((Box::new(rows.swap_remove(index)), error)),
        }
    }
    Ok(rows)
}

fn log_unknown_selectors(rows: &[PricedRow], correlation_id: &str) -> usize {
    let mut unknown = 0;
    for priced in rows {
        for side in PriceSide::ALL {
            if let Some(Resolution::UnknownSelector { selector }) = priced.resolution(side) {
                unknown += 1;
                debug!(
                    event_name = "pricing.resolve.unknown_selector",
                    correlation_id = %correlation_id,
                    region = %priced.row.region,
                    product_id = %priced.row.product_id,
                    side = side.as_str(),
                    selector = %selector,
                    "strategy selector has no tree entry"
                );
            }
        }
    }
    unknown
}

fn stage_completed(correlation_id: &str, stage: &'static str, started: Instant) {
    let elapsed_ms = started.elapsed().as_millis() as u64;
    info!(
        event_name = "pricing.stage.completed",
        correlation_id = %correlation_id,
        stage,
        elapsed_ms,
        "pricing stage completed"
    );
}
