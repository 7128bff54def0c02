use std::cmp::Ordering;
use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::product::{ProductId, Region};
use crate::engine::table::PricedRow;

/// Commercial metrics of one row at one price.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricSet {
    pub price: Option<Decimal>,
    /// `price * sales`
    pub gmv: Option<Decimal>,
    /// `(price - cost) * sales`
    pub front_margin: Option<Decimal>,
    /// `(price - cost) / price`
    pub front_margin_pct: Option<Decimal>,
}

/// `(price - cost) / price`; absent when either side is absent or the price is zero.
pub fn front_margin_pct(price: Option<Decimal>, cost: Option<Decimal>) -> Option<Decimal> {
    let price = price.filter(|price| !price.is_zero())?;
    price.checked_sub(cost?)?.checked_div(price)
}

pub fn metric_set(
    price: Option<Decimal>,
    cost: Option<Decimal>,
    sales: Option<Decimal>,
) -> MetricSet {
    let gmv = price.zip(sales).and_then(|(price, sales)| price.checked_mul(sales));
    let front_margin = price
        .zip(cost)
        .and_then(|(price, cost)| price.checked_sub(cost))
        .zip(sales)
        .and_then(|(unit_margin, sales)| unit_margin.checked_mul(sales));

    MetricSet { price, gmv, front_margin, front_margin_pct: front_margin_pct(price, cost) }
}

/// Fills metrics for the current price and for `new_price_final`.
pub fn add_metrics(mut rows: Vec<PricedRow>) -> Vec<PricedRow> {
    for priced in &mut rows {
        let cost = priced.row.cost();
        let sales = priced.row.sales;
        priced.current_metrics = Some(metric_set(priced.row.current_price, cost, sales));
        priced.new_metrics = Some(metric_set(priced.new_price_final, cost, sales));
    }
    rows
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceChange {
    pub region: Region,
    pub product_id: ProductId,
    pub current_price: Decimal,
    pub new_price: Decimal,
    pub price_change: Decimal,
    pub front_margin_pct_current: Option<Decimal>,
    pub front_margin_pct_new: Option<Decimal>,
    pub front_margin_pct_change: Option<Decimal>,
}

/// Region totals skip rows with absent metrics; a total is absent once the sum overflows.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionSummary {
    pub region: Region,
    pub rows: usize,
    pub priced_rows: usize,
    pub gmv_current: Option<Decimal>,
    pub gmv_new: Option<Decimal>,
    pub front_margin_current: Option<Decimal>,
    pub front_margin_new: Option<Decimal>,
}

impl RegionSummary {
    fn new(region: Region) -> Self {
        Self {
            region,
            rows: 0,
            priced_rows: 0,
            gmv_current: Some(Decimal::ZERO),
            gmv_new: Some(Decimal::ZERO),
            front_margin_current: Some(Decimal::ZERO),
            front_margin_new: Some(Decimal::ZERO),
        }
    }
}

fn accumulate(total: &mut Option<Decimal>, value: Option<Decimal>) {
    if let Some(value) = value {
        *total = total.and_then(|total| total.checked_add(value));
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsReport {
    pub top_price_changes: Vec<PriceChange>,
    pub top_margin_changes: Vec<PriceChange>,
    pub regions: Vec<RegionSummary>,
}

/// Largest price and margin moves plus per-region totals. Reporting only.
pub fn compute_metrics(rows: &[PricedRow], top_n: usize) -> MetricsReport {
    let changes: Vec<PriceChange> = rows.iter().filter_map(price_change).collect();

    let mut top_price_changes = changes.clone();
    top_price_changes
        .sort_by(|a, b| by_magnitude(Some(a.price_change), Some(b.price_change), a, b));
    top_price_changes.truncate(top_n);

    let mut top_margin_changes: Vec<PriceChange> =
        changes.into_iter().filter(|change| change.front_margin_pct_change.is_some()).collect();
    top_margin_changes.sort_by(|a, b| {
        by_magnitude(a.front_margin_pct_change, b.front_margin_pct_change, a, b)
    });
    top_margin_changes.truncate(top_n);

    MetricsReport { top_price_changes, top_margin_changes, regions: region_summaries(rows) }
}

fn price_change(priced: &PricedRow) -> Option<PriceChange> {
    let current = priced.current_metrics.as_ref()?;
    let new = priced.new_metrics.as_ref()?;
    let current_price = current.price?;
    let new_price = new.price?;

    Some(PriceChange {
        region: priced.row.region.clone(),
        product_id: priced.row.product_id.clone(),
        current_price,
        new_price,
        price_change: new_price.checked_sub(current_price)?,
        front_margin_pct_current: current.front_margin_pct,
        front_margin_pct_new: new.front_margin_pct,
        front_margin_pct_change: new
            .front_margin_pct
            .zip(current.front_margin_pct)
            .and_then(|(new, current)| new.checked_sub(current)),
    })
}

/// Descending by absolute value, ties by (region, product_id).
fn by_magnitude(
    a_value: Option<Decimal>,
    b_value: Option<Decimal>,
    a: &PriceChange,
    b: &PriceChange,
) -> Ordering {
    let a_abs = a_value.map(|value| value.abs());
    let b_abs = b_value.map(|value| value.abs());
    b_abs
        .cmp(&a_abs)
        .then_with(|| a.region.cmp(&b.region))
        .then_with(|| a.product_id.cmp(&b.product_id))
}

fn region_summaries(rows: &[PricedRow]) -> Vec<RegionSummary> {
    let mut regions: BTreeMap<&Region, RegionSummary> = BTreeMap::new();

    for priced in rows {
        let summary = regions
            .entry(&priced.row.region)
            .or_insert_with(|| RegionSummary::new(priced.row.region.clone()));
        summary.rows += 1;
        if priced.new_price_final.is_some() {
            summary.priced_rows += 1;
        }

        if let Some(current) = &priced.current_metrics {
            accumulate(&mut summary.gmv_current, current.gmv);
            accumulate(&mut summary.front_margin_current, current.front_margin);
        }
        if let Some(new) = &priced.new_metrics {
            accumulate(&mut summary.gmv_new, new.gmv);
            accumulate(&mut summary.front_margin_new, new.front_margin);
        }
    }

    regions.into_values().collect()
}
