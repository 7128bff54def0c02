use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::row::{PriceSide, ProductRow};
use crate::engine::bounds::ClipAdjustment;
use crate::engine::lines::LineAdjustment;
use crate::engine::metrics::MetricSet;
use crate::strategy::resolver::Resolution;

/// Price columns a stage can read or overwrite.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceColumn {
    NewPriceBase,
    NewPriceLower,
    NewPriceUpper,
    NewPriceFinal,
}

impl PriceColumn {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NewPriceBase => "new_price_base",
            Self::NewPriceLower => "new_price_lower",
            Self::NewPriceUpper => "new_price_upper",
            Self::NewPriceFinal => "new_price_final",
        }
    }

    pub fn for_side(side: PriceSide) -> Self {
        match side {
            PriceSide::Base => Self::NewPriceBase,
            PriceSide::Lower => Self::NewPriceLower,
            PriceSide::Upper => Self::NewPriceUpper,
        }
    }
}

/// An input row plus every column the pipeline appends to it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PricedRow {
    #[serde(flatten)]
    pub row: ProductRow,
    pub new_price_base: Option<Decimal>,
    pub new_price_lower: Option<Decimal>,
    pub new_price_upper: Option<Decimal>,
    pub new_price_final: Option<Decimal>,
    pub price_after_clip: Option<Decimal>,
    pub price_after_rounding: Option<Decimal>,
    pub base_resolution: Option<Resolution>,
    pub lower_resolution: Option<Resolution>,
    pub upper_resolution: Option<Resolution>,
    pub clip_adjustment: Option<ClipAdjustment>,
    pub line_adjustment: Option<LineAdjustment>,
    pub current_metrics: Option<MetricSet>,
    pub new_metrics: Option<MetricSet>,
    pub reason: Option<String>,
}

impl PricedRow {
    pub fn from_row(row: ProductRow) -> Self {
        Self {
            row,
            new_price_base: None,
            new_price_lower: None,
            new_price_upper: None,
            new_price_final: None,
            price_after_clip: None,
            price_after_rounding: None,
            base_resolution: None,
            lower_resolution: None,
            upper_resolution: None,
            clip_adjustment: None,
            line_adjustment: None,
            current_metrics: None,
            new_metrics: None,
            reason: None,
        }
    }

    pub fn price(&self, column: PriceColumn) -> Option<Decimal> {
        match column {
            PriceColumn::NewPriceBase => self.new_price_base,
            PriceColumn::NewPriceLower => self.new_price_lower,
            PriceColumn::NewPriceUpper => self.new_price_upper,
            PriceColumn::NewPriceFinal => self.new_price_final,
        }
    }

    pub fn set_price(&mut self, column: PriceColumn, price: Option<Decimal>) {
        let slot = match column {
            PriceColumn::NewPriceBase => &mut self.new_price_base,
            PriceColumn::NewPriceLower => &mut self.new_price_lower,
            PriceColumn::NewPriceUpper => &mut self.new_price_upper,
            PriceColumn::NewPriceFinal => &mut self.new_price_final,
        };
        *slot = price;
    }

    pub fn resolution(&self, side: PriceSide) -> Option<&Resolution> {
        match side {
            PriceSide::Base => self.base_resolution.as_ref(),
            PriceSide::Lower => self.lower_resolution.as_ref(),
            PriceSide::Upper => self.upper_resolution.as_ref(),
        }
    }

    pub fn set_resolution(&mut self, side: PriceSide, resolution: Resolution) {
        self.set_price(PriceColumn::for_side(side), resolution.price());
        match side {
            PriceSide::Base => self.base_resolution = Some(resolution),
            PriceSide::Lower => self.lower_resolution = Some(resolution),
            PriceSide::Upper => self.upper_resolution = Some(resolution),
        }
    }
}

impl From<ProductRow> for PricedRow {
    fn from(row: ProductRow) -> Self {
        Self::from_row(row)
    }
}
