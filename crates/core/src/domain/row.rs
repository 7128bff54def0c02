use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::product::{ProductId, Region};

/// Which of the three parallel price computations a value belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceSide {
    Base,
    Lower,
    Upper,
}

impl PriceSide {
    pub const ALL: [PriceSide; 3] = [PriceSide::Base, PriceSide::Lower, PriceSide::Upper];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Base => "base",
            Self::Lower => "lower",
            Self::Upper => "upper",
        }
    }

    pub fn margin_column(self) -> &'static str {
        match self {
            Self::Base => "base_margin",
            Self::Lower => "lower_base_margin",
            Self::Upper => "upper_base_margin",
        }
    }

    pub fn competitor_column(self) -> &'static str {
        match self {
            Self::Base => "base_competitor",
            Self::Lower => "lower_competitor",
            Self::Upper => "upper_competitor",
        }
    }

    pub fn strategy_column(self) -> &'static str {
        match self {
            Self::Base => "base_strategy",
            Self::Lower => "lower_strategy",
            Self::Upper => "upper_strategy",
        }
    }
}

impl fmt::Display for PriceSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One product in one region, as delivered by the upstream data merge.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductRow {
    pub region: Region,
    pub product_id: ProductId,
    #[serde(default)]
    pub line: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub report_date: Option<NaiveDate>,
    #[serde(default)]
    pub purchase_price: Option<Decimal>,
    #[serde(default)]
    pub vat: Option<Decimal>,
    #[serde(default)]
    pub current_price: Option<Decimal>,
    #[serde(default, deserialize_with = "deserialize_margin")]
    pub base_margin: Option<Decimal>,
    #[serde(default, deserialize_with = "deserialize_margin")]
    pub lower_base_margin: Option<Decimal>,
    #[serde(default, deserialize_with = "deserialize_margin")]
    pub upper_base_margin: Option<Decimal>,
    #[serde(default)]
    pub base_competitor: Option<String>,
    #[serde(default)]
    pub lower_competitor: Option<String>,
    #[serde(default)]
    pub upper_competitor: Option<String>,
    #[serde(default, deserialize_with = "deserialize_competitors")]
    pub all_competitors: BTreeMap<String, Option<Decimal>>,
    #[serde(default)]
    pub priority_competitors: Option<Vec<String>>,
    #[serde(default)]
    pub base_strategy: Option<String>,
    #[serde(default)]
    pub lower_strategy: Option<String>,
    #[serde(default)]
    pub upper_strategy: Option<String>,
    #[serde(default)]
    pub sales: Option<Decimal>,
}

impl ProductRow {
    pub fn new(region: impl Into<String>, product_id: impl Into<String>) -> Self {
        Self {
            region: Region(region.into()),
            product_id: ProductId(product_id.into()),
            ..Self::default()
        }
    }

    /// Purchase price including incoming VAT; absent unless both parts are present.
    pub fn cost(&self) -> Option<Decimal> {
        self.purchase_price?.checked_add(self.vat?)
    }

    pub fn margin(&self, side: PriceSide) -> Option<Decimal> {
        match side {
            PriceSide::Base => self.base_margin,
            PriceSide::Lower => self.lower_base_margin,
            PriceSide::Upper => self.upper_base_margin,
        }
    }

    pub fn competitor(&self, side: PriceSide) -> Option<&str> {
        let name = match side {
            PriceSide::Base => self.base_competitor.as_deref(),
            PriceSide::Lower => self.lower_competitor.as_deref(),
            PriceSide::Upper => self.upper_competitor.as_deref(),
        };
        name.filter(|name| !name.trim().is_empty())
    }

    pub fn strategy_selector(&self, side: PriceSide) -> Option<&str> {
        let selector = match side {
            PriceSide::Base => self.base_strategy.as_deref(),
            PriceSide::Lower => self.lower_strategy.as_deref(),
            PriceSide::Upper => self.upper_strategy.as_deref(),
        };
        selector.filter(|selector| !selector.trim().is_empty())
    }

    /// Row-specific priority order, if the upstream merge supplied a non-empty one.
    pub fn priority_competitors(&self) -> Option<&[String]> {
        self.priority_competitors.as_deref().filter(|list| !list.is_empty())
    }
}

/// Parses a margin given either as a fraction (`0.15`) or a percent string (`15%`).
pub fn parse_margin(raw: &str) -> Option<Decimal> {
    let trimmed = raw.trim();
    if let Some(percent) = trimmed.strip_suffix('%') {
        let value = percent.trim().parse::<Decimal>().ok()?;
        return value.checked_div(Decimal::ONE_HUNDRED);
    }
    trimmed.parse::<Decimal>().ok()
}

fn deserialize_margin<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum MarginInput {
        Fraction(Decimal),
        Text(String),
    }

    let raw = Option::<MarginInput>::deserialize(deserializer)?;
    Ok(raw.and_then(|input| match input {
        MarginInput::Fraction(value) => Some(value),
        MarginInput::Text(text) => parse_margin(&text),
    }))
}

fn deserialize_competitors<'de, D>(
    deserializer: D,
) -> Result<BTreeMap<String, Option<Decimal>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<BTreeMap<String, Option<Decimal>>>::deserialize(deserializer)?;
    Ok(raw.unwrap_or_default())
}
