//! Pricing strategies: small pure rules that derive a candidate price from one row.
//!
//! Every strategy returns `None` when the inputs it needs are missing. That is
//! what lets strategies be chained into fallbacks (see [`tree`] and
//! [`resolver`]).

pub mod resolver;
pub mod tree;

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::row::{PriceSide, ProductRow};

/// Selector values found in the `*_strategy` columns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    PriorityCompetitors,
    Competitor,
    MinPrice,
    BaseMargin,
    CurrentPrice,
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("unknown pricing strategy `{0}`")]
pub struct UnknownStrategy(pub String);

impl StrategyKind {
    pub const ALL: [StrategyKind; 5] = [
        StrategyKind::PriorityCompetitors,
        StrategyKind::Competitor,
        StrategyKind::MinPrice,
        StrategyKind::BaseMargin,
        StrategyKind::CurrentPrice,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::PriorityCompetitors => "Priority Competitors",
            Self::Competitor => "Competitor",
            Self::MinPrice => "Minimum Price",
            Self::BaseMargin => "Base Margin",
            Self::CurrentPrice => "Current Price",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for StrategyKind {
    type Err = UnknownStrategy;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value
            .trim()
            .to_ascii_lowercase()
            .replace(['_', '-'], " ")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");

        match normalized.as_str() {
            "priority competitors" => Ok(Self::PriorityCompetitors),
            "competitor" | "competitor price" => Ok(Self::Competitor),
            "minimum price" | "min price" => Ok(Self::MinPrice),
            "base margin" => Ok(Self::BaseMargin),
            "current price" => Ok(Self::CurrentPrice),
            _ => Err(UnknownStrategy(value.to_string())),
        }
    }
}

/// A pricing rule together with the single parameter it reads, if any.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Strategy {
    CurrentPrice,
    /// `cost / (1 - margin)`, margin taken from the column of `margin`'s side.
    BaseMargin { margin: PriceSide },
    MinPrice,
    /// Price of the competitor named in the competitor column of `competitor`'s side.
    Competitor { competitor: PriceSide },
    PriorityCompetitors { default_priority: Vec<String> },
}

/// Outcome of one strategy evaluation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceResult {
    pub price: Option<Decimal>,
    pub strategy: Strategy,
    pub description: String,
}

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Self::CurrentPrice => "Current Price",
            Self::BaseMargin { .. } => "Base Margin",
            Self::MinPrice => "Minimum Price",
            Self::Competitor { .. } => "Competitor Price",
            Self::PriorityCompetitors { .. } => "Priority Competitors",
        }
    }

    pub fn kind(&self) -> StrategyKind {
        match self {
            Self::CurrentPrice => StrategyKind::CurrentPrice,
            Self::BaseMargin { .. } => StrategyKind::BaseMargin,
            Self::MinPrice => StrategyKind::MinPrice,
            Self::Competitor { .. } => StrategyKind::Competitor,
            Self::PriorityCompetitors { .. } => StrategyKind::PriorityCompetitors,
        }
    }

    /// Column this strategy reads its parameter from, for display.
    pub fn bound_column(&self) -> Option<&'static str> {
        match self {
            Self::BaseMargin { margin } => Some(margin.margin_column()),
            Self::Competitor { competitor } => Some(competitor.competitor_column()),
            Self::CurrentPrice | Self::MinPrice | Self::PriorityCompetitors { .. } => None,
        }
    }

    pub fn compute(&self, row: &ProductRow) -> Option<PriceResult> {
        match self {
            Self::CurrentPrice => {
                let current = row.current_price?;
                Some(self.result(Some(current), format!("Used current price: {current}")))
            }
            Self::BaseMargin { margin } => {
                let margin = row.margin(*margin)?;
                let cost = row.cost()?;
                // margin == 1 divides by zero and yields no price.
                let price = cost.checked_div(Decimal::ONE.checked_sub(margin)?)?;
                Some(self.result(
                    Some(price),
                    format!(
                        "Calculated price using base margin: {} / (1 - {}) = {}",
                        fmt_dp(cost, 1),
                        fmt_dp(margin, 2),
                        fmt_dp(price, 1)
                    ),
                ))
            }
            Self::MinPrice => {
                let (name, price) = lowest_competitor(row)?;
                Some(self.result(
                    Some(price),
                    format!("Used competitor {name} with the lowest price: {}", fmt_dp(price, 1)),
                ))
            }
            Self::Competitor { competitor } => {
                let name = row.competitor(*competitor)?;
                let price = (*row.all_competitors.get(name)?)?;
                Some(self.result(
                    Some(price),
                    format!("Used price {} for selected competitor {name}", fmt_dp(price, 1)),
                ))
            }
            Self::PriorityCompetitors { default_priority } => {
                let priority = row.priority_competitors().unwrap_or(default_priority.as_slice());
                let (name, price) = priority.iter().find_map(|name| {
                    row.all_competitors.get(name).map(|price| (name.as_str(), *price))
                })?;
                let description = match price {
                    Some(price) => format!(
                        "Used price {} from the most prioritized competitor {name}",
                        fmt_dp(price, 1)
                    ),
                    None => format!("Most prioritized competitor {name} has no price"),
                };
                Some(self.result(price, description))
            }
        }
    }

    fn result(&self, price: Option<Decimal>, description: String) -> PriceResult {
        PriceResult { price, strategy: self.clone(), description }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.bound_column() {
            Some(column) => write!(f, "{} ({column})", self.name()),
            None => f.write_str(self.name()),
        }
    }
}

/// Lowest priced competitor; ties go to the first name in key order.
fn lowest_competitor(row: &ProductRow) -> Option<(&str, Decimal)> {
    row.all_competitors
        .iter()
        .filter_map(|(name, price)| price.map(|price| (name.as_str(), price)))
        .fold(None, |best, (name, price)| match best {
            Some((_, best_price)) if best_price <= price => best,
            _ => Some((name, price)),
        })
}

/// Formats with exactly `dp` decimal places.
pub(crate) fn fmt_dp(value: Decimal, dp: u32) -> String {
    format!("{:.*}", dp as usize, value.round_dp(dp))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use rust_decimal::Decimal;

    use super::{Strategy, StrategyKind};
    use crate::domain::row::{PriceSide, ProductRow};

    fn competitors(entries: &[(&str, i64)]) -> BTreeMap<String, Option<Decimal>> {
        entries
            .iter()
            .map(|(name, price)| (name.to_string(), Some(Decimal::from(*price))))
            .collect()
    }

    fn default_priority() -> Vec<String> {
        vec!["competitor_1".to_string(), "competitor_2".to_string(), "competitor_3".to_string()]
    }

    #[test]
    fn current_price_returns_price_only_when_present() {
        let mut row = ProductRow::new("north", "sku-1");
        assert_eq!(Strategy::CurrentPrice.compute(&row), None);

        row.current_price = Some(Decimal::new(9990, 2));
        let result = Strategy::CurrentPrice.compute(&row).expect("current price result");
        assert_eq!(result.price, Some(Decimal::new(9990, 2)));
        assert_eq!(result.strategy, Strategy::CurrentPrice);
        assert_eq!(result.description, "Used current price: 99.90");
    }

    #[test]
    fn base_margin_divides_cost_by_margin_complement() {
        let row = ProductRow {
            purchase_price: Some(Decimal::from(70)),
            vat: Some(Decimal::from(10)),
            base_margin: Some(Decimal::new(2, 1)),
            ..ProductRow::new("north", "sku-1")
        };

        let result =
            Strategy::BaseMargin { margin: PriceSide::Base }.compute(&row).expect("margin result");
        assert_eq!(result.price, Some(Decimal::from(100)));
        assert_eq!(
            result.description,
            "Calculated price using base margin: 80.0 / (1 - 0.20) = 100.0"
        );
    }

    #[test]
    fn base_margin_reads_the_column_of_its_side() {
        let row = ProductRow {
            purchase_price: Some(Decimal::from(50)),
            vat: Some(Decimal::ZERO),
            base_margin: Some(Decimal::new(5, 1)),
            ..ProductRow::new("north", "sku-1")
        };

        assert!(Strategy::BaseMargin { margin: PriceSide::Base }.compute(&row).is_some());
        assert_eq!(Strategy::BaseMargin { margin: PriceSide::Lower }.compute(&row), None);
    }

    #[test]
    fn base_margin_of_one_yields_no_result() {
        let row = ProductRow {
            purchase_price: Some(Decimal::from(70)),
            vat: Some(Decimal::from(10)),
            base_margin: Some(Decimal::ONE),
            ..ProductRow::new("north", "sku-1")
        };

        assert_eq!(Strategy::BaseMargin { margin: PriceSide::Base }.compute(&row), None);
    }

    #[test]
    fn base_margin_requires_vat() {
        let row = ProductRow {
            purchase_price: Some(Decimal::from(70)),
            base_margin: Some(Decimal::new(2, 1)),
            ..ProductRow::new("north", "sku-1")
        };

        assert_eq!(Strategy::BaseMargin { margin: PriceSide::Base }.compute(&row), None);
    }

    #[test]
    fn min_price_picks_lowest_competitor() {
        let row = ProductRow {
            all_competitors: competitors(&[("a", 15), ("b", 9), ("c", 12)]),
            ..ProductRow::new("north", "sku-1")
        };

        let result = Strategy::MinPrice.compute(&row).expect("min price result");
        assert_eq!(result.price, Some(Decimal::from(9)));
        assert_eq!(result.description, "Used competitor b with the lowest price: 9.0");
    }

    #[test]
    fn min_price_breaks_ties_by_competitor_name() {
        let row = ProductRow {
            all_competitors: competitors(&[("zeta", 9), ("alpha", 9), ("mid", 11)]),
            ..ProductRow::new("north", "sku-1")
        };

        let result = Strategy::MinPrice.compute(&row).expect("min price result");
        assert!(result.description.contains("alpha"));
    }

    #[test]
    fn min_price_ignores_competitors_without_price() {
        let mut all_competitors = competitors(&[("b", 20)]);
        all_competitors.insert("a".to_string(), None);
        let row = ProductRow { all_competitors, ..ProductRow::new("north", "sku-1") };

        let result = Strategy::MinPrice.compute(&row).expect("min price result");
        assert_eq!(result.price, Some(Decimal::from(20)));

        let empty = ProductRow::new("north", "sku-2");
        assert_eq!(Strategy::MinPrice.compute(&empty), None);
    }

    #[test]
    fn competitor_strategy_looks_up_named_competitor() {
        let row = ProductRow {
            upper_competitor: Some("c".to_string()),
            base_competitor: Some("missing".to_string()),
            all_competitors: competitors(&[("a", 15), ("c", 12)]),
            ..ProductRow::new("north", "sku-1")
        };

        let upper = Strategy::Competitor { competitor: PriceSide::Upper }
            .compute(&row)
            .expect("upper competitor result");
        assert_eq!(upper.price, Some(Decimal::from(12)));
        assert_eq!(upper.description, "Used price 12.0 for selected competitor c");

        assert_eq!(Strategy::Competitor { competitor: PriceSide::Base }.compute(&row), None);
        assert_eq!(Strategy::Competitor { competitor: PriceSide::Lower }.compute(&row), None);
    }

    #[test]
    fn priority_competitors_respects_order() {
        let row = ProductRow {
            all_competitors: competitors(&[("competitor_2", 10), ("competitor_1", 12)]),
            priority_competitors: Some(vec![
                "competitor_1".to_string(),
                "competitor_2".to_string(),
            ]),
            ..ProductRow::new("north", "sku-1")
        };

        let result = Strategy::PriorityCompetitors { default_priority: Vec::new() }
            .compute(&row)
            .expect("priority result");
        assert_eq!(result.price, Some(Decimal::from(12)));
        assert!(result.description.ends_with("competitor_1"));
    }

    #[test]
    fn priority_competitors_falls_back_to_default_list() {
        let row = ProductRow {
            all_competitors: competitors(&[("competitor_3", 30), ("competitor_2", 20)]),
            ..ProductRow::new("north", "sku-1")
        };

        let result = Strategy::PriorityCompetitors { default_priority: default_priority() }
            .compute(&row)
            .expect("priority result");
        assert_eq!(result.price, Some(Decimal::from(20)));
    }

    #[test]
    fn priority_competitor_without_price_reports_absent_price() {
        let mut all_competitors = competitors(&[("competitor_2", 20)]);
        all_competitors.insert("competitor_1".to_string(), None);
        let row = ProductRow { all_competitors, ..ProductRow::new("north", "sku-1") };

        let result = Strategy::PriorityCompetitors { default_priority: default_priority() }
            .compute(&row)
            .expect("priority result");
        assert_eq!(result.price, None);
        assert!(result.description.contains("competitor_1"));
    }

    #[test]
    fn strategy_kind_parses_labels_and_aliases() {
        assert_eq!("Priority Competitors".parse(), Ok(StrategyKind::PriorityCompetitors));
        assert_eq!("base_margin".parse(), Ok(StrategyKind::BaseMargin));
        assert_eq!("MINIMUM PRICE".parse(), Ok(StrategyKind::MinPrice));
        assert_eq!("competitor".parse(), Ok(StrategyKind::Competitor));
        assert_eq!(" current-price ".parse(), Ok(StrategyKind::CurrentPrice));
        assert!("Optimizer".parse::<StrategyKind>().is_err());

        for kind in StrategyKind::ALL {
            assert_eq!(kind.label().parse(), Ok(kind));
        }
    }

    #[test]
    fn strategies_compare_by_parameters() {
        assert_eq!(
            Strategy::BaseMargin { margin: PriceSide::Lower },
            Strategy::BaseMargin { margin: PriceSide::Lower }
        );
        assert_ne!(
            Strategy::BaseMargin { margin: PriceSide::Lower },
            Strategy::BaseMargin { margin: PriceSide::Upper }
        );
        assert_eq!(
            Strategy::Competitor { competitor: PriceSide::Upper }.to_string(),
            "Competitor Price (upper_competitor)"
        );
    }
}
