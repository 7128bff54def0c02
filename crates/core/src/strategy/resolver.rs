use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::row::{PriceSide, ProductRow};
use crate::strategy::tree::StrategyTree;
use crate::strategy::{PriceResult, Strategy, StrategyKind};

/// Walks `chain` in order and returns the first result that carries a price.
pub fn resolve(row: &ProductRow, chain: &[Strategy]) -> Option<PriceResult> {
    chain
        .iter()
        .filter_map(|strategy| strategy.compute(row))
        .find(|result| result.price.is_some())
}

/// How one side (base, lower or upper) of a row was priced.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Resolution {
    Resolved {
        selector: StrategyKind,
        strategy: String,
        description: String,
        price: Decimal,
    },
    /// Every strategy of the selected chain lacked its inputs.
    Exhausted { selector: StrategyKind },
    NoSelector,
    /// Selector value that does not map to a chain in the tree.
    UnknownSelector { selector: String },
}

impl Resolution {
    pub fn price(&self) -> Option<Decimal> {
        match self {
            Self::Resolved { price, .. } => Some(*price),
            Self::Exhausted { .. } | Self::NoSelector | Self::UnknownSelector { .. } => None,
        }
    }

    pub fn description(&self) -> Option<&str> {
        match self {
            Self::Resolved { description, .. } => Some(description),
            _ => None,
        }
    }

    /// Human readable account of this side, used in reason strings.
    pub fn explain(&self, side: PriceSide) -> String {
        match self {
            Self::Resolved { strategy, description, .. } => format!("{description} [{strategy}]"),
            Self::Exhausted { selector } => {
                format!("no {side} price: every fallback for `{selector}` lacked input data")
            }
            Self::NoSelector => format!("no {side} price: no {side} strategy selected"),
            Self::UnknownSelector { selector } => {
                format!("no {side} price: unknown {side} strategy `{selector}`")
            }
        }
    }
}

/// Picks the chain for the row's selector on the tree's side and resolves it.
pub fn resolve_side(row: &ProductRow, tree: &StrategyTree) -> Resolution {
    let side = tree.side();
    let Some(raw) = row.strategy_selector(side) else {
        return Resolution::NoSelector;
    };
    let Ok(selector) = raw.parse::<StrategyKind>() else {
        return Resolution::UnknownSelector { selector: raw.to_string() };
    };
    let Some(chain) = tree.chain(selector) else {
        return Resolution::UnknownSelector { selector: raw.to_string() };
    };

    match resolve(row, chain) {
        Some(PriceResult { price: Some(price), strategy, description }) => Resolution::Resolved {
            selector,
            strategy: strategy.name().to_string(),
            description,
            price,
        },
        _ => Resolution::Exhausted { selector },
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{resolve, resolve_side, Resolution};
    use crate::domain::row::{PriceSide, ProductRow};
    use crate::strategy::tree::{StrategyTree, StrategyTrees};
    use crate::strategy::{Strategy, StrategyKind};

    fn priority() -> Vec<String> {
        vec!["competitor_1".to_string(), "competitor_2".to_string()]
    }

    fn row_with_margin_and_current() -> ProductRow {
        ProductRow {
            purchase_price: Some(Decimal::from(60)),
            vat: Some(Decimal::from(12)),
            base_margin: Some(Decimal::new(1, 1)),
            current_price: Some(Decimal::from(95)),
            ..ProductRow::new("north", "sku-1")
        }
    }

    #[test]
    fn resolve_returns_first_strategy_with_a_price() {
        let row = row_with_margin_and_current();
        let chain = [
            Strategy::MinPrice,
            Strategy::BaseMargin { margin: PriceSide::Base },
            Strategy::CurrentPrice,
        ];

        let result = resolve(&row, &chain).expect("chain should resolve");
        assert_eq!(result.strategy, Strategy::BaseMargin { margin: PriceSide::Base });
        assert_eq!(result.price, Some(Decimal::from(80)));
    }

    #[test]
    fn resolve_skips_results_without_price() {
        let mut row = row_with_margin_and_current();
        row.all_competitors.insert("competitor_1".to_string(), None);
        row.all_competitors.insert("competitor_2".to_string(), Some(Decimal::from(70)));

        let chain = [
            Strategy::PriorityCompetitors { default_priority: priority() },
            Strategy::CurrentPrice,
        ];

        let result = resolve(&row, &chain).expect("chain should resolve");
        assert_eq!(result.strategy, Strategy::CurrentPrice);
    }

    #[test]
    fn exhausted_chain_yields_none() {
        let row = ProductRow::new("north", "sku-1");
        assert_eq!(resolve(&row, &[Strategy::MinPrice, Strategy::CurrentPrice]), None);
        assert_eq!(resolve(&row, &[]), None);
    }

    #[test]
    fn resolution_is_deterministic() {
        let row = ProductRow {
            base_strategy: Some("Minimum Price".to_string()),
            all_competitors: [("b", 9), ("a", 9)]
                .into_iter()
                .map(|(name, price)| (name.to_string(), Some(Decimal::from(price))))
                .collect(),
            ..ProductRow::new("north", "sku-1")
        };
        let tree = StrategyTree::standard_base(&priority());

        let first = resolve_side(&row, &tree);
        for _ in 0..10 {
            assert_eq!(resolve_side(&row, &tree), first);
        }
        assert_eq!(first.price(), Some(Decimal::from(9)));
    }

    #[test]
    fn resolve_side_reports_missing_and_unknown_selectors() {
        let trees = StrategyTrees::standard(&priority());
        let mut row = row_with_margin_and_current();

        assert_eq!(resolve_side(&row, &trees.base), Resolution::NoSelector);

        row.base_strategy = Some("Optimizer".to_string());
        assert_eq!(
            resolve_side(&row, &trees.base),
            Resolution::UnknownSelector { selector: "Optimizer".to_string() }
        );
    }

    #[test]
    fn selector_missing_from_tree_is_unknown() {
        let tree = StrategyTree::new(PriceSide::Lower)
            .with_chain(StrategyKind::CurrentPrice, vec![Strategy::CurrentPrice]);
        let row = ProductRow {
            lower_strategy: Some("Base Margin".to_string()),
            ..row_with_margin_and_current()
        };

        assert!(matches!(resolve_side(&row, &tree), Resolution::UnknownSelector { .. }));
    }

    #[test]
    fn resolve_side_uses_the_tree_side_selector() {
        let trees = StrategyTrees::standard(&priority());
        let row = ProductRow {
            base_strategy: Some("Base Margin".to_string()),
            lower_strategy: Some("Base Margin".to_string()),
            upper_strategy: Some("Current Price".to_string()),
            ..row_with_margin_and_current()
        };

        let base = resolve_side(&row, &trees.base);
        assert_eq!(base.price(), Some(Decimal::from(80)));
        assert!(base.explain(PriceSide::Base).ends_with("[Base Margin]"));

        // lower_base_margin is not set and the lower chain has no fallback.
        assert_eq!(
            resolve_side(&row, &trees.lower),
            Resolution::Exhausted { selector: StrategyKind::BaseMargin }
        );
        assert_eq!(resolve_side(&row, &trees.upper).price(), Some(Decimal::from(95)));
    }
}
