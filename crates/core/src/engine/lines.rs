//! Line price harmonization: every product of a merchandising line in a
//! region carries the line's maximum price.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::product::Region;
use crate::engine::table::{PriceColumn, PricedRow};

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LineKey {
    pub region: Region,
    pub line: String,
}

impl LineKey {
    pub fn of(priced: &PricedRow) -> Option<Self> {
        let line = priced.row.line.as_deref().map(str::trim).filter(|line| !line.is_empty())?;
        Some(Self { region: priced.row.region.clone(), line: line.to_string() })
    }
}

/// Aggregated price per line; `None` when the aggregation criteria were not met.
pub type LinePrices = BTreeMap<LineKey, Option<Decimal>>;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineAggregation {
    /// Max over the members that have a price.
    #[default]
    Lenient,
    /// Max only when every member has a price.
    Strict,
}

impl LineAggregation {
    pub fn from_only_where_existed(only_where_existed: bool) -> Self {
        if only_where_existed {
            Self::Strict
        } else {
            Self::Lenient
        }
    }
}

/// Records that a line price replaced the row's own price.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineAdjustment {
    pub line: String,
    pub previous: Option<Decimal>,
    pub line_price: Decimal,
}

/// Phase one: the maximum of `column` per (region, line).
pub fn determine_line_prices(
    rows: &[PricedRow],
    column: PriceColumn,
    mode: LineAggregation,
) -> LinePrices {
    let mut members: BTreeMap<LineKey, Vec<Option<Decimal>>> = BTreeMap::new();
    for priced in rows {
        if let Some(key) = LineKey::of(priced) {
            members.entry(key).or_default().push(priced.price(column));
        }
    }

    members
        .into_iter()
        .map(|(key, prices)| {
            let complete = prices.iter().all(Option::is_some);
            let max = prices.into_iter().flatten().max();
            let line_price = match mode {
                LineAggregation::Strict if !complete => None,
                _ => max,
            };
            (key, line_price)
        })
        .collect()
}

/// Phase two: overwrite `column` with the line price wherever one exists.
pub fn assign_line_prices(
    mut rows: Vec<PricedRow>,
    column: PriceColumn,
    line_prices: &LinePrices,
) -> Vec<PricedRow> {
    for priced in &mut rows {
        let Some(key) = LineKey::of(priced) else {
            continue;
        };
        let Some(Some(line_price)) = line_prices.get(&key) else {
            continue;
        };

        let previous = priced.price(column);
        if previous != Some(*line_price) {
            priced.line_adjustment =
                Some(LineAdjustment { line: key.line, previous, line_price: *line_price });
            priced.set_price(column, Some(*line_price));
        }
    }
    rows
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{
        assign_line_prices, determine_line_prices, LineAggregation, LineKey, LinePrices,
    };
    use crate::domain::product::Region;
    use crate::domain::row::ProductRow;
    use crate::engine::table::{PriceColumn, PricedRow};

    fn priced(region: &str, product: &str, line: Option<&str>, price: Option<i64>) -> PricedRow {
        let mut priced = PricedRow::from(ProductRow {
            line: line.map(str::to_string),
            ..ProductRow::new(region, product)
        });
        priced.new_price_final = price.map(Decimal::from);
        priced
    }

    fn line_group() -> Vec<PricedRow> {
        vec![
            priced("north", "a", Some("L1"), Some(100)),
            priced("north", "b", Some("L1"), None),
            priced("north", "c", Some("L1"), Some(120)),
        ]
    }

    fn key(region: &str, line: &str) -> LineKey {
        LineKey { region: Region(region.to_string()), line: line.to_string() }
    }

    fn finals(rows: &[PricedRow]) -> Vec<Option<Decimal>> {
        rows.iter().map(|row| row.new_price_final).collect()
    }

    #[test]
    fn lenient_mode_broadcasts_max_to_every_member() {
        let rows = line_group();
        let prices =
            determine_line_prices(&rows, PriceColumn::NewPriceFinal, LineAggregation::Lenient);
        assert_eq!(prices.get(&key("north", "L1")), Some(&Some(Decimal::from(120))));

        let rows = assign_line_prices(rows, PriceColumn::NewPriceFinal, &prices);
        assert_eq!(finals(&rows), vec![Some(Decimal::from(120)); 3]);
        let previous: Vec<_> =
            rows.iter().map(|row| row.line_adjustment.as_ref().map(|a| a.previous)).collect();
        assert_eq!(previous, vec![Some(Some(Decimal::from(100))), Some(None), None]);
    }

    #[test]
    fn strict_mode_requires_every_member_priced() {
        let rows = line_group();
        let prices =
            determine_line_prices(&rows, PriceColumn::NewPriceFinal, LineAggregation::Strict);
        assert_eq!(prices.get(&key("north", "L1")), Some(&None));

        let rows = assign_line_prices(rows, PriceColumn::NewPriceFinal, &prices);
        assert_eq!(
            finals(&rows),
            vec![Some(Decimal::from(100)), None, Some(Decimal::from(120))]
        );
        assert!(rows.iter().all(|row| row.line_adjustment.is_none()));
    }

    #[test]
    fn lines_are_scoped_by_region() {
        let rows = vec![
            priced("north", "a", Some("L1"), Some(100)),
            priced("south", "a", Some("L1"), Some(80)),
            priced("south", "b", Some("L1"), Some(90)),
        ];
        let prices =
            determine_line_prices(&rows, PriceColumn::NewPriceFinal, LineAggregation::Lenient);
        let rows = assign_line_prices(rows, PriceColumn::NewPriceFinal, &prices);

        assert_eq!(
            finals(&rows),
            vec![Some(Decimal::from(100)), Some(Decimal::from(90)), Some(Decimal::from(90))]
        );
    }

    #[test]
    fn rows_without_line_or_line_price_keep_their_price() {
        let rows = vec![
            priced("north", "a", None, Some(10)),
            priced("north", "b", Some("  "), Some(20)),
            priced("north", "c", Some("L9"), Some(30)),
            priced("north", "d", Some("L2"), None),
        ];
        let mut prices =
            determine_line_prices(&rows, PriceColumn::NewPriceFinal, LineAggregation::Lenient);
        assert_eq!(prices.len(), 2);
        assert_eq!(prices.get(&key("north", "L2")), Some(&None));

        prices.remove(&key("north", "L9"));
        let rows = assign_line_prices(rows, PriceColumn::NewPriceFinal, &prices);
        assert_eq!(
            finals(&rows),
            vec![Some(Decimal::from(10)), Some(Decimal::from(20)), Some(Decimal::from(30)), None]
        );
    }

    #[test]
    fn empty_line_price_map_changes_nothing() {
        let rows = line_group();
        let expected = finals(&rows);
        let rows = assign_line_prices(rows, PriceColumn::NewPriceFinal, &LinePrices::new());
        assert_eq!(finals(&rows), expected);
    }
}
