//! Snapping prices to valid price points.
//!
//! Without a rounding table prices go to the nearest integer using
//! `rust_decimal`'s default [`Decimal::round`], which rounds half to even
//! (`2.5 -> 2`, `3.5 -> 4`).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RoundingError {
    #[error("price {price} is not covered by any rounding interval")]
    DomainGap { price: Decimal },
    #[error("rounding interval [{left_bound}, {right_bound}) is empty or inverted")]
    InvalidInterval { left_bound: Decimal, right_bound: Decimal },
    #[error(
        "rounding intervals [{first_left}, {first_right}) and [{second_left}, {second_right}) overlap"
    )]
    OverlappingIntervals {
        first_left: Decimal,
        first_right: Decimal,
        second_left: Decimal,
        second_right: Decimal,
    },
    #[error("rounding table has no intervals")]
    EmptyTable,
}

/// `[left_bound, right_bound) -> rounded_price`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundingInterval {
    pub left_bound: Decimal,
    pub right_bound: Decimal,
    pub rounded_price: Decimal,
}

impl RoundingInterval {
    pub fn new(left_bound: Decimal, right_bound: Decimal, rounded_price: Decimal) -> Self {
        Self { left_bound, right_bound, rounded_price }
    }

    pub fn contains(&self, price: Decimal) -> bool {
        self.left_bound <= price && price < self.right_bound
    }
}

/// Validated, sorted set of non-overlapping rounding intervals.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoundingTable {
    intervals: Vec<RoundingInterval>,
}

impl RoundingTable {
    pub fn new(mut intervals: Vec<RoundingInterval>) -> Result<Self, RoundingError> {
        if intervals.is_empty() {
            return Err(RoundingError::EmptyTable);
        }

        let invalid =
            intervals.iter().find(|interval| interval.left_bound >= interval.right_bound);
        if let Some(invalid) = invalid {
            return Err(RoundingError::InvalidInterval {
                left_bound: invalid.left_bound,
                right_bound: invalid.right_bound,
            });
        }

        intervals.sort_by(|a, b| a.left_bound.cmp(&b.left_bound));
        for pair in intervals.windows(2) {
            if pair[1].left_bound < pair[0].right_bound {
                return Err(RoundingError::OverlappingIntervals {
                    first_left: pair[0].left_bound,
                    first_right: pair[0].right_bound,
                    second_left: pair[1].left_bound,
                    second_right: pair[1].right_bound,
                });
            }
        }

        Ok(Self { intervals })
    }

    pub fn from_json(raw: &str) -> Result<Self, RoundingTableLoadError> {
        let intervals: Vec<RoundingInterval> = serde_json::from_str(raw)?;
        Ok(Self::new(intervals)?)
    }

    pub fn intervals(&self) -> &[RoundingInterval] {
        &self.intervals
    }

    pub fn lookup(&self, price: Decimal) -> Result<Decimal, RoundingError> {
        // Sorted by left bound, so the candidate is the last interval starting at or below price.
        let index = self.intervals.partition_point(|interval| interval.left_bound <= price);
        index
            .checked_sub(1)
            .map(|candidate| &self.intervals[candidate])
            .filter(|interval| interval.contains(price))
            .map(|interval| interval.rounded_price)
            .ok_or(RoundingError::DomainGap { price })
    }
}

#[derive(Debug, Error)]
pub enum RoundingTableLoadError {
    #[error("could not parse rounding table: {0}")]
    Parse(#[from] serde_json::Error),
    #[error(transparent)]
    Invalid(#[from] RoundingError),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum PriceRounder {
    #[default]
    NearestInteger,
    Table(RoundingTable),
}

impl PriceRounder {
    /// Absent prices pass through; a price outside the table is an error.
    pub fn round_value(&self, price: Option<Decimal>) -> Result<Option<Decimal>, RoundingError> {
        let Some(price) = price else {
            return Ok(None);
        };

        match self {
            Self::NearestInteger => Ok(Some(price.round())),
            Self::Table(table) => table.lookup(price).map(Some),
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Self::NearestInteger => "nearest integer (half to even)",
            Self::Table(_) => "price rounding table",
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{PriceRounder, RoundingError, RoundingInterval, RoundingTable};

    fn dec(raw: &str) -> Decimal {
        raw.parse().expect("decimal literal")
    }

    fn table() -> RoundingTable {
        RoundingTable::new(vec![
            RoundingInterval::new(dec("100"), dec("150"), dec("149")),
            RoundingInterval::new(dec("0"), dec("100"), dec("99")),
            RoundingInterval::new(dec("150"), dec("1000"), dec("199")),
        ])
        .expect("valid table")
    }

    #[test]
    fn nearest_integer_rounds_half_to_even() {
        let rounder = PriceRounder::NearestInteger;
        assert_eq!(rounder.round_value(Some(dec("2.5"))), Ok(Some(dec("2"))));
        assert_eq!(rounder.round_value(Some(dec("3.5"))), Ok(Some(dec("4"))));
        assert_eq!(rounder.round_value(Some(dec("104.49"))), Ok(Some(dec("104"))));
        assert_eq!(rounder.round_value(None), Ok(None));
    }

    #[test]
    fn table_lookup_uses_half_open_intervals() {
        let rounder = PriceRounder::Table(table());
        assert_eq!(rounder.round_value(Some(dec("99.99"))), Ok(Some(dec("99"))));
        assert_eq!(rounder.round_value(Some(dec("100"))), Ok(Some(dec("149"))));
        assert_eq!(rounder.round_value(Some(dec("0"))), Ok(Some(dec("99"))));
        assert_eq!(rounder.round_value(None), Ok(None));
    }

    #[test]
    fn value_outside_table_is_an_error() {
        let rounder = PriceRounder::Table(table());
        assert_eq!(
            rounder.round_value(Some(dec("1000"))),
            Err(RoundingError::DomainGap { price: dec("1000") })
        );
        assert!(rounder.round_value(Some(dec("-1"))).is_err());
    }

    #[test]
    fn rounding_is_idempotent_on_its_output() {
        let rounder = PriceRounder::NearestInteger;
        for raw in ["0.4", "17.5", "18.5", "99.51", "1234.0001"] {
            let once = rounder.round_value(Some(dec(raw))).expect("rounded");
            assert_eq!(rounder.round_value(once), Ok(once));
        }

        let table = PriceRounder::Table(table());
        for raw in ["12", "120", "640"] {
            let once = table.round_value(Some(dec(raw))).expect("rounded");
            assert_eq!(table.round_value(once), Ok(once));
        }
    }

    #[test]
    fn table_rejects_overlaps_and_inverted_intervals() {
        let overlapping = RoundingTable::new(vec![
            RoundingInterval::new(dec("0"), dec("100"), dec("99")),
            RoundingInterval::new(dec("90"), dec("200"), dec("199")),
        ]);
        assert!(matches!(overlapping, Err(RoundingError::OverlappingIntervals { .. })));

        let inverted =
            RoundingTable::new(vec![RoundingInterval::new(dec("10"), dec("10"), dec("10"))]);
        assert!(matches!(inverted, Err(RoundingError::InvalidInterval { .. })));

        assert_eq!(RoundingTable::new(Vec::new()), Err(RoundingError::EmptyTable));
    }

    #[test]
    fn table_loads_from_json() {
        let table = RoundingTable::from_json(
            r#"[{"left_bound": 0, "right_bound": 10, "rounded_price": 9},
                {"left_bound": 10, "right_bound": "20", "rounded_price": "19"}]"#,
        )
        .expect("table should load");

        assert_eq!(table.intervals().len(), 2);
        assert_eq!(table.lookup(dec("15")), Ok(dec("19")));
    }
}
