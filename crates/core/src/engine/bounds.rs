use rayon::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::row::PriceSide;
use crate::engine::table::PricedRow;
use crate::strategy::resolver::resolve_side;
use crate::strategy::tree::StrategyTrees;

/// Records that clipping moved the base price onto a bound.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipAdjustment {
    /// The bound that decided the final value.
    pub bound: PriceSide,
    pub from: Decimal,
    pub to: Decimal,
    /// Lower bound was above the upper bound.
    pub inverted_bounds: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClipOutcome {
    pub price: Option<Decimal>,
    pub adjustment: Option<ClipAdjustment>,
}

/// `min(max(base, lower), upper)` with absent bounds imposing nothing.
///
/// An absent base stays absent. When `lower > upper` the upper bound is
/// applied last and decides the result.
pub fn clip_price(
    base: Option<Decimal>,
    lower: Option<Decimal>,
    upper: Option<Decimal>,
) -> ClipOutcome {
    let Some(base) = base else {
        return ClipOutcome { price: None, adjustment: None };
    };

    let floored = lower.map_or(base, |lower| base.max(lower));
    let clipped = upper.map_or(floored, |upper| floored.min(upper));

    let adjustment = (clipped != base).then(|| ClipAdjustment {
        bound: if clipped != floored { PriceSide::Upper } else { PriceSide::Lower },
        from: base,
        to: clipped,
        inverted_bounds: matches!((lower, upper), (Some(lower), Some(upper)) if lower > upper),
    });

    ClipOutcome { price: Some(clipped), adjustment }
}

/// Resolves base, lower and upper candidates for every row.
///
/// Rows are independent, so with `parallel` they are resolved on the rayon pool.
pub fn compute_individual_prices(
    mut rows: Vec<PricedRow>,
    trees: &StrategyTrees,
    parallel: bool,
) -> Vec<PricedRow> {
    let resolve_row = |priced: &mut PricedRow| {
        for side in PriceSide::ALL {
            let resolution = resolve_side(&priced.row, trees.for_side(side));
            priced.set_resolution(side, resolution);
        }
    };

    if parallel {
        rows.par_iter_mut().for_each(resolve_row);
    } else {
        rows.iter_mut().for_each(resolve_row);
    }

    rows
}

/// Clips every base price into its band and records `price_after_clip`.
pub fn clip_prices(mut rows: Vec<PricedRow>) -> Vec<PricedRow> {
    for priced in &mut rows {
        let outcome =
            clip_price(priced.new_price_base, priced.new_price_lower, priced.new_price_upper);
        priced.new_price_final = outcome.price;
        priced.price_after_clip = outcome.price;
        priced.clip_adjustment = outcome.adjustment;
    }
    rows
}
