use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::product::{ProductId, Region};
use crate::domain::row::ProductRow;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateKey {
    pub region: Region,
    pub product_id: ProductId,
    pub occurrences: usize,
}

/// Lists (region, product_id) keys that appear more than once in a snapshot.
///
/// Duplicates come from upstream joins; the engine reports them and prices
/// every row anyway.
pub fn duplicate_keys(rows: &[ProductRow]) -> Vec<DuplicateKey> {
    let mut counts: BTreeMap<(&Region, &ProductId), usize> = BTreeMap::new();
    for row in rows {
        *counts.entry((&row.region, &row.product_id)).or_insert(0) += 1;
    }

    counts
        .into_iter()
        .filter(|(_, occurrences)| *occurrences > 1)
        .map(|((region, product_id), occurrences)| DuplicateKey {
            region: region.clone(),
            product_id: product_id.clone(),
            occurrences,
        })
        .collect()
}
