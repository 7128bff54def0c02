use std::collections::BTreeMap;

use crate::domain::row::PriceSide;
use crate::strategy::{Strategy, StrategyKind};

/// Fallback chains keyed by selector, most preferred strategy first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StrategyTree {
    side: PriceSide,
    chains: BTreeMap<StrategyKind, Vec<Strategy>>,
}

impl StrategyTree {
    pub fn new(side: PriceSide) -> Self {
        Self { side, chains: BTreeMap::new() }
    }

    pub fn with_chain(mut self, kind: StrategyKind, chain: Vec<Strategy>) -> Self {
        self.chains.insert(kind, chain);
        self
    }

    pub fn side(&self) -> PriceSide {
        self.side
    }

    pub fn chain(&self, kind: StrategyKind) -> Option<&[Strategy]> {
        self.chains.get(&kind).map(Vec::as_slice)
    }

    pub fn kinds(&self) -> impl Iterator<Item = StrategyKind> + '_ {
        self.chains.keys().copied()
    }

    /// The base tree: each selector falls back to base margin, then the current price.
    pub fn standard_base(default_priority: &[String]) -> Self {
        let base_margin = Strategy::BaseMargin { margin: PriceSide::Base };
        let priority =
            Strategy::PriorityCompetitors { default_priority: default_priority.to_vec() };

        Self::new(PriceSide::Base)
            .with_chain(
                StrategyKind::PriorityCompetitors,
                vec![priority, base_margin.clone(), Strategy::CurrentPrice],
            )
            .with_chain(
                StrategyKind::Competitor,
                vec![
                    Strategy::Competitor { competitor: PriceSide::Base },
                    base_margin.clone(),
                    Strategy::CurrentPrice,
                ],
            )
            .with_chain(
                StrategyKind::MinPrice,
                vec![Strategy::MinPrice, base_margin.clone(), Strategy::CurrentPrice],
            )
            .with_chain(StrategyKind::BaseMargin, vec![base_margin, Strategy::CurrentPrice])
            .with_chain(StrategyKind::CurrentPrice, vec![Strategy::CurrentPrice])
    }

    /// A bound tree: one strategy per selector, reading the bound's own columns.
    pub fn standard_bound(side: PriceSide, default_priority: &[String]) -> Self {
        Self::new(side)
            .with_chain(
                StrategyKind::PriorityCompetitors,
                vec![Strategy::PriorityCompetitors { default_priority: default_priority.to_vec() }],
            )
            .with_chain(StrategyKind::Competitor, vec![Strategy::Competitor { competitor: side }])
            .with_chain(StrategyKind::MinPrice, vec![Strategy::MinPrice])
            .with_chain(StrategyKind::BaseMargin, vec![Strategy::BaseMargin { margin: side }])
            .with_chain(StrategyKind::CurrentPrice, vec![Strategy::CurrentPrice])
    }
}

/// The three trees used for one run. Built once, then only read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StrategyTrees {
    pub base: StrategyTree,
    pub lower: StrategyTree,
    pub upper: StrategyTree,
}

impl StrategyTrees {
    pub fn standard(default_priority: &[String]) -> Self {
        Self {
            base: StrategyTree::standard_base(default_priority),
            lower: StrategyTree::standard_bound(PriceSide::Lower, default_priority),
            upper: StrategyTree::standard_bound(PriceSide::Upper, default_priority),
        }
    }

    pub fn for_side(&self, side: PriceSide) -> &StrategyTree {
        match side {
            PriceSide::Base => &self.base,
            PriceSide::Lower => &self.lower,
            PriceSide::Upper => &self.upper,
        }
    }
}
