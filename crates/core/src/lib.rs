pub mod config;
pub mod domain;
pub mod engine;
pub mod errors;
pub mod rounding;
pub mod strategy;

pub use config::{AppConfig, ConfigError, LoadOptions, LogFormat, PricingConfig};
pub use domain::product::{ProductId, Region};
pub use domain::row::{PriceSide, ProductRow};
pub use engine::bounds::{clip_price, ClipAdjustment};
pub use engine::lines::{LineAggregation, LineKey, LinePrices};
pub use engine::metrics::{MetricSet, MetricsReport};
pub use engine::table::{PriceColumn, PricedRow};
pub use engine::{PricingEngine, PricingRun, RunReport};
pub use errors::{InterfaceError, PricingError};
pub use rounding::{PriceRounder, RoundingError, RoundingInterval, RoundingTable};
pub use strategy::resolver::{resolve, resolve_side, Resolution};
pub use strategy::tree::{StrategyTree, StrategyTrees};
pub use strategy::{PriceResult, Strategy, StrategyKind};
