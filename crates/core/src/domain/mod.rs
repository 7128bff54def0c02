pub mod product;
pub mod row;
pub mod snapshot;
