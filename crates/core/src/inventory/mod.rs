//! Inventory cost accounting.

mod cost;
#[cfg(test)]
mod props;

pub use cost::weighted_average_cost;
