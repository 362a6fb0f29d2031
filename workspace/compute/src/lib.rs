//! Budget evaluation and read-only aggregations for the finance tracker.

pub mod amount;
pub mod budget;
pub mod categories;
pub mod dashboard;
pub mod error;
pub mod evaluator;
pub mod filter;
pub mod notify;
pub mod report;

#[cfg(test)]
pub(crate) mod testing;

use rust_decimal::{Decimal, RoundingStrategy};

/// Label used wherever a transaction has no category.
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Rounds a percentage for display, halves away from zero.
pub fn round_percentage(value: Decimal, dp: u32) -> Decimal {
    value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero)
}
