//! Budget usage arithmetic.
//!
//! A budget's `spent` amount is always re-aggregated from the transaction table,
//! never kept as a running total. Everything else here is pure arithmetic on
//! top of that sum.

use chrono::NaiveDate;
use model::entities::{budget, transaction, TransactionKind};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use tracing::{instrument, trace};

use crate::amount::{checked_percentage, checked_sum};
use crate::error::{ComputeError, Result};

/// Usage percentage from which a budget counts as nearly spent.
pub const WARNING_THRESHOLD_PERCENT: Decimal = Decimal::from_parts(80, 0, 0, false, 0);

/// `spent / amount * 100`, or zero when the budget amount is not positive.
pub fn percentage_used(spent: Decimal, amount: Decimal) -> Result<Decimal> {
    checked_percentage(spent, amount)
}

/// Classification of a budget against its spending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetStatus {
    OnTrack,
    Warning,
    Exceeded,
}

/// How much of a budget has been used.
#[derive(Debug, Clone, PartialEq)]
pub struct BudgetUsage {
    pub budget_id: i32,
    pub amount: Decimal,
    pub spent: Decimal,
    pub percentage_used: Decimal,
}

impl BudgetUsage {
    /// Fails when the percentage overflows, e.g. for a tiny budget amount.
    pub fn new(budget: &budget::Model, spent: Decimal) -> Result<Self> {
        Ok(Self {
            budget_id: budget.id,
            amount: budget.amount,
            spent,
            percentage_used: percentage_used(spent, budget.amount)?,
        })
    }

    /// Remaining amount. Negative once the budget is exceeded.
    pub fn remaining(&self) -> Result<Decimal> {
        self.amount.checked_sub(self.spent).ok_or_else(|| {
            ComputeError::Budget(format!("Remaining amount of budget {} overflowed", self.budget_id))
        })
    }

    pub fn is_exceeded(&self) -> bool {
        self.spent > self.amount
    }

    /// Exceeded wins over the warning threshold.
    pub fn status(&self) -> BudgetStatus {
        if self.is_exceeded() {
            BudgetStatus::Exceeded
        } else if self.percentage_used >= WARNING_THRESHOLD_PERCENT {
            BudgetStatus::Warning
        } else {
            BudgetStatus::OnTrack
        }
    }
}

/// Sum of the user's expenses in a category between two dates, both inclusive.
#[instrument(skip(db))]
pub async fn spent_in_period<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
    category_id: i32,
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> Result<Decimal> {
    let rows = transaction::Entity::find()
        .filter(transaction::Column::UserId.eq(user_id))
        .filter(transaction::Column::CategoryId.eq(category_id))
        .filter(transaction::Column::Kind.eq(TransactionKind::Expense))
        .filter(transaction::Column::Date.gte(start_date))
        .filter(transaction::Column::Date.lte(end_date))
        .all(db)
        .await?;

    let spent = checked_sum(rows.iter().map(|t| t.amount))?;
    trace!(count = rows.len(), %spent, "Aggregated expenses for budget period");
    Ok(spent)
}

/// Computes the usage of a stored budget.
pub async fn usage_for<C: ConnectionTrait>(db: &C, budget: &budget::Model) -> Result<BudgetUsage> {
    let spent = spent_in_period(
        db,
        budget.user_id,
        budget.category_id,
        budget.start_date,
        budget.end_date,
    )
    .await?;
    BudgetUsage::new(budget, spent)
}
