use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Headline numbers for the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DashboardStats {
    pub total_income: Decimal,
    pub total_expenses: Decimal,
    pub net_balance: Decimal,
    /// Total expenses as a percentage of the total budgeted amount, 1 decimal place.
    /// Zero when nothing is budgeted.
    pub budget_utilization: Decimal,
}

/// A transaction as listed in the "recent activity" widget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RecentTransaction {
    pub id: i32,
    pub amount: Decimal,
    /// "income" or "expense"
    pub kind: String,
    /// Category name, "Uncategorized" when none
    pub category: String,
    pub date: NaiveDate,
    pub description: String,
}

/// Progress of one budget, as shown in the dashboard list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BudgetStatusEntry {
    pub id: i32,
    pub category: String,
    pub budget_amount: Decimal,
    pub spent_amount: Decimal,
    /// Percentage used, 1 decimal place
    pub percentage: Decimal,
}

/// Detailed status of a single budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BudgetStatusDetail {
    pub budget_amount: Decimal,
    pub spent_amount: Decimal,
    /// Negative once the budget is exceeded
    pub remaining_amount: Decimal,
    /// Percentage used, 2 decimal places
    pub percentage_used: Decimal,
    pub is_exceeded: bool,
}
