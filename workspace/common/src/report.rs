use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::DateRange;

/// Amount spent or earned in one category over the report range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CategoryBreakdownEntry {
    pub category: String,
    pub amount: Decimal,
    /// Share of the total for the category's kind, 1 decimal place
    pub percentage: Decimal,
    /// "income" or "expense"
    pub kind: String,
}

/// Income and expenses of one calendar month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MonthlyTrend {
    /// Label such as "Jan 2024"
    pub month: String,
    pub income: Decimal,
    pub expenses: Decimal,
    pub net: Decimal,
}

/// Payload of the reports page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ReportData {
    pub range: DateRange,
    pub total_income: Decimal,
    pub total_expenses: Decimal,
    pub net_balance: Decimal,
    pub category_breakdown: Vec<CategoryBreakdownEntry>,
    /// Six calendar months, oldest first
    pub monthly_trends: Vec<MonthlyTrend>,
}

/// One month of a transaction summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MonthlyBreakdown {
    /// Month key in `YYYY-MM` form
    pub month: String,
    pub income: Decimal,
    pub expenses: Decimal,
}

/// Totals over a filtered set of transactions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TransactionSummary {
    pub total_income: Decimal,
    pub total_expenses: Decimal,
    pub net_balance: Decimal,
    pub monthly_breakdown: Vec<MonthlyBreakdown>,
}

/// Totals per category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CategoryStatistic {
    pub category_id: i32,
    pub category_name: String,
    pub kind: String,
    pub total_amount: Decimal,
    pub transaction_count: u64,
}
