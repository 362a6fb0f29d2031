//! Common transport-layer types shared between the compute layer and the HTTP handlers.
//! The aggregation code in `compute` produces these structs directly, so the handlers
//! can serialize them without re-shaping.

mod dashboard;
mod report;

pub use dashboard::{BudgetStatusDetail, BudgetStatusEntry, DashboardStats, RecentTransaction};
pub use report::{
    CategoryBreakdownEntry, CategoryStatistic, MonthlyBreakdown, MonthlyTrend, ReportData,
    TransactionSummary,
};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Generic API response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    /// Response data
    pub data: T,
    /// Response message
    pub message: String,
    /// Success flag
    pub success: bool,
}

/// Inclusive date range used to scope aggregations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct DateRange {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl DateRange {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            start_date,
            end_date,
        }
    }

    /// Whether the date falls inside the range, boundaries included.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }
}
