//! Report aggregation over a date range and CSV export.

use std::collections::BTreeMap;

use chrono::{Datelike, Duration, Months, NaiveDate};
use common::{
    CategoryBreakdownEntry, DateRange, MonthlyBreakdown, MonthlyTrend, ReportData,
    TransactionSummary,
};
use model::entities::{category, transaction, TransactionKind};
use rust_decimal::Decimal;
use sea_orm::{DatabaseConnection, QueryOrder};
use tracing::{debug, instrument};

use crate::amount::{checked_add, checked_percentage};
use crate::dashboard::totals;
use crate::error::{ComputeError, Result};
use crate::filter::TransactionFilter;
use crate::{round_percentage, UNCATEGORIZED};

/// Days covered by a report when no start date is given.
pub const DEFAULT_REPORT_DAYS: i64 = 90;
/// Calendar months in the trend series.
pub const TREND_MONTHS: u32 = 6;

pub const CSV_HEADER: [&str; 5] = ["Date", "Description", "Category", "Type", "Amount"];

/// Fills in the default report range: the last 90 days up to `today`.
pub fn resolve_range(
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    today: NaiveDate,
) -> DateRange {
    DateRange::new(
        start_date.unwrap_or(today - Duration::days(DEFAULT_REPORT_DAYS)),
        end_date.unwrap_or(today),
    )
}

/// First day of the month containing `date`.
fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// The `count` calendar months ending with the month of `today`, oldest first,
/// as (first day, last day) pairs.
pub fn trailing_months(today: NaiveDate, count: u32) -> Vec<(NaiveDate, NaiveDate)> {
    let current = month_start(today);
    (0..count)
        .rev()
        .filter_map(|back| {
            let start = current.checked_sub_months(Months::new(back))?;
            let end = start.checked_add_months(Months::new(1))? - Duration::days(1);
            Some((start, end))
        })
        .collect()
}

#[derive(Debug, Default)]
pub struct ReportComputer;

impl ReportComputer {
    pub fn new() -> Self {
        Self
    }

    /// Totals, category breakdown and monthly trend for a date range.
    ///
    /// The trend always spans the six calendar months ending with `today`'s month
    /// but only counts transactions inside `range`.
    #[instrument(skip(self, db))]
    pub async fn report_data(
        &self,
        db: &DatabaseConnection,
        user_id: i32,
        range: DateRange,
        today: NaiveDate,
    ) -> Result<ReportData> {
        let transactions = TransactionFilter::between(Some(range.start_date), Some(range.end_date))
            .select(user_id)
            .all(db)
            .await?;
        let (total_income, total_expenses) = totals(&transactions)?;
        debug!(count = transactions.len(), "Loaded transactions for report");

        let categories = category::Entity::find_for_user(db, user_id).await?;
        let mut per_category: BTreeMap<i32, Decimal> = BTreeMap::new();
        for tx in &transactions {
            if let Some(category_id) = tx.category_id {
                let entry = per_category.entry(category_id).or_insert(Decimal::ZERO);
                *entry = checked_add(*entry, tx.amount)?;
            }
        }

        let mut category_breakdown = Vec::new();
        for category in &categories {
            let amount = per_category.get(&category.id).copied().unwrap_or_default();
            if amount <= Decimal::ZERO {
                continue;
            }
            let total_for_kind = match category.kind {
                TransactionKind::Income => total_income,
                TransactionKind::Expense => total_expenses,
            };
            category_breakdown.push(CategoryBreakdownEntry {
                category: category.name.clone(),
                amount,
                percentage: round_percentage(checked_percentage(amount, total_for_kind)?, 1),
                kind: category.kind.to_string(),
            });
        }

        let monthly_trends = trailing_months(today, TREND_MONTHS)
            .into_iter()
            .map(|(start, end)| -> Result<MonthlyTrend> {
                let in_month: Vec<transaction::Model> = transactions
                    .iter()
                    .filter(|tx| start <= tx.date && tx.date <= end)
                    .cloned()
                    .collect();
                let (income, expenses) = totals(&in_month)?;
                Ok(MonthlyTrend {
                    month: start.format("%b %Y").to_string(),
                    income,
                    expenses,
                    net: income - expenses,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(ReportData {
            range,
            total_income,
            total_expenses,
            net_balance: total_income - total_expenses,
            category_breakdown,
            monthly_trends,
        })
    }

    /// Totals and a per-month breakdown of the filtered transactions.
    #[instrument(skip(self, db))]
    pub async fn transaction_summary(
        &self,
        db: &DatabaseConnection,
        user_id: i32,
        filter: &TransactionFilter,
    ) -> Result<TransactionSummary> {
        let transactions = filter.select(user_id).all(db).await?;
        let (total_income, total_expenses) = totals(&transactions)?;

        let mut months: BTreeMap<(i32, u32), (Decimal, Decimal)> = BTreeMap::new();
        for tx in &transactions {
            let entry = months
                .entry((tx.date.year(), tx.date.month()))
                .or_insert((Decimal::ZERO, Decimal::ZERO));
            match tx.kind {
                TransactionKind::Income => entry.0 = checked_add(entry.0, tx.amount)?,
                TransactionKind::Expense => entry.1 = checked_add(entry.1, tx.amount)?,
            }
        }

        Ok(TransactionSummary {
            total_income,
            total_expenses,
            net_balance: total_income - total_expenses,
            monthly_breakdown: months
                .into_iter()
                .map(|((year, month), (income, expenses))| MonthlyBreakdown {
                    month: format!("{:04}-{:02}", year, month),
                    income,
                    expenses,
                })
                .collect(),
        })
    }

    /// CSV document of the user's transactions, newest first.
    #[instrument(skip(self, db))]
    pub async fn export_csv(
        &self,
        db: &DatabaseConnection,
        user_id: i32,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<String> {
        let rows = TransactionFilter::between(start_date, end_date)
            .select(user_id)
            .order_by_desc(transaction::Column::Date)
            .order_by_desc(transaction::Column::Id)
            .find_also_related(category::Entity)
            .all(db)
            .await?;

        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(CSV_HEADER)?;
        for (tx, category) in &rows {
            writer.write_record([
                tx.date.format("%Y-%m-%d").to_string(),
                tx.description.clone(),
                category
                    .as_ref()
                    .map(|c| c.name.clone())
                    .unwrap_or_else(|| UNCATEGORIZED.to_string()),
                tx.kind.to_string(),
                format!("{:.2}", tx.amount),
            ])?;
        }
        debug!(rows = rows.len(), "Exported transactions to CSV");

        let bytes = writer
            .into_inner()
            .map_err(|e| ComputeError::Csv(e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| ComputeError::Csv(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{new_category, new_transaction, new_user, setup_db};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn dec(value: &str) -> Decimal {
        value.parse().unwrap()
    }

    #[test]
    fn test_resolve_range_defaults() {
        let today = date(2024, 6, 30);
        let range = resolve_range(None, None, today);
        assert_eq!(range.start_date, date(2024, 4, 1));
        assert_eq!(range.end_date, today);

        let explicit = resolve_range(Some(date(2024, 1, 1)), None, today);
        assert_eq!(explicit.start_date, date(2024, 1, 1));
    }

    #[test]
    fn test_trailing_months_cross_year() {
        let months = trailing_months(date(2024, 2, 15), 6);
        assert_eq!(months.len(), 6);
        assert_eq!(months[0], (date(2023, 9, 1), date(2023, 9, 30)));
        assert_eq!(months[4], (date(2024, 1, 1), date(2024, 1, 31)));
        assert_eq!(months[5], (date(2024, 2, 1), date(2024, 2, 29)));
    }

    #[tokio::test]
    async fn test_report_data() {
        let db = setup_db().await;
        let user = new_user(&db, "reporter").await.unwrap();
        let food = new_category(&db, &user, "Food", TransactionKind::Expense).await.unwrap();
        let rent = new_category(&db, &user, "Rent", TransactionKind::Expense).await.unwrap();
        let salary = new_category(&db, &user, "Salary", TransactionKind::Income).await.unwrap();
        new_category(&db, &user, "Unused", TransactionKind::Expense).await.unwrap();

        new_transaction(&db, &user, Some(&salary), "3000", TransactionKind::Income, date(2024, 5, 1)).await.unwrap();
        new_transaction(&db, &user, Some(&rent), "1000", TransactionKind::Expense, date(2024, 5, 2)).await.unwrap();
        new_transaction(&db, &user, Some(&food), "200", TransactionKind::Expense, date(2024, 6, 3)).await.unwrap();
        new_transaction(&db, &user, None, "50", TransactionKind::Expense, date(2024, 6, 4)).await.unwrap();
        // Outside the range
        new_transaction(&db, &user, Some(&food), "999", TransactionKind::Expense, date(2023, 12, 1)).await.unwrap();

        let today = date(2024, 6, 15);
        let range = DateRange::new(date(2024, 1, 1), today);
        let report = ReportComputer::new()
            .report_data(&db, user.id, range, today)
            .await
            .unwrap();

        assert_eq!(report.total_income, dec("3000"));
        assert_eq!(report.total_expenses, dec("1250"));
        assert_eq!(report.net_balance, dec("1750"));

        let names: Vec<_> = report.category_breakdown.iter().map(|c| c.category.as_str()).collect();
        assert_eq!(names, vec!["Food", "Rent", "Salary"]);
        assert_eq!(report.category_breakdown[0].percentage, dec("16"));
        assert_eq!(report.category_breakdown[1].percentage, dec("80"));
        assert_eq!(report.category_breakdown[2].percentage, dec("100"));

        assert_eq!(report.monthly_trends.len(), 6);
        assert_eq!(report.monthly_trends[0].month, "Jan 2024");
        let may = &report.monthly_trends[4];
        assert_eq!(may.month, "May 2024");
        assert_eq!(may.income, dec("3000"));
        assert_eq!(may.net, dec("2000"));
        assert_eq!(report.monthly_trends[5].expenses, dec("250"));
    }

    #[tokio::test]
    async fn test_transaction_summary() {
        let db = setup_db().await;
        let user = new_user(&db, "summary").await.unwrap();
        new_transaction(&db, &user, None, "100", TransactionKind::Income, date(2024, 2, 1)).await.unwrap();
        new_transaction(&db, &user, None, "40", TransactionKind::Expense, date(2024, 1, 9)).await.unwrap();
        new_transaction(&db, &user, None, "10", TransactionKind::Expense, date(2024, 2, 9)).await.unwrap();

        let summary = ReportComputer::new()
            .transaction_summary(&db, user.id, &TransactionFilter::default())
            .await
            .unwrap();

        assert_eq!(summary.net_balance, dec("50"));
        assert_eq!(summary.monthly_breakdown.len(), 2);
        assert_eq!(summary.monthly_breakdown[0].month, "2024-01");
        assert_eq!(summary.monthly_breakdown[0].expenses, dec("40"));
        assert_eq!(summary.monthly_breakdown[1].income, dec("100"));
    }

    #[tokio::test]
    async fn test_export_csv() {
        let db = setup_db().await;
        let user = new_user(&db, "exporter").await.unwrap();
        let food = new_category(&db, &user, "Food", TransactionKind::Expense).await.unwrap();
        new_transaction(&db, &user, Some(&food), "12.5", TransactionKind::Expense, date(2024, 1, 1)).await.unwrap();
        new_transaction(&db, &user, None, "100", TransactionKind::Income, date(2024, 1, 3)).await.unwrap();
        new_transaction(&db, &user, None, "1", TransactionKind::Income, date(2024, 2, 3)).await.unwrap();

        let csv = ReportComputer::new()
            .export_csv(&db, user.id, None, Some(date(2024, 1, 31)))
            .await
            .unwrap();
        let lines: Vec<_> = csv.lines().collect();

        assert_eq!(lines[0], "Date,Description,Category,Type,Amount");
        assert_eq!(lines[1], "2024-01-03,income on 2024-01-03,Uncategorized,income,100.00");
        assert_eq!(lines[2], "2024-01-01,expense on 2024-01-01,Food,expense,12.50");
        assert_eq!(lines.len(), 3);
    }
}
