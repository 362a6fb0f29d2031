use common::{BudgetStatusEntry, DashboardStats, RecentTransaction};
use model::entities::{budget, category, transaction, TransactionKind};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect};
use tracing::{debug, instrument};

use crate::amount::{checked_add, checked_sum};
use crate::budget::{percentage_used, usage_for};
use crate::error::Result;
use crate::{round_percentage, UNCATEGORIZED};

/// Number of entries in the "recent transactions" list.
pub const RECENT_TRANSACTIONS_LIMIT: u64 = 5;

/// Read-only aggregates shown on the dashboard.
#[derive(Debug, Default)]
pub struct DashboardComputer;

impl DashboardComputer {
    pub fn new() -> Self {
        Self
    }

    /// All-time totals of the user and budget utilization.
    ///
    /// Utilization relates every expense to the sum of all budget amounts.
    #[instrument(skip(self, db))]
    pub async fn stats(&self, db: &DatabaseConnection, user_id: i32) -> Result<DashboardStats> {
        let transactions = transaction::Entity::find()
            .filter(transaction::Column::UserId.eq(user_id))
            .all(db)
            .await?;
        let (total_income, total_expenses) = totals(&transactions)?;

        let budgets = budget::Entity::find()
            .filter(budget::Column::UserId.eq(user_id))
            .all(db)
            .await?;
        let total_budget = checked_sum(budgets.iter().map(|b| b.amount))?;

        debug!(%total_income, %total_expenses, %total_budget, "Dashboard totals computed");

        Ok(DashboardStats {
            total_income,
            total_expenses,
            net_balance: total_income - total_expenses,
            budget_utilization: round_percentage(percentage_used(total_expenses, total_budget)?, 1),
        })
    }

    /// Latest transactions by date, newest first.
    #[instrument(skip(self, db))]
    pub async fn recent_transactions(
        &self,
        db: &DatabaseConnection,
        user_id: i32,
    ) -> Result<Vec<RecentTransaction>> {
        let rows = transaction::Entity::find()
            .filter(transaction::Column::UserId.eq(user_id))
            .order_by_desc(transaction::Column::Date)
            .order_by_desc(transaction::Column::Id)
            .limit(RECENT_TRANSACTIONS_LIMIT)
            .find_also_related(category::Entity)
            .all(db)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(tx, category)| RecentTransaction {
                id: tx.id,
                amount: tx.amount,
                kind: tx.kind.to_string(),
                category: category.map(|c| c.name).unwrap_or_else(|| UNCATEGORIZED.to_string()),
                date: tx.date,
                description: tx.description,
            })
            .collect())
    }

    /// Spending progress of every budget of the user.
    #[instrument(skip(self, db))]
    pub async fn budget_statuses(
        &self,
        db: &DatabaseConnection,
        user_id: i32,
    ) -> Result<Vec<BudgetStatusEntry>> {
        let budgets = budget::Entity::find()
            .filter(budget::Column::UserId.eq(user_id))
            .order_by_asc(budget::Column::Id)
            .find_also_related(category::Entity)
            .all(db)
            .await?;

        let mut entries = Vec::with_capacity(budgets.len());
        for (budget, category) in budgets {
            let usage = usage_for(db, &budget).await?;
            entries.push(BudgetStatusEntry {
                id: budget.id,
                category: category.map(|c| c.name).unwrap_or_else(|| UNCATEGORIZED.to_string()),
                budget_amount: usage.amount,
                spent_amount: usage.spent,
                percentage: round_percentage(usage.percentage_used, 1),
            });
        }
        Ok(entries)
    }
}

/// (income, expenses) of a set of transactions.
pub(crate) fn totals(transactions: &[transaction::Model]) -> Result<(Decimal, Decimal)> {
    transactions
        .iter()
        .try_fold((Decimal::ZERO, Decimal::ZERO), |(income, expenses), tx| match tx.kind {
            TransactionKind::Income => Ok((checked_add(income, tx.amount)?, expenses)),
            TransactionKind::Expense => Ok((income, checked_add(expenses, tx.amount)?)),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{new_budget, new_category, new_transaction, new_user, setup_db};
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn dec(value: &str) -> Decimal {
        value.parse().unwrap()
    }

    #[tokio::test]
    async fn test_stats_without_budgets() {
        let db = setup_db().await;
        let user = new_user(&db, "stats").await.unwrap();
        new_transaction(&db, &user, None, "1000", TransactionKind::Income, date(2024, 1, 1))
            .await
            .unwrap();
        new_transaction(&db, &user, None, "250.50", TransactionKind::Expense, date(2024, 1, 2))
            .await
            .unwrap();

        let stats = DashboardComputer::new().stats(&db, user.id).await.unwrap();
        assert_eq!(stats.total_income, dec("1000"));
        assert_eq!(stats.total_expenses, dec("250.5"));
        assert_eq!(stats.net_balance, dec("749.5"));
        assert_eq!(stats.budget_utilization, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_stats_budget_utilization() {
        let db = setup_db().await;
        let user = new_user(&db, "util").await.unwrap();
        let food = new_category(&db, &user, "Food", TransactionKind::Expense).await.unwrap();
        new_budget(&db, &user, &food, "200", date(2024, 1, 1), date(2024, 1, 31))
            .await
            .unwrap();
        new_budget(&db, &user, &food, "100", date(2024, 2, 1), date(2024, 2, 29))
            .await
            .unwrap();
        new_transaction(&db, &user, Some(&food), "100", TransactionKind::Expense, date(2024, 1, 5))
            .await
            .unwrap();

        let stats = DashboardComputer::new().stats(&db, user.id).await.unwrap();
        assert_eq!(stats.budget_utilization, dec("33.3"));
    }

    #[tokio::test]
    async fn test_recent_transactions_limit_and_order() {
        let db = setup_db().await;
        let user = new_user(&db, "recent").await.unwrap();
        let food = new_category(&db, &user, "Food", TransactionKind::Expense).await.unwrap();
        for day in 1..=7 {
            let category = if day % 2 == 0 { Some(&food) } else { None };
            new_transaction(&db, &user, category, "1", TransactionKind::Expense, date(2024, 1, day))
                .await
                .unwrap();
        }

        let recent = DashboardComputer::new()
            .recent_transactions(&db, user.id)
            .await
            .unwrap();
        assert_eq!(recent.len(), 5);
        assert_eq!(recent[0].date, date(2024, 1, 7));
        assert_eq!(recent[0].category, UNCATEGORIZED);
        assert_eq!(recent[1].category, "Food");
        assert_eq!(recent[4].date, date(2024, 1, 3));
    }

    #[tokio::test]
    async fn test_budget_statuses() {
        let db = setup_db().await;
        let user = new_user(&db, "status").await.unwrap();
        let food = new_category(&db, &user, "Food", TransactionKind::Expense).await.unwrap();
        new_budget(&db, &user, &food, "300", date(2024, 1, 1), date(2024, 1, 31))
            .await
            .unwrap();
        new_transaction(&db, &user, Some(&food), "100", TransactionKind::Expense, date(2024, 1, 5))
            .await
            .unwrap();

        let statuses = DashboardComputer::new()
            .budget_statuses(&db, user.id)
            .await
            .unwrap();
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[0].category, "Food");
        assert_eq!(statuses[0].spent_amount, dec("100"));
        assert_eq!(statuses[0].percentage, dec("33.3"));
    }
}
