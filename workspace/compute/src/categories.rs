use std::collections::HashMap;

use common::CategoryStatistic;
use model::entities::{category, transaction};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use tracing::{debug, instrument};

use crate::amount::checked_add;
use crate::error::Result;

/// Per-category totals over all transactions of a user.
#[derive(Debug, Default)]
pub struct CategoriesComputer;

impl CategoriesComputer {
    pub fn new() -> Self {
        Self
    }

    /// One entry per category, largest total first. Categories without
    /// transactions are included with a zero total.
    #[instrument(skip(self, db))]
    pub async fn category_statistics(
        &self,
        db: &DatabaseConnection,
        user_id: i32,
    ) -> Result<Vec<CategoryStatistic>> {
        let categories = category::Entity::find_for_user(db, user_id).await?;
        let transactions = transaction::Entity::find()
            .filter(transaction::Column::UserId.eq(user_id))
            .filter(transaction::Column::CategoryId.is_not_null())
            .all(db)
            .await?;

        let mut sums: HashMap<i32, (Decimal, u64)> = HashMap::new();
        for tx in &transactions {
            if let Some(category_id) = tx.category_id {
                let entry = sums.entry(category_id).or_insert((Decimal::ZERO, 0));
                entry.0 = checked_add(entry.0, tx.amount)?;
                entry.1 += 1;
            }
        }

        let mut statistics: Vec<CategoryStatistic> = categories
            .into_iter()
            .map(|category| {
                let (total_amount, transaction_count) =
                    sums.get(&category.id).copied().unwrap_or((Decimal::ZERO, 0));
                CategoryStatistic {
                    category_id: category.id,
                    category_name: category.name,
                    kind: category.kind.to_string(),
                    total_amount,
                    transaction_count,
                }
            })
            .collect();

        // Stable sort keeps name order between equal totals.
        statistics.sort_by(|a, b| b.total_amount.cmp(&a.total_amount));
        debug!(categories = statistics.len(), "Category statistics computed");
        Ok(statistics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{new_category, new_transaction, new_user, setup_db};
    use chrono::NaiveDate;
    use model::entities::TransactionKind;

    #[tokio::test]
    async fn test_category_statistics_ordering() {
        let db = setup_db().await;
        let user = new_user(&db, "cats").await.unwrap();
        let food = new_category(&db, &user, "Food", TransactionKind::Expense).await.unwrap();
        let rent = new_category(&db, &user, "Rent", TransactionKind::Expense).await.unwrap();
        new_category(&db, &user, "Empty", TransactionKind::Income).await.unwrap();
        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

        new_transaction(&db, &user, Some(&food), "10", TransactionKind::Expense, day).await.unwrap();
        new_transaction(&db, &user, Some(&food), "15", TransactionKind::Expense, day).await.unwrap();
        new_transaction(&db, &user, Some(&rent), "500", TransactionKind::Expense, day).await.unwrap();
        new_transaction(&db, &user, None, "1", TransactionKind::Expense, day).await.unwrap();

        let stats = CategoriesComputer::new()
            .category_statistics(&db, user.id)
            .await
            .unwrap();

        let names: Vec<_> = stats.iter().map(|s| s.category_name.as_str()).collect();
        assert_eq!(names, vec!["Rent", "Food", "Empty"]);
        assert_eq!(stats[1].total_amount, Decimal::new(25, 0));
        assert_eq!(stats[1].transaction_count, 2);
        assert_eq!(stats[2].transaction_count, 0);
    }
}
