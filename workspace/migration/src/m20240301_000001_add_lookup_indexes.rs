use sea_orm_migration::prelude::*;

use crate::m20240101_000001_create_table::{Budgets, Notifications, Transactions};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Budget aggregation scans expenses by user, category and date
        manager
            .create_index(
                Index::create()
                    .name("idx_transactions_user_category_date")
                    .table(Transactions::Table)
                    .col(Transactions::UserId)
                    .col(Transactions::CategoryId)
                    .col(Transactions::Date)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_budgets_user_dates")
                    .table(Budgets::Table)
                    .col(Budgets::UserId)
                    .col(Budgets::StartDate)
                    .col(Budgets::EndDate)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_notifications_user_read")
                    .table(Notifications::Table)
                    .col(Notifications::UserId)
                    .col(Notifications::IsRead)
                    .to_owned(),
            )
            .await?;

        // Warning deduplication key
        manager
            .create_index(
                Index::create()
                    .name("idx_notifications_budget_period")
                    .table(Notifications::Table)
                    .col(Notifications::UserId)
                    .col(Notifications::BudgetId)
                    .col(Notifications::PeriodStart)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_notifications_budget_period")
                    .table(Notifications::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx_notifications_user_read")
                    .table(Notifications::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx_budgets_user_dates")
                    .table(Budgets::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx_transactions_user_category_date")
                    .table(Transactions::Table)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }
}
