//! Budget evaluation triggered by newly created transactions.
//!
//! The transaction-creation handler calls [`on_transaction_created`] once per
//! created transaction. It records a `new_transaction` notification and then lets
//! [`BudgetEvaluator`] compare every budget covering the transaction against the
//! re-aggregated spending of its period.
//!
//! Nothing in here is allowed to fail the request that created the transaction:
//! [`on_transaction_created`] logs and swallows every error.

use std::sync::Arc;
use std::time::Duration;

use model::entities::{budget, category, notification, transaction, user, NotificationKind};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use tracing::{debug, info, instrument, warn};

use crate::budget::{usage_for, BudgetStatus, BudgetUsage};
use crate::error::{ComputeError, Result};
use crate::notify::{create_notification, warning_exists, Mailer, NewNotification};

pub const EXCEEDED_TITLE: &str = "Budget Exceeded!";
pub const WARNING_TITLE: &str = "Budget Warning";
pub const NEW_TRANSACTION_TITLE: &str = "New Transaction Added";
pub const EXCEEDED_EMAIL_SUBJECT: &str = "Budget Exceeded - Finance Manager";

/// How long evaluation waits for the exceeded email before giving up on it.
pub const EMAIL_TIMEOUT: Duration = Duration::from_secs(5);

const NO_CATEGORY: &str = "No Category";

/// Decides which budget notifications a transaction causes.
#[derive(Debug, Clone)]
pub struct BudgetEvaluator {
    db: DatabaseConnection,
    mailer: Arc<dyn Mailer>,
    email_timeout: Duration,
}

impl BudgetEvaluator {
    pub fn new(db: DatabaseConnection, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            db,
            mailer,
            email_timeout: EMAIL_TIMEOUT,
        }
    }

    pub fn with_email_timeout(mut self, email_timeout: Duration) -> Self {
        self.email_timeout = email_timeout;
        self
    }

    /// Evaluates every budget of the transaction's category whose period contains the
    /// transaction date. Returns the notifications created, at most one per budget.
    ///
    /// Income and uncategorized transactions are ignored.
    #[instrument(skip(self, tx), fields(transaction_id = tx.id, user_id = tx.user_id))]
    pub async fn evaluate(&self, tx: &transaction::Model) -> Result<Vec<notification::Model>> {
        let category_id = match tx.category_id {
            Some(category_id) if tx.is_expense() => category_id,
            _ => {
                debug!("Transaction is not a categorized expense, skipping budget evaluation");
                return Ok(Vec::new());
            }
        };

        let category = category::Entity::find_by_id(category_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| {
                ComputeError::Budget(format!("Category {} of transaction {} not found", category_id, tx.id))
            })?;

        let budgets = budget::Entity::find()
            .filter(budget::Column::UserId.eq(tx.user_id))
            .filter(budget::Column::CategoryId.eq(category_id))
            .filter(budget::Column::StartDate.lte(tx.date))
            .filter(budget::Column::EndDate.gte(tx.date))
            .order_by_asc(budget::Column::Id)
            .all(&self.db)
            .await?;

        debug!(count = budgets.len(), category = %category.name, "Matching budgets loaded");

        let mut created = Vec::new();
        for budget in &budgets {
            match self.evaluate_budget(budget, &category).await {
                Ok(Some(notification)) => created.push(notification),
                Ok(None) => {}
                Err(err) => {
                    warn!(budget_id = budget.id, error = %err, "Failed to evaluate budget, continuing");
                }
            }
        }

        Ok(created)
    }

    async fn evaluate_budget(
        &self,
        budget: &budget::Model,
        category: &category::Model,
    ) -> Result<Option<notification::Model>> {
        let usage = usage_for(&self.db, budget).await?;
        debug!(
            budget_id = budget.id,
            spent = %usage.spent,
            percentage = %usage.percentage_used,
            "Budget usage computed"
        );

        match usage.status() {
            BudgetStatus::Exceeded => {
                let notification = create_notification(
                    &self.db,
                    NewNotification::new(
                        budget.user_id,
                        NotificationKind::BudgetExceeded,
                        EXCEEDED_TITLE,
                        exceeded_message(&category.name, &usage),
                    )
                    .for_budget(budget.id, budget.start_date),
                )
                .await?;
                info!(budget_id = budget.id, "Budget exceeded");

                self.send_exceeded_email(budget.user_id, &category.name).await;
                Ok(Some(notification))
            }
            BudgetStatus::Warning => {
                if warning_exists(&self.db, budget.user_id, budget.id, budget.start_date).await? {
                    debug!(budget_id = budget.id, "Warning already issued for this period");
                    return Ok(None);
                }

                let notification = create_notification(
                    &self.db,
                    NewNotification::new(
                        budget.user_id,
                        NotificationKind::BudgetWarning,
                        WARNING_TITLE,
                        warning_message(&category.name, &usage),
                    )
                    .for_budget(budget.id, budget.start_date),
                )
                .await?;
                info!(budget_id = budget.id, "Budget warning threshold crossed");
                Ok(Some(notification))
            }
            BudgetStatus::OnTrack => Ok(None),
        }
    }

    /// Best effort and bounded by `email_timeout`. Failures end up in the log only.
    async fn send_exceeded_email(&self, user_id: i32, category_name: &str) {
        let owner = match user::Entity::find_by_id(user_id).one(&self.db).await {
            Ok(Some(owner)) => owner,
            Ok(None) => return,
            Err(err) => {
                warn!(user_id, error = %err, "Could not load user for budget email");
                return;
            }
        };

        let Some(to) = owner.email_address() else {
            debug!(user_id, "User has no email address, skipping budget email");
            return;
        };

        let body = format!("Your budget for {} has been exceeded.", category_name);
        let delivery = self.mailer.send(EXCEEDED_EMAIL_SUBJECT, &body, to);
        match tokio::time::timeout(self.email_timeout, delivery).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(user_id, error = %err, "Failed to send budget exceeded email"),
            Err(_) => warn!(
                user_id,
                timeout_ms = self.email_timeout.as_millis() as u64,
                "Budget exceeded email timed out"
            ),
        }
    }
}

pub fn exceeded_message(category_name: &str, usage: &BudgetUsage) -> String {
    format!(
        "Your budget for {} has been exceeded. Spent: ${:.2}, Budget: ${:.2}",
        category_name, usage.spent, usage.amount
    )
}

pub fn warning_message(category_name: &str, usage: &BudgetUsage) -> String {
    format!(
        "You have used {:.1}% of your budget for {}. Spent: ${:.2}, Budget: ${:.2}",
        usage.percentage_used, category_name, usage.spent, usage.amount
    )
}

/// Records the `new_transaction` notification and runs budget evaluation.
///
/// Never fails; returns every notification that was created.
#[instrument(skip(db, mailer, tx), fields(transaction_id = tx.id))]
pub async fn on_transaction_created(
    db: &DatabaseConnection,
    mailer: Arc<dyn Mailer>,
    tx: &transaction::Model,
) -> Vec<notification::Model> {
    let mut created = Vec::new();

    match record_new_transaction(db, tx).await {
        Ok(notification) => created.push(notification),
        Err(err) => warn!(error = %err, "Failed to record new transaction notification"),
    }

    let evaluator = BudgetEvaluator::new(db.clone(), mailer);
    match evaluator.evaluate(tx).await {
        Ok(mut notifications) => created.append(&mut notifications),
        Err(err) => warn!(error = %err, "Budget evaluation aborted"),
    }

    created
}

async fn record_new_transaction(
    db: &DatabaseConnection,
    tx: &transaction::Model,
) -> Result<notification::Model> {
    let category_name = match tx.category_id {
        Some(category_id) => category::Entity::find_by_id(category_id)
            .one(db)
            .await?
            .map(|c| c.name)
            .unwrap_or_else(|| NO_CATEGORY.to_string()),
        None => NO_CATEGORY.to_string(),
    };

    create_notification(
        db,
        NewNotification::new(
            tx.user_id,
            NotificationKind::NewTransaction,
            NEW_TRANSACTION_TITLE,
            format!("New {}: ${:.2} for {}", tx.kind, tx.amount, category_name),
        ),
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        new_budget, new_category, new_transaction, new_user, setup_db, FailingMailer,
        RecordingMailer, SlowMailer,
    };
    use std::time::Instant;
    use chrono::NaiveDate;
    use model::entities::TransactionKind;
    use sea_orm::PaginatorTrait;
    use std::sync::atomic::Ordering;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn count_kind(db: &DatabaseConnection, user_id: i32, kind: NotificationKind) -> u64 {
        notification::Entity::find()
            .filter(notification::Column::UserId.eq(user_id))
            .filter(notification::Column::Kind.eq(kind))
            .count(db)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_groceries_warning_then_exceeded() {
        let db = setup_db().await;
        let mailer = Arc::new(RecordingMailer::default());
        let user = new_user(&db, "alice").await.unwrap();
        let groceries = new_category(&db, &user, "Groceries", TransactionKind::Expense)
            .await
            .unwrap();
        let budget = new_budget(&db, &user, &groceries, "100.00", date(2024, 1, 1), date(2024, 1, 31))
            .await
            .unwrap();
        let evaluator = BudgetEvaluator::new(db.clone(), mailer.clone());

        let first = new_transaction(&db, &user, Some(&groceries), "85.00", TransactionKind::Expense, date(2024, 1, 15))
            .await
            .unwrap();
        let created = evaluator.evaluate(&first).await.unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].kind, NotificationKind::BudgetWarning);
        assert_eq!(created[0].title, WARNING_TITLE);
        assert!(created[0].message.contains("85.0%"), "{}", created[0].message);
        assert!(created[0].message.contains("Groceries"));
        assert_eq!(created[0].budget_id, Some(budget.id));
        assert_eq!(created[0].period_start, Some(date(2024, 1, 1)));
        assert!(!created[0].is_read);

        let second = new_transaction(&db, &user, Some(&groceries), "20.00", TransactionKind::Expense, date(2024, 1, 20))
            .await
            .unwrap();
        let created = evaluator.evaluate(&second).await.unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].kind, NotificationKind::BudgetExceeded);
        assert_eq!(created[0].title, EXCEEDED_TITLE);
        assert_eq!(
            created[0].message,
            "Your budget for Groceries has been exceeded. Spent: $105.00, Budget: $100.00"
        );

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, EXCEEDED_EMAIL_SUBJECT);
        assert_eq!(sent[0].1, "Your budget for Groceries has been exceeded.");
        assert_eq!(sent[0].2, "alice@example.com");
    }

    #[tokio::test]
    async fn test_warning_is_issued_once_per_period() {
        let db = setup_db().await;
        let user = new_user(&db, "bob").await.unwrap();
        let food = new_category(&db, &user, "Food", TransactionKind::Expense).await.unwrap();
        new_budget(&db, &user, &food, "100", date(2024, 3, 1), date(2024, 3, 31))
            .await
            .unwrap();
        let evaluator = BudgetEvaluator::new(db.clone(), Arc::new(RecordingMailer::default()));

        for (amount, day) in [("81", 2), ("5", 3), ("4", 4)] {
            let tx = new_transaction(&db, &user, Some(&food), amount, TransactionKind::Expense, date(2024, 3, day))
                .await
                .unwrap();
            evaluator.evaluate(&tx).await.unwrap();
        }

        assert_eq!(count_kind(&db, user.id, NotificationKind::BudgetWarning).await, 1);
        assert_eq!(count_kind(&db, user.id, NotificationKind::BudgetExceeded).await, 0);
    }

    #[tokio::test]
    async fn test_exceeded_is_never_deduplicated() {
        let db = setup_db().await;
        let user = new_user(&db, "carol").await.unwrap();
        let fun = new_category(&db, &user, "Fun", TransactionKind::Expense).await.unwrap();
        new_budget(&db, &user, &fun, "50", date(2024, 5, 1), date(2024, 5, 31))
            .await
            .unwrap();
        let evaluator = BudgetEvaluator::new(db.clone(), Arc::new(RecordingMailer::default()));

        for day in [10, 11, 12] {
            let tx = new_transaction(&db, &user, Some(&fun), "60", TransactionKind::Expense, date(2024, 5, day))
                .await
                .unwrap();
            evaluator.evaluate(&tx).await.unwrap();
        }

        assert_eq!(count_kind(&db, user.id, NotificationKind::BudgetExceeded).await, 3);
    }

    #[tokio::test]
    async fn test_transaction_outside_period_matches_no_budget() {
        let db = setup_db().await;
        let user = new_user(&db, "dave").await.unwrap();
        let groceries = new_category(&db, &user, "Groceries", TransactionKind::Expense)
            .await
            .unwrap();
        new_budget(&db, &user, &groceries, "100.00", date(2024, 1, 1), date(2024, 1, 31))
            .await
            .unwrap();
        let evaluator = BudgetEvaluator::new(db.clone(), Arc::new(RecordingMailer::default()));

        let tx = new_transaction(&db, &user, Some(&groceries), "300.00", TransactionKind::Expense, date(2024, 2, 1))
            .await
            .unwrap();
        assert!(evaluator.evaluate(&tx).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_boundary_dates_count() {
        let db = setup_db().await;
        let user = new_user(&db, "erin").await.unwrap();
        let rent = new_category(&db, &user, "Rent", TransactionKind::Expense).await.unwrap();
        new_budget(&db, &user, &rent, "100", date(2024, 1, 1), date(2024, 1, 31))
            .await
            .unwrap();
        let evaluator = BudgetEvaluator::new(db.clone(), Arc::new(RecordingMailer::default()));

        new_transaction(&db, &user, Some(&rent), "40", TransactionKind::Expense, date(2024, 1, 1))
            .await
            .unwrap();
        let last = new_transaction(&db, &user, Some(&rent), "45", TransactionKind::Expense, date(2024, 1, 31))
            .await
            .unwrap();

        let created = evaluator.evaluate(&last).await.unwrap();
        assert_eq!(created.len(), 1);
        assert!(created[0].message.contains("85.0%"));
    }

    #[tokio::test]
    async fn test_income_and_uncategorized_never_evaluate() {
        let db = setup_db().await;
        let user = new_user(&db, "frank").await.unwrap();
        let groceries = new_category(&db, &user, "Groceries", TransactionKind::Expense)
            .await
            .unwrap();
        new_budget(&db, &user, &groceries, "10", date(2024, 1, 1), date(2024, 1, 31))
            .await
            .unwrap();
        let evaluator = BudgetEvaluator::new(db.clone(), Arc::new(RecordingMailer::default()));

        let income = new_transaction(&db, &user, Some(&groceries), "500", TransactionKind::Income, date(2024, 1, 10))
            .await
            .unwrap();
        let uncategorized = new_transaction(&db, &user, None, "500", TransactionKind::Expense, date(2024, 1, 10))
            .await
            .unwrap();

        assert!(evaluator.evaluate(&income).await.unwrap().is_empty());
        assert!(evaluator.evaluate(&uncategorized).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_overlapping_budgets_each_evaluated() {
        let db = setup_db().await;
        let user = new_user(&db, "gina").await.unwrap();
        let travel = new_category(&db, &user, "Travel", TransactionKind::Expense).await.unwrap();
        new_budget(&db, &user, &travel, "100", date(2024, 6, 1), date(2024, 6, 30))
            .await
            .unwrap();
        new_budget(&db, &user, &travel, "1000", date(2024, 1, 1), date(2024, 12, 31))
            .await
            .unwrap();
        new_budget(&db, &user, &travel, "110", date(2024, 6, 1), date(2024, 6, 30))
            .await
            .unwrap();
        let evaluator = BudgetEvaluator::new(db.clone(), Arc::new(RecordingMailer::default()));

        let tx = new_transaction(&db, &user, Some(&travel), "105", TransactionKind::Expense, date(2024, 6, 15))
            .await
            .unwrap();
        let mut kinds: Vec<_> = evaluator
            .evaluate(&tx)
            .await
            .unwrap()
            .into_iter()
            .map(|n| n.kind)
            .collect();
        kinds.sort_by_key(|k| k.as_str());

        assert_eq!(kinds, vec![NotificationKind::BudgetExceeded, NotificationKind::BudgetWarning]);
    }

    #[tokio::test]
    async fn test_mail_failure_does_not_block_notification() {
        let db = setup_db().await;
        let mailer = Arc::new(FailingMailer::default());
        let user = new_user(&db, "hank").await.unwrap();
        let bills = new_category(&db, &user, "Bills", TransactionKind::Expense).await.unwrap();
        new_budget(&db, &user, &bills, "10", date(2024, 1, 1), date(2024, 1, 31))
            .await
            .unwrap();

        let tx = new_transaction(&db, &user, Some(&bills), "20", TransactionKind::Expense, date(2024, 1, 5))
            .await
            .unwrap();
        let created = on_transaction_created(&db, mailer.clone(), &tx).await;

        let kinds: Vec<_> = created.iter().map(|n| n.kind).collect();
        assert_eq!(kinds, vec![NotificationKind::NewTransaction, NotificationKind::BudgetExceeded]);
        assert_eq!(mailer.attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_on_transaction_created_records_new_transaction() {
        let db = setup_db().await;
        let user = new_user(&db, "ivy").await.unwrap();
        let salary = new_category(&db, &user, "Salary", TransactionKind::Income).await.unwrap();

        let income = new_transaction(&db, &user, Some(&salary), "1500", TransactionKind::Income, date(2024, 1, 1))
            .await
            .unwrap();
        let created = on_transaction_created(&db, Arc::new(RecordingMailer::default()), &income).await;
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].title, NEW_TRANSACTION_TITLE);
        assert_eq!(created[0].message, "New income: $1500.00 for Salary");

        let loose = new_transaction(&db, &user, None, "12.5", TransactionKind::Expense, date(2024, 1, 2))
            .await
            .unwrap();
        let created = on_transaction_created(&db, Arc::new(RecordingMailer::default()), &loose).await;
        assert_eq!(created[0].message, "New expense: $12.50 for No Category");
    }

    #[tokio::test]
    async fn test_user_without_email_gets_no_mail() {
        let db = setup_db().await;
        let mailer = Arc::new(RecordingMailer::default());
        let user = user::ActiveModel {
            username: sea_orm::Set("quiet".to_string()),
            email: sea_orm::Set(String::new()),
            created_at: sea_orm::Set(chrono::Utc::now()),
            ..Default::default()
        };
        let user = sea_orm::ActiveModelTrait::insert(user, &db).await.unwrap();
        let misc = new_category(&db, &user, "Misc", TransactionKind::Expense).await.unwrap();
        new_budget(&db, &user, &misc, "1", date(2024, 1, 1), date(2024, 1, 31))
            .await
            .unwrap();

        let tx = new_transaction(&db, &user, Some(&misc), "2", TransactionKind::Expense, date(2024, 1, 3))
            .await
            .unwrap();
        let created = BudgetEvaluator::new(db.clone(), mailer.clone()).evaluate(&tx).await.unwrap();

        assert_eq!(created.len(), 1);
        assert!(mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_slow_mail_relay_does_not_hold_up_evaluation() {
        let db = setup_db().await;
        let user = new_user(&db, "patient").await.unwrap();
        let fun = new_category(&db, &user, "Fun", TransactionKind::Expense).await.unwrap();
        new_budget(&db, &user, &fun, "50", date(2024, 5, 1), date(2024, 5, 31))
            .await
            .unwrap();
        let mailer = Arc::new(SlowMailer::new(Duration::from_secs(60)));
        let evaluator = BudgetEvaluator::new(db.clone(), mailer.clone())
            .with_email_timeout(Duration::from_millis(50));

        let tx = new_transaction(&db, &user, Some(&fun), "60", TransactionKind::Expense, date(2024, 5, 2))
            .await
            .unwrap();
        let started = Instant::now();
        let created = evaluator.evaluate(&tx).await.unwrap();

        assert!(started.elapsed() < Duration::from_secs(10));
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].kind, NotificationKind::BudgetExceeded);
        assert_eq!(mailer.attempts.load(Ordering::SeqCst), 1);
        assert!(EMAIL_TIMEOUT < Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_failing_budget_does_not_stop_the_others() {
        let db = setup_db().await;
        let user = new_user(&db, "mixed").await.unwrap();
        let art = new_category(&db, &user, "Art", TransactionKind::Expense).await.unwrap();
        // Spending over this amount overflows the percentage calculation.
        new_budget(&db, &user, &art, "0.0000000001", date(2024, 6, 1), date(2024, 6, 30))
            .await
            .unwrap();
        let healthy = new_budget(
            &db,
            &user,
            &art,
            "1200000000000000000000",
            date(2024, 6, 1),
            date(2024, 6, 30),
        )
        .await
        .unwrap();

        let tx = new_transaction(
            &db,
            &user,
            Some(&art),
            "1000000000000000000000",
            TransactionKind::Expense,
            date(2024, 6, 15),
        )
        .await
        .unwrap();
        let created = on_transaction_created(&db, Arc::new(RecordingMailer::default()), &tx).await;

        assert_eq!(created.len(), 2);
        assert_eq!(created[0].kind, NotificationKind::NewTransaction);
        assert_eq!(created[1].kind, NotificationKind::BudgetWarning);
        assert_eq!(created[1].budget_id, Some(healthy.id));
        assert_eq!(count_kind(&db, user.id, NotificationKind::BudgetExceeded).await, 0);
    }

    #[tokio::test]
    async fn test_overflowing_period_sum_is_contained() {
        let db = setup_db().await;
        let user = new_user(&db, "whale").await.unwrap();
        let yachts = new_category(&db, &user, "Yachts", TransactionKind::Expense)
            .await
            .unwrap();
        new_budget(&db, &user, &yachts, "100", date(2024, 7, 1), date(2024, 7, 31))
            .await
            .unwrap();

        let huge = "70000000000000000000000000000";
        new_transaction(&db, &user, Some(&yachts), huge, TransactionKind::Expense, date(2024, 7, 1))
            .await
            .unwrap();
        let tx = new_transaction(&db, &user, Some(&yachts), huge, TransactionKind::Expense, date(2024, 7, 2))
            .await
            .unwrap();
        let created = on_transaction_created(&db, Arc::new(RecordingMailer::default()), &tx).await;

        assert_eq!(created.len(), 1);
        assert_eq!(created[0].kind, NotificationKind::NewTransaction);
    }
}
