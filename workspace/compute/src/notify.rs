//! Notification persistence and the email collaborator.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use model::entities::{notification, NotificationKind};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter, Set,
};
use std::fmt::Debug;
use tracing::{debug, info};

use crate::error::Result;

/// Sends plain-text emails on behalf of the service.
#[async_trait]
pub trait Mailer: Send + Sync + Debug {
    async fn send(&self, subject: &str, body: &str, to: &str) -> Result<()>;
}

/// Mailer used when no SMTP relay is configured. It only logs.
#[derive(Debug, Default, Clone)]
pub struct NoopMailer;

#[async_trait]
impl Mailer for NoopMailer {
    async fn send(&self, subject: &str, _body: &str, to: &str) -> Result<()> {
        info!(subject, to, "Email delivery disabled, skipping");
        Ok(())
    }
}

/// Fields of a notification about to be stored.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: i32,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub budget_id: Option<i32>,
    pub period_start: Option<NaiveDate>,
}

impl NewNotification {
    pub fn new(
        user_id: i32,
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            kind,
            title: title.into(),
            message: message.into(),
            budget_id: None,
            period_start: None,
        }
    }

    /// Ties the notification to a budget period.
    pub fn for_budget(mut self, budget_id: i32, period_start: NaiveDate) -> Self {
        self.budget_id = Some(budget_id);
        self.period_start = Some(period_start);
        self
    }
}

/// Stores a new unread notification.
pub async fn create_notification<C: ConnectionTrait>(
    db: &C,
    new: NewNotification,
) -> Result<notification::Model> {
    let stored = notification::ActiveModel {
        user_id: Set(new.user_id),
        kind: Set(new.kind),
        title: Set(new.title),
        message: Set(new.message),
        is_read: Set(false),
        created_at: Set(Utc::now()),
        budget_id: Set(new.budget_id),
        period_start: Set(new.period_start),
        ..Default::default()
    }
    .insert(db)
    .await?;

    debug!(notification_id = stored.id, kind = %stored.kind, "Stored notification");
    Ok(stored)
}

/// Whether a warning was already issued for this budget period.
pub async fn warning_exists<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
    budget_id: i32,
    period_start: NaiveDate,
) -> Result<bool> {
    let count = notification::Entity::find()
        .filter(notification::Column::UserId.eq(user_id))
        .filter(notification::Column::Kind.eq(NotificationKind::BudgetWarning))
        .filter(notification::Column::BudgetId.eq(budget_id))
        .filter(notification::Column::PeriodStart.eq(period_start))
        .count(db)
        .await?;
    Ok(count > 0)
}

/// Detaches the budget's warnings from their period so the next crossing of the
/// threshold warns again. Used when a budget moves to another category.
pub async fn release_budget_warnings<C: ConnectionTrait>(db: &C, budget_id: i32) -> Result<u64> {
    let result = notification::Entity::update_many()
        .col_expr(notification::Column::PeriodStart, Expr::value(Option::<NaiveDate>::None))
        .filter(notification::Column::Kind.eq(NotificationKind::BudgetWarning))
        .filter(notification::Column::BudgetId.eq(budget_id))
        .exec(db)
        .await?;
    debug!(budget_id, released = result.rows_affected, "Released budget warnings");
    Ok(result.rows_affected)
}
