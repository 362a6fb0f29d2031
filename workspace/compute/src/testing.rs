//! Fixtures shared by the compute tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use migration::{Migrator, MigratorTrait};
use model::entities::{budget, category, transaction, user, TransactionKind};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ConnectionTrait, Database, DatabaseConnection, DbErr, Set};

use crate::error::{ComputeError, Result as ComputeResult};
use crate::notify::Mailer;

pub type Result<T> = std::result::Result<T, DbErr>;

pub async fn setup_db() -> DatabaseConnection {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();

    let db = Database::connect("sqlite::memory:")
        .await
        .expect("Failed to connect to database");
    db.execute_unprepared("PRAGMA foreign_keys = ON;")
        .await
        .expect("Failed to enable foreign keys");
    Migrator::up(&db, None).await.expect("Migrations failed.");
    db
}

pub async fn new_user(db: &DatabaseConnection, username: &str) -> Result<user::Model> {
    user::ActiveModel {
        username: Set(username.to_string()),
        email: Set(format!("{}@example.com", username)),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
}

pub async fn new_category(
    db: &DatabaseConnection,
    owner: &user::Model,
    name: &str,
    kind: TransactionKind,
) -> Result<category::Model> {
    category::ActiveModel {
        user_id: Set(owner.id),
        name: Set(name.to_string()),
        kind: Set(kind),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
}

pub async fn new_transaction(
    db: &DatabaseConnection,
    owner: &user::Model,
    category: Option<&category::Model>,
    amount: &str,
    kind: TransactionKind,
    date: NaiveDate,
) -> Result<transaction::Model> {
    transaction::ActiveModel {
        user_id: Set(owner.id),
        category_id: Set(category.map(|c| c.id)),
        amount: Set(amount.parse::<Decimal>().expect("invalid decimal")),
        kind: Set(kind),
        description: Set(format!("{} on {}", kind, date)),
        date: Set(date),
        created_at: Set(Utc::now()),
        updated_at: Set(None),
        ..Default::default()
    }
    .insert(db)
    .await
}

pub async fn new_budget(
    db: &DatabaseConnection,
    owner: &user::Model,
    category: &category::Model,
    amount: &str,
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> Result<budget::Model> {
    budget::ActiveModel {
        user_id: Set(owner.id),
        category_id: Set(category.id),
        amount: Set(amount.parse::<Decimal>().expect("invalid decimal")),
        start_date: Set(start_date),
        end_date: Set(end_date),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
}

/// Mailer that keeps every message it was asked to send.
#[derive(Debug, Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<(String, String, String)>>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<(String, String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, subject: &str, body: &str, to: &str) -> ComputeResult<()> {
        self.sent
            .lock()
            .unwrap()
            .push((subject.to_string(), body.to_string(), to.to_string()));
        Ok(())
    }
}

/// Mailer whose relay is always down.
#[derive(Debug, Default)]
pub struct FailingMailer {
    pub attempts: AtomicUsize,
}

#[async_trait]
impl Mailer for FailingMailer {
    async fn send(&self, _subject: &str, _body: &str, _to: &str) -> ComputeResult<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(ComputeError::Mail("connection refused".to_string()))
    }
}

/// Mailer whose relay answers only after `delay`.
#[derive(Debug)]
pub struct SlowMailer {
    pub delay: Duration,
    pub attempts: AtomicUsize,
}

impl SlowMailer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            attempts: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Mailer for SlowMailer {
    async fn send(&self, _subject: &str, _body: &str, _to: &str) -> ComputeResult<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(())
    }
}
