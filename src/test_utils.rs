use crate::router::create_router;
use crate::schemas::AppState;
use async_trait::async_trait;
use axum::http::{HeaderName, HeaderValue};
use axum::Router;
use axum_test::TestServer;
use chrono::Utc;
use compute::error::Result as ComputeResult;
use compute::notify::Mailer;
use migration::{Migrator, MigratorTrait};
use model::entities::user;
use moka::future::Cache;
use sea_orm::{ActiveModelTrait, ConnectionTrait, Database, DatabaseConnection, Set};
use std::sync::{Arc, Mutex};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

pub const USER_HEADER: HeaderName = HeaderName::from_static("x-user-id");

/// Mailer that records every message instead of sending it.
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

/// Create an in-memory SQLite database for testing
pub async fn setup_test_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("Failed to connect to in-memory database");
    db.execute_unprepared("PRAGMA foreign_keys = ON;")
        .await
        .expect("Failed to enable foreign keys");

    Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");

    db
}

/// Test fixture: the shared state, the mailer behind it and two users.
pub struct TestContext {
    pub server: TestServer,
    pub state: AppState,
    pub mailer: Arc<RecordingMailer>,
    pub alice: user::Model,
    pub bob: user::Model,
}

impl TestContext {
    /// Header value authenticating as the given user.
    pub fn auth(user: &user::Model) -> HeaderValue {
        HeaderValue::from_str(&user.id.to_string()).unwrap()
    }
}

async fn insert_user(db: &DatabaseConnection, username: &str, email: &str) -> user::Model {
    user::ActiveModel {
        username: Set(username.to_string()),
        email: Set(email.to_string()),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to create test user")
}

/// Create AppState for testing
pub async fn setup_test_app_state(mailer: Arc<RecordingMailer>) -> AppState {
    let db = setup_test_db().await;
    AppState {
        db,
        cache: Cache::new(100),
        mailer,
    }
}

/// Initialize tracing for tests with output to STDERR.
///
/// The log level is taken from RUST_LOG and defaults to WARN.
fn init_test_tracing() -> tracing::subscriber::DefaultGuard {
    let log_level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|level| level.parse::<Level>().ok())
        .unwrap_or(Level::WARN);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_default(subscriber)
}

/// Create axum app for testing
pub async fn setup_test_app() -> Router {
    let _guard = init_test_tracing();
    create_router(setup_test_app_state(Arc::new(RecordingMailer::default())).await)
}

/// Server with two registered users, alice (with email) and bob (without).
pub async fn setup_test_context() -> TestContext {
    let _guard = init_test_tracing();

    let mailer = Arc::new(RecordingMailer::default());
    let state = setup_test_app_state(mailer.clone()).await;
    let alice = insert_user(&state.db, "alice", "alice@example.com").await;
    let bob = insert_user(&state.db, "bob", "").await;

    let server = TestServer::new(create_router(state.clone())).expect("Failed to start test server");
    TestContext {
        server,
        state,
        mailer,
        alice,
        bob,
    }
}
