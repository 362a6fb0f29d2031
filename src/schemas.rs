use std::sync::Arc;

use axum::{http::StatusCode, response::Json};
use common::{
    BudgetStatusDetail, BudgetStatusEntry, CategoryBreakdownEntry, CategoryStatistic,
    DashboardStats, DateRange, MonthlyBreakdown, MonthlyTrend, RecentTransaction, ReportData,
    TransactionSummary,
};
use compute::error::ComputeError;
use compute::notify::Mailer;
use moka::future::Cache;
use sea_orm::{DatabaseConnection, DbErr};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};
use utoipa::{OpenApi, ToSchema};

pub use common::ApiResponse;

/// Application state shared across handlers
#[derive(Clone, Debug)]
pub struct AppState {
    /// Database connection
    pub db: DatabaseConnection,
    /// Cache for dashboard aggregates, keyed per user
    pub cache: Cache<String, CachedData>,
    /// Outgoing email
    pub mailer: Arc<dyn Mailer>,
}

/// Cached data types
#[derive(Clone, Debug)]
pub enum CachedData {
    DashboardStats(DashboardStats),
    BudgetStatuses(Vec<BudgetStatusEntry>),
}

pub fn dashboard_stats_key(user_id: i32) -> String {
    format!("dashboard_stats:{}", user_id)
}

pub fn budget_status_key(user_id: i32) -> String {
    format!("budget_status:{}", user_id)
}

impl AppState {
    /// Drops every cached aggregate of the user. Called after writes that change
    /// transactions or budgets.
    pub async fn invalidate_user_cache(&self, user_id: i32) {
        debug!(user_id, "Invalidating cached dashboard data");
        self.cache.invalidate(&dashboard_stats_key(user_id)).await;
        self.cache.invalidate(&budget_status_key(user_id)).await;
    }
}

/// Error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
    /// Error code
    pub code: String,
    /// Success status (always false for errors)
    pub success: bool,
}

/// Error half of every handler result.
pub type HandlerError = (StatusCode, Json<ErrorResponse>);

pub fn error_response(status: StatusCode, code: &str, message: impl Into<String>) -> HandlerError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
            code: code.to_string(),
            success: false,
        }),
    )
}

pub fn not_found(what: &str) -> HandlerError {
    error_response(
        StatusCode::NOT_FOUND,
        "NOT_FOUND",
        format!("{} not found", what),
    )
}

/// Logs a database failure and hides its details from the client.
pub fn database_error(context: &str, err: DbErr) -> HandlerError {
    error!("{}: {}", context, err);
    error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        "DATABASE_ERROR",
        context.to_string(),
    )
}

pub fn compute_error(context: &str, err: ComputeError) -> HandlerError {
    match err {
        ComputeError::Database(db_err) => database_error(context, db_err),
        ComputeError::Validation(message) => {
            error_response(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message)
        }
        other => {
            error!("{}: {}", context, other);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "COMPUTE_ERROR",
                context.to_string(),
            )
        }
    }
}

/// Health check response
#[derive(Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Service version
    pub version: String,
    /// Database connection status
    pub database: String,
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::health::health_check,
        crate::handlers::users::create_user,
        crate::handlers::users::get_users,
        crate::handlers::users::get_user,
        crate::handlers::users::update_user,
        crate::handlers::users::delete_user,
        crate::handlers::categories::create_category,
        crate::handlers::categories::get_categories,
        crate::handlers::categories::get_category,
        crate::handlers::categories::update_category,
        crate::handlers::categories::delete_category,
        crate::handlers::categories::get_category_statistics,
        crate::handlers::transactions::create_transaction,
        crate::handlers::transactions::get_transactions,
        crate::handlers::transactions::get_transaction,
        crate::handlers::transactions::update_transaction,
        crate::handlers::transactions::delete_transaction,
        crate::handlers::transactions::get_transaction_summary,
        crate::handlers::transactions::export_transactions,
        crate::handlers::budgets::create_budget,
        crate::handlers::budgets::get_budgets,
        crate::handlers::budgets::get_budget,
        crate::handlers::budgets::update_budget,
        crate::handlers::budgets::delete_budget,
        crate::handlers::budgets::get_budget_status,
        crate::handlers::notifications::get_notifications,
        crate::handlers::notifications::get_unread_count,
        crate::handlers::notifications::mark_all_read,
        crate::handlers::notifications::mark_read,
        crate::handlers::notifications::delete_notification,
        crate::handlers::dashboard::get_dashboard_stats,
        crate::handlers::dashboard::get_recent_transactions,
        crate::handlers::dashboard::get_budget_status_list,
        crate::handlers::reports::get_report_data,
        crate::handlers::reports::export_report,
    ),
    components(
        schemas(
            ErrorResponse,
            HealthResponse,
            crate::handlers::users::CreateUserRequest,
            crate::handlers::users::UpdateUserRequest,
            crate::handlers::users::UserResponse,
            crate::handlers::categories::CreateCategoryRequest,
            crate::handlers::categories::UpdateCategoryRequest,
            crate::handlers::categories::CategoryResponse,
            crate::handlers::transactions::CreateTransactionRequest,
            crate::handlers::transactions::UpdateTransactionRequest,
            crate::handlers::transactions::TransactionResponse,
            crate::handlers::budgets::CreateBudgetRequest,
            crate::handlers::budgets::UpdateBudgetRequest,
            crate::handlers::budgets::BudgetResponse,
            crate::handlers::notifications::NotificationResponse,
            crate::handlers::notifications::UnreadCountResponse,
            DashboardStats,
            RecentTransaction,
            BudgetStatusEntry,
            BudgetStatusDetail,
            CategoryBreakdownEntry,
            CategoryStatistic,
            MonthlyTrend,
            MonthlyBreakdown,
            ReportData,
            TransactionSummary,
            DateRange,
        )
    ),
    modifiers(&UserHeaderAddon),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "users", description = "User management"),
        (name = "categories", description = "Income and expense categories"),
        (name = "transactions", description = "Income and expense transactions"),
        (name = "budgets", description = "Budgets per category and period"),
        (name = "notifications", description = "Budget alerts and activity notifications"),
        (name = "dashboard", description = "Dashboard aggregates"),
        (name = "reports", description = "Reports and CSV export"),
    ),
    info(
        title = "Pennywise API",
        description = "Personal finance tracker: transactions, categories, budgets and budget alerts",
        version = "0.1.0",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    )
)]
pub struct ApiDoc;

/// Documents the `X-User-Id` header as an API key scheme.
pub struct UserHeaderAddon;

impl utoipa::Modify for UserHeaderAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};

        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "user_id",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(
                    crate::auth::USER_ID_HEADER,
                ))),
            );
        }
    }
}
