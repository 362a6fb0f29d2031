use crate::handlers::{
    budgets::{
        create_budget, delete_budget, get_budget, get_budget_status, get_budgets, update_budget,
    },
    categories::{
        create_category, delete_category, get_categories, get_category, get_category_statistics,
        update_category,
    },
    dashboard::{get_budget_status_list, get_dashboard_stats, get_recent_transactions},
    health::health_check,
    notifications::{
        delete_notification, get_notifications, get_unread_count, mark_all_read, mark_read,
    },
    reports::{export_report, get_report_data},
    transactions::{
        create_transaction, delete_transaction, export_transactions, get_transaction,
        get_transaction_summary, get_transactions, update_transaction,
    },
    users::{create_user, delete_user, get_user, get_users, update_user},
};
use crate::schemas::{ApiDoc, AppState};
use axum::{
    routing::{delete, get, patch, post},
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Upper bound for handling a single request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Create application router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_check))
        // User CRUD routes
        .route("/api/v1/users", post(create_user).get(get_users))
        .route(
            "/api/v1/users/:user_id",
            get(get_user).put(update_user).delete(delete_user),
        )
        // Categories
        .route("/api/v1/categories", post(create_category).get(get_categories))
        .route("/api/v1/categories/statistics", get(get_category_statistics))
        .route(
            "/api/v1/categories/:category_id",
            get(get_category).put(update_category).delete(delete_category),
        )
        // Transactions
        .route(
            "/api/v1/transactions",
            post(create_transaction).get(get_transactions),
        )
        .route("/api/v1/transactions/summary", get(get_transaction_summary))
        .route("/api/v1/transactions/export", get(export_transactions))
        .route(
            "/api/v1/transactions/:transaction_id",
            get(get_transaction)
                .put(update_transaction)
                .delete(delete_transaction),
        )
        // Budgets
        .route("/api/v1/budgets", post(create_budget).get(get_budgets))
        .route(
            "/api/v1/budgets/:budget_id",
            get(get_budget).put(update_budget).delete(delete_budget),
        )
        .route("/api/v1/budgets/:budget_id/status", get(get_budget_status))
        // Notifications
        .route("/api/v1/notifications", get(get_notifications))
        .route("/api/v1/notifications/unread-count", get(get_unread_count))
        .route("/api/v1/notifications/read-all", patch(mark_all_read))
        .route("/api/v1/notifications/:notification_id/read", patch(mark_read))
        .route(
            "/api/v1/notifications/:notification_id",
            delete(delete_notification),
        )
        // Dashboard
        .route("/api/v1/dashboard/stats", get(get_dashboard_stats))
        .route(
            "/api/v1/dashboard/recent-transactions",
            get(get_recent_transactions),
        )
        .route("/api/v1/dashboard/budget-status", get(get_budget_status_list))
        // Reports
        .route("/api/v1/reports/data", get(get_report_data))
        .route("/api/v1/reports/export", get(export_report))
        // Swagger UI
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Add middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
