use crate::auth::CurrentUser;
use crate::schemas::{
    budget_status_key, compute_error, dashboard_stats_key, ApiResponse, AppState, CachedData,
    ErrorResponse, HandlerError,
};
use axum::{extract::State, response::Json};
use common::{BudgetStatusEntry, DashboardStats, RecentTransaction};
use compute::dashboard::DashboardComputer;
use tracing::{debug, instrument};

/// Income, expenses, net balance and budget utilization
#[utoipa::path(
    get,
    path = "/api/v1/dashboard/stats",
    tag = "dashboard",
    security(("user_id" = [])),
    responses(
        (status = 200, description = "Dashboard statistics", body = ApiResponse<DashboardStats>),
        (status = 401, description = "Unknown user", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_dashboard_stats(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<ApiResponse<DashboardStats>>, HandlerError> {
    let key = dashboard_stats_key(user.id());
    let stats = match state.cache.get(&key).await {
        Some(CachedData::DashboardStats(stats)) => {
            debug!("Dashboard stats served from cache");
            stats
        }
        _ => {
            let stats = DashboardComputer::new()
                .stats(&state.db, user.id())
                .await
                .map_err(|e| compute_error("Failed to compute dashboard statistics", e))?;
            state
                .cache
                .insert(key, CachedData::DashboardStats(stats.clone()))
                .await;
            stats
        }
    };

    Ok(Json(ApiResponse {
        data: stats,
        message: "Dashboard statistics retrieved successfully".to_string(),
        success: true,
    }))
}

/// The five most recent transactions
#[utoipa::path(
    get,
    path = "/api/v1/dashboard/recent-transactions",
    tag = "dashboard",
    security(("user_id" = [])),
    responses(
        (status = 200, description = "Recent transactions", body = ApiResponse<Vec<RecentTransaction>>),
        (status = 401, description = "Unknown user", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_recent_transactions(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<ApiResponse<Vec<RecentTransaction>>>, HandlerError> {
    let recent = DashboardComputer::new()
        .recent_transactions(&state.db, user.id())
        .await
        .map_err(|e| compute_error("Failed to load recent transactions", e))?;

    Ok(Json(ApiResponse {
        data: recent,
        message: "Recent transactions retrieved successfully".to_string(),
        success: true,
    }))
}

/// Spending progress of every budget
#[utoipa::path(
    get,
    path = "/api/v1/dashboard/budget-status",
    tag = "dashboard",
    security(("user_id" = [])),
    responses(
        (status = 200, description = "Budget status list", body = ApiResponse<Vec<BudgetStatusEntry>>),
        (status = 401, description = "Unknown user", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_budget_status_list(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<ApiResponse<Vec<BudgetStatusEntry>>>, HandlerError> {
    let key = budget_status_key(user.id());
    let statuses = match state.cache.get(&key).await {
        Some(CachedData::BudgetStatuses(statuses)) => {
            debug!("Budget statuses served from cache");
            statuses
        }
        _ => {
            let statuses = DashboardComputer::new()
                .budget_statuses(&state.db, user.id())
                .await
                .map_err(|e| compute_error("Failed to compute budget statuses", e))?;
            state
                .cache
                .insert(key, CachedData::BudgetStatuses(statuses.clone()))
                .await;
            statuses
        }
    };

    Ok(Json(ApiResponse {
        data: statuses,
        message: "Budget statuses retrieved successfully".to_string(),
        success: true,
    }))
}
