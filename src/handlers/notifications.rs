use crate::auth::CurrentUser;
use crate::schemas::{database_error, not_found, ApiResponse, AppState, ErrorResponse, HandlerError};
use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use axum_valid::Valid;
use chrono::{DateTime, NaiveDate, Utc};
use model::entities::{notification, NotificationKind};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Notification as returned by the API
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct NotificationResponse {
    pub id: i32,
    #[schema(value_type = String, example = "budget_warning")]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    pub budget_id: Option<i32>,
    pub period_start: Option<NaiveDate>,
}

impl From<notification::Model> for NotificationResponse {
    fn from(model: notification::Model) -> Self {
        Self {
            id: model.id,
            kind: model.kind,
            title: model.title,
            message: model.message,
            is_read: model.is_read,
            created_at: model.created_at,
            budget_id: model.budget_id,
            period_start: model.period_start,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UnreadCountResponse {
    pub count: u64,
}

#[derive(Debug, Default, Deserialize, IntoParams, Validate)]
#[into_params(parameter_in = Query)]
pub struct NotificationQuery {
    /// Only return unread notifications
    pub unread_only: Option<bool>,
    /// Page number (default: 1)
    #[validate(range(min = 1, max = 10000))]
    pub page: Option<u64>,
    /// Page size (default: 50)
    #[validate(range(min = 1, max = 1000))]
    pub limit: Option<u64>,
}

/// List notifications, newest first
#[utoipa::path(
    get,
    path = "/api/v1/notifications",
    tag = "notifications",
    params(NotificationQuery),
    security(("user_id" = [])),
    responses(
        (status = 200, description = "Notifications retrieved successfully", body = ApiResponse<Vec<NotificationResponse>>),
        (status = 401, description = "Unknown user", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_notifications(
    State(state): State<AppState>,
    user: CurrentUser,
    Valid(Query(query)): Valid<Query<NotificationQuery>>,
) -> Result<Json<ApiResponse<Vec<NotificationResponse>>>, HandlerError> {
    let page = query.page.unwrap_or(1);
    let limit = query.limit.unwrap_or(50);

    let mut select = notification::Entity::find()
        .filter(notification::Column::UserId.eq(user.id()));
    if query.unread_only.unwrap_or(false) {
        select = select.filter(notification::Column::IsRead.eq(false));
    }

    let notifications = select
        .order_by_desc(notification::Column::CreatedAt)
        .order_by_desc(notification::Column::Id)
        .paginate(&state.db, limit)
        .fetch_page(page - 1)
        .await
        .map_err(|e| database_error("Failed to retrieve notifications", e))?;

    debug!("Retrieved {} notifications", notifications.len());
    Ok(Json(ApiResponse {
        data: notifications.into_iter().map(NotificationResponse::from).collect(),
        message: "Notifications retrieved successfully".to_string(),
        success: true,
    }))
}

/// Number of unread notifications
#[utoipa::path(
    get,
    path = "/api/v1/notifications/unread-count",
    tag = "notifications",
    security(("user_id" = [])),
    responses(
        (status = 200, description = "Unread count", body = ApiResponse<UnreadCountResponse>),
        (status = 401, description = "Unknown user", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_unread_count(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<ApiResponse<UnreadCountResponse>>, HandlerError> {
    let count = notification::Entity::find()
        .filter(notification::Column::UserId.eq(user.id()))
        .filter(notification::Column::IsRead.eq(false))
        .count(&state.db)
        .await
        .map_err(|e| database_error("Failed to count notifications", e))?;

    Ok(Json(ApiResponse {
        data: UnreadCountResponse { count },
        message: "Unread count retrieved successfully".to_string(),
        success: true,
    }))
}

/// Mark every notification of the user as read
#[utoipa::path(
    patch,
    path = "/api/v1/notifications/read-all",
    tag = "notifications",
    security(("user_id" = [])),
    responses(
        (status = 200, description = "Notifications marked as read", body = ApiResponse<UnreadCountResponse>),
        (status = 401, description = "Unknown user", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn mark_all_read(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<ApiResponse<UnreadCountResponse>>, HandlerError> {
    let result = notification::Entity::update_many()
        .col_expr(notification::Column::IsRead, Expr::value(true))
        .filter(notification::Column::UserId.eq(user.id()))
        .filter(notification::Column::IsRead.eq(false))
        .exec(&state.db)
        .await
        .map_err(|e| database_error("Failed to mark notifications as read", e))?;

    info!("Marked {} notifications as read for user {}", result.rows_affected, user.id());
    Ok(Json(ApiResponse {
        data: UnreadCountResponse { count: 0 },
        message: format!("{} notifications marked as read", result.rows_affected),
        success: true,
    }))
}

/// Mark a single notification as read
#[utoipa::path(
    patch,
    path = "/api/v1/notifications/{notification_id}/read",
    tag = "notifications",
    params(("notification_id" = i32, Path, description = "Notification ID")),
    security(("user_id" = [])),
    responses(
        (status = 200, description = "Notification marked as read", body = ApiResponse<NotificationResponse>),
        (status = 404, description = "Notification not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn mark_read(
    Path(notification_id): Path<i32>,
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<ApiResponse<NotificationResponse>>, HandlerError> {
    let existing = notification::Entity::find_by_id(notification_id)
        .filter(notification::Column::UserId.eq(user.id()))
        .one(&state.db)
        .await
        .map_err(|e| database_error("Failed to retrieve notification", e))?
        .ok_or_else(|| not_found("Notification"))?;

    let mut active: notification::ActiveModel = existing.into();
    active.is_read = Set(true);
    let updated = active
        .update(&state.db)
        .await
        .map_err(|e| database_error("Failed to update notification", e))?;

    Ok(Json(ApiResponse {
        data: NotificationResponse::from(updated),
        message: "Notification marked as read".to_string(),
        success: true,
    }))
}

/// Delete a notification
#[utoipa::path(
    delete,
    path = "/api/v1/notifications/{notification_id}",
    tag = "notifications",
    params(("notification_id" = i32, Path, description = "Notification ID")),
    security(("user_id" = [])),
    responses(
        (status = 200, description = "Notification deleted", body = ApiResponse<String>),
        (status = 404, description = "Notification not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn delete_notification(
    Path(notification_id): Path<i32>,
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<ApiResponse<String>>, HandlerError> {
    let result = notification::Entity::delete_many()
        .filter(notification::Column::Id.eq(notification_id))
        .filter(notification::Column::UserId.eq(user.id()))
        .exec(&state.db)
        .await
        .map_err(|e| database_error("Failed to delete notification", e))?;

    if result.rows_affected == 0 {
        return Err(not_found("Notification"));
    }

    Ok(Json(ApiResponse {
        data: format!("Notification {} deleted", notification_id),
        message: "Notification deleted successfully".to_string(),
        success: true,
    }))
}
