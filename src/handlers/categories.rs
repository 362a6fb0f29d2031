use crate::auth::CurrentUser;
use crate::schemas::{
    compute_error, database_error, error_response, not_found, ApiResponse, AppState,
    ErrorResponse, HandlerError,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use axum_valid::Valid;
use chrono::{DateTime, Utc};
use common::CategoryStatistic;
use compute::categories::CategoriesComputer;
use model::entities::{category, TransactionKind};
use sea_orm::{ActiveModelTrait, DbErr, EntityTrait, ModelTrait, Set, SqlErr};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;
use validator::Validate;

/// Request structure for creating a new category
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct CreateCategoryRequest {
    /// The name of the category (unique per user)
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    /// Whether the category groups income or expenses
    #[schema(value_type = String, example = "expense")]
    pub kind: TransactionKind,
}

/// Request structure for updating an existing category
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct UpdateCategoryRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[schema(value_type = Option<String>, example = "income")]
    pub kind: Option<TransactionKind>,
}

/// Response structure for category operations
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CategoryResponse {
    pub id: i32,
    pub name: String,
    #[schema(value_type = String)]
    pub kind: TransactionKind,
    pub created_at: DateTime<Utc>,
}

impl From<category::Model> for CategoryResponse {
    fn from(model: category::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            kind: model.kind,
            created_at: model.created_at,
        }
    }
}

fn write_error(name: &str, err: DbErr) -> HandlerError {
    if let Some(SqlErr::UniqueConstraintViolation(_)) = err.sql_err() {
        warn!("Category '{}' already exists", name);
        return error_response(
            StatusCode::CONFLICT,
            "CATEGORY_ALREADY_EXISTS",
            format!("Category '{}' already exists", name),
        );
    }
    database_error("Failed to store category", err)
}

async fn load_owned(state: &AppState, user_id: i32, category_id: i32) -> Result<category::Model, HandlerError> {
    category::Entity::find_owned(&state.db, user_id, category_id)
        .await
        .map_err(|e| database_error("Failed to retrieve category", e))?
        .ok_or_else(|| not_found("Category"))
}

/// Create a new category
#[utoipa::path(
    post,
    path = "/api/v1/categories",
    tag = "categories",
    request_body = CreateCategoryRequest,
    security(("user_id" = [])),
    responses(
        (status = 201, description = "Category created successfully", body = ApiResponse<CategoryResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 401, description = "Unknown user", body = ErrorResponse),
        (status = 409, description = "Category name already used", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn create_category(
    State(state): State<AppState>,
    user: CurrentUser,
    Valid(Json(request)): Valid<Json<CreateCategoryRequest>>,
) -> Result<(StatusCode, Json<ApiResponse<CategoryResponse>>), HandlerError> {
    debug!("Creating category '{}' for user {}", request.name, user.id());

    let created = category::ActiveModel {
        user_id: Set(user.id()),
        name: Set(request.name.trim().to_string()),
        kind: Set(request.kind),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&state.db)
    .await
    .map_err(|e| write_error(&request.name, e))?;

    info!("Category created successfully with ID: {}", created.id);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse {
            data: CategoryResponse::from(created),
            message: "Category created successfully".to_string(),
            success: true,
        }),
    ))
}

/// List the current user's categories ordered by name
#[utoipa::path(
    get,
    path = "/api/v1/categories",
    tag = "categories",
    security(("user_id" = [])),
    responses(
        (status = 200, description = "Categories retrieved successfully", body = ApiResponse<Vec<CategoryResponse>>),
        (status = 401, description = "Unknown user", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_categories(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<ApiResponse<Vec<CategoryResponse>>>, HandlerError> {
    let categories = category::Entity::find_for_user(&state.db, user.id())
        .await
        .map_err(|e| database_error("Failed to retrieve categories", e))?;

    Ok(Json(ApiResponse {
        data: categories.into_iter().map(CategoryResponse::from).collect(),
        message: "Categories retrieved successfully".to_string(),
        success: true,
    }))
}

/// Get a specific category
#[utoipa::path(
    get,
    path = "/api/v1/categories/{category_id}",
    tag = "categories",
    params(("category_id" = i32, Path, description = "Category ID")),
    security(("user_id" = [])),
    responses(
        (status = 200, description = "Category retrieved successfully", body = ApiResponse<CategoryResponse>),
        (status = 404, description = "Category not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_category(
    Path(category_id): Path<i32>,
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<ApiResponse<CategoryResponse>>, HandlerError> {
    let model = load_owned(&state, user.id(), category_id).await?;
    Ok(Json(ApiResponse {
        data: CategoryResponse::from(model),
        message: "Category retrieved successfully".to_string(),
        success: true,
    }))
}

/// Update a category
#[utoipa::path(
    put,
    path = "/api/v1/categories/{category_id}",
    tag = "categories",
    params(("category_id" = i32, Path, description = "Category ID")),
    request_body = UpdateCategoryRequest,
    security(("user_id" = [])),
    responses(
        (status = 200, description = "Category updated successfully", body = ApiResponse<CategoryResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 404, description = "Category not found", body = ErrorResponse),
        (status = 409, description = "Category name already used", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn update_category(
    Path(category_id): Path<i32>,
    State(state): State<AppState>,
    user: CurrentUser,
    Valid(Json(request)): Valid<Json<UpdateCategoryRequest>>,
) -> Result<Json<ApiResponse<CategoryResponse>>, HandlerError> {
    let existing = load_owned(&state, user.id(), category_id).await?;
    let name = request.name.clone().unwrap_or_else(|| existing.name.clone());

    let mut active: category::ActiveModel = existing.into();
    if let Some(new_name) = request.name {
        active.name = Set(new_name.trim().to_string());
    }
    if let Some(kind) = request.kind {
        active.kind = Set(kind);
    }

    let updated = active
        .update(&state.db)
        .await
        .map_err(|e| write_error(&name, e))?;
    // Budget statuses carry category names.
    state.invalidate_user_cache(user.id()).await;

    info!("Category {} updated successfully", category_id);
    Ok(Json(ApiResponse {
        data: CategoryResponse::from(updated),
        message: "Category updated successfully".to_string(),
        success: true,
    }))
}

/// Delete a category. Its transactions become uncategorized and its budgets are removed.
#[utoipa::path(
    delete,
    path = "/api/v1/categories/{category_id}",
    tag = "categories",
    params(("category_id" = i32, Path, description = "Category ID")),
    security(("user_id" = [])),
    responses(
        (status = 200, description = "Category deleted successfully", body = ApiResponse<String>),
        (status = 404, description = "Category not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn delete_category(
    Path(category_id): Path<i32>,
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<ApiResponse<String>>, HandlerError> {
    let existing = load_owned(&state, user.id(), category_id).await?;
    existing
        .delete(&state.db)
        .await
        .map_err(|e| database_error("Failed to delete category", e))?;
    state.invalidate_user_cache(user.id()).await;

    info!("Category {} deleted successfully", category_id);
    Ok(Json(ApiResponse {
        data: format!("Category {} deleted", category_id),
        message: "Category deleted successfully".to_string(),
        success: true,
    }))
}

/// Totals and transaction counts per category, largest total first
#[utoipa::path(
    get,
    path = "/api/v1/categories/statistics",
    tag = "categories",
    security(("user_id" = [])),
    responses(
        (status = 200, description = "Category statistics computed", body = ApiResponse<Vec<CategoryStatistic>>),
        (status = 401, description = "Unknown user", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_category_statistics(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<ApiResponse<Vec<CategoryStatistic>>>, HandlerError> {
    let statistics = CategoriesComputer::new()
        .category_statistics(&state.db, user.id())
        .await
        .map_err(|e| compute_error("Failed to compute category statistics", e))?;

    Ok(Json(ApiResponse {
        data: statistics,
        message: "Category statistics retrieved successfully".to_string(),
        success: true,
    }))
}
