use crate::auth::CurrentUser;
use crate::handlers::transactions::validate_positive_amount;
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
use chrono::{DateTime, NaiveDate, Utc};
use common::BudgetStatusDetail;
use compute::budget::usage_for;
use compute::notify::release_budget_warnings;
use compute::round_percentage;
use model::entities::{budget, category};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

/// Request body for creating a budget
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
#[validate(schema(function = "validate_new_period"))]
pub struct CreateBudgetRequest {
    pub category_id: i32,
    #[validate(custom(function = "validate_positive_amount"))]
    #[schema(value_type = String, example = "250.00")]
    pub amount: Decimal,
    /// First day of the period (inclusive)
    pub start_date: NaiveDate,
    /// Last day of the period (inclusive); must be after `start_date`
    pub end_date: NaiveDate,
}

fn validate_new_period(request: &CreateBudgetRequest) -> Result<(), ValidationError> {
    check_period(request.start_date, request.end_date)
}

fn check_period(start_date: NaiveDate, end_date: NaiveDate) -> Result<(), ValidationError> {
    if end_date <= start_date {
        return Err(ValidationError::new("end_date_must_be_after_start_date"));
    }
    Ok(())
}

/// Request body for updating a budget. Only provided fields change.
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct UpdateBudgetRequest {
    pub category_id: Option<i32>,
    #[validate(custom(function = "validate_positive_amount"))]
    #[schema(value_type = Option<String>, example = "250.00")]
    pub amount: Option<Decimal>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// Budget as returned by the API
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BudgetResponse {
    pub id: i32,
    pub category_id: i32,
    pub category_name: Option<String>,
    #[schema(value_type = String)]
    pub amount: Decimal,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

impl BudgetResponse {
    fn new(model: budget::Model, category: Option<category::Model>) -> Self {
        Self {
            id: model.id,
            category_id: model.category_id,
            category_name: category.map(|c| c.name),
            amount: model.amount,
            start_date: model.start_date,
            end_date: model.end_date,
            created_at: model.created_at,
        }
    }
}

async fn ensure_category(
    state: &AppState,
    user_id: i32,
    category_id: i32,
) -> Result<category::Model, HandlerError> {
    category::Entity::find_owned(&state.db, user_id, category_id)
        .await
        .map_err(|e| database_error("Failed to validate category", e))?
        .ok_or_else(|| {
            warn!("Category {} does not belong to user {}", category_id, user_id);
            error_response(
                StatusCode::BAD_REQUEST,
                "INVALID_CATEGORY",
                format!("Category {} not found", category_id),
            )
        })
}

async fn load_owned(
    state: &AppState,
    user_id: i32,
    budget_id: i32,
) -> Result<budget::Model, HandlerError> {
    budget::Entity::find_by_id(budget_id)
        .filter(budget::Column::UserId.eq(user_id))
        .one(&state.db)
        .await
        .map_err(|e| database_error("Failed to retrieve budget", e))?
        .ok_or_else(|| not_found("Budget"))
}

/// Create a budget
#[utoipa::path(
    post,
    path = "/api/v1/budgets",
    tag = "budgets",
    request_body = CreateBudgetRequest,
    security(("user_id" = [])),
    responses(
        (status = 201, description = "Budget created successfully", body = ApiResponse<BudgetResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 401, description = "Unknown user", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn create_budget(
    State(state): State<AppState>,
    user: CurrentUser,
    Valid(Json(request)): Valid<Json<CreateBudgetRequest>>,
) -> Result<(StatusCode, Json<ApiResponse<BudgetResponse>>), HandlerError> {
    let category = ensure_category(&state, user.id(), request.category_id).await?;

    let created = budget::ActiveModel {
        user_id: Set(user.id()),
        category_id: Set(request.category_id),
        amount: Set(request.amount),
        start_date: Set(request.start_date),
        end_date: Set(request.end_date),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&state.db)
    .await
    .map_err(|e| database_error("Failed to create budget", e))?;
    state.invalidate_user_cache(user.id()).await;

    info!("Budget created successfully with ID: {}", created.id);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse {
            data: BudgetResponse::new(created, Some(category)),
            message: "Budget created successfully".to_string(),
            success: true,
        }),
    ))
}

/// List budgets, latest period first
#[utoipa::path(
    get,
    path = "/api/v1/budgets",
    tag = "budgets",
    security(("user_id" = [])),
    responses(
        (status = 200, description = "Budgets retrieved successfully", body = ApiResponse<Vec<BudgetResponse>>),
        (status = 401, description = "Unknown user", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_budgets(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<ApiResponse<Vec<BudgetResponse>>>, HandlerError> {
    let rows = budget::Entity::find()
        .filter(budget::Column::UserId.eq(user.id()))
        .order_by_desc(budget::Column::StartDate)
        .order_by_desc(budget::Column::Id)
        .find_also_related(category::Entity)
        .all(&state.db)
        .await
        .map_err(|e| database_error("Failed to retrieve budgets", e))?;

    debug!("Retrieved {} budgets", rows.len());
    Ok(Json(ApiResponse {
        data: rows
            .into_iter()
            .map(|(budget, category)| BudgetResponse::new(budget, category))
            .collect(),
        message: "Budgets retrieved successfully".to_string(),
        success: true,
    }))
}

/// Get a specific budget
#[utoipa::path(
    get,
    path = "/api/v1/budgets/{budget_id}",
    tag = "budgets",
    params(("budget_id" = i32, Path, description = "Budget ID")),
    security(("user_id" = [])),
    responses(
        (status = 200, description = "Budget retrieved successfully", body = ApiResponse<BudgetResponse>),
        (status = 404, description = "Budget not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_budget(
    Path(budget_id): Path<i32>,
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<ApiResponse<BudgetResponse>>, HandlerError> {
    let model = load_owned(&state, user.id(), budget_id).await?;
    let category = model
        .find_related(category::Entity)
        .one(&state.db)
        .await
        .map_err(|e| database_error("Failed to retrieve category", e))?;

    Ok(Json(ApiResponse {
        data: BudgetResponse::new(model, category),
        message: "Budget retrieved successfully".to_string(),
        success: true,
    }))
}

/// Update a budget
#[utoipa::path(
    put,
    path = "/api/v1/budgets/{budget_id}",
    tag = "budgets",
    params(("budget_id" = i32, Path, description = "Budget ID")),
    request_body = UpdateBudgetRequest,
    security(("user_id" = [])),
    responses(
        (status = 200, description = "Budget updated successfully", body = ApiResponse<BudgetResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 404, description = "Budget not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn update_budget(
    Path(budget_id): Path<i32>,
    State(state): State<AppState>,
    user: CurrentUser,
    Valid(Json(request)): Valid<Json<UpdateBudgetRequest>>,
) -> Result<Json<ApiResponse<BudgetResponse>>, HandlerError> {
    let existing = load_owned(&state, user.id(), budget_id).await?;

    let start_date = request.start_date.unwrap_or(existing.start_date);
    let end_date = request.end_date.unwrap_or(existing.end_date);
    if check_period(start_date, end_date).is_err() {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "VALIDATION_ERROR",
            "end_date must be after start_date",
        ));
    }

    let moved_category = request
        .category_id
        .filter(|category_id| *category_id != existing.category_id);

    let mut active: budget::ActiveModel = existing.into();
    if let Some(category_id) = moved_category {
        ensure_category(&state, user.id(), category_id).await?;
        active.category_id = Set(category_id);
    }
    if let Some(amount) = request.amount {
        active.amount = Set(amount);
    }
    active.start_date = Set(start_date);
    active.end_date = Set(end_date);

    let updated = active
        .update(&state.db)
        .await
        .map_err(|e| database_error("Failed to update budget", e))?;
    if moved_category.is_some() {
        // Warnings issued for the old category must not mute the new one.
        release_budget_warnings(&state.db, budget_id)
            .await
            .map_err(|e| compute_error("Failed to reset budget warnings", e))?;
    }
    state.invalidate_user_cache(user.id()).await;

    let category = updated
        .find_related(category::Entity)
        .one(&state.db)
        .await
        .map_err(|e| database_error("Failed to retrieve category", e))?;

    info!("Budget {} updated successfully", budget_id);
    Ok(Json(ApiResponse {
        data: BudgetResponse::new(updated, category),
        message: "Budget updated successfully".to_string(),
        success: true,
    }))
}

/// Delete a budget
#[utoipa::path(
    delete,
    path = "/api/v1/budgets/{budget_id}",
    tag = "budgets",
    params(("budget_id" = i32, Path, description = "Budget ID")),
    security(("user_id" = [])),
    responses(
        (status = 200, description = "Budget deleted successfully", body = ApiResponse<String>),
        (status = 404, description = "Budget not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn delete_budget(
    Path(budget_id): Path<i32>,
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<ApiResponse<String>>, HandlerError> {
    let existing = load_owned(&state, user.id(), budget_id).await?;
    existing
        .delete(&state.db)
        .await
        .map_err(|e| database_error("Failed to delete budget", e))?;
    state.invalidate_user_cache(user.id()).await;

    info!("Budget {} deleted successfully", budget_id);
    Ok(Json(ApiResponse {
        data: format!("Budget {} deleted", budget_id),
        message: "Budget deleted successfully".to_string(),
        success: true,
    }))
}

/// Spending against a single budget
#[utoipa::path(
    get,
    path = "/api/v1/budgets/{budget_id}/status",
    tag = "budgets",
    params(("budget_id" = i32, Path, description = "Budget ID")),
    security(("user_id" = [])),
    responses(
        (status = 200, description = "Budget status computed", body = ApiResponse<BudgetStatusDetail>),
        (status = 404, description = "Budget not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_budget_status(
    Path(budget_id): Path<i32>,
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<ApiResponse<BudgetStatusDetail>>, HandlerError> {
    let model = load_owned(&state, user.id(), budget_id).await?;
    let usage = usage_for(&state.db, &model)
        .await
        .map_err(|e| compute_error("Failed to compute budget status", e))?;
    let remaining_amount = usage
        .remaining()
        .map_err(|e| compute_error("Failed to compute budget status", e))?;

    Ok(Json(ApiResponse {
        data: BudgetStatusDetail {
            budget_amount: usage.amount,
            spent_amount: usage.spent,
            remaining_amount,
            percentage_used: round_percentage(usage.percentage_used, 2),
            is_exceeded: usage.is_exceeded(),
        },
        message: "Budget status retrieved successfully".to_string(),
        success: true,
    }))
}
