use crate::auth::CurrentUser;
use crate::handlers::reports::{csv_attachment, ExportQuery};
use crate::schemas::{
    compute_error, database_error, error_response, not_found, ApiResponse, AppState,
    ErrorResponse, HandlerError,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Json, Response},
};
use axum_valid::Valid;
use chrono::{DateTime, NaiveDate, Utc};
use common::TransactionSummary;
use compute::amount::is_valid_amount;
use compute::evaluator::on_transaction_created;
use compute::filter::TransactionFilter;
use compute::report::ReportComputer;
use model::entities::{category, transaction, TransactionKind};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, trace, warn};
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationError};

/// Positive, below 100,000,000 and with at most two decimal places.
pub(crate) fn validate_positive_amount(amount: &Decimal) -> Result<(), ValidationError> {
    if *amount <= Decimal::ZERO {
        return Err(ValidationError::new("amount_must_be_positive"));
    }
    if !is_valid_amount(amount) {
        return Err(ValidationError::new("amount_out_of_range"));
    }
    Ok(())
}

/// Request body for creating a transaction
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct CreateTransactionRequest {
    /// Positive amount; the direction is given by `kind`
    #[validate(custom(function = "validate_positive_amount"))]
    #[schema(value_type = String, example = "42.50")]
    pub amount: Decimal,
    #[schema(value_type = String, example = "expense")]
    pub kind: TransactionKind,
    /// Category owned by the current user
    pub category_id: Option<i32>,
    #[serde(default)]
    #[validate(length(max = 500))]
    pub description: String,
    pub date: NaiveDate,
}

/// Request body for updating a transaction. Only provided fields change.
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct UpdateTransactionRequest {
    #[validate(custom(function = "validate_positive_amount"))]
    #[schema(value_type = Option<String>, example = "42.50")]
    pub amount: Option<Decimal>,
    #[schema(value_type = Option<String>, example = "income")]
    pub kind: Option<TransactionKind>,
    /// Omit to keep the category, `null` to remove it
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    #[schema(value_type = Option<i32>)]
    pub category_id: Option<Option<i32>>,
    #[validate(length(max = 500))]
    pub description: Option<String>,
    pub date: Option<NaiveDate>,
}

/// Transaction as returned by the API
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TransactionResponse {
    pub id: i32,
    #[schema(value_type = String)]
    pub amount: Decimal,
    #[schema(value_type = String)]
    pub kind: TransactionKind,
    pub category_id: Option<i32>,
    pub category_name: Option<String>,
    pub description: String,
    pub date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl TransactionResponse {
    fn new(model: transaction::Model, category: Option<category::Model>) -> Self {
        Self {
            id: model.id,
            amount: model.amount,
            kind: model.kind,
            category_id: model.category_id,
            category_name: category.map(|c| c.name),
            description: model.description,
            date: model.date,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// Filters shared by the list and summary endpoints
#[derive(Debug, Default, Deserialize, IntoParams, Validate)]
#[into_params(parameter_in = Query)]
pub struct TransactionQuery {
    #[param(value_type = Option<String>)]
    pub kind: Option<TransactionKind>,
    pub category_id: Option<i32>,
    /// Substring of the description
    pub search: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    #[param(value_type = Option<String>)]
    pub amount_min: Option<Decimal>,
    #[param(value_type = Option<String>)]
    pub amount_max: Option<Decimal>,
    /// Page number (default: 1)
    #[validate(range(min = 1, max = 10000))]
    pub page: Option<u64>,
    /// Page size (default: 50)
    #[validate(range(min = 1, max = 1000))]
    pub limit: Option<u64>,
}

impl TransactionQuery {
    fn filter(&self) -> TransactionFilter {
        TransactionFilter {
            kind: self.kind,
            category_id: self.category_id,
            search: self.search.clone(),
            start_date: self.start_date,
            end_date: self.end_date,
            amount_min: self.amount_min,
            amount_max: self.amount_max,
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
    transaction_id: i32,
) -> Result<transaction::Model, HandlerError> {
    transaction::Entity::find_by_id(transaction_id)
        .filter(transaction::Column::UserId.eq(user_id))
        .one(&state.db)
        .await
        .map_err(|e| database_error("Failed to retrieve transaction", e))?
        .ok_or_else(|| not_found("Transaction"))
}

/// Create a transaction and evaluate the budgets it affects
#[utoipa::path(
    post,
    path = "/api/v1/transactions",
    tag = "transactions",
    request_body = CreateTransactionRequest,
    security(("user_id" = [])),
    responses(
        (status = 201, description = "Transaction created successfully", body = ApiResponse<TransactionResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 401, description = "Unknown user", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn create_transaction(
    State(state): State<AppState>,
    user: CurrentUser,
    Valid(Json(request)): Valid<Json<CreateTransactionRequest>>,
) -> Result<(StatusCode, Json<ApiResponse<TransactionResponse>>), HandlerError> {
    trace!("Entering create_transaction function");

    let category = match request.category_id {
        Some(category_id) => Some(ensure_category(&state, user.id(), category_id).await?),
        None => None,
    };

    let created = transaction::ActiveModel {
        user_id: Set(user.id()),
        category_id: Set(request.category_id),
        amount: Set(request.amount),
        kind: Set(request.kind),
        description: Set(request.description),
        date: Set(request.date),
        created_at: Set(Utc::now()),
        updated_at: Set(None),
        ..Default::default()
    }
    .insert(&state.db)
    .await
    .map_err(|e| database_error("Failed to create transaction", e))?;

    info!("Transaction created successfully with ID: {}", created.id);
    state.invalidate_user_cache(user.id()).await;

    let notifications = on_transaction_created(&state.db, state.mailer.clone(), &created).await;
    debug!("Transaction {} produced {} notifications", created.id, notifications.len());

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse {
            data: TransactionResponse::new(created, category),
            message: "Transaction created successfully".to_string(),
            success: true,
        }),
    ))
}

/// List transactions, newest first
#[utoipa::path(
    get,
    path = "/api/v1/transactions",
    tag = "transactions",
    params(TransactionQuery),
    security(("user_id" = [])),
    responses(
        (status = 200, description = "Transactions retrieved successfully", body = ApiResponse<Vec<TransactionResponse>>),
        (status = 400, description = "Invalid query", body = ErrorResponse),
        (status = 401, description = "Unknown user", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_transactions(
    State(state): State<AppState>,
    user: CurrentUser,
    Valid(Query(query)): Valid<Query<TransactionQuery>>,
) -> Result<Json<ApiResponse<Vec<TransactionResponse>>>, HandlerError> {
    let page = query.page.unwrap_or(1);
    let limit = query.limit.unwrap_or(50);
    debug!("Fetching transactions - page: {}, limit: {}", page, limit);

    let rows = query
        .filter()
        .select(user.id())
        .order_by_desc(transaction::Column::Date)
        .order_by_desc(transaction::Column::Id)
        .find_also_related(category::Entity)
        .paginate(&state.db, limit)
        .fetch_page(page - 1)
        .await
        .map_err(|e| database_error("Failed to retrieve transactions", e))?;

    Ok(Json(ApiResponse {
        data: rows
            .into_iter()
            .map(|(tx, category)| TransactionResponse::new(tx, category))
            .collect(),
        message: "Transactions retrieved successfully".to_string(),
        success: true,
    }))
}

/// Get a specific transaction
#[utoipa::path(
    get,
    path = "/api/v1/transactions/{transaction_id}",
    tag = "transactions",
    params(("transaction_id" = i32, Path, description = "Transaction ID")),
    security(("user_id" = [])),
    responses(
        (status = 200, description = "Transaction retrieved successfully", body = ApiResponse<TransactionResponse>),
        (status = 404, description = "Transaction not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_transaction(
    Path(transaction_id): Path<i32>,
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<ApiResponse<TransactionResponse>>, HandlerError> {
    let model = load_owned(&state, user.id(), transaction_id).await?;
    let category = model
        .find_related(category::Entity)
        .one(&state.db)
        .await
        .map_err(|e| database_error("Failed to retrieve category", e))?;

    Ok(Json(ApiResponse {
        data: TransactionResponse::new(model, category),
        message: "Transaction retrieved successfully".to_string(),
        success: true,
    }))
}

/// Update a transaction. Budgets are not re-evaluated.
#[utoipa::path(
    put,
    path = "/api/v1/transactions/{transaction_id}",
    tag = "transactions",
    params(("transaction_id" = i32, Path, description = "Transaction ID")),
    request_body = UpdateTransactionRequest,
    security(("user_id" = [])),
    responses(
        (status = 200, description = "Transaction updated successfully", body = ApiResponse<TransactionResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 404, description = "Transaction not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn update_transaction(
    Path(transaction_id): Path<i32>,
    State(state): State<AppState>,
    user: CurrentUser,
    Valid(Json(request)): Valid<Json<UpdateTransactionRequest>>,
) -> Result<Json<ApiResponse<TransactionResponse>>, HandlerError> {
    let existing = load_owned(&state, user.id(), transaction_id).await?;

    let mut active: transaction::ActiveModel = existing.into();
    match request.category_id {
        Some(Some(category_id)) => {
            ensure_category(&state, user.id(), category_id).await?;
            active.category_id = Set(Some(category_id));
        }
        Some(None) => active.category_id = Set(None),
        None => {}
    }
    if let Some(amount) = request.amount {
        active.amount = Set(amount);
    }
    if let Some(kind) = request.kind {
        active.kind = Set(kind);
    }
    if let Some(description) = request.description {
        active.description = Set(description);
    }
    if let Some(date) = request.date {
        active.date = Set(date);
    }
    active.updated_at = Set(Some(Utc::now()));

    let updated = active
        .update(&state.db)
        .await
        .map_err(|e| database_error("Failed to update transaction", e))?;
    state.invalidate_user_cache(user.id()).await;

    let category = updated
        .find_related(category::Entity)
        .one(&state.db)
        .await
        .map_err(|e| database_error("Failed to retrieve category", e))?;

    info!("Transaction {} updated successfully", transaction_id);
    Ok(Json(ApiResponse {
        data: TransactionResponse::new(updated, category),
        message: "Transaction updated successfully".to_string(),
        success: true,
    }))
}

/// Delete a transaction
#[utoipa::path(
    delete,
    path = "/api/v1/transactions/{transaction_id}",
    tag = "transactions",
    params(("transaction_id" = i32, Path, description = "Transaction ID")),
    security(("user_id" = [])),
    responses(
        (status = 200, description = "Transaction deleted successfully", body = ApiResponse<String>),
        (status = 404, description = "Transaction not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn delete_transaction(
    Path(transaction_id): Path<i32>,
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<ApiResponse<String>>, HandlerError> {
    let existing = load_owned(&state, user.id(), transaction_id).await?;
    existing
        .delete(&state.db)
        .await
        .map_err(|e| database_error("Failed to delete transaction", e))?;
    state.invalidate_user_cache(user.id()).await;

    info!("Transaction {} deleted successfully", transaction_id);
    Ok(Json(ApiResponse {
        data: format!("Transaction {} deleted", transaction_id),
        message: "Transaction deleted successfully".to_string(),
        success: true,
    }))
}

/// Totals and monthly breakdown of the filtered transactions
#[utoipa::path(
    get,
    path = "/api/v1/transactions/summary",
    tag = "transactions",
    params(TransactionQuery),
    security(("user_id" = [])),
    responses(
        (status = 200, description = "Summary computed", body = ApiResponse<TransactionSummary>),
        (status = 401, description = "Unknown user", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_transaction_summary(
    State(state): State<AppState>,
    user: CurrentUser,
    Valid(Query(query)): Valid<Query<TransactionQuery>>,
) -> Result<Json<ApiResponse<TransactionSummary>>, HandlerError> {
    let summary = ReportComputer::new()
        .transaction_summary(&state.db, user.id(), &query.filter())
        .await
        .map_err(|e| compute_error("Failed to compute transaction summary", e))?;

    Ok(Json(ApiResponse {
        data: summary,
        message: "Transaction summary retrieved successfully".to_string(),
        success: true,
    }))
}

/// Download transactions as CSV
#[utoipa::path(
    get,
    path = "/api/v1/transactions/export",
    tag = "transactions",
    params(ExportQuery),
    security(("user_id" = [])),
    responses(
        (status = 200, description = "CSV file", content_type = "text/csv", body = String),
        (status = 401, description = "Unknown user", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn export_transactions(
    State(state): State<AppState>,
    user: CurrentUser,
    Valid(Query(query)): Valid<Query<ExportQuery>>,
) -> Result<Response, HandlerError> {
    let body = ReportComputer::new()
        .export_csv(&state.db, user.id(), query.start_date, query.end_date)
        .await
        .map_err(|e| compute_error("Failed to export transactions", e))?;
    Ok(csv_attachment(body))
}
