use crate::schemas::{
    database_error, error_response, not_found, ApiResponse, AppState, ErrorResponse, HandlerError,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use axum_valid::Valid;
use chrono::{DateTime, Utc};
use model::entities::user;
use sea_orm::{ActiveModelTrait, DbErr, EntityTrait, QueryOrder, Set, SqlErr};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, trace, warn};
use utoipa::ToSchema;
use validator::Validate;

/// Request body for creating a new user
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct CreateUserRequest {
    /// Username (must be unique)
    #[validate(length(min = 1, max = 150))]
    pub username: String,
    /// Address for budget alerts
    #[validate(email)]
    pub email: Option<String>,
}

/// Request body for updating a user
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct UpdateUserRequest {
    /// Username (must be unique)
    #[validate(length(min = 1, max = 150))]
    pub username: Option<String>,
    /// Address for budget alerts; an empty string removes it
    pub email: Option<String>,
}

/// User response model
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl From<user::Model> for UserResponse {
    fn from(model: user::Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            email: model.email,
            created_at: model.created_at,
        }
    }
}

fn write_error(username: &str, err: DbErr) -> HandlerError {
    if let Some(SqlErr::UniqueConstraintViolation(_)) = err.sql_err() {
        warn!("Username '{}' already exists", username);
        return error_response(
            StatusCode::CONFLICT,
            "USERNAME_ALREADY_EXISTS",
            format!("Username '{}' already exists", username),
        );
    }
    database_error("Failed to store user", err)
}

/// Create a new user
#[utoipa::path(
    post,
    path = "/api/v1/users",
    tag = "users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created successfully", body = ApiResponse<UserResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 409, description = "Username already taken", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn create_user(
    State(state): State<AppState>,
    Valid(Json(request)): Valid<Json<CreateUserRequest>>,
) -> Result<(StatusCode, Json<ApiResponse<UserResponse>>), HandlerError> {
    trace!("Entering create_user function");
    debug!("Creating user with username: {}", request.username);

    let new_user = user::ActiveModel {
        username: Set(request.username.clone()),
        email: Set(request.email.unwrap_or_default()),
        created_at: Set(Utc::now()),
        ..Default::default()
    };

    let user_model = new_user
        .insert(&state.db)
        .await
        .map_err(|e| write_error(&request.username, e))?;

    info!(
        "User created successfully with ID: {}, username: {}",
        user_model.id, user_model.username
    );
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse {
            data: UserResponse::from(user_model),
            message: "User created successfully".to_string(),
            success: true,
        }),
    ))
}

/// Get all users
#[utoipa::path(
    get,
    path = "/api/v1/users",
    tag = "users",
    responses(
        (status = 200, description = "Users retrieved successfully", body = ApiResponse<Vec<UserResponse>>),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_users(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<UserResponse>>>, HandlerError> {
    let users = user::Entity::find()
        .order_by_asc(user::Column::Id)
        .all(&state.db)
        .await
        .map_err(|e| database_error("Failed to retrieve users", e))?;

    debug!("Retrieved {} users from database", users.len());
    Ok(Json(ApiResponse {
        data: users.into_iter().map(UserResponse::from).collect(),
        message: "Users retrieved successfully".to_string(),
        success: true,
    }))
}

/// Get a specific user by ID
#[utoipa::path(
    get,
    path = "/api/v1/users/{user_id}",
    tag = "users",
    params(
        ("user_id" = i32, Path, description = "User ID"),
    ),
    responses(
        (status = 200, description = "User retrieved successfully", body = ApiResponse<UserResponse>),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_user(
    Path(user_id): Path<i32>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<UserResponse>>, HandlerError> {
    let user_model = user::Entity::find_by_id(user_id)
        .one(&state.db)
        .await
        .map_err(|e| database_error("Failed to retrieve user", e))?
        .ok_or_else(|| {
            warn!("User with ID {} not found", user_id);
            not_found("User")
        })?;

    Ok(Json(ApiResponse {
        data: UserResponse::from(user_model),
        message: "User retrieved successfully".to_string(),
        success: true,
    }))
}

/// Update a user
#[utoipa::path(
    put,
    path = "/api/v1/users/{user_id}",
    tag = "users",
    params(
        ("user_id" = i32, Path, description = "User ID"),
    ),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "User updated successfully", body = ApiResponse<UserResponse>),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn update_user(
    Path(user_id): Path<i32>,
    State(state): State<AppState>,
    Valid(Json(request)): Valid<Json<UpdateUserRequest>>,
) -> Result<Json<ApiResponse<UserResponse>>, HandlerError> {
    let existing_user = user::Entity::find_by_id(user_id)
        .one(&state.db)
        .await
        .map_err(|e| database_error("Failed to retrieve user", e))?
        .ok_or_else(|| not_found("User"))?;

    let username = request
        .username
        .clone()
        .unwrap_or_else(|| existing_user.username.clone());
    let mut user_active: user::ActiveModel = existing_user.into();

    if let Some(new_username) = request.username {
        debug!("Updating username to: {}", new_username);
        user_active.username = Set(new_username);
    }
    if let Some(email) = request.email {
        let email = email.trim().to_string();
        if !email.is_empty() && !validator::ValidateEmail::validate_email(&email) {
            return Err(error_response(
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                "Invalid email address",
            ));
        }
        user_active.email = Set(email);
    }

    let updated_user = user_active
        .update(&state.db)
        .await
        .map_err(|e| write_error(&username, e))?;

    info!("User with ID {} updated successfully", user_id);
    Ok(Json(ApiResponse {
        data: UserResponse::from(updated_user),
        message: "User updated successfully".to_string(),
        success: true,
    }))
}

/// Delete a user and everything the user owns
#[utoipa::path(
    delete,
    path = "/api/v1/users/{user_id}",
    tag = "users",
    params(
        ("user_id" = i32, Path, description = "User ID"),
    ),
    responses(
        (status = 200, description = "User deleted successfully", body = ApiResponse<String>),
        (status = 404, description = "User not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn delete_user(
    Path(user_id): Path<i32>,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<String>>, HandlerError> {
    let delete_result = user::Entity::delete_by_id(user_id)
        .exec(&state.db)
        .await
        .map_err(|e| database_error("Failed to delete user", e))?;

    if delete_result.rows_affected == 0 {
        warn!("User with ID {} not found for deletion (no rows affected)", user_id);
        return Err(not_found("User"));
    }

    state.invalidate_user_cache(user_id).await;
    info!("User with ID {} deleted successfully", user_id);
    Ok(Json(ApiResponse {
        data: format!("User {} deleted", user_id),
        message: "User deleted successfully".to_string(),
        success: true,
    }))
}
