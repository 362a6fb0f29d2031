//! Resolves the user a request acts for.
//!
//! Token issuance lives outside this service; requests carry the numeric user id in
//! the `X-User-Id` header and the extractor only checks that the user exists.

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};
use model::entities::user;
use sea_orm::EntityTrait;
use tracing::{debug, warn};

use crate::schemas::{database_error, error_response, AppState, HandlerError};

pub const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated user of the current request.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub user::Model);

impl CurrentUser {
    pub fn id(&self) -> i32 {
        self.0.id
    }
}

fn unauthorized(message: &str) -> HandlerError {
    error_response(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
}

#[axum::async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = HandlerError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or_else(|| unauthorized("Missing X-User-Id header"))?;

        let user_id: i32 = raw
            .to_str()
            .ok()
            .and_then(|value| value.trim().parse().ok())
            .ok_or_else(|| unauthorized("Malformed X-User-Id header"))?;

        match user::Entity::find_by_id(user_id).one(&state.db).await {
            Ok(Some(model)) => {
                debug!(user_id, "Request authenticated");
                Ok(CurrentUser(model))
            }
            Ok(None) => {
                warn!(user_id, "Request for unknown user");
                Err(unauthorized("Unknown user"))
            }
            Err(err) => Err(database_error("Failed to load current user", err)),
        }
    }
}
