use crate::auth::CurrentUser;
use crate::schemas::{compute_error, ApiResponse, AppState, ErrorResponse, HandlerError};
use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Json, Response},
};
use axum_valid::Valid;
use chrono::{NaiveDate, Utc};
use common::ReportData;
use compute::report::{resolve_range, ReportComputer};
use serde::Deserialize;
use tracing::{debug, instrument};
use utoipa::IntoParams;
use validator::{Validate, ValidationError};

pub const CSV_FILENAME: &str = "transactions.csv";

/// Optional date range of a report or export
#[derive(Debug, Default, Deserialize, IntoParams, Validate)]
#[into_params(parameter_in = Query)]
#[validate(schema(function = "validate_date_order"))]
pub struct ExportQuery {
    /// First day included (YYYY-MM-DD)
    pub start_date: Option<NaiveDate>,
    /// Last day included (YYYY-MM-DD)
    pub end_date: Option<NaiveDate>,
}

fn validate_date_order(query: &ExportQuery) -> Result<(), ValidationError> {
    match (query.start_date, query.end_date) {
        (Some(start), Some(end)) if end < start => {
            Err(ValidationError::new("end_date_before_start_date"))
        }
        _ => Ok(()),
    }
}

/// Wraps a CSV document into a download response.
pub fn csv_attachment(body: String) -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", CSV_FILENAME),
            ),
        ],
        body,
    )
        .into_response()
}

/// Totals, category breakdown and six-month trend. Defaults to the last 90 days.
#[utoipa::path(
    get,
    path = "/api/v1/reports/data",
    tag = "reports",
    params(ExportQuery),
    security(("user_id" = [])),
    responses(
        (status = 200, description = "Report computed", body = ApiResponse<ReportData>),
        (status = 400, description = "Invalid date range", body = ErrorResponse),
        (status = 401, description = "Unknown user", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_report_data(
    State(state): State<AppState>,
    user: CurrentUser,
    Valid(Query(query)): Valid<Query<ExportQuery>>,
) -> Result<Json<ApiResponse<ReportData>>, HandlerError> {
    let today = Utc::now().date_naive();
    let range = resolve_range(query.start_date, query.end_date, today);
    debug!("Building report for {} to {}", range.start_date, range.end_date);

    let report = ReportComputer::new()
        .report_data(&state.db, user.id(), range, today)
        .await
        .map_err(|e| compute_error("Failed to compute report", e))?;

    Ok(Json(ApiResponse {
        data: report,
        message: "Report data retrieved successfully".to_string(),
        success: true,
    }))
}

/// Download the report's transactions as CSV
#[utoipa::path(
    get,
    path = "/api/v1/reports/export",
    tag = "reports",
    params(ExportQuery),
    security(("user_id" = [])),
    responses(
        (status = 200, description = "CSV file", content_type = "text/csv", body = String),
        (status = 400, description = "Invalid date range", body = ErrorResponse),
        (status = 401, description = "Unknown user", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn export_report(
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
