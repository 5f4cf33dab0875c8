use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use validator::Validate;

use crate::api::requests::{
    validation_error, CreateAccountRequest, ListAccountsQuery, TransferRequest,
    UpdateAccountRequest,
};
use crate::api::responses::{
    AccountResponse, HealthResponse, OperationResponse, PaginatedResponse, TransferResponse,
};
use crate::error::AppError;
use crate::models::PageRequest;

use super::routes::AppState;

/// Liveness check endpoint.
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "UP".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
    })
}

/// Readiness check endpoint. Ready once the account store answers.
pub async fn readiness_check(State(state): State<AppState>) -> StatusCode {
    match state.service.ping().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!("Readiness check failed: {}", e);
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

/// Prometheus scrape endpoint.
pub async fn metrics_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    match &state.metrics_handle {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        ),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            "metrics recorder not installed".to_string(),
        ),
    }
}

/// Create a new account.
pub async fn create_account(
    State(state): State<AppState>,
    Json(request): Json<CreateAccountRequest>,
) -> Result<(StatusCode, Json<AccountResponse>), AppError> {
    request.validate().map_err(validation_error)?;

    let account = state.service.create_account(request.into()).await?;

    Ok((StatusCode::CREATED, Json(AccountResponse::from(account))))
}

/// Get account by account number.
pub async fn get_account(
    State(state): State<AppState>,
    Path(account_number): Path<String>,
) -> Result<Json<AccountResponse>, AppError> {
    let account = state.service.get_account(&account_number).await?;
    Ok(Json(AccountResponse::from(account)))
}

/// Replace holder name and contact.
pub async fn update_account(
    State(state): State<AppState>,
    Path(account_number): Path<String>,
    Json(request): Json<UpdateAccountRequest>,
) -> Result<Json<AccountResponse>, AppError> {
    request.validate().map_err(validation_error)?;

    let account = state
        .service
        .update_account(&account_number, request.into())
        .await?;

    Ok(Json(AccountResponse::from(account)))
}

/// Delete an account.
pub async fn delete_account(
    State(state): State<AppState>,
    Path(account_number): Path<String>,
) -> Result<Json<OperationResponse>, AppError> {
    state.service.delete_account(&account_number).await?;
    Ok(Json(OperationResponse::success("delete finish")))
}

/// List accounts, newest first by default.
pub async fn list_accounts(
    State(state): State<AppState>,
    Query(query): Query<ListAccountsQuery>,
) -> Result<Json<PaginatedResponse<AccountResponse>>, AppError> {
    let page = state
        .service
        .list_accounts(PageRequest::from(query))
        .await?;

    Ok(Json(PaginatedResponse::from(page.map(AccountResponse::from))))
}

/// Move funds between two accounts.
pub async fn transfer_funds(
    State(state): State<AppState>,
    Json(request): Json<TransferRequest>,
) -> Result<Json<TransferResponse>, AppError> {
    request.validate().map_err(validation_error)?;

    let receipt = state.service.transfer_funds(request.into()).await?;

    Ok(Json(TransferResponse::from(receipt)))
}
