use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::{Account, Page};
use crate::services::TransferReceipt;

const STATUS_SUCCESS: &str = "success";

/// Error body returned for every failed request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error_code: String,
    pub error_message: String,
}

impl ErrorResponse {
    pub fn new(error_code: impl Into<String>, error_message: impl Into<String>) -> Self {
        Self {
            error_code: error_code.into(),
            error_message: error_message.into(),
        }
    }
}

impl AppError {
    pub fn http_status(&self) -> StatusCode {
        match self {
            AppError::Validation { .. }
            | AppError::InvalidAmount(_)
            | AppError::SameAccount(_)
            | AppError::InsufficientFunds { .. } => StatusCode::BAD_REQUEST,
            AppError::DuplicateAccount(_) => StatusCode::CONFLICT,
            AppError::AccountNotFound(_) => StatusCode::NOT_FOUND,
            AppError::LockTimeout(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::LockInterrupted(_)
            | AppError::Database(_)
            | AppError::Redis(_)
            | AppError::Config(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = if self.is_domain() {
            self.to_string()
        } else {
            tracing::error!(code = self.code(), error = ?self, "Request failed");
            "Internal server error".to_string()
        };
        let body = ErrorResponse::new(self.code(), message);
        (self.http_status(), Json(body)).into_response()
    }
}

/// Account DTO.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountResponse {
    pub id: i64,
    pub account_number: String,
    pub account_holder_name: String,
    pub contact_number: String,
    pub balance: Decimal,
    pub created_at: DateTime<Utc>,
}

impl From<Account> for AccountResponse {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            account_number: account.account_number,
            account_holder_name: account.account_holder_name,
            contact_number: account.contact_number,
            balance: account.balance,
            created_at: account.created_at,
        }
    }
}

/// Acknowledgement for operations that return no entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationResponse {
    pub status: String,
    pub operation_message: String,
}

impl OperationResponse {
    pub fn success(operation_message: impl Into<String>) -> Self {
        Self {
            status: STATUS_SUCCESS.to_string(),
            operation_message: operation_message.into(),
        }
    }
}

/// Transfer acknowledgement with the resulting balances.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferResponse {
    pub status: String,
    pub operation_message: String,
    pub from_account: String,
    pub to_account: String,
    pub amount: Decimal,
    pub from_balance: Decimal,
    pub to_balance: Decimal,
}

impl From<TransferReceipt> for TransferResponse {
    fn from(receipt: TransferReceipt) -> Self {
        Self {
            status: STATUS_SUCCESS.to_string(),
            operation_message: "transfer finish".to_string(),
            from_account: receipt.from_account,
            to_account: receipt.to_account,
            amount: receipt.amount,
            from_balance: receipt.from_balance,
            to_balance: receipt.to_balance,
        }
    }
}

/// Paginated response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub size: u32,
    pub total_pages: i64,
}

impl<T> From<Page<T>> for PaginatedResponse<T> {
    fn from(page: Page<T>) -> Self {
        let total_pages = page.total_pages();
        Self {
            items: page.items,
            total: page.total,
            page: page.page,
            size: page.size,
            total_pages,
        }
    }
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
}
