use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError, ValidationErrors};

use crate::error::AppError;
use crate::models::{PageRequest, SortDirection, SortField, DEFAULT_PAGE_SIZE};
use crate::services::account_service;

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut error = ValidationError::new("blank");
        error.message = Some("must not be blank".into());
        return Err(error);
    }
    Ok(())
}

/// Request to open a new account.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateAccountRequest {
    #[validate(custom = "not_blank", length(max = 64))]
    pub account_number: String,
    #[validate(custom = "not_blank", length(max = 255))]
    pub account_holder_name: String,
    #[validate(custom = "not_blank", length(max = 64))]
    pub contact_number: String,
}

impl From<CreateAccountRequest> for account_service::CreateAccountRequest {
    fn from(request: CreateAccountRequest) -> Self {
        Self {
            account_number: request.account_number,
            account_holder_name: request.account_holder_name,
            contact_number: request.contact_number,
        }
    }
}

/// Request to replace an account's holder metadata.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdateAccountRequest {
    #[validate(custom = "not_blank", length(max = 255))]
    pub account_holder_name: String,
    #[validate(custom = "not_blank", length(max = 64))]
    pub contact_number: String,
}

impl From<UpdateAccountRequest> for account_service::UpdateAccountRequest {
    fn from(request: UpdateAccountRequest) -> Self {
        Self {
            account_holder_name: request.account_holder_name,
            contact_number: request.contact_number,
        }
    }
}

/// Request to move funds. Amount range and precision are checked by the
/// service so they surface with their own error code.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TransferRequest {
    #[validate(custom = "not_blank")]
    pub from_account: String,
    #[validate(custom = "not_blank")]
    pub to_account: String,
    pub amount: Decimal,
}

impl From<TransferRequest> for account_service::TransferRequest {
    fn from(request: TransferRequest) -> Self {
        Self {
            from_account: request.from_account,
            to_account: request.to_account,
            amount: request.amount,
        }
    }
}

/// Query parameters for listing accounts.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListAccountsQuery {
    pub page: Option<u32>,
    pub size: Option<u32>,
    pub sort: Option<SortField>,
    pub direction: Option<SortDirection>,
}

impl From<ListAccountsQuery> for PageRequest {
    fn from(query: ListAccountsQuery) -> Self {
        PageRequest::new(query.page.unwrap_or(0), query.size.unwrap_or(DEFAULT_PAGE_SIZE))
            .sorted_by(query.sort.unwrap_or_default(), query.direction.unwrap_or_default())
    }
}

/// Collapses validator output into a single `Validation` error. Fields are
/// reported in name order so the message is stable.
pub fn validation_error(errors: ValidationErrors) -> AppError {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by_key(|(field, _)| *field);

    let names: Vec<&str> = fields.iter().map(|(field, _)| *field).collect();
    let messages: Vec<String> = fields
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| match &e.message {
                Some(message) => format!("{} {}", field, message),
                None => format!("{} is invalid ({})", field, e.code),
            })
        })
        .collect();

    AppError::validation(names.join(","), messages.join("; "))
}
