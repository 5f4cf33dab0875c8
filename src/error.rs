use rust_decimal::Decimal;
use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, AppError>;

/// Errors surfaced by the account engine.
///
/// Domain variants carry the arguments needed to format a caller-facing
/// message; infrastructure variants wrap the underlying client error and are
/// reported to callers only as a generic internal error.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Parameter '{field}' is invalid: {message}")]
    Validation { field: String, message: String },

    #[error("Amount {0} must be between 0.01 and 999999999.99 with at most 2 decimal places")]
    InvalidAmount(Decimal),

    #[error("Account '{0}' already exists")]
    DuplicateAccount(String),

    #[error("Account '{0}' is busy, please retry later")]
    LockTimeout(String),

    #[error("Lock acquisition for '{0}' was interrupted")]
    LockInterrupted(String),

    #[error("Account '{0}' does not exist")]
    AccountNotFound(String),

    #[error("Cannot transfer from account '{0}' to itself")]
    SameAccount(String),

    #[error("Insufficient funds in account '{account_number}': requested {requested}, available {available}")]
    InsufficientFunds {
        account_number: String,
        requested: Decimal,
        available: Decimal,
    },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Stable error code exposed to API callers.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::DuplicateAccount(_) => "BM-002",
            AppError::LockTimeout(_) => "BM-003",
            AppError::LockInterrupted(_) => "BM-004",
            AppError::AccountNotFound(_) => "BM-005",
            AppError::SameAccount(_) => "BM-006",
            AppError::InsufficientFunds { .. } => "BM-007",
            AppError::Validation { .. } => "BM-008",
            AppError::InvalidAmount(_) => "BM-009",
            AppError::Database(_)
            | AppError::Redis(_)
            | AppError::Config(_)
            | AppError::Internal(_) => "BM-001",
        }
    }

    /// Returns true if the caller may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::LockTimeout(_))
    }

    /// Returns true for errors caused by the request itself rather than by
    /// the engine or its backing services.
    pub fn is_domain(&self) -> bool {
        !matches!(
            self,
            AppError::Database(_)
                | AppError::Redis(_)
                | AppError::Config(_)
                | AppError::Internal(_)
                | AppError::LockInterrupted(_)
        )
    }

    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Validation { .. } => "validation",
            AppError::InvalidAmount(_) => "invalid_amount",
            AppError::DuplicateAccount(_) => "duplicate_account",
            AppError::LockTimeout(_) => "lock_timeout",
            AppError::LockInterrupted(_) => "lock_interrupted",
            AppError::AccountNotFound(_) => "account_not_found",
            AppError::SameAccount(_) => "same_account",
            AppError::InsufficientFunds { .. } => "insufficient_funds",
            AppError::Database(_) => "database",
            AppError::Redis(_) => "redis",
            AppError::Config(_) => "config",
            AppError::Internal(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(AppError::DuplicateAccount("A1".into()).code(), "BM-002");
        assert_eq!(AppError::LockTimeout("A1".into()).code(), "BM-003");
        assert_eq!(AppError::AccountNotFound("A1".into()).code(), "BM-005");
        assert_eq!(AppError::SameAccount("A1".into()).code(), "BM-006");
        assert_eq!(AppError::InvalidAmount(dec!(0.001)).code(), "BM-009");
        assert_eq!(
            AppError::Internal(anyhow::anyhow!("boom")).code(),
            "BM-001"
        );
    }

    #[test]
    fn test_only_lock_timeout_is_retryable() {
        assert!(AppError::LockTimeout("A1".into()).is_retryable());
        assert!(!AppError::LockInterrupted("A1".into()).is_retryable());
        assert!(!AppError::SameAccount("A1".into()).is_retryable());
    }

    #[test]
    fn test_insufficient_funds_message_carries_arguments() {
        let err = AppError::InsufficientFunds {
            account_number: "ACC-1".to_string(),
            requested: dec!(300.00),
            available: dec!(100.00),
        };
        let message = err.to_string();
        assert!(message.contains("ACC-1"));
        assert!(message.contains("300.00"));
        assert!(message.contains("100.00"));
        assert!(err.is_domain());
    }

    #[test]
    fn test_infrastructure_errors_are_not_domain() {
        assert!(!AppError::Internal(anyhow::anyhow!("boom")).is_domain());
        assert!(!AppError::LockInterrupted("A1".into()).is_domain());
    }
}
