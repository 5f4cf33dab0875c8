use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::{AppError, Result};

/// Number of fractional digits carried by every balance and amount.
pub const MONEY_SCALE: u32 = 2;

/// Largest transferable amount: 9 integer digits, 2 fractional.
pub fn max_transfer_amount() -> Decimal {
    Decimal::new(99_999_999_999, MONEY_SCALE)
}

/// Smallest transferable amount.
pub fn min_transfer_amount() -> Decimal {
    Decimal::new(1, MONEY_SCALE)
}

/// A bank account. The row in the store is authoritative; any cached copy of
/// this struct is a snapshot only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Account {
    pub id: i64,
    pub account_number: String,
    pub account_holder_name: String,
    pub contact_number: String,
    pub balance: Decimal,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Creates a new account with a zero balance.
    pub fn new(
        id: i64,
        account_number: String,
        account_holder_name: String,
        contact_number: String,
    ) -> Self {
        Self {
            id,
            account_number,
            account_holder_name,
            contact_number,
            balance: Decimal::new(0, MONEY_SCALE),
            created_at: Utc::now(),
        }
    }

    /// Replaces the holder metadata. Balance and identifiers are untouched.
    pub fn update_holder(&mut self, account_holder_name: String, contact_number: String) {
        self.account_holder_name = account_holder_name;
        self.contact_number = contact_number;
    }

    pub fn has_sufficient_funds(&self, amount: Decimal) -> bool {
        self.balance >= amount
    }

    /// Debits the account. Fails without mutating when the balance would go negative.
    pub fn debit(&mut self, amount: Decimal) -> Result<()> {
        if !self.has_sufficient_funds(amount) {
            return Err(AppError::InsufficientFunds {
                account_number: self.account_number.clone(),
                requested: amount,
                available: self.balance,
            });
        }
        self.balance = with_money_scale(self.balance - amount);
        Ok(())
    }

    pub fn credit(&mut self, amount: Decimal) {
        self.balance = with_money_scale(self.balance + amount);
    }
}

/// Validates a transfer amount and returns it with exactly two fractional digits.
///
/// Trailing zeros beyond the second fractional digit are accepted (`1.500`),
/// any other extra precision is rejected rather than rounded.
pub fn normalize_amount(amount: Decimal) -> Result<Decimal> {
    if amount.normalize().scale() > MONEY_SCALE
        || amount < min_transfer_amount()
        || amount > max_transfer_amount()
    {
        return Err(AppError::InvalidAmount(amount));
    }
    Ok(with_money_scale(amount))
}

fn with_money_scale(value: Decimal) -> Decimal {
    let mut value = value.normalize();
    value.rescale(MONEY_SCALE);
    value
}

/// Rejects empty or whitespace-only input.
pub fn require_not_blank(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(AppError::validation(field, format!("{} cannot be blank", field)));
    }
    Ok(())
}
