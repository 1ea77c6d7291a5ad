use rust_decimal::Decimal;
use thiserror::Error;

/// Raised by decimal arithmetic helpers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    #[error("division by zero")]
    DivisionByZero,
}

/// Raised when an interval fails validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid interval: {0}")]
pub struct InvalidIntervalError(pub String);

/// Raised by ledger mutations on the simulated exchange.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("investment amount must be positive (got {0})")]
    NonPositiveAmount(Decimal),
    #[error("insufficient {currency} balance: available {available}, required {required}")]
    InsufficientBalance {
        currency: String,
        available: Decimal,
        required: Decimal,
    },
    #[error("insufficient position in {figi}: held {held} lots, requested {requested}")]
    InsufficientPosition {
        figi: String,
        held: i64,
        requested: i64,
    },
    #[error("no known price for {0} at the current simulated time")]
    MissingPrice(String),
    #[error("order quantity must be positive (got {0} lots)")]
    NonPositiveQuantity(i64),
}

/// Raised when a strategy parameter fails validation at construction time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid value for parameter `{name}`: {reason}")]
pub struct ParameterError {
    pub name: String,
    pub reason: String,
}

impl ParameterError {
    pub fn new(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reason: reason.into(),
        }
    }
}
