use thiserror::Error;

/// Reasons a transaction request is refused before it reaches the rule chain.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("customer_id must not be empty")]
    MissingCustomer,

    #[error("transaction_type must not be empty")]
    MissingTransactionType,

    #[error("amount must be a finite number >= 0, got {0}")]
    InvalidAmount(f64),
}
