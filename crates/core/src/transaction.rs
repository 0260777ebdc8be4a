use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A transaction submitted for a risk check, before any historical signal
/// has been attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRequest {
    pub customer_id: String,
    #[serde(default)]
    pub account_id: Option<String>,
    pub amount: f64,
    pub transaction_type: String,
    #[serde(default)]
    pub recipient_account_id: Option<String>,
    /// Caller-supplied extension fields (batch totals, pending scheduled
    /// transfers, custom window counts, ...).
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl TransactionRequest {
    pub fn new(customer_id: impl Into<String>, amount: f64, transaction_type: impl Into<String>) -> Self {
        Self {
            customer_id: customer_id.into(),
            account_id: None,
            amount,
            transaction_type: transaction_type.into(),
            recipient_account_id: None,
            metadata: serde_json::Map::new(),
        }
    }

    pub fn with_account(mut self, account_id: impl Into<String>) -> Self {
        self.account_id = Some(account_id.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.customer_id.trim().is_empty() {
            return Err(ValidationError::MissingCustomer);
        }
        if self.transaction_type.trim().is_empty() {
            return Err(ValidationError::MissingTransactionType);
        }
        if !self.amount.is_finite() || self.amount < 0.0 {
            return Err(ValidationError::InvalidAmount(self.amount));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_with_optional_fields_missing() {
        let req: TransactionRequest = serde_json::from_str(
            r#"{"customer_id": "cust-001", "amount": 1000.0, "transaction_type": "transfer"}"#,
        )
        .unwrap();
        assert_eq!(req.customer_id, "cust-001");
        assert!(req.account_id.is_none());
        assert!(req.metadata.is_empty());
        assert!(req.validate().is_ok());
    }

    #[test]
    fn validation_rejects_bad_input() {
        let req = TransactionRequest::new(" ", 10.0, "transfer");
        assert_eq!(req.validate(), Err(ValidationError::MissingCustomer));

        let req = TransactionRequest::new("c1", 10.0, "");
        assert_eq!(req.validate(), Err(ValidationError::MissingTransactionType));

        let req = TransactionRequest::new("c1", -1.0, "transfer");
        assert_eq!(req.validate(), Err(ValidationError::InvalidAmount(-1.0)));
    }

    #[test]
    fn zero_amount_is_valid() {
        assert!(TransactionRequest::new("c1", 0.0, "payment").validate().is_ok());
    }
}
