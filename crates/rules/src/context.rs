//! Request-scoped decision context: the transaction merged with historical signals.

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use riskgate_core::TransactionRequest;

use crate::aggregator::ContextAggregates;

/// Extension keys understood by the built-in evaluators.
pub mod keys {
    pub const BATCH_TOTAL_AMOUNT: &str = "batch_total_amount";
    pub const BATCH_COUNT: &str = "batch_count";
    pub const DAILY_BATCH_COUNT: &str = "daily_batch_count";
    pub const PENDING_SCHEDULED_COUNT: &str = "pending_scheduled_count";
    pub const COUNT_IN_WINDOW: &str = "count_in_window";
}

/// Core field names that caller metadata may not overwrite.
const RESERVED: &[&str] = &[
    "customer_id",
    "account_id",
    "amount",
    "transaction_type",
    "recipient_account_id",
    "count_1h",
    "count_24h",
    "daily_accumulated",
    "in_blacklist",
];

/// Everything an evaluator may look at. Missing values mean "not matched".
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct DecisionContext {
    pub customer_id: String,
    pub account_id: Option<String>,
    pub amount: Option<f64>,
    pub transaction_type: Option<String>,
    pub recipient_account_id: Option<String>,
    pub count_1h: u64,
    pub count_24h: u64,
    pub daily_accumulated: f64,
    pub in_blacklist: bool,
    /// Caller-supplied fields such as batch totals or pending counts.
    pub extensions: Map<String, Value>,
}

impl DecisionContext {
    pub fn from_request(
        request: &TransactionRequest,
        aggregates: ContextAggregates,
        in_blacklist: bool,
    ) -> Self {
        let mut extensions = Map::new();
        for (key, value) in &request.metadata {
            if RESERVED.contains(&key.as_str()) {
                debug!(key = %key, "metadata key shadows a core context field, ignored");
                continue;
            }
            extensions.insert(key.clone(), value.clone());
        }

        Self {
            customer_id: request.customer_id.clone(),
            account_id: request.account_id.clone(),
            amount: Some(request.amount),
            transaction_type: Some(request.transaction_type.clone()),
            recipient_account_id: request.recipient_account_id.clone(),
            count_1h: aggregates.count_1h,
            count_24h: aggregates.count_24h,
            daily_accumulated: aggregates.daily_accumulated,
            in_blacklist,
            extensions,
        }
    }

    pub fn with_extension(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extensions.insert(key.into(), value.into());
        self
    }

    /// Numeric extension; numeric strings are accepted.
    pub fn extension_f64(&self, key: &str) -> Option<f64> {
        match self.extensions.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Integer extension; floats are truncated, integer strings accepted.
    pub fn extension_i64(&self, key: &str) -> Option<i64> {
        match self.extensions.get(key)? {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn merges_request_aggregates_and_metadata() {
        let request = TransactionRequest::new("cust-1", 2500.0, "transfer")
            .with_account("acc-9")
            .with_metadata("batch_count", json!(12))
            .with_metadata("amount", json!(1));
        let aggregates = ContextAggregates {
            count_1h: 3,
            count_24h: 9,
            daily_accumulated: 4000.0,
        };

        let ctx = DecisionContext::from_request(&request, aggregates, true);
        assert_eq!(ctx.amount, Some(2500.0));
        assert_eq!(ctx.account_id.as_deref(), Some("acc-9"));
        assert_eq!(ctx.count_24h, 9);
        assert!(ctx.in_blacklist);
        assert_eq!(ctx.extension_i64("batch_count"), Some(12));
        assert!(!ctx.extensions.contains_key("amount"));
    }

    #[test]
    fn extension_coercion() {
        let ctx = DecisionContext::default()
            .with_extension("a", "42.5")
            .with_extension("b", 7.9)
            .with_extension("c", true);
        assert_eq!(ctx.extension_f64("a"), Some(42.5));
        assert_eq!(ctx.extension_i64("b"), Some(7));
        assert_eq!(ctx.extension_f64("c"), None);
        assert_eq!(ctx.extension_f64("missing"), None);
    }
}
