use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of a risk check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Approve => "approve",
            Decision::Reject => "reject",
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Four-tier bucketing of the final numeric score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of one walk of the rule chain. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionResult {
    pub action: Decision,
    pub message: Option<String>,
    /// 0..=100
    pub risk_score: f64,
    /// Names of the rules that fired, in evaluation order.
    pub triggered_rules: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reject_error_code: Option<String>,
}

impl DecisionResult {
    pub fn approve(risk_score: f64, triggered_rules: Vec<String>) -> Self {
        Self {
            action: Decision::Approve,
            message: None,
            risk_score,
            triggered_rules,
            reject_error_code: None,
        }
    }

    pub fn reject(
        message: impl Into<String>,
        risk_score: f64,
        triggered_rules: Vec<String>,
        error_code: impl Into<String>,
    ) -> Self {
        Self {
            action: Decision::Reject,
            message: Some(message.into()),
            risk_score,
            triggered_rules,
            reject_error_code: Some(error_code.into()),
        }
    }

    pub fn is_approved(&self) -> bool {
        self.action == Decision::Approve
    }
}

/// Caller-facing view of a decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskCheckResponse {
    pub approved: bool,
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    pub message: Option<String>,
    pub triggered_rules: Vec<String>,
    /// Only set when `approved` is false.
    pub reject_error_code: Option<String>,
    pub decision_id: String,
    pub processing_time_ms: u64,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decision_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Decision::Reject).unwrap(), "\"reject\"");
        assert_eq!(serde_json::to_string(&RiskLevel::Critical).unwrap(), "\"critical\"");
    }

    #[test]
    fn approve_has_no_error_code() {
        let result = DecisionResult::approve(12.5, vec!["night_watch".to_string()]);
        assert!(result.is_approved());
        assert!(result.reject_error_code.is_none());
        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("reject_error_code").is_none());
    }
}
