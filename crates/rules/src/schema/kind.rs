//! Rule type enum used to pick the condition schema and evaluator.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use riskgate_core::codes;

/// Supported rule types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    Limit,
    Frequency,
    Blacklist,
    BatchLimit,
    ScheduledLimit,
}

impl RuleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleType::Limit => "limit",
            RuleType::Frequency => "frequency",
            RuleType::Blacklist => "blacklist",
            RuleType::BatchLimit => "batch_limit",
            RuleType::ScheduledLimit => "scheduled_limit",
        }
    }

    /// Error code used when a rejecting rule of this type has no `error_code`.
    pub fn default_error_code(&self) -> &'static str {
        match self {
            RuleType::Limit => codes::LIMIT_EXCEEDED,
            RuleType::Frequency => codes::FREQUENCY_EXCEEDED,
            RuleType::Blacklist => codes::BLACKLISTED,
            RuleType::BatchLimit => codes::LIMIT_EXCEEDED,
            RuleType::ScheduledLimit => codes::LIMIT_EXCEEDED,
        }
    }
}

impl fmt::Display for RuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuleType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "limit" => Ok(RuleType::Limit),
            "frequency" => Ok(RuleType::Frequency),
            "blacklist" => Ok(RuleType::Blacklist),
            "batch_limit" => Ok(RuleType::BatchLimit),
            "scheduled_limit" => Ok(RuleType::ScheduledLimit),
            other => Err(format!("unknown rule type: '{}'", other)),
        }
    }
}
