//! What the chain does when a rule matches.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Action taken on a match. Anything other than `reject` lets the chain continue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    /// Stop the chain and reject the transaction.
    #[default]
    Reject,
    /// Add the rule's score and continue.
    Warn,
    /// Same as `Warn`; kept distinct so it shows up in summaries.
    Review,
}

impl RuleAction {
    /// Parse a configured action. Unrecognised values fall back to `Warn`,
    /// and the caller is told so it can log a load-time warning.
    pub fn parse_lenient(raw: Option<&str>) -> (Self, Option<String>) {
        let Some(raw) = raw else {
            return (RuleAction::Reject, None);
        };
        match raw.trim().to_lowercase().as_str() {
            "" | "reject" => (RuleAction::Reject, None),
            "warn" => (RuleAction::Warn, None),
            "review" => (RuleAction::Review, None),
            other => (
                RuleAction::Warn,
                Some(format!("unknown action '{}', treated as warn", other)),
            ),
        }
    }

    pub fn is_reject(&self) -> bool {
        matches!(self, RuleAction::Reject)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RuleAction::Reject => "reject",
            RuleAction::Warn => "warn",
            RuleAction::Review => "review",
        }
    }
}

impl fmt::Display for RuleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
