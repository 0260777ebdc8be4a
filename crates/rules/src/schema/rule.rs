//! Rule definitions: loose `RawRule` first pass, typed `RuleDefinition` second pass.

use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use super::condition::{coerce_f64, coerce_i64};
use super::{RuleAction, RuleCondition, RuleType};

/// Priority assigned to rules that do not set one.
pub const DEFAULT_PRIORITY: i64 = 999;

/// Score added by a non-rejecting match without `risk_score_add`.
pub const DEFAULT_WARN_SCORE: f64 = 10.0;

/// First pass: every field optional, values kept loose.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRule {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub rule_type: Option<String>,
    pub enabled: Option<bool>,
    pub priority: Option<Value>,
    pub action: Option<String>,
    pub condition: Option<Value>,
    pub message: Option<String>,
    pub error_code: Option<String>,
    pub risk_score_add: Option<Value>,
    pub description: Option<String>,
}

/// A validated rule. Immutable once loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleDefinition {
    pub name: String,
    pub enabled: bool,
    /// Ascending; lower runs first.
    pub priority: i64,
    pub action: RuleAction,
    pub condition: RuleCondition,
    pub message: Option<String>,
    pub error_code: Option<String>,
    pub risk_score_add: Option<f64>,
    pub description: Option<String>,
}

impl RuleDefinition {
    /// Second pass. Returns `None` (with a warning) when the rule type is
    /// missing or unknown; every other problem only produces a warning.
    pub fn from_raw(raw: RawRule, index: usize, warnings: &mut Vec<String>) -> Option<Self> {
        let name = raw
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "unnamed".to_string());

        let rule_type = match raw.rule_type.as_deref().map(str::parse::<RuleType>) {
            Some(Ok(t)) => t,
            Some(Err(e)) => {
                warnings.push(format!("rules[{}] '{}': {}, rule dropped", index, name, e));
                return None;
            }
            None => {
                warnings.push(format!("rules[{}] '{}': missing type, rule dropped", index, name));
                return None;
            }
        };

        let (action, action_warning) = RuleAction::parse_lenient(raw.action.as_deref());
        if let Some(w) = action_warning {
            warnings.push(format!("rule '{}': {}", name, w));
        }

        let priority = match raw.priority.as_ref().filter(|v| !v.is_null()) {
            None => DEFAULT_PRIORITY,
            Some(v) => coerce_i64(v).unwrap_or_else(|| {
                warnings.push(format!(
                    "rule '{}': priority is not an integer, using {}",
                    name, DEFAULT_PRIORITY
                ));
                DEFAULT_PRIORITY
            }),
        };

        let risk_score_add = match raw.risk_score_add.as_ref().filter(|v| !v.is_null()) {
            None => None,
            Some(v) => {
                let parsed = coerce_f64(v);
                if parsed.is_none() {
                    warnings.push(format!("rule '{}': risk_score_add is not a finite number, ignored", name));
                }
                parsed
            }
        };

        let condition = RuleCondition::parse(rule_type, &name, raw.condition.as_ref(), warnings);

        Some(Self {
            name,
            enabled: raw.enabled.unwrap_or(true),
            priority,
            action,
            condition,
            message: raw.message.filter(|m| !m.trim().is_empty()),
            error_code: raw.error_code.filter(|c| !c.trim().is_empty()),
            risk_score_add,
            description: raw.description,
        })
    }

    pub fn rule_type(&self) -> RuleType {
        self.condition.rule_type()
    }

    /// Configured code, else the default for the rule type.
    pub fn reject_error_code(&self) -> String {
        self.error_code
            .clone()
            .unwrap_or_else(|| self.rule_type().default_error_code().to_string())
    }

    /// Score contribution on the warn path. An explicit 0 is honoured.
    pub fn warn_score(&self) -> f64 {
        self.risk_score_add.unwrap_or(DEFAULT_WARN_SCORE)
    }

    /// Score contribution on the reject path.
    pub fn reject_score(&self) -> f64 {
        self.risk_score_add.unwrap_or(0.0)
    }

    pub fn summary(&self) -> RuleSummary {
        RuleSummary {
            name: self.name.clone(),
            rule_type: self.rule_type(),
            enabled: self.enabled,
            priority: self.priority,
            action: self.action,
            error_code: self.action.is_reject().then(|| self.reject_error_code()),
            risk_score_add: if self.action.is_reject() {
                self.reject_score()
            } else {
                self.warn_score()
            },
            description: self.description.clone(),
        }
    }
}

/// Serializable one-line view of a rule, for listings and the CLI.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleSummary {
    pub name: String,
    #[serde(rename = "type")]
    pub rule_type: RuleType,
    pub enabled: bool,
    pub priority: i64,
    pub action: RuleAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    pub risk_score_add: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}
