//! Top-level rules document: `score_reject_threshold` plus `rules: [...]`.

use serde::Deserialize;
use serde_yaml::Value;

use super::condition::coerce_f64;
use super::{RawRule, RuleDefinition};

/// Loose shape of the whole file. Each rule stays a raw `Value` so that a
/// malformed entry can be dropped without failing the document.
#[derive(Debug, Default, Deserialize)]
pub struct RulesDocument {
    pub score_reject_threshold: Option<Value>,
    pub rules: Option<Value>,
}

/// Result of parsing a document: the rules in file order plus everything
/// that was ignored along the way.
#[derive(Debug, Clone, Default)]
pub struct ParsedRules {
    pub rules: Vec<RuleDefinition>,
    pub score_reject_threshold: Option<f64>,
    pub warnings: Vec<String>,
}

impl RulesDocument {
    /// Parse YAML text. Fails only when the text is not YAML or its top
    /// level is not a mapping; an empty document is an empty rule list.
    pub fn parse(content: &str) -> Result<ParsedRules, serde_yaml::Error> {
        if content.trim().is_empty() {
            return Ok(ParsedRules::default());
        }
        let value: Value = serde_yaml::from_str(content)?;
        if value.is_null() {
            return Ok(ParsedRules::default());
        }
        let doc: RulesDocument = serde_yaml::from_value(value)?;
        Ok(doc.into_rules())
    }

    fn into_rules(self) -> ParsedRules {
        let mut warnings = Vec::new();

        let score_reject_threshold = match self.score_reject_threshold.filter(|v| !v.is_null()) {
            None => None,
            Some(v) => {
                let parsed = coerce_f64(&v);
                if parsed.is_none() {
                    warnings.push("score_reject_threshold is not a finite number, using default".to_string());
                }
                parsed
            }
        };

        let entries = match self.rules {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Sequence(items)) => items,
            Some(_) => {
                warnings.push("rules must be a list, no rules loaded".to_string());
                Vec::new()
            }
        };

        let mut rules = Vec::with_capacity(entries.len());
        for (index, entry) in entries.into_iter().enumerate() {
            let raw: RawRule = match serde_yaml::from_value(entry) {
                Ok(raw) => raw,
                Err(e) => {
                    warnings.push(format!("rules[{}]: {}, rule dropped", index, e));
                    continue;
                }
            };
            if let Some(rule) = RuleDefinition::from_raw(raw, index, &mut warnings) {
                rules.push(rule);
            }
        }

        ParsedRules {
            rules,
            score_reject_threshold,
            warnings,
        }
    }
}
