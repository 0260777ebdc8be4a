//! Typed per-rule-type condition blocks.
//!
//! Each rule type gets its own struct with optional, strongly typed
//! thresholds. Values are coerced leniently at load time (numbers, numeric
//! strings); anything that cannot be coerced is dropped for that field only
//! and reported as a warning, so the remaining thresholds still apply.

use std::fmt;

use serde_yaml::{Mapping, Value};

use super::RuleType;

// ── Condition variants ──────────────────────────────────────────────

/// Single-transaction and daily accumulated amount limits.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LimitCondition {
    /// `max_amount`, or its alias `max_single_amount`.
    pub max_amount: Option<f64>,
    pub max_daily_amount: Option<f64>,
    /// Lowercased. When set, the rule only applies to these transaction types.
    pub transaction_types: Option<Vec<String>>,
}

/// Time window a frequency rule counts over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrequencyWindow {
    /// `1h`, reads `count_1h`.
    OneHour,
    /// `24h` or `1d`, reads `count_24h`.
    OneDay,
    /// Anything else, reads the caller-supplied `count_in_window`.
    Custom(String),
}

impl FrequencyWindow {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "1h" => FrequencyWindow::OneHour,
            "24h" | "1d" => FrequencyWindow::OneDay,
            other => FrequencyWindow::Custom(other.to_string()),
        }
    }
}

impl Default for FrequencyWindow {
    fn default() -> Self {
        FrequencyWindow::OneHour
    }
}

impl fmt::Display for FrequencyWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrequencyWindow::OneHour => f.write_str("1h"),
            FrequencyWindow::OneDay => f.write_str("24h"),
            FrequencyWindow::Custom(label) => f.write_str(label),
        }
    }
}

/// Maximum number of transactions inside a window.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FrequencyCondition {
    pub window: FrequencyWindow,
    pub max_count: Option<i64>,
}

/// Blacklist membership. Membership itself is resolved upstream; the
/// dimensions listed here are informational.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BlacklistCondition {
    pub check_types: Vec<String>,
}

/// Batch transfer limits.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BatchLimitCondition {
    pub max_batch_total: Option<f64>,
    pub max_batch_count: Option<i64>,
    /// Inclusive: fires once the daily batch count reaches this value.
    pub max_daily_batch_count: Option<i64>,
}

/// Pending scheduled-transfer cap.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScheduledLimitCondition {
    /// Inclusive: fires once the pending count reaches this value.
    pub max_pending_count: Option<i64>,
}

/// Closed set of condition blocks, one per [`RuleType`].
#[derive(Debug, Clone, PartialEq)]
pub enum RuleCondition {
    Limit(LimitCondition),
    Frequency(FrequencyCondition),
    Blacklist(BlacklistCondition),
    BatchLimit(BatchLimitCondition),
    ScheduledLimit(ScheduledLimitCondition),
}

impl RuleCondition {
    pub fn rule_type(&self) -> RuleType {
        match self {
            RuleCondition::Limit(_) => RuleType::Limit,
            RuleCondition::Frequency(_) => RuleType::Frequency,
            RuleCondition::Blacklist(_) => RuleType::Blacklist,
            RuleCondition::BatchLimit(_) => RuleType::BatchLimit,
            RuleCondition::ScheduledLimit(_) => RuleType::ScheduledLimit,
        }
    }

    /// Build the typed condition for `rule_type` from the raw `condition:` block.
    ///
    /// Never fails: problems are appended to `warnings` and the offending
    /// field is left unset.
    pub fn parse(
        rule_type: RuleType,
        rule_name: &str,
        raw: Option<&Value>,
        warnings: &mut Vec<String>,
    ) -> Self {
        match rule_type {
            RuleType::Limit => {
                let mut r = FieldReader::new(
                    rule_name,
                    raw,
                    &["max_amount", "max_single_amount", "max_daily_amount", "transaction_types"],
                    warnings,
                );
                let max_amount = r.number("max_amount");
                let max_single_amount = r.number("max_single_amount");
                let cond = LimitCondition {
                    max_amount: max_amount.or(max_single_amount),
                    max_daily_amount: r.number("max_daily_amount"),
                    transaction_types: r
                        .text_list("transaction_types")
                        .map(|types| types.into_iter().map(|t| t.to_lowercase()).collect()),
                };
                r.finish();
                RuleCondition::Limit(cond)
            }
            RuleType::Frequency => {
                let mut r = FieldReader::new(rule_name, raw, &["window", "max_count"], warnings);
                let window = r
                    .text("window")
                    .map(|w| FrequencyWindow::parse(&w))
                    .unwrap_or_default();
                let max_count = r.integer("max_count");
                if max_count.is_none() {
                    r.warn("max_count", "missing, rule can never match");
                }
                r.finish();
                RuleCondition::Frequency(FrequencyCondition { window, max_count })
            }
            RuleType::Blacklist => {
                let mut r = FieldReader::new(rule_name, raw, &["check_types"], warnings);
                let check_types = r.text_list("check_types").unwrap_or_default();
                r.finish();
                RuleCondition::Blacklist(BlacklistCondition { check_types })
            }
            RuleType::BatchLimit => {
                let mut r = FieldReader::new(
                    rule_name,
                    raw,
                    &["max_batch_total", "max_batch_count", "max_daily_batch_count"],
                    warnings,
                );
                let cond = BatchLimitCondition {
                    max_batch_total: r.number("max_batch_total"),
                    max_batch_count: r.integer("max_batch_count"),
                    max_daily_batch_count: r.integer("max_daily_batch_count"),
                };
                r.finish();
                RuleCondition::BatchLimit(cond)
            }
            RuleType::ScheduledLimit => {
                let mut r = FieldReader::new(rule_name, raw, &["max_pending_count"], warnings);
                let cond = ScheduledLimitCondition {
                    max_pending_count: r.integer("max_pending_count"),
                };
                r.finish();
                RuleCondition::ScheduledLimit(cond)
            }
        }
    }
}

// ── Lenient field reader ────────────────────────────────────────────

/// Reads fields out of a `condition:` mapping, recording a warning for each
/// value that cannot be coerced and for each key the rule type does not know.
struct FieldReader<'a> {
    rule: &'a str,
    map: Option<&'a Mapping>,
    known: &'static [&'static str],
    warnings: &'a mut Vec<String>,
}

impl<'a> FieldReader<'a> {
    fn new(
        rule: &'a str,
        raw: Option<&'a Value>,
        known: &'static [&'static str],
        warnings: &'a mut Vec<String>,
    ) -> Self {
        let map = match raw {
            None | Some(Value::Null) => None,
            Some(Value::Mapping(m)) => Some(m),
            Some(other) => {
                warnings.push(format!(
                    "rule '{}': condition must be a mapping, got {}",
                    rule,
                    describe(other)
                ));
                None
            }
        };
        Self { rule, map, known, warnings }
    }

    fn get(&self, key: &str) -> Option<&'a Value> {
        self.map
            .and_then(|m| m.get(key))
            .filter(|v| !v.is_null())
    }

    fn warn(&mut self, key: &str, problem: &str) {
        self.warnings
            .push(format!("rule '{}': condition.{} {}", self.rule, key, problem));
    }

    fn number(&mut self, key: &str) -> Option<f64> {
        let value = self.get(key)?;
        let parsed = coerce_f64(value);
        if parsed.is_none() {
            self.warn(key, &format!("is not a finite number ({}), ignored", describe(value)));
        }
        parsed
    }

    fn integer(&mut self, key: &str) -> Option<i64> {
        let value = self.get(key)?;
        let parsed = coerce_i64(value);
        if parsed.is_none() {
            self.warn(key, &format!("is not an integer ({}), ignored", describe(value)));
        }
        parsed
    }

    fn text(&mut self, key: &str) -> Option<String> {
        let value = self.get(key)?;
        match value {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            other => {
                self.warn(key, &format!("is not a string ({}), ignored", describe(other)));
                None
            }
        }
    }

    /// A sequence of scalars; a single scalar is accepted as a one-element list.
    fn text_list(&mut self, key: &str) -> Option<Vec<String>> {
        let value = self.get(key)?;
        match value {
            Value::Sequence(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::String(s) => out.push(s.clone()),
                        Value::Number(n) => out.push(n.to_string()),
                        Value::Bool(b) => out.push(b.to_string()),
                        other => self.warn(
                            key,
                            &format!("contains a non-scalar entry ({}), skipped", describe(other)),
                        ),
                    }
                }
                Some(out)
            }
            Value::String(s) => Some(vec![s.clone()]),
            other => {
                self.warn(key, &format!("is not a list ({}), ignored", describe(other)));
                None
            }
        }
    }

    /// Report keys the rule type does not understand.
    fn finish(self) {
        let Some(map) = self.map else {
            return;
        };
        for key in map.keys() {
            let name = match key.as_str() {
                Some(k) => k,
                None => {
                    self.warnings.push(format!(
                        "rule '{}': condition has a non-string key ({}), ignored",
                        self.rule,
                        describe(key)
                    ));
                    continue;
                }
            };
            if !self.known.contains(&name) {
                self.warnings.push(format!(
                    "rule '{}': unknown condition field '{}', ignored",
                    self.rule, name
                ));
            }
        }
    }
}

/// Finite numbers and numeric strings. `nan` and `inf`, in either form,
/// are rejected.
pub(crate) fn coerce_f64(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|f| f.is_finite())
}

/// Integers, finite floats (truncated) and integer strings.
pub(crate) fn coerce_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite())
                .map(|f| f.trunc() as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Sequence(_) => "list",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}
