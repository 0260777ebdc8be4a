//! Per-type rule evaluators.
//!
//! Each condition struct implements [`Evaluator`]; [`RuleCondition`] picks the
//! implementation by matching on its variant, so adding a rule type without
//! an evaluator does not compile. Evaluators are pure: a missing context
//! value means "not matched", never an error.

mod batch_limit;
mod blacklist;
mod frequency;
mod limit;
mod scheduled_limit;

use crate::context::DecisionContext;
use crate::schema::{RuleCondition, RuleDefinition};

/// A stateless check of one condition against a decision context.
pub trait Evaluator {
    /// `Some(default_message)` when the condition matches.
    fn check(&self, ctx: &DecisionContext) -> Option<String>;
}

impl Evaluator for RuleCondition {
    fn check(&self, ctx: &DecisionContext) -> Option<String> {
        match self {
            RuleCondition::Limit(c) => c.check(ctx),
            RuleCondition::Frequency(c) => c.check(ctx),
            RuleCondition::Blacklist(c) => c.check(ctx),
            RuleCondition::BatchLimit(c) => c.check(ctx),
            RuleCondition::ScheduledLimit(c) => c.check(ctx),
        }
    }
}

/// Outcome of evaluating one rule.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub matched: bool,
    /// The rule's configured message, else the evaluator's default. `None`
    /// when not matched.
    pub message: Option<String>,
}

impl Verdict {
    pub fn no_match() -> Self {
        Self { matched: false, message: None }
    }
}

/// Evaluate `rule` against `ctx`.
pub fn evaluate_rule(rule: &RuleDefinition, ctx: &DecisionContext) -> Verdict {
    match rule.condition.check(ctx) {
        Some(default_message) => Verdict {
            matched: true,
            message: Some(rule.message.clone().unwrap_or(default_message)),
        },
        None => Verdict::no_match(),
    }
}

/// Render a threshold for messages: whole numbers without a fractional part.
pub(crate) fn format_threshold(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{:.0}", value)
    } else {
        format!("{}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{BlacklistCondition, RuleAction};

    fn blacklist_rule(message: Option<&str>) -> RuleDefinition {
        RuleDefinition {
            name: "blacklist_check".to_string(),
            enabled: true,
            priority: 1,
            action: RuleAction::Reject,
            condition: RuleCondition::Blacklist(BlacklistCondition::default()),
            message: message.map(str::to_string),
            error_code: None,
            risk_score_add: None,
            description: None,
        }
    }

    #[test]
    fn configured_message_overrides_default() {
        let ctx = DecisionContext {
            in_blacklist: true,
            ..Default::default()
        };
        let verdict = evaluate_rule(&blacklist_rule(Some("account frozen")), &ctx);
        assert!(verdict.matched);
        assert_eq!(verdict.message.as_deref(), Some("account frozen"));

        let verdict = evaluate_rule(&blacklist_rule(None), &ctx);
        assert_eq!(verdict.message.as_deref(), Some("customer or account is blacklisted"));
    }

    #[test]
    fn no_match_has_no_message() {
        let verdict = evaluate_rule(&blacklist_rule(Some("x")), &DecisionContext::default());
        assert_eq!(verdict, Verdict::no_match());
    }

    #[test]
    fn thresholds_render_without_trailing_zero() {
        assert_eq!(format_threshold(5000.0), "5000");
        assert_eq!(format_threshold(99.5), "99.5");
    }
}
