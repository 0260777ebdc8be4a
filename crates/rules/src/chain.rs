//! Walks the rule chain and produces a [`DecisionResult`].

use riskgate_core::{codes, DecisionResult};
use tracing::debug;

use crate::context::DecisionContext;
use crate::evaluator::evaluate_rule;
use crate::loader::RuleSet;
use crate::scoring::{apply_contextual, should_reject};

const MAX_SCORE: f64 = 100.0;

/// Evaluate enabled rules in priority order.
///
/// The first matching reject-action rule stops the chain; its score is the
/// warn score so far plus its own `risk_score_add`, clamped to 0..=100
/// without contextual adjustment. Otherwise warn scores accumulate, the contextual scorer is
/// applied, and a final score at or above the set's threshold rejects.
pub fn evaluate_chain(rules: &RuleSet, ctx: &DecisionContext) -> DecisionResult {
    let mut running = 0.0_f64;
    let mut triggered: Vec<String> = Vec::new();

    for rule in rules.enabled() {
        let verdict = evaluate_rule(rule, ctx);
        if !verdict.matched {
            continue;
        }
        triggered.push(rule.name.clone());

        if rule.action.is_reject() {
            let score = (running + rule.reject_score()).clamp(0.0, MAX_SCORE);
            let message = verdict
                .message
                .unwrap_or_else(|| format!("rejected by rule {}", rule.name));
            debug!(rule = %rule.name, score, "reject rule matched");
            return DecisionResult::reject(message, score, triggered, rule.reject_error_code());
        }

        running += rule.warn_score();
        debug!(rule = %rule.name, action = %rule.action, running, "warn rule matched");
    }

    let score = apply_contextual(running.min(MAX_SCORE), ctx);
    let threshold = rules.score_reject_threshold();
    if should_reject(score, threshold) {
        return DecisionResult::reject(
            format!("risk score {:.1} reached reject threshold {:.1}", score, threshold),
            score,
            triggered,
            codes::SCORE_TOO_HIGH,
        );
    }
    DecisionResult::approve(score, triggered)
}
