//! Contextual risk scoring and score bucketing.

use riskgate_core::RiskLevel;

use crate::context::DecisionContext;

/// Amount from which large transactions start adding score.
const LARGE_AMOUNT: f64 = 10_000.0;

/// Adjust `base` by transaction size and recent activity, clamped to 0..=100.
///
/// - amount >= 10000 adds up to 15, scaling linearly over the next 50000
/// - any transaction in the last hour adds 1.5 each, up to 10
/// - more than 5 in the last 24h adds 0.5 per extra, up to 10
pub fn contextual_score(base: f64, amount: f64, count_1h: u64, count_24h: u64) -> f64 {
    let mut score = base;
    if amount >= LARGE_AMOUNT {
        score += ((amount - LARGE_AMOUNT) / 50_000.0 * 15.0).min(15.0);
    }
    if count_1h > 0 {
        score += (count_1h as f64 * 1.5).min(10.0);
    }
    if count_24h > 5 {
        score += ((count_24h - 5) as f64 * 0.5).min(10.0);
    }
    score.clamp(0.0, 100.0)
}

/// [`contextual_score`] with the inputs taken from a decision context.
pub fn apply_contextual(base: f64, ctx: &DecisionContext) -> f64 {
    contextual_score(base, ctx.amount.unwrap_or(0.0), ctx.count_1h, ctx.count_24h)
}

pub fn score_to_level(score: f64) -> RiskLevel {
    if score < 30.0 {
        RiskLevel::Low
    } else if score < 60.0 {
        RiskLevel::Medium
    } else if score < 80.0 {
        RiskLevel::High
    } else {
        RiskLevel::Critical
    }
}

/// Inclusive: a score equal to the threshold rejects.
pub fn should_reject(score: f64, threshold: f64) -> bool {
    score >= threshold
}
