//! Transaction count inside a time window.

use crate::context::{keys, DecisionContext};
use crate::schema::{FrequencyCondition, FrequencyWindow};

use super::Evaluator;

impl FrequencyCondition {
    /// Count for the configured window. A zero aggregate count falls back to
    /// the caller-supplied `count_in_window`.
    fn observed_count(&self, ctx: &DecisionContext) -> Option<i64> {
        let in_window = ctx.extension_i64(keys::COUNT_IN_WINDOW);
        let aggregated = match self.window {
            FrequencyWindow::OneHour => ctx.count_1h,
            FrequencyWindow::OneDay => ctx.count_24h,
            FrequencyWindow::Custom(_) => return in_window,
        };
        if aggregated == 0 {
            return Some(in_window.unwrap_or(0));
        }
        Some(i64::try_from(aggregated).unwrap_or(i64::MAX))
    }
}

impl Evaluator for FrequencyCondition {
    fn check(&self, ctx: &DecisionContext) -> Option<String> {
        let max = self.max_count?;
        let count = self.observed_count(ctx)?;
        (count > max).then(|| {
            format!(
                "transaction count in {} exceeds limit of {}",
                self.window, max
            )
        })
    }
}
