//! Single-transaction and daily accumulated amount limits.

use crate::context::DecisionContext;
use crate::schema::LimitCondition;

use super::{format_threshold, Evaluator};

impl LimitCondition {
    fn applies_to(&self, ctx: &DecisionContext) -> bool {
        let Some(types) = &self.transaction_types else {
            return true;
        };
        match &ctx.transaction_type {
            Some(t) => {
                let t = t.to_lowercase();
                types.iter().any(|allowed| *allowed == t)
            }
            None => false,
        }
    }
}

impl Evaluator for LimitCondition {
    fn check(&self, ctx: &DecisionContext) -> Option<String> {
        if !self.applies_to(ctx) {
            return None;
        }
        let amount = ctx.amount?;

        if let Some(max) = self.max_amount {
            if amount > max {
                return Some(format!(
                    "single transaction amount exceeds limit of {}",
                    format_threshold(max)
                ));
            }
        }
        if let Some(max_daily) = self.max_daily_amount {
            if ctx.daily_accumulated + amount > max_daily {
                return Some(format!(
                    "daily accumulated amount exceeds limit of {}",
                    format_threshold(max_daily)
                ));
            }
        }
        None
    }
}
