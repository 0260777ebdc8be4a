//! Batch transfer limits, checked in a fixed order: total, count, daily count.

use crate::context::{keys, DecisionContext};
use crate::schema::BatchLimitCondition;

use super::{format_threshold, Evaluator};

impl Evaluator for BatchLimitCondition {
    fn check(&self, ctx: &DecisionContext) -> Option<String> {
        if let (Some(max), Some(total)) = (
            self.max_batch_total,
            ctx.extension_f64(keys::BATCH_TOTAL_AMOUNT),
        ) {
            if total > max {
                return Some(format!(
                    "batch total amount exceeds limit of {}",
                    format_threshold(max)
                ));
            }
        }
        if let (Some(max), Some(count)) = (self.max_batch_count, ctx.extension_i64(keys::BATCH_COUNT)) {
            if count > max {
                return Some(format!("batch count exceeds limit of {}", max));
            }
        }
        if let (Some(max), Some(daily)) = (
            self.max_daily_batch_count,
            ctx.extension_i64(keys::DAILY_BATCH_COUNT),
        ) {
            if daily >= max {
                return Some(format!("daily batch count reached limit of {}", max));
            }
        }
        None
    }
}
