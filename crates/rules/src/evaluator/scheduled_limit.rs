use crate::context::{keys, DecisionContext};
use crate::schema::ScheduledLimitCondition;

use super::Evaluator;

impl Evaluator for ScheduledLimitCondition {
    fn check(&self, ctx: &DecisionContext) -> Option<String> {
        let max = self.max_pending_count?;
        let pending = ctx.extension_i64(keys::PENDING_SCHEDULED_COUNT)?;
        (pending >= max).then(|| format!("pending scheduled transfers reached limit of {}", max))
    }
}
