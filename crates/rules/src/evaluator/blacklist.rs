use crate::context::DecisionContext;
use crate::schema::BlacklistCondition;

use super::Evaluator;

impl Evaluator for BlacklistCondition {
    fn check(&self, ctx: &DecisionContext) -> Option<String> {
        ctx.in_blacklist
            .then(|| "customer or account is blacklisted".to_string())
    }
}
