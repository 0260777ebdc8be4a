//! Rule chain loading with hot reload.
//!
//! The rules file is re-checked by modification time at most once per
//! reload interval; an opt-in `notify` watcher can trigger a reload as soon
//! as the file changes. Reloads are serialized by a writer mutex and end by
//! swapping the shared `Arc<RuleSet>`, so readers always see one complete
//! rule set and never wait on a parse.

mod error;
mod rule_set;
mod store;
mod watcher;

#[cfg(test)]
mod tests;

pub use self::error::{Result, RuleError};
pub use self::rule_set::{RuleSet, DEFAULT_REJECT_THRESHOLD};
pub use self::store::RuleChainStore;
