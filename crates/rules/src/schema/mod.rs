//! YAML schema types for the rule configuration document.
//!
//! Loading is two-pass, following the envelope pattern:
//! - `RulesDocument` / `RawRule`: loose first pass that only needs valid YAML
//! - `RuleDefinition`: typed second pass with a closed `RuleCondition` per
//!   rule type, where bad fields become load-time warnings
//!
//! A single malformed rule never prevents the rest of the document from loading.

mod action;
mod condition;
mod document;
mod kind;
mod rule;

pub use action::*;
pub use condition::*;
pub use document::*;
pub use kind::*;
pub use rule::*;
