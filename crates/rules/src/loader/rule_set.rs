//! The immutable, sorted view of a rules document.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};

use crate::schema::{ParsedRules, RuleDefinition, RulesDocument, RuleSummary};

use super::error::Result;

/// Score at or above which the chain rejects when no threshold is configured.
pub const DEFAULT_REJECT_THRESHOLD: f64 = 75.0;

/// Validated rule definitions, stable-sorted by priority, plus the global
/// reject threshold. Never mutated after construction; reloads build a new one.
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<RuleDefinition>,
    score_reject_threshold: f64,
    warnings: Vec<String>,
    loaded_at: DateTime<Utc>,
}

impl RuleSet {
    /// No rules: every transaction is approved with the contextual score.
    pub fn empty() -> Self {
        Self::from_parsed(ParsedRules::default())
    }

    pub fn from_parsed(parsed: ParsedRules) -> Self {
        let mut rules = parsed.rules;
        // `sort_by_key` is stable, so equal priorities keep file order.
        rules.sort_by_key(|r| r.priority);
        Self {
            rules,
            score_reject_threshold: parsed
                .score_reject_threshold
                .unwrap_or(DEFAULT_REJECT_THRESHOLD),
            warnings: parsed.warnings,
            loaded_at: Utc::now(),
        }
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(Self::from_parsed(RulesDocument::parse(content)?))
    }

    /// Strict load: I/O and YAML errors are returned to the caller.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// All loaded rules in evaluation order, including disabled ones.
    pub fn rules(&self) -> &[RuleDefinition] {
        &self.rules
    }

    /// Enabled rules in evaluation order.
    pub fn enabled(&self) -> impl Iterator<Item = &RuleDefinition> {
        self.rules.iter().filter(|r| r.enabled)
    }

    pub fn enabled_count(&self) -> usize {
        self.enabled().count()
    }

    pub fn score_reject_threshold(&self) -> f64 {
        self.score_reject_threshold
    }

    /// Problems found while loading (dropped rules, ignored fields).
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    pub fn summaries(&self) -> Vec<RuleSummary> {
        self.rules.iter().map(RuleDefinition::summary).collect()
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::empty()
    }
}
