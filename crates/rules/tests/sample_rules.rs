//! Verifies the shipped `config/rules.yaml` loads cleanly.

use riskgate_rules::loader::RuleSet;
use riskgate_rules::schema::{RuleAction, RuleType};

/// Integration tests run from the crate directory, so go up two levels.
fn sample_rules_path() -> std::path::PathBuf {
    let manifest = std::path::Path::new(env!("CARGO_MANIFEST_DIR"));
    manifest.join("../../config/rules.yaml")
}

#[test]
fn sample_rules_load_without_warnings() {
    let set = RuleSet::from_file(&sample_rules_path()).expect("sample rules parse");
    assert!(set.warnings().is_empty(), "warnings: {:?}", set.warnings());
    assert_eq!(set.score_reject_threshold(), 75.0);
    assert_eq!(set.rules().len(), 8);
    assert_eq!(set.enabled_count(), 8);
}

#[test]
fn sample_rules_cover_every_type_in_priority_order() {
    let set = RuleSet::from_file(&sample_rules_path()).expect("sample rules parse");

    let priorities: Vec<i64> = set.rules().iter().map(|r| r.priority).collect();
    let mut sorted = priorities.clone();
    sorted.sort();
    assert_eq!(priorities, sorted);

    for kind in [
        RuleType::Limit,
        RuleType::Frequency,
        RuleType::Blacklist,
        RuleType::BatchLimit,
        RuleType::ScheduledLimit,
    ] {
        assert!(
            set.rules().iter().any(|r| r.rule_type() == kind),
            "no {} rule in sample",
            kind
        );
    }

    let first = &set.rules()[0];
    assert_eq!(first.name, "blacklist_check");
    assert_eq!(first.action, RuleAction::Reject);

    let review = set
        .rules()
        .iter()
        .find(|r| r.name == "large_amount_review")
        .expect("review rule present");
    assert_eq!(review.action, RuleAction::Review);
    assert_eq!(review.warn_score(), 15.0);
}
