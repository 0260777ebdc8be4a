//! Tests for the rule chain loader.

use std::fs::{self, File};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tempfile::TempDir;

use super::*;

const TWO_RULES_YAML: &str = r#"
score_reject_threshold: 70
rules:
  - name: late
    type: limit
    priority: 50
    condition: { max_amount: 5000 }
  - name: early
    type: blacklist
    priority: 1
  - name: tie_first
    type: frequency
    priority: 20
    action: warn
    condition: { window: 1h, max_count: 5 }
  - name: tie_second
    type: frequency
    priority: 20
    action: warn
    condition: { window: 24h, max_count: 50 }
  - name: off
    type: scheduled_limit
    enabled: false
    condition: { max_pending_count: 20 }
"#;

const ONE_RULE_YAML: &str = r#"
rules:
  - name: only
    type: limit
    condition: { max_amount: 100 }
"#;

/// Write `content` and pin the modification time so consecutive writes in
/// the same test always produce distinct markers.
fn write_rules(path: &Path, content: &str, mtime_secs: u64) {
    fs::write(path, content).unwrap();
    let file = File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(mtime_secs))
        .unwrap();
}

fn names(set: &RuleSet) -> Vec<&str> {
    set.rules().iter().map(|r| r.name.as_str()).collect()
}

#[test]
fn load_sorts_by_priority_keeping_file_order_on_ties() {
    let dir = TempDir::new().expect("create tempdir");
    let path = dir.path().join("rules.yaml");
    write_rules(&path, TWO_RULES_YAML, 1_000);

    let store = RuleChainStore::open(&path, Duration::ZERO);
    let set = store.current();
    assert_eq!(names(&set), vec!["early", "tie_first", "tie_second", "late", "off"]);
    assert_eq!(set.enabled_count(), 4);
    assert_eq!(set.score_reject_threshold(), 70.0);
}

#[test]
fn missing_file_yields_empty_set() {
    let dir = TempDir::new().expect("create tempdir");
    let store = RuleChainStore::open(dir.path().join("absent.yaml"), Duration::ZERO);
    let set = store.current();
    assert!(set.rules().is_empty());
    assert_eq!(set.score_reject_threshold(), DEFAULT_REJECT_THRESHOLD);
}

#[test]
fn unparsable_file_yields_empty_set() {
    let dir = TempDir::new().expect("create tempdir");
    let path = dir.path().join("rules.yaml");
    write_rules(&path, "rules: [this is: not valid", 1_000);

    let store = RuleChainStore::open(&path, Duration::ZERO);
    assert!(store.current().rules().is_empty());
    // Same marker: nothing to reload.
    assert!(!store.maybe_reload());
}

#[test]
fn maybe_reload_swaps_after_marker_change() {
    let dir = TempDir::new().expect("create tempdir");
    let path = dir.path().join("rules.yaml");
    write_rules(&path, ONE_RULE_YAML, 1_000);

    let store = RuleChainStore::open(&path, Duration::ZERO);
    let before = store.current();
    assert_eq!(names(&before), vec!["only"]);
    assert!(!store.maybe_reload(), "unchanged file must not reload");

    write_rules(&path, TWO_RULES_YAML, 2_000);
    assert!(store.maybe_reload());

    let after = store.current();
    assert_eq!(after.rules().len(), 5);
    // A reader holding the old Arc still sees one consistent set.
    assert_eq!(names(&before), vec!["only"]);
    assert!(!Arc::ptr_eq(&before, &after));
}

#[test]
fn maybe_reload_respects_interval() {
    let dir = TempDir::new().expect("create tempdir");
    let path = dir.path().join("rules.yaml");
    write_rules(&path, ONE_RULE_YAML, 1_000);

    let store = RuleChainStore::open(&path, Duration::from_secs(3600));
    write_rules(&path, TWO_RULES_YAML, 2_000);
    assert!(!store.maybe_reload());
    assert_eq!(store.current().rules().len(), 1);

    // A forced reload ignores the interval.
    assert_eq!(store.reload().rules().len(), 5);
}

#[test]
fn disappearing_file_keeps_current_set() {
    let dir = TempDir::new().expect("create tempdir");
    let path = dir.path().join("rules.yaml");
    write_rules(&path, ONE_RULE_YAML, 1_000);

    let store = RuleChainStore::open(&path, Duration::ZERO);
    fs::remove_file(&path).unwrap();

    assert!(!store.maybe_reload());
    assert_eq!(store.current().rules().len(), 1);
    assert_eq!(store.reload().rules().len(), 1);
}

#[test]
fn strict_load_reports_errors() {
    let dir = TempDir::new().expect("create tempdir");
    let missing = RuleSet::from_file(&dir.path().join("nope.yaml"));
    assert!(matches!(missing, Err(RuleError::Io(_))));

    let path = dir.path().join("bad.yaml");
    fs::write(&path, "rules: [unclosed").unwrap();
    assert!(matches!(RuleSet::from_file(&path), Err(RuleError::Parse(_))));
}

#[test]
fn summaries_follow_evaluation_order() {
    let set = RuleSet::from_yaml(TWO_RULES_YAML).unwrap();
    let summaries = set.summaries();
    assert_eq!(summaries[0].name, "early");
    assert_eq!(summaries[0].error_code.as_deref(), Some("RKB002"));
    assert_eq!(summaries[1].risk_score_add, 10.0);
}

#[test]
fn concurrent_readers_during_reload() {
    let dir = TempDir::new().expect("create tempdir");
    let path = dir.path().join("rules.yaml");
    write_rules(&path, ONE_RULE_YAML, 1_000);
    let store = Arc::new(RuleChainStore::open(&path, Duration::ZERO));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for _ in 0..200 {
                    let len = store.current().rules().len();
                    assert!(len == 1 || len == 5, "saw partial rule set of {}", len);
                }
            })
        })
        .collect();

    write_rules(&path, TWO_RULES_YAML, 2_000);
    store.reload();

    for r in readers {
        r.join().unwrap();
    }
    assert_eq!(store.current().rules().len(), 5);
}

fn many_rules_yaml(count: usize) -> String {
    let mut yaml = String::from("rules:\n");
    for i in 0..count {
        yaml.push_str(&format!(
            "  - name: limit_{i}\n    type: limit\n    priority: {i}\n    condition: {{ max_amount: 5000 }}\n"
        ));
    }
    yaml
}

#[test]
fn slow_poll_reload_cannot_overwrite_forced_reload() {
    let dir = TempDir::new().expect("create tempdir");
    let path = dir.path().join("rules.yaml");
    write_rules(&path, ONE_RULE_YAML, 1_000);
    let store = Arc::new(RuleChainStore::open(&path, Duration::ZERO));

    // A large file keeps the polling reload busy parsing.
    write_rules(&path, &many_rules_yaml(20_000), 2_000);
    let poller = {
        let store = Arc::clone(&store);
        std::thread::spawn(move || store.maybe_reload())
    };
    std::thread::sleep(Duration::from_millis(20));

    write_rules(&path, TWO_RULES_YAML, 3_000);
    assert_eq!(store.reload().rules().len(), 5);
    poller.join().unwrap();

    assert_eq!(store.current().rules().len(), 5, "older file won the swap");
    assert!(!store.maybe_reload(), "marker must match the file on disk");
    assert_eq!(store.current().rules().len(), 5);
}

#[test]
fn reload_due_tracks_interval() {
    let dir = TempDir::new().expect("create tempdir");
    let path = dir.path().join("rules.yaml");
    write_rules(&path, ONE_RULE_YAML, 1_000);

    assert!(RuleChainStore::open(&path, Duration::ZERO).reload_due());
    assert!(!RuleChainStore::open(&path, Duration::from_secs(3600)).reload_due());
}
