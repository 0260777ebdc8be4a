//! End-to-end tests for `RiskService::check_risk` over the in-memory store.

use std::fs::{self, File};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use chrono::Utc;
use serde_json::json;
use tempfile::TempDir;

use riskgate_core::{RiskLevel, TransactionRequest, ValidationError};
use riskgate_rules::aggregator::{BlacklistEntry, BlacklistType, ContextAggregator, MemoryStore};
use riskgate_rules::loader::RuleChainStore;
use riskgate_rules::metrics::RealtimeMetricsWindow;
use riskgate_rules::RiskService;

const RULES_YAML: &str = r#"
score_reject_threshold: 75
rules:
  - name: blacklist_check
    type: blacklist
    priority: 1
  - name: single_limit
    type: limit
    priority: 10
    condition: { max_amount: 5000 }
    message: "Single transaction limit exceeded"
  - name: hourly_frequency
    type: frequency
    priority: 20
    condition: { window: 1h, max_count: 2 }
  - name: pending_cap
    type: scheduled_limit
    priority: 30
    condition: { max_pending_count: 20 }
"#;

fn write_rules(path: &Path, content: &str, mtime_secs: u64) {
    fs::write(path, content).unwrap();
    File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(mtime_secs))
        .unwrap();
}

struct Harness {
    _dir: TempDir,
    rules_path: std::path::PathBuf,
    store: Arc<MemoryStore>,
    service: RiskService,
}

fn harness() -> Harness {
    let dir = TempDir::new().expect("create tempdir");
    let rules_path = dir.path().join("rules.yaml");
    write_rules(&rules_path, RULES_YAML, 1_000);

    let store = Arc::new(MemoryStore::new());
    let service = RiskService::new(
        Arc::new(RuleChainStore::open(&rules_path, Duration::ZERO)),
        ContextAggregator::new(store.clone(), Duration::from_millis(500)),
        Arc::new(RealtimeMetricsWindow::new()),
    );
    Harness {
        _dir: dir,
        rules_path,
        store,
        service,
    }
}

#[tokio::test]
async fn approve_records_decision_everywhere() {
    let h = harness();
    let response = h
        .service
        .check_risk(&TransactionRequest::new("cust-1", 1000.0, "transfer"))
        .await
        .unwrap();

    assert!(response.approved);
    assert_eq!(response.risk_score, 0.0);
    assert_eq!(response.risk_level, RiskLevel::Low);
    assert!(response.reject_error_code.is_none());
    assert_eq!(response.decision_id.len(), 36);

    let records = h.store.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].decision_id, response.decision_id);

    let snap = h.service.realtime_snapshot("5m");
    assert_eq!(snap.total_count, 1);
    assert_eq!(snap.approve_count, 1);
}

#[tokio::test]
async fn limit_reject_carries_code_and_message() {
    let h = harness();
    let response = h
        .service
        .check_risk(&TransactionRequest::new("cust-1", 5000.01, "transfer"))
        .await
        .unwrap();
    assert!(!response.approved);
    assert_eq!(response.reject_error_code.as_deref(), Some("RKB003"));
    assert_eq!(response.message.as_deref(), Some("Single transaction limit exceeded"));
    assert_eq!(response.triggered_rules, vec!["single_limit"]);
}

#[tokio::test]
async fn blacklisted_account_is_rejected() {
    let h = harness();
    h.store.add_blacklist_entry(BlacklistEntry {
        id: "bl-1".to_string(),
        blacklist_type: BlacklistType::Account,
        value: "acc-666".to_string(),
        reason: Some("fraud".to_string()),
        source: Some("RULE".to_string()),
        is_active: true,
        created_at: Some(Utc::now()),
        expires_at: None,
    });

    let request = TransactionRequest::new("cust-1", 10.0, "payment").with_account("acc-666");
    let response = h.service.check_risk(&request).await.unwrap();
    assert!(!response.approved);
    assert_eq!(response.reject_error_code.as_deref(), Some("RKB002"));
}

#[tokio::test]
async fn history_feeds_frequency_rule() {
    let h = harness();
    for _ in 0..3 {
        let response = h
            .service
            .check_risk(&TransactionRequest::new("busy", 10.0, "transfer"))
            .await
            .unwrap();
        assert!(response.approved);
    }
    let response = h
        .service
        .check_risk(&TransactionRequest::new("busy", 10.0, "transfer"))
        .await
        .unwrap();
    assert!(!response.approved);
    assert_eq!(response.reject_error_code.as_deref(), Some("RKB004"));
}

#[tokio::test]
async fn store_outage_degrades_to_zero_context() {
    let h = harness();
    h.store.set_available(false);

    let request = TransactionRequest::new("cust-1", 60_000.0, "deposit");
    let response = h.service.check_risk(&request).await;
    // amount limit still applies without any history
    assert!(!response.unwrap().approved);

    let response = h
        .service
        .check_risk(&TransactionRequest::new("cust-1", 100.0, "deposit"))
        .await
        .unwrap();
    assert!(response.approved);
    assert!(h.store.records().is_empty());
    assert_eq!(h.service.realtime_snapshot("1h").total_count, 2);

    let monitor = h.service.realtime_monitor("1h").await;
    assert!(!monitor.store_available);
    assert!(monitor.store.is_none());
    assert_eq!(monitor.window, "1h");
    assert_eq!(monitor.buffered_events, 2);
}

#[tokio::test]
async fn metadata_extensions_reach_evaluators() {
    let h = harness();
    let request = TransactionRequest::new("cust-1", 10.0, "scheduled_transfer")
        .with_metadata("pending_scheduled_count", json!(20));
    let response = h.service.check_risk(&request).await.unwrap();
    assert!(!response.approved);
    assert_eq!(response.triggered_rules, vec!["pending_cap"]);
}

#[tokio::test]
async fn invalid_request_is_refused_before_evaluation() {
    let h = harness();
    let err = h
        .service
        .check_risk(&TransactionRequest::new("", 10.0, "transfer"))
        .await
        .unwrap_err();
    assert_eq!(err, ValidationError::MissingCustomer);
    assert_eq!(h.service.realtime_snapshot("5m").total_count, 0);
}

#[tokio::test]
async fn rules_file_change_applies_to_next_check() {
    let h = harness();
    let request = TransactionRequest::new("cust-1", 6000.0, "transfer");
    assert!(!h.service.check_risk(&request).await.unwrap().approved);

    write_rules(&h.rules_path, "rules: []\n", 2_000);
    let response = h.service.check_risk(&request).await.unwrap();
    assert!(response.approved);
    assert!(h.service.rule_set().rules().is_empty());
}

#[tokio::test]
async fn report_and_listing_use_the_store() {
    let h = harness();
    h.service
        .check_risk(&TransactionRequest::new("cust-1", 10.0, "transfer"))
        .await
        .unwrap();
    h.service
        .check_risk(&TransactionRequest::new("cust-1", 9000.0, "transfer"))
        .await
        .unwrap();

    let today = Utc::now().format("%Y-%m-%d").to_string();
    let range = riskgate_rules::aggregator::ReportRange::parse(&today, &today).unwrap();
    let report = h.service.report(&range).await.unwrap();
    assert_eq!(report.total_count, 2);
    assert_eq!(report.reject_count, 1);

    h.store.set_available(false);
    assert!(h.service.report(&range).await.is_err());
    assert!(h
        .service
        .list_blacklist(&Default::default())
        .await
        .is_err());
}

#[tokio::test]
async fn forced_reload_ignores_poll_interval() {
    let dir = TempDir::new().expect("create tempdir");
    let rules_path = dir.path().join("rules.yaml");
    write_rules(&rules_path, RULES_YAML, 1_000);
    let service = RiskService::new(
        Arc::new(RuleChainStore::open(&rules_path, Duration::from_secs(3600))),
        ContextAggregator::disabled(),
        Arc::new(RealtimeMetricsWindow::new()),
    );

    write_rules(&rules_path, "rules: []\n", 2_000);
    let request = TransactionRequest::new("cust-1", 6000.0, "transfer");
    // Not due yet: the old chain still rejects.
    assert!(!service.check_risk(&request).await.unwrap().approved);

    assert!(service.reload_rules().await.rules().is_empty());
    assert!(service.check_risk(&request).await.unwrap().approved);
}

#[tokio::test]
async fn monitor_includes_store_side_stats() {
    let h = harness();
    h.service
        .check_risk(&TransactionRequest::new("cust-1", 10.0, "transfer"))
        .await
        .unwrap();
    h.service
        .check_risk(&TransactionRequest::new("cust-2", 9000.0, "transfer"))
        .await
        .unwrap();

    let monitor = h.service.realtime_monitor("5m").await;
    assert!(monitor.store_available);
    let store = monitor.store.expect("store stats");
    assert_eq!(store.window, "5m");
    assert_eq!(store.total_count, 2);
    assert_eq!(store.reject_count, 1);
    assert_eq!(monitor.in_memory.total_count, 2);
    assert_eq!(monitor.buffer_capacity, riskgate_rules::metrics::DEFAULT_CAPACITY);
}
