//! Tests for the context aggregator fallbacks.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use super::*;

/// Store that answers every read after a fixed delay.
struct SlowStore {
    delay: Duration,
}

#[async_trait]
impl AnalyticsStore for SlowStore {
    fn name(&self) -> &'static str {
        "slow"
    }

    async fn aggregate_counts_and_sum(&self, _customer_id: &str) -> Result<ContextAggregates, StoreError> {
        tokio::time::sleep(self.delay).await;
        Ok(ContextAggregates {
            count_1h: 9,
            count_24h: 99,
            daily_accumulated: 999.0,
        })
    }

    async fn is_blacklisted(&self, _customer_id: &str, _account_id: Option<&str>) -> Result<bool, StoreError> {
        tokio::time::sleep(self.delay).await;
        Ok(true)
    }

    async fn record_decision(&self, _record: &DecisionRecord) -> Result<(), StoreError> {
        tokio::time::sleep(self.delay).await;
        Ok(())
    }

    async fn search_blacklist(&self, query: &BlacklistQuery) -> Result<BlacklistPage, StoreError> {
        tokio::time::sleep(self.delay).await;
        Ok(BlacklistPage {
            entries: Vec::new(),
            total: 0,
            page: query.page,
            page_size: query.page_size,
        })
    }

    async fn report(&self, range: &ReportRange) -> Result<RiskReport, StoreError> {
        tokio::time::sleep(self.delay).await;
        Ok(RiskReport::empty(range))
    }

    async fn realtime_stats(&self, window: &str, since: chrono::DateTime<Utc>) -> Result<RealtimeStats, StoreError> {
        tokio::time::sleep(self.delay).await;
        Ok(RealtimeStats::from_records(window, since, Utc::now(), std::iter::empty()))
    }

    async fn ping(&self) -> bool {
        tokio::time::sleep(self.delay).await;
        true
    }
}

fn slow(delay_ms: u64, timeout_ms: u64) -> ContextAggregator {
    ContextAggregator::new(
        Arc::new(SlowStore {
            delay: Duration::from_millis(delay_ms),
        }),
        Duration::from_millis(timeout_ms),
    )
}

#[tokio::test]
async fn answers_within_timeout_are_used() {
    let aggregator = slow(0, 500);
    let (agg, listed) = aggregator.gather("c1", None).await;
    assert_eq!(agg.count_1h, 9);
    assert!(listed);
    assert!(aggregator.is_available().await);
}

#[tokio::test]
async fn timeouts_fall_back_to_zero_context() {
    let aggregator = slow(200, 10);
    let (agg, listed) = aggregator.gather("c1", Some("a1")).await;
    assert_eq!(agg, ContextAggregates::default());
    assert!(!listed);
    assert!(!aggregator.is_available().await);
}

#[tokio::test]
async fn operator_reads_propagate_timeouts() {
    let aggregator = slow(200, 10);
    let err = aggregator
        .list_blacklist(&BlacklistQuery::default())
        .await
        .unwrap_err();
    assert_eq!(err, StoreError::Timeout(10));

    let range = ReportRange {
        from: Utc::now(),
        to: Utc::now(),
    };
    assert!(aggregator.report(&range).await.is_err());
    assert_eq!(aggregator.realtime_stats("5m").await.unwrap_err(), StoreError::Timeout(10));
}

#[tokio::test]
async fn unavailable_store_yields_zero_context() {
    let store = Arc::new(MemoryStore::new());
    store.set_available(false);
    let aggregator = ContextAggregator::new(store.clone(), DEFAULT_STORE_TIMEOUT);

    let (agg, listed) = aggregator.gather("c1", None).await;
    assert_eq!(agg, ContextAggregates::default());
    assert!(!listed);
    assert!(matches!(
        aggregator.list_blacklist(&BlacklistQuery::default()).await,
        Err(StoreError::Unavailable(_))
    ));
}

#[tokio::test]
async fn disabled_aggregator_never_touches_a_store() {
    let aggregator = ContextAggregator::disabled();
    assert!(!aggregator.is_enabled());
    assert_eq!(aggregator.backend_name(), "disabled");
    assert_eq!(aggregator.aggregates("c1").await, ContextAggregates::default());
    assert!(!aggregator.in_blacklist("c1", None).await);
    assert!(aggregator.report(&ReportRange { from: Utc::now(), to: Utc::now() }).await.is_err());
    assert!(aggregator.realtime_stats("5m").await.is_err());
}

#[tokio::test]
async fn realtime_stats_cover_the_requested_window() {
    let aggregator = slow(0, 500);
    let before = Utc::now();
    let stats = aggregator.realtime_stats("10m").await.unwrap();
    let after = Utc::now();
    assert_eq!(stats.window, "10m");
    assert!(stats.since >= before - chrono::Duration::minutes(10));
    assert!(stats.since <= after - chrono::Duration::minutes(10));
    assert_eq!(stats.total_count, 0);
    assert_eq!(stats.reject_rate, 0.0);
}

#[test]
fn blacklist_query_normalizes_paging() {
    let q = BlacklistQuery::new(None, 0, 500);
    assert_eq!(q.page, 1);
    assert_eq!(q.page_size, 100);
    assert_eq!(q.offset(), 0);

    let q = BlacklistQuery::new(Some(BlacklistType::Ip), 3, 0);
    assert_eq!(q.page_size, 1);
    assert_eq!(q.offset(), 2);
}

#[test]
fn blacklist_expiry() {
    let now = Utc::now();
    let mut entry = BlacklistEntry {
        id: "1".to_string(),
        blacklist_type: BlacklistType::Customer,
        value: "c1".to_string(),
        reason: Some("chargebacks".to_string()),
        source: None,
        is_active: true,
        created_at: None,
        expires_at: None,
    };
    assert!(entry.is_effective_at(now));

    entry.expires_at = Some(now - chrono::Duration::seconds(1));
    assert!(!entry.is_effective_at(now));

    entry.expires_at = Some(now + chrono::Duration::days(1));
    assert!(entry.is_effective_at(now));

    entry.is_active = false;
    assert!(!entry.is_effective_at(now));
}

#[test]
fn report_range_parsing() {
    let range = ReportRange::parse("2026-03-01", "2026-03-02").unwrap();
    assert_eq!(range.from.to_rfc3339(), "2026-03-01T00:00:00+00:00");
    assert_eq!(
        range.to.to_rfc3339_opts(chrono::SecondsFormat::Millis, false),
        "2026-03-02T23:59:59.999+00:00"
    );

    let range = ReportRange::parse("2026-03-01T08:00:00Z", "2026-03-01T09:00:00+01:00").unwrap();
    assert_eq!(range.from, range.to);

    assert!(ReportRange::parse("yesterday", "2026-03-01").is_err());
    assert!(ReportRange::parse("2026-03-02", "2026-03-01").is_err());
}

#[test]
fn report_from_records() {
    use riskgate_core::{Decision, RiskLevel};

    let range = ReportRange::parse("2026-01-01", "2026-12-31").unwrap();
    let make = |action: Decision, score: f64, latency: u64, code: Option<&str>| DecisionRecord {
        decision_id: "d".to_string(),
        timestamp: range.from + chrono::Duration::days(1),
        customer_id: "c".to_string(),
        account_id: None,
        amount: 1.0,
        transaction_type: "transfer".to_string(),
        recipient_account_id: None,
        action,
        risk_score: score,
        risk_level: RiskLevel::Low,
        processing_time_ms: latency,
        triggered_rules: vec!["r1".to_string()],
        reject_error_code: code.map(str::to_string),
        message: None,
    };
    let mut outside = make(Decision::Approve, 0.0, 1, None);
    outside.timestamp = range.to + chrono::Duration::days(1);
    let records = vec![
        make(Decision::Approve, 10.0, 10, None),
        make(Decision::Approve, 20.0, 20, None),
        make(Decision::Reject, 90.0, 30, Some("RKB003")),
        outside,
    ];

    let report = RiskReport::from_records(&range, &records);
    assert_eq!(report.total_count, 3);
    assert_eq!(report.reject_count, 1);
    assert!((report.approve_rate - 2.0 / 3.0).abs() < 1e-9);
    assert!((report.avg_risk_score - 40.0).abs() < 1e-9);
    assert_eq!(report.p50_processing_time_ms, 20);
    assert_eq!(report.by_reject_error_code["RKB003"], 1);
    assert_eq!(report.top_triggered_rules[0].count, 3);
    assert_eq!(report.daily.len(), 1);
    assert_eq!(report.daily[0].start.to_rfc3339(), "2026-01-02T00:00:00+00:00");
    assert_eq!((report.daily[0].total, report.daily[0].approve, report.daily[0].reject), (3, 2, 1));
}

fn decision_at(at: chrono::DateTime<Utc>, action: riskgate_core::Decision) -> DecisionRecord {
    DecisionRecord {
        decision_id: format!("d-{}", at.timestamp_millis()),
        timestamp: at,
        customer_id: "c".to_string(),
        account_id: None,
        amount: 1.0,
        transaction_type: "transfer".to_string(),
        recipient_account_id: None,
        action,
        risk_score: 0.0,
        risk_level: riskgate_core::RiskLevel::Low,
        processing_time_ms: 4,
        triggered_rules: Vec::new(),
        reject_error_code: None,
        message: None,
    }
}

#[test]
fn daily_buckets_split_on_utc_midnight() {
    use riskgate_core::Decision;

    let range = ReportRange::parse("2026-03-01", "2026-03-03").unwrap();
    let day1 = range.from + chrono::Duration::hours(23);
    let day3 = range.from + chrono::Duration::hours(49);
    let records = vec![
        decision_at(day3, Decision::Reject),
        decision_at(day1, Decision::Approve),
        decision_at(day1 + chrono::Duration::minutes(59), Decision::Approve),
    ];

    let report = RiskReport::from_records(&range, &records);
    let days: Vec<_> = report
        .daily
        .iter()
        .map(|b| (b.start.format("%Y-%m-%d").to_string(), b.total, b.reject))
        .collect();
    assert_eq!(
        days,
        vec![("2026-03-01".to_string(), 2, 0), ("2026-03-03".to_string(), 1, 1)]
    );
}

#[test]
fn realtime_stats_bucket_by_minute() {
    use riskgate_core::Decision;

    let now = ReportRange::parse("2026-03-01T12:10:30Z", "2026-03-01T12:10:30Z").unwrap().from;
    let records = vec![
        decision_at(now - chrono::Duration::seconds(20), Decision::Approve),
        decision_at(now - chrono::Duration::seconds(40), Decision::Reject),
        decision_at(now - chrono::Duration::seconds(45), Decision::Approve),
        decision_at(now - chrono::Duration::minutes(30), Decision::Approve),
    ];

    let stats = RealtimeStats::from_records("5m", now - chrono::Duration::minutes(5), now, &records);
    assert_eq!(stats.total_count, 3);
    assert_eq!(stats.reject_count, 1);
    assert!((stats.reject_rate - 1.0 / 3.0).abs() < 1e-9);
    let minutes: Vec<_> = stats
        .timeseries_1m
        .iter()
        .map(|b| (b.start.format("%H:%M").to_string(), b.total))
        .collect();
    assert_eq!(minutes, vec![("12:09".to_string(), 2), ("12:10".to_string(), 1)]);
}
