//! Core types for the analytical store.
//!
//! Defines the store trait, error enum, and the records exchanged with it.
//! The server crate implements the trait over Elasticsearch with reqwest;
//! this crate only depends on the trait and stays HTTP-client free.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use riskgate_core::{Decision, RiskLevel};

use crate::metrics::{percentile, RuleHitCount};

/// Abstraction over the historical event and blacklist store.
#[async_trait::async_trait]
pub trait AnalyticsStore: Send + Sync {
    /// Short backend name for logs and health output.
    fn name(&self) -> &'static str;

    /// Transactions in the last hour and 24 hours, plus today's summed
    /// amount, for one customer. One round trip.
    async fn aggregate_counts_and_sum(&self, customer_id: &str) -> Result<ContextAggregates, StoreError>;

    /// Whether an effective blacklist entry exists for the customer id or,
    /// when given, the account id.
    async fn is_blacklisted(&self, customer_id: &str, account_id: Option<&str>) -> Result<bool, StoreError>;

    /// Persist one decision.
    async fn record_decision(&self, record: &DecisionRecord) -> Result<(), StoreError>;

    /// Effective blacklist entries, newest first.
    async fn search_blacklist(&self, query: &BlacklistQuery) -> Result<BlacklistPage, StoreError>;

    /// Decision statistics over a time range.
    async fn report(&self, range: &ReportRange) -> Result<RiskReport, StoreError>;

    /// Decision statistics for the events since `since`, with one-minute
    /// buckets. `window` is the label the caller asked for.
    async fn realtime_stats(&self, window: &str, since: DateTime<Utc>) -> Result<RealtimeStats, StoreError>;

    /// Cheap reachability check.
    async fn ping(&self) -> bool;
}

/// Errors reaching or reading the analytical store.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("analytical store unavailable: {0}")]
    Unavailable(String),

    #[error("analytical store timed out after {0}ms")]
    Timeout(u64),

    #[error("analytical store returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("failed to decode analytical store response: {0}")]
    Decode(String),
}

// ── Context reads ───────────────────────────────────────────────────

/// Historical signals for one customer. `Default` is the fallback used
/// whenever the store cannot answer.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ContextAggregates {
    pub count_1h: u64,
    pub count_24h: u64,
    pub daily_accumulated: f64,
}

// ── Decision records ────────────────────────────────────────────────

/// One decision as written to the event store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub decision_id: String,
    pub timestamp: DateTime<Utc>,
    pub customer_id: String,
    pub account_id: Option<String>,
    pub amount: f64,
    pub transaction_type: String,
    pub recipient_account_id: Option<String>,
    pub action: Decision,
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    pub processing_time_ms: u64,
    pub triggered_rules: Vec<String>,
    pub reject_error_code: Option<String>,
    pub message: Option<String>,
}

// ── Blacklist ───────────────────────────────────────────────────────

/// Dimension a blacklist entry applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlacklistType {
    Customer,
    Account,
    Card,
    Ip,
    Device,
}

impl BlacklistType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlacklistType::Customer => "customer",
            BlacklistType::Account => "account",
            BlacklistType::Card => "card",
            BlacklistType::Ip => "ip",
            BlacklistType::Device => "device",
        }
    }
}

impl fmt::Display for BlacklistType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BlacklistType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "customer" => Ok(BlacklistType::Customer),
            "account" => Ok(BlacklistType::Account),
            "card" => Ok(BlacklistType::Card),
            "ip" => Ok(BlacklistType::Ip),
            "device" => Ok(BlacklistType::Device),
            other => Err(format!("unknown blacklist type: '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlacklistEntry {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub blacklist_type: BlacklistType,
    pub value: String,
    #[serde(default)]
    pub reason: Option<String>,
    /// Where the entry came from, e.g. `MANUAL`, `RULE` or `PARTNER`.
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// `None` means permanent.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

fn default_true() -> bool {
    true
}

impl BlacklistEntry {
    /// Active and not expired. An expiry in the past deactivates the entry
    /// even when it is still flagged active.
    pub fn is_effective_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at.map_or(true, |expires| expires > now)
    }
}

/// Largest page a blacklist listing may request.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Normalized paging and filter for a blacklist listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlacklistQuery {
    pub blacklist_type: Option<BlacklistType>,
    /// 1-based.
    pub page: u32,
    pub page_size: u32,
}

impl BlacklistQuery {
    /// `page` is raised to at least 1 and `page_size` clamped to `1..=100`.
    pub fn new(blacklist_type: Option<BlacklistType>, page: u32, page_size: u32) -> Self {
        Self {
            blacklist_type,
            page: page.max(1),
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> usize {
        (self.page as usize - 1) * self.page_size as usize
    }
}

impl Default for BlacklistQuery {
    fn default() -> Self {
        Self::new(None, 1, 20)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlacklistPage {
    pub entries: Vec<BlacklistEntry>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
}

// ── Reports ─────────────────────────────────────────────────────────

/// Inclusive time range for a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl ReportRange {
    /// Parse RFC 3339 timestamps or `YYYY-MM-DD` dates. A date-only `from`
    /// starts at 00:00:00 and a date-only `to` ends at 23:59:59.999.
    pub fn parse(from: &str, to: &str) -> Result<Self, String> {
        let from = parse_bound(from, false)?;
        let to = parse_bound(to, true)?;
        if from > to {
            return Err(format!("from ({}) is after to ({})", from, to));
        }
        Ok(Self { from, to })
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.from && at <= self.to
    }
}

fn parse_bound(raw: &str, end_of_day: bool) -> Result<DateTime<Utc>, String> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| format!("invalid date '{}', expected YYYY-MM-DD or RFC 3339", raw))?;
    let time = if end_of_day {
        NaiveTime::from_hms_milli_opt(23, 59, 59, 999)
    } else {
        NaiveTime::from_hms_opt(0, 0, 0)
    }
    .ok_or_else(|| "invalid time of day".to_string())?;
    Ok(date.and_time(time).and_utc())
}

/// Decision statistics over a time range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskReport {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub total_count: u64,
    pub approve_count: u64,
    pub reject_count: u64,
    /// 0.0 when there are no decisions.
    pub approve_rate: f64,
    pub by_decision: BTreeMap<String, u64>,
    pub by_risk_level: BTreeMap<String, u64>,
    pub by_transaction_type: BTreeMap<String, u64>,
    pub by_reject_error_code: BTreeMap<String, u64>,
    pub avg_risk_score: f64,
    pub p50_processing_time_ms: u64,
    pub p95_processing_time_ms: u64,
    pub p99_processing_time_ms: u64,
    pub top_triggered_rules: Vec<RuleHitCount>,
    /// One bucket per UTC day that has decisions, oldest first.
    #[serde(default)]
    pub daily: Vec<DecisionBucket>,
}

impl RiskReport {
    /// Build a report from raw records; records outside `range` are ignored.
    pub fn from_records<'a>(
        range: &ReportRange,
        records: impl IntoIterator<Item = &'a DecisionRecord>,
    ) -> Self {
        let mut report = Self::empty(range);
        let mut latencies = Vec::new();
        let mut score_sum = 0.0;
        let mut rule_hits: IndexMap<&str, u64> = IndexMap::new();
        let mut days = DecisionBuckets::new(Duration::days(1));

        for r in records.into_iter().filter(|r| range.contains(r.timestamp)) {
            days.add(r);
            report.total_count += 1;
            match r.action {
                Decision::Approve => report.approve_count += 1,
                Decision::Reject => report.reject_count += 1,
            }
            *report.by_decision.entry(r.action.to_string()).or_insert(0) += 1;
            *report.by_risk_level.entry(r.risk_level.to_string()).or_insert(0) += 1;
            *report
                .by_transaction_type
                .entry(r.transaction_type.clone())
                .or_insert(0) += 1;
            if let Some(code) = &r.reject_error_code {
                *report.by_reject_error_code.entry(code.clone()).or_insert(0) += 1;
            }
            for rule in &r.triggered_rules {
                *rule_hits.entry(rule.as_str()).or_insert(0) += 1;
            }
            score_sum += r.risk_score;
            latencies.push(r.processing_time_ms);
        }

        if report.total_count > 0 {
            report.approve_rate = report.approve_count as f64 / report.total_count as f64;
            report.avg_risk_score = score_sum / report.total_count as f64;
        }
        latencies.sort_unstable();
        report.p50_processing_time_ms = percentile(&latencies, 0.50);
        report.p95_processing_time_ms = percentile(&latencies, 0.95);
        report.p99_processing_time_ms = percentile(&latencies, 0.99);

        let mut top: Vec<(&str, u64)> = rule_hits.into_iter().collect();
        top.sort_by(|a, b| b.1.cmp(&a.1));
        report.top_triggered_rules = top
            .into_iter()
            .take(10)
            .map(|(rule, count)| RuleHitCount {
                rule: rule.to_string(),
                count,
            })
            .collect();
        report.daily = days.into_vec();
        report
    }

    /// A report with every count at zero.
    pub fn empty(range: &ReportRange) -> Self {
        Self {
            from: range.from,
            to: range.to,
            total_count: 0,
            approve_count: 0,
            reject_count: 0,
            approve_rate: 0.0,
            by_decision: BTreeMap::new(),
            by_risk_level: BTreeMap::new(),
            by_transaction_type: BTreeMap::new(),
            by_reject_error_code: BTreeMap::new(),
            avg_risk_score: 0.0,
            p50_processing_time_ms: 0,
            p95_processing_time_ms: 0,
            p99_processing_time_ms: 0,
            top_triggered_rules: Vec::new(),
            daily: Vec::new(),
        }
    }
}

// ── Time buckets ────────────────────────────────────────────────────

/// Decision counts for one fixed-width time bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionBucket {
    /// Bucket start, aligned to the bucket width since the Unix epoch.
    pub start: DateTime<Utc>,
    pub total: u64,
    pub approve: u64,
    pub reject: u64,
}

/// Accumulates records into aligned buckets; empty buckets are omitted.
struct DecisionBuckets {
    width_ms: i64,
    buckets: BTreeMap<i64, DecisionBucket>,
}

impl DecisionBuckets {
    fn new(width: Duration) -> Self {
        Self {
            width_ms: width.num_milliseconds().max(1),
            buckets: BTreeMap::new(),
        }
    }

    fn add(&mut self, record: &DecisionRecord) {
        let key = record.timestamp.timestamp_millis().div_euclid(self.width_ms) * self.width_ms;
        let bucket = self.buckets.entry(key).or_insert_with(|| DecisionBucket {
            start: DateTime::from_timestamp_millis(key).unwrap_or(record.timestamp),
            total: 0,
            approve: 0,
            reject: 0,
        });
        bucket.total += 1;
        match record.action {
            Decision::Approve => bucket.approve += 1,
            Decision::Reject => bucket.reject += 1,
        }
    }

    fn into_vec(self) -> Vec<DecisionBucket> {
        self.buckets.into_values().collect()
    }
}

// ── Realtime ────────────────────────────────────────────────────────

/// Store-side statistics for a recent window. Unlike the in-process
/// window this covers every instance writing to the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealtimeStats {
    pub window: String,
    pub since: DateTime<Utc>,
    pub total_count: u64,
    pub approve_count: u64,
    pub reject_count: u64,
    /// 0.0 when there are no decisions.
    pub reject_rate: f64,
    pub by_decision: BTreeMap<String, u64>,
    pub by_risk_level: BTreeMap<String, u64>,
    pub by_transaction_type: BTreeMap<String, u64>,
    pub by_reject_error_code: BTreeMap<String, u64>,
    pub p50_processing_time_ms: u64,
    pub p95_processing_time_ms: u64,
    pub p99_processing_time_ms: u64,
    pub top_triggered_rules: Vec<RuleHitCount>,
    /// Oldest first.
    pub timeseries_1m: Vec<DecisionBucket>,
}

impl RealtimeStats {
    /// Reuse the report counters; the report's daily buckets are dropped.
    pub fn from_report(window: &str, report: RiskReport, timeseries_1m: Vec<DecisionBucket>) -> Self {
        let reject_rate = if report.total_count == 0 {
            0.0
        } else {
            report.reject_count as f64 / report.total_count as f64
        };
        Self {
            window: window.to_string(),
            since: report.from,
            total_count: report.total_count,
            approve_count: report.approve_count,
            reject_count: report.reject_count,
            reject_rate,
            by_decision: report.by_decision,
            by_risk_level: report.by_risk_level,
            by_transaction_type: report.by_transaction_type,
            by_reject_error_code: report.by_reject_error_code,
            p50_processing_time_ms: report.p50_processing_time_ms,
            p95_processing_time_ms: report.p95_processing_time_ms,
            p99_processing_time_ms: report.p99_processing_time_ms,
            top_triggered_rules: report.top_triggered_rules,
            timeseries_1m,
        }
    }

    /// Build from raw records in `[since, now]`.
    pub fn from_records<'a>(
        window: &str,
        since: DateTime<Utc>,
        now: DateTime<Utc>,
        records: impl IntoIterator<Item = &'a DecisionRecord>,
    ) -> Self {
        let range = ReportRange { from: since, to: now };
        let in_range: Vec<&DecisionRecord> = records
            .into_iter()
            .filter(|r| range.contains(r.timestamp))
            .collect();

        let mut minutes = DecisionBuckets::new(Duration::minutes(1));
        for r in &in_range {
            minutes.add(r);
        }
        let report = RiskReport::from_records(&range, in_range.iter().copied());
        Self::from_report(window, report, minutes.into_vec())
    }
}
