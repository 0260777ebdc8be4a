//! In-process realtime decision metrics.
//!
//! Keeps the most recent decisions in a bounded ring buffer (default 5000)
//! with FIFO eviction, and answers windowed snapshot queries from it. Used
//! as the observability source of last resort when the analytical store is
//! unavailable. Uses `std::sync::RwLock`; the lock is never held across an
//! await.

use std::collections::{BTreeMap, VecDeque};
use std::sync::RwLock;
use std::time::Duration;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use riskgate_core::{Decision, RiskLevel};

/// Default ring buffer capacity.
pub const DEFAULT_CAPACITY: usize = 5000;

/// Window used when the requested one cannot be parsed.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(300);

const TOP_RULES: usize = 10;

/// Immutable record of one decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionEvent {
    pub timestamp: DateTime<Utc>,
    pub decision: Decision,
    pub risk_level: RiskLevel,
    pub processing_time_ms: u64,
    pub triggered_rules: Vec<String>,
    pub reject_error_code: Option<String>,
    pub transaction_type: Option<String>,
}

/// How often a rule fired inside a window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleHitCount {
    pub rule: String,
    pub count: u64,
}

/// Aggregates over the events inside one window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// The window as requested, e.g. `"5m"`.
    pub window: String,
    pub window_ms: u64,
    pub total_count: u64,
    pub approve_count: u64,
    pub reject_count: u64,
    /// 0.0 when the window is empty.
    pub reject_rate: f64,
    pub by_decision: BTreeMap<String, u64>,
    pub by_risk_level: BTreeMap<String, u64>,
    /// `unknown` when the transaction type is absent.
    pub by_transaction_type: BTreeMap<String, u64>,
    /// `none` when the event has no reject code.
    pub by_reject_error_code: BTreeMap<String, u64>,
    pub p95_processing_time_ms: u64,
    /// At most ten, most frequent first; ties keep first-seen order.
    pub top_triggered_rules: Vec<RuleHitCount>,
}

/// Bounded FIFO of recent decision events.
pub struct RealtimeMetricsWindow {
    events: RwLock<VecDeque<DecisionEvent>>,
    capacity: usize,
}

impl RealtimeMetricsWindow {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: RwLock::new(VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY))),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Events currently held, at most [`capacity()`](Self::capacity).
    pub fn buffered(&self) -> usize {
        self.events.read().expect("metrics lock poisoned").len()
    }

    /// Append an event, evicting the oldest beyond capacity.
    pub fn record(&self, event: DecisionEvent) {
        let mut guard = self.events.write().expect("metrics lock poisoned");
        guard.push_back(event);
        while guard.len() > self.capacity {
            guard.pop_front();
        }
    }

    /// Snapshot of the last `window` (see [`parse_window`]) ending now.
    pub fn snapshot(&self, window: &str) -> MetricsSnapshot {
        self.snapshot_at(window, Utc::now())
    }

    /// Snapshot of the events with timestamps in `[now - window, now]`.
    pub fn snapshot_at(&self, window: &str, now: DateTime<Utc>) -> MetricsSnapshot {
        let span = parse_window(window);
        let since = window_start(now, span);

        let in_window: Vec<DecisionEvent> = {
            let guard = self.events.read().expect("metrics lock poisoned");
            guard
                .iter()
                .filter(|e| e.timestamp >= since && e.timestamp <= now)
                .cloned()
                .collect()
        };

        let label = if window.trim().is_empty() {
            "5m".to_string()
        } else {
            window.trim().to_string()
        };
        summarize(label, span, &in_window)
    }
}

impl Default for RealtimeMetricsWindow {
    fn default() -> Self {
        Self::new()
    }
}

fn summarize(window: String, span: Duration, events: &[DecisionEvent]) -> MetricsSnapshot {
    let mut by_decision = BTreeMap::new();
    let mut by_risk_level = BTreeMap::new();
    let mut by_transaction_type = BTreeMap::new();
    let mut by_reject_error_code = BTreeMap::new();
    let mut rule_hits: IndexMap<&str, u64> = IndexMap::new();
    let mut latencies = Vec::with_capacity(events.len());
    let mut approve_count = 0u64;
    let mut reject_count = 0u64;

    for e in events {
        match e.decision {
            Decision::Approve => approve_count += 1,
            Decision::Reject => reject_count += 1,
        }
        *by_decision.entry(e.decision.to_string()).or_insert(0) += 1;
        *by_risk_level.entry(e.risk_level.to_string()).or_insert(0) += 1;
        let kind = e.transaction_type.as_deref().unwrap_or("unknown");
        *by_transaction_type.entry(kind.to_string()).or_insert(0) += 1;
        let code = e.reject_error_code.as_deref().unwrap_or("none");
        *by_reject_error_code.entry(code.to_string()).or_insert(0) += 1;
        for rule in &e.triggered_rules {
            *rule_hits.entry(rule.as_str()).or_insert(0) += 1;
        }
        latencies.push(e.processing_time_ms);
    }

    let total_count = events.len() as u64;
    let reject_rate = if total_count == 0 {
        0.0
    } else {
        reject_count as f64 / total_count as f64
    };

    latencies.sort_unstable();

    // Stable sort keeps first-seen order among equal counts.
    let mut top: Vec<(&str, u64)> = rule_hits.into_iter().collect();
    top.sort_by(|a, b| b.1.cmp(&a.1));
    let top_triggered_rules = top
        .into_iter()
        .take(TOP_RULES)
        .map(|(rule, count)| RuleHitCount {
            rule: rule.to_string(),
            count,
        })
        .collect();

    MetricsSnapshot {
        window,
        window_ms: span.as_millis() as u64,
        total_count,
        approve_count,
        reject_count,
        reject_rate,
        by_decision,
        by_risk_level,
        by_transaction_type,
        by_reject_error_code,
        p95_processing_time_ms: percentile(&latencies, 0.95),
        top_triggered_rules,
    }
}

/// Parse a window such as `250ms`, `30s`, `5m` or `1h`. A bare number is
/// minutes, anything unparsable is five minutes, and the result is never
/// shorter than one second.
pub fn parse_window(raw: &str) -> Duration {
    let s = raw.trim().to_lowercase();
    let (number, unit_ms) = if let Some(n) = s.strip_suffix("ms") {
        (n, 1.0)
    } else if let Some(n) = s.strip_suffix('s') {
        (n, 1_000.0)
    } else if let Some(n) = s.strip_suffix('m') {
        (n, 60_000.0)
    } else if let Some(n) = s.strip_suffix('h') {
        (n, 3_600_000.0)
    } else {
        (s.as_str(), 60_000.0)
    };

    let millis = match number.trim().parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 => v * unit_ms,
        _ => return DEFAULT_WINDOW,
    };
    Duration::from_millis(millis.max(1_000.0) as u64)
}

/// `now - span`, saturating at the earliest representable time.
pub fn window_start(now: DateTime<Utc>, span: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(span)
        .ok()
        .and_then(|d| now.checked_sub_signed(d))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Nearest-rank percentile over sorted values: `sorted[floor(q * (n - 1))]`.
/// Zero for an empty slice.
pub fn percentile(sorted: &[u64], q: f64) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    let idx = (q * (sorted.len() - 1) as f64).floor() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(at: DateTime<Utc>, decision: Decision, rules: &[&str], latency: u64) -> DecisionEvent {
        DecisionEvent {
            timestamp: at,
            decision,
            risk_level: if decision == Decision::Reject {
                RiskLevel::High
            } else {
                RiskLevel::Low
            },
            processing_time_ms: latency,
            triggered_rules: rules.iter().map(|r| r.to_string()).collect(),
            reject_error_code: (decision == Decision::Reject).then(|| "RKB003".to_string()),
            transaction_type: (latency % 2 == 0).then(|| "transfer".to_string()),
        }
    }

    #[test]
    fn evicts_oldest_beyond_capacity() {
        let window = RealtimeMetricsWindow::new();
        let now = Utc::now();
        for i in 0..5001 {
            window.record(event(now, Decision::Approve, &[], i));
        }
        assert_eq!(window.buffered(), window.capacity());
        let snap = window.snapshot_at("1h", now);
        assert_eq!(snap.total_count, 5000);
        // latency 0 was evicted
        assert_eq!(window.events.read().unwrap().front().unwrap().processing_time_ms, 1);
    }

    #[test]
    fn empty_window_has_zero_rates() {
        let snap = RealtimeMetricsWindow::new().snapshot("5m");
        assert_eq!(snap.total_count, 0);
        assert_eq!(snap.reject_rate, 0.0);
        assert_eq!(snap.p95_processing_time_ms, 0);
        assert!(snap.top_triggered_rules.is_empty());
    }

    #[test]
    fn snapshot_filters_by_window_and_counts() {
        let window = RealtimeMetricsWindow::with_capacity(100);
        let now = Utc::now();
        window.record(event(now - chrono::Duration::minutes(10), Decision::Reject, &["old"], 1));
        window.record(event(now - chrono::Duration::seconds(30), Decision::Reject, &["limit"], 40));
        window.record(event(now - chrono::Duration::seconds(20), Decision::Approve, &["freq"], 7));
        window.record(event(now, Decision::Approve, &["freq", "limit"], 12));
        window.record(event(now + chrono::Duration::seconds(5), Decision::Approve, &[], 3));

        let snap = window.snapshot_at("5m", now);
        assert_eq!(snap.total_count, 3);
        assert_eq!(snap.approve_count, 2);
        assert_eq!(snap.reject_count, 1);
        assert!((snap.reject_rate - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(snap.by_decision["approve"], 2);
        assert_eq!(snap.by_risk_level["high"], 1);
        assert_eq!(snap.by_transaction_type["transfer"], 2);
        assert_eq!(snap.by_transaction_type["unknown"], 1);
        assert_eq!(snap.by_reject_error_code["none"], 2);
        assert_eq!(snap.by_reject_error_code["RKB003"], 1);
        // sorted latencies [7, 12, 40], index floor(0.95 * 2) = 1
        assert_eq!(snap.p95_processing_time_ms, 12);
        // equal counts keep first-seen order
        assert_eq!(
            snap.top_triggered_rules,
            vec![
                RuleHitCount { rule: "limit".to_string(), count: 2 },
                RuleHitCount { rule: "freq".to_string(), count: 2 },
            ]
        );
    }

    #[test]
    fn top_rules_are_capped_at_ten() {
        let window = RealtimeMetricsWindow::new();
        let now = Utc::now();
        let names: Vec<String> = (0..15).map(|i| format!("r{}", i)).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        window.record(event(now, Decision::Approve, &refs, 1));
        let snap = window.snapshot_at("1m", now);
        assert_eq!(snap.top_triggered_rules.len(), 10);
        assert_eq!(snap.top_triggered_rules[0].rule, "r0");
    }

    #[test]
    fn window_parsing() {
        assert_eq!(parse_window("30s"), Duration::from_secs(30));
        assert_eq!(parse_window("5m"), Duration::from_secs(300));
        assert_eq!(parse_window("1h"), Duration::from_secs(3600));
        assert_eq!(parse_window("10"), Duration::from_secs(600));
        assert_eq!(parse_window(" 2M "), Duration::from_secs(120));
        assert_eq!(parse_window("250ms"), Duration::from_secs(1));
        assert_eq!(parse_window("1500ms"), Duration::from_millis(1500));
        assert_eq!(parse_window("soon"), DEFAULT_WINDOW);
        assert_eq!(parse_window(""), DEFAULT_WINDOW);
        assert_eq!(parse_window("-3m"), DEFAULT_WINDOW);
    }

    #[test]
    fn percentile_nearest_rank() {
        let values: Vec<u64> = (1..=100).collect();
        assert_eq!(percentile(&values, 0.95), 95);
        assert_eq!(percentile(&values, 0.5), 50);
        assert_eq!(percentile(&[42], 0.99), 42);
        assert_eq!(percentile(&[], 0.95), 0);
    }
}
