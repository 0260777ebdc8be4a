//! Request bodies and response decoding for the Elasticsearch store.
//!
//! Pure functions over `serde_json::Value` so every query shape can be
//! checked without a cluster.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde_json::{json, Map, Value};
use tracing::warn;

use riskgate_rules::aggregator::{
    BlacklistEntry, BlacklistPage, BlacklistQuery, ContextAggregates, DecisionBucket, DecisionRecord,
    RealtimeStats, ReportRange, RiskReport,
};
use riskgate_rules::metrics::RuleHitCount;

fn ts(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
        .unwrap_or(now - Duration::hours(24))
}

/// `hits.total` is a number on old clusters and `{ "value": n }` on new ones.
pub fn hits_total(response: &Value) -> u64 {
    match response.pointer("/hits/total") {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(Value::Object(o)) => o.get("value").and_then(Value::as_u64).unwrap_or(0),
        _ => 0,
    }
}

// ── Context aggregates ──────────────────────────────────────────────

/// One `size: 0` search with three filter aggregations over the
/// customer's events.
pub fn aggregate_query(customer_id: &str, now: DateTime<Utc>) -> Value {
    json!({
        "size": 0,
        "query": { "term": { "customer_id": customer_id } },
        "aggs": {
            "count_1h": {
                "filter": { "range": { "timestamp": { "gte": ts(now - Duration::hours(1)) } } }
            },
            "count_24h": {
                "filter": { "range": { "timestamp": { "gte": ts(now - Duration::hours(24)) } } }
            },
            "daily_sum": {
                "filter": { "range": { "timestamp": { "gte": ts(start_of_day(now)) } } },
                "aggs": { "s": { "sum": { "field": "amount" } } }
            }
        }
    })
}

/// Missing aggregations read as zero.
pub fn parse_aggregates(response: &Value) -> ContextAggregates {
    let count = |name: &str| {
        response
            .pointer(&format!("/aggregations/{}/doc_count", name))
            .and_then(Value::as_u64)
            .unwrap_or(0)
    };
    ContextAggregates {
        count_1h: count("count_1h"),
        count_24h: count("count_24h"),
        daily_accumulated: response
            .pointer("/aggregations/daily_sum/s/value")
            .and_then(Value::as_f64)
            .unwrap_or(0.0),
    }
}

// ── Blacklist ───────────────────────────────────────────────────────

/// Entry is active and either has no expiry or expires after `now`.
fn effective_filter(now: DateTime<Utc>) -> Value {
    json!({
        "bool": {
            "should": [
                { "bool": { "must_not": { "exists": { "field": "expires_at" } } } },
                { "range": { "expires_at": { "gt": ts(now) } } }
            ]
        }
    })
}

/// Membership check for the customer id and, when present, the account id.
pub fn blacklist_membership_query(
    customer_id: &str,
    account_id: Option<&str>,
    now: DateTime<Utc>,
) -> Value {
    let mut should = vec![json!({
        "bool": { "must": [
            { "term": { "type": "customer" } },
            { "term": { "value": customer_id } }
        ] }
    })];
    if let Some(account) = account_id.filter(|a| !a.is_empty()) {
        should.push(json!({
            "bool": { "must": [
                { "term": { "type": "account" } },
                { "term": { "value": account } }
            ] }
        }));
    }
    json!({
        "size": 1,
        "query": {
            "bool": {
                "must": [ { "term": { "is_active": true } } ],
                "filter": [ effective_filter(now) ],
                "should": should,
                "minimum_should_match": 1
            }
        }
    })
}

/// Paged listing of effective entries, newest first.
pub fn blacklist_search_query(query: &BlacklistQuery, now: DateTime<Utc>) -> Value {
    let mut must = vec![json!({ "term": { "is_active": true } })];
    if let Some(kind) = query.blacklist_type {
        must.push(json!({ "term": { "type": kind.as_str() } }));
    }
    json!({
        "from": query.offset(),
        "size": query.page_size,
        "query": {
            "bool": {
                "must": must,
                "filter": [ effective_filter(now) ]
            }
        },
        "sort": [ { "created_at": { "order": "desc", "unmapped_type": "date" } } ]
    })
}

/// Hits become entries with `id` taken from `_id`. Hits whose source does
/// not decode are skipped.
pub fn parse_blacklist_page(response: &Value, query: &BlacklistQuery) -> BlacklistPage {
    let hits = response
        .pointer("/hits/hits")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[]);

    let entries = hits
        .iter()
        .filter_map(|hit| {
            let mut source = hit.get("_source").and_then(Value::as_object).cloned()?;
            if let Some(id) = hit.get("_id").and_then(Value::as_str) {
                source.insert("id".to_string(), Value::String(id.to_string()));
            }
            match serde_json::from_value::<BlacklistEntry>(Value::Object(source)) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(id = ?hit.get("_id"), error = %e, "skipping malformed blacklist document");
                    None
                }
            }
        })
        .collect();

    BlacklistPage {
        entries,
        total: hits_total(response),
        page: query.page,
        page_size: query.page_size,
    }
}

// ── Decision events ─────────────────────────────────────────────────

/// Document written to the events index. Field names match the
/// aggregations above and in [`report_query`].
pub fn decision_document(record: &DecisionRecord) -> Value {
    let mut doc = Map::new();
    doc.insert("decision_id".into(), json!(record.decision_id));
    doc.insert("event_type".into(), json!("decision"));
    doc.insert("timestamp".into(), json!(ts(record.timestamp)));
    doc.insert("customer_id".into(), json!(record.customer_id));
    doc.insert(
        "account_id".into(),
        json!(record.account_id.clone().unwrap_or_default()),
    );
    doc.insert("amount".into(), json!(record.amount));
    doc.insert("transaction_type".into(), json!(record.transaction_type));
    if let Some(recipient) = &record.recipient_account_id {
        doc.insert("recipient_account_id".into(), json!(recipient));
    }
    doc.insert("decision".into(), json!(record.action.as_str()));
    doc.insert("risk_score".into(), json!(record.risk_score));
    doc.insert("risk_level".into(), json!(record.risk_level.as_str()));
    doc.insert("processing_time_ms".into(), json!(record.processing_time_ms));
    doc.insert("triggered_rules".into(), json!(record.triggered_rules));
    if let Some(code) = &record.reject_error_code {
        doc.insert("reject_error_code".into(), json!(code));
    }
    if let Some(message) = &record.message {
        doc.insert("message".into(), json!(message));
    }
    Value::Object(doc)
}

// ── Index mappings ──────────────────────────────────────────────────

/// Explicit mapping for the events index. Ids and enum-like fields are
/// `keyword` so the `term` filters and `terms` aggregations above match
/// exact values.
pub fn events_index_mapping() -> Value {
    json!({
        "settings": { "number_of_shards": 1, "number_of_replicas": 0 },
        "mappings": {
            "properties": {
                "decision_id": { "type": "keyword" },
                "event_type": { "type": "keyword" },
                "timestamp": { "type": "date" },
                "customer_id": { "type": "keyword" },
                "account_id": { "type": "keyword" },
                "recipient_account_id": { "type": "keyword" },
                "amount": { "type": "float" },
                "transaction_type": { "type": "keyword" },
                "decision": { "type": "keyword" },
                "risk_score": { "type": "float" },
                "risk_level": { "type": "keyword" },
                "processing_time_ms": { "type": "integer" },
                "triggered_rules": { "type": "keyword" },
                "reject_error_code": { "type": "keyword" },
                "message": { "type": "text" }
            }
        }
    })
}

/// Explicit mapping for the blacklist index.
pub fn blacklist_index_mapping() -> Value {
    json!({
        "settings": { "number_of_shards": 1, "number_of_replicas": 0 },
        "mappings": {
            "properties": {
                "type": { "type": "keyword" },
                "value": { "type": "keyword" },
                "reason": { "type": "text" },
                "source": { "type": "keyword" },
                "created_at": { "type": "date" },
                "expires_at": { "type": "date" },
                "is_active": { "type": "boolean" }
            }
        }
    })
}

// ── Reports ─────────────────────────────────────────────────────────

/// Aggregations shared by reports and realtime stats.
fn decision_aggs(top_rules: usize) -> Map<String, Value> {
    let aggs = json!({
        "by_decision": { "terms": { "field": "decision", "size": 10 } },
        "by_risk_level": { "terms": { "field": "risk_level", "size": 10 } },
        "by_transaction_type": { "terms": { "field": "transaction_type", "size": 20 } },
        "by_reject_error_code": { "terms": { "field": "reject_error_code", "size": 20 } },
        "latency_ms": {
            "percentiles": { "field": "processing_time_ms", "percents": [50, 95, 99] }
        },
        "top_triggered_rules": { "terms": { "field": "triggered_rules", "size": top_rules } }
    });
    match aggs {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Date histogram with a per-bucket decision split. Empty buckets are
/// left out.
fn histogram(interval_key: &str, interval: &str) -> Value {
    let mut date_histogram = Map::new();
    date_histogram.insert("field".into(), json!("timestamp"));
    date_histogram.insert(interval_key.into(), json!(interval));
    date_histogram.insert("min_doc_count".into(), json!(1));
    json!({
        "date_histogram": date_histogram,
        "aggs": { "by_decision": { "terms": { "field": "decision", "size": 5 } } }
    })
}

fn range_query(from: DateTime<Utc>, to: Option<DateTime<Utc>>) -> Value {
    let mut bounds = Map::new();
    bounds.insert("gte".into(), json!(ts(from)));
    if let Some(to) = to {
        bounds.insert("lte".into(), json!(ts(to)));
    }
    json!({ "range": { "timestamp": bounds } })
}

pub fn report_query(range: &ReportRange) -> Value {
    let mut aggs = decision_aggs(10);
    aggs.insert("avg_risk_score".into(), json!({ "avg": { "field": "risk_score" } }));
    aggs.insert("daily".into(), histogram("calendar_interval", "1d"));
    json!({
        "size": 0,
        "track_total_hits": true,
        "query": range_query(range.from, Some(range.to)),
        "aggs": aggs
    })
}

/// Everything since `since`, with one-minute buckets.
pub fn realtime_query(since: DateTime<Utc>) -> Value {
    let mut aggs = decision_aggs(10);
    aggs.insert("timeseries".into(), histogram("fixed_interval", "1m"));
    json!({
        "size": 0,
        "track_total_hits": true,
        "query": range_query(since, None),
        "aggs": aggs
    })
}

fn aggregations(response: &Value) -> &Value {
    response.get("aggregations").unwrap_or(&Value::Null)
}

fn term_buckets(aggs: &Value, name: &str) -> Vec<(String, u64)> {
    aggs.get(name)
        .and_then(|agg| agg.get("buckets"))
        .and_then(Value::as_array)
        .map(|buckets| {
            buckets
                .iter()
                .filter_map(|b| {
                    let key = match b.get("key")? {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    Some((key, b.get("doc_count").and_then(Value::as_u64).unwrap_or(0)))
                })
                .collect()
        })
        .unwrap_or_default()
}

fn term_counts(aggs: &Value, name: &str) -> BTreeMap<String, u64> {
    term_buckets(aggs, name).into_iter().collect()
}

fn latency_percentile(aggs: &Value, key: &str) -> u64 {
    aggs.pointer("/latency_ms/values")
        .and_then(|v| v.get(key))
        .and_then(Value::as_f64)
        .map(|v| v.max(0.0).round() as u64)
        .unwrap_or(0)
}

/// Histogram buckets keyed by epoch millis. Buckets without a usable key
/// are skipped.
fn decision_buckets(aggs: &Value, name: &str) -> Vec<DecisionBucket> {
    aggs.get(name)
        .and_then(|agg| agg.get("buckets"))
        .and_then(Value::as_array)
        .map(|buckets| {
            buckets
                .iter()
                .filter_map(|b| {
                    let start = b
                        .get("key")
                        .and_then(Value::as_i64)
                        .and_then(DateTime::from_timestamp_millis)?;
                    let split = term_counts(b, "by_decision");
                    Some(DecisionBucket {
                        start,
                        total: b.get("doc_count").and_then(Value::as_u64).unwrap_or(0),
                        approve: split.get("approve").copied().unwrap_or(0),
                        reject: split.get("reject").copied().unwrap_or(0),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

pub fn parse_report(response: &Value, range: &ReportRange) -> RiskReport {
    let aggs = aggregations(response);
    let mut report = RiskReport::empty(range);
    report.total_count = hits_total(response);
    report.by_decision = term_counts(aggs, "by_decision");
    report.by_risk_level = term_counts(aggs, "by_risk_level");
    report.by_transaction_type = term_counts(aggs, "by_transaction_type");
    report.by_reject_error_code = term_counts(aggs, "by_reject_error_code");
    report.approve_count = report.by_decision.get("approve").copied().unwrap_or(0);
    report.reject_count = report.by_decision.get("reject").copied().unwrap_or(0);
    if report.total_count > 0 {
        report.approve_rate = report.approve_count as f64 / report.total_count as f64;
    }
    report.avg_risk_score = aggs
        .pointer("/avg_risk_score/value")
        .and_then(Value::as_f64)
        .unwrap_or(0.0);
    report.p50_processing_time_ms = latency_percentile(aggs, "50.0");
    report.p95_processing_time_ms = latency_percentile(aggs, "95.0");
    report.p99_processing_time_ms = latency_percentile(aggs, "99.0");
    report.top_triggered_rules = term_buckets(aggs, "top_triggered_rules")
        .into_iter()
        .map(|(rule, count)| RuleHitCount { rule, count })
        .collect();
    report.daily = decision_buckets(aggs, "daily");
    report
}

pub fn parse_realtime_stats(
    response: &Value,
    window: &str,
    since: DateTime<Utc>,
    now: DateTime<Utc>,
) -> RealtimeStats {
    let report = parse_report(response, &ReportRange { from: since, to: now });
    let timeseries = decision_buckets(aggregations(response), "timeseries");
    RealtimeStats::from_report(window, report, timeseries)
}
