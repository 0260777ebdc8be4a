//! In-process [`AnalyticsStore`] for local runs and tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use super::types::{
    AnalyticsStore, BlacklistEntry, BlacklistPage, BlacklistQuery, BlacklistType, ContextAggregates,
    DecisionRecord, RealtimeStats, ReportRange, RiskReport, StoreError,
};

/// Keeps decisions and blacklist entries in memory.
///
/// [`set_available(false)`](Self::set_available) makes every call fail with
/// [`StoreError::Unavailable`], to exercise the degraded paths.
pub struct MemoryStore {
    records: RwLock<Vec<DecisionRecord>>,
    blacklist: RwLock<Vec<BlacklistEntry>>,
    available: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            blacklist: RwLock::new(Vec::new()),
            available: AtomicBool::new(true),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn add_blacklist_entry(&self, entry: BlacklistEntry) {
        self.blacklist
            .write()
            .expect("blacklist lock poisoned")
            .push(entry);
    }

    /// Insert a decision directly, bypassing availability.
    pub fn seed_record(&self, record: DecisionRecord) {
        self.records.write().expect("records lock poisoned").push(record);
    }

    pub fn records(&self) -> Vec<DecisionRecord> {
        self.records.read().expect("records lock poisoned").clone()
    }

    fn ensure_available(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("memory store switched off".to_string()))
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AnalyticsStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn aggregate_counts_and_sum(&self, customer_id: &str) -> Result<ContextAggregates, StoreError> {
        self.ensure_available()?;
        let now = Utc::now();
        let hour_ago = now - Duration::hours(1);
        let day_ago = now - Duration::hours(24);
        let start_of_day = now
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc())
            .unwrap_or(day_ago);

        let guard = self.records.read().expect("records lock poisoned");
        let mut aggregates = ContextAggregates::default();
        for r in guard.iter().filter(|r| r.customer_id == customer_id && r.timestamp <= now) {
            if r.timestamp >= hour_ago {
                aggregates.count_1h += 1;
            }
            if r.timestamp >= day_ago {
                aggregates.count_24h += 1;
            }
            if r.timestamp >= start_of_day {
                aggregates.daily_accumulated += r.amount;
            }
        }
        Ok(aggregates)
    }

    async fn is_blacklisted(&self, customer_id: &str, account_id: Option<&str>) -> Result<bool, StoreError> {
        self.ensure_available()?;
        let now = Utc::now();
        let guard = self.blacklist.read().expect("blacklist lock poisoned");
        Ok(guard.iter().filter(|e| e.is_effective_at(now)).any(|e| {
            match e.blacklist_type {
                BlacklistType::Customer => e.value == customer_id,
                BlacklistType::Account => account_id == Some(e.value.as_str()),
                _ => false,
            }
        }))
    }

    async fn record_decision(&self, record: &DecisionRecord) -> Result<(), StoreError> {
        self.ensure_available()?;
        self.seed_record(record.clone());
        Ok(())
    }

    async fn search_blacklist(&self, query: &BlacklistQuery) -> Result<BlacklistPage, StoreError> {
        self.ensure_available()?;
        let now = Utc::now();
        let mut matching: Vec<BlacklistEntry> = {
            let guard = self.blacklist.read().expect("blacklist lock poisoned");
            guard
                .iter()
                .filter(|e| e.is_effective_at(now))
                .filter(|e| query.blacklist_type.map_or(true, |t| e.blacklist_type == t))
                .cloned()
                .collect()
        };
        // Newest first; entries without a creation time sort last.
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matching.len() as u64;
        let entries = matching
            .into_iter()
            .skip(query.offset())
            .take(query.page_size as usize)
            .collect();
        Ok(BlacklistPage {
            entries,
            total,
            page: query.page,
            page_size: query.page_size,
        })
    }

    async fn report(&self, range: &ReportRange) -> Result<RiskReport, StoreError> {
        self.ensure_available()?;
        let guard = self.records.read().expect("records lock poisoned");
        Ok(RiskReport::from_records(range, guard.iter()))
    }

    async fn realtime_stats(&self, window: &str, since: DateTime<Utc>) -> Result<RealtimeStats, StoreError> {
        self.ensure_available()?;
        let guard = self.records.read().expect("records lock poisoned");
        Ok(RealtimeStats::from_records(window, since, Utc::now(), guard.iter()))
    }

    async fn ping(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }
}
