//! Context aggregation over the analytical store.
//!
//! Reads that feed a decision (aggregates, blacklist membership) fail open:
//! any store error or timeout yields the zero-value fallback and the
//! decision proceeds. Reads that back an operator query (blacklist listing,
//! reports, store-side realtime stats) propagate [`StoreError`] so the API
//! can report degradation.

mod memory;
mod types;

#[cfg(test)]
mod tests;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, warn};

use crate::metrics::{parse_window, window_start};

pub use memory::MemoryStore;
pub use types::*;

/// Default bound for one store round trip.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_millis(800);

/// Gathers historical signals for a decision, with fallbacks.
pub struct ContextAggregator {
    /// Store client. None = aggregation disabled, fallbacks always.
    store: Option<Arc<dyn AnalyticsStore>>,
    timeout: Duration,
}

impl ContextAggregator {
    pub fn new(store: Arc<dyn AnalyticsStore>, timeout: Duration) -> Self {
        Self {
            store: Some(store),
            timeout,
        }
    }

    /// No store configured: every read returns its fallback.
    pub fn disabled() -> Self {
        Self {
            store: None,
            timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.as_ref().map_or("disabled", |s| s.name())
    }

    /// `count_1h`, `count_24h` and `daily_accumulated`, or zeros.
    pub async fn aggregates(&self, customer_id: &str) -> ContextAggregates {
        let Some(store) = &self.store else {
            return ContextAggregates::default();
        };
        match self.bounded(store.aggregate_counts_and_sum(customer_id)).await {
            Ok(aggregates) => aggregates,
            Err(e) => {
                debug!(customer_id, error = %e, "aggregate read failed, using zero context");
                ContextAggregates::default()
            }
        }
    }

    /// Blacklist membership by customer or account, or `false`.
    pub async fn in_blacklist(&self, customer_id: &str, account_id: Option<&str>) -> bool {
        let Some(store) = &self.store else {
            return false;
        };
        match self.bounded(store.is_blacklisted(customer_id, account_id)).await {
            Ok(listed) => listed,
            Err(e) => {
                debug!(customer_id, error = %e, "blacklist read failed, assuming not listed");
                false
            }
        }
    }

    /// Both reads, run concurrently.
    pub async fn gather(&self, customer_id: &str, account_id: Option<&str>) -> (ContextAggregates, bool) {
        tokio::join!(
            self.aggregates(customer_id),
            self.in_blacklist(customer_id, account_id)
        )
    }

    /// Best-effort write. Failures are logged and swallowed.
    pub async fn record_decision(&self, record: &DecisionRecord) {
        let Some(store) = &self.store else {
            return;
        };
        if let Err(e) = self.bounded(store.record_decision(record)).await {
            warn!(decision_id = %record.decision_id, error = %e, "failed to record decision");
        }
    }

    pub async fn list_blacklist(&self, query: &BlacklistQuery) -> Result<BlacklistPage, StoreError> {
        let store = self.require_store()?;
        self.bounded(store.search_blacklist(query)).await
    }

    pub async fn report(&self, range: &ReportRange) -> Result<RiskReport, StoreError> {
        let store = self.require_store()?;
        self.bounded(store.report(range)).await
    }

    /// Store-side statistics for the last `window` (see [`parse_window`]).
    pub async fn realtime_stats(&self, window: &str) -> Result<RealtimeStats, StoreError> {
        let store = self.require_store()?;
        let since = window_start(Utc::now(), parse_window(window));
        self.bounded(store.realtime_stats(window, since)).await
    }

    /// Whether the store answered a ping within the timeout.
    pub async fn is_available(&self) -> bool {
        let Some(store) = &self.store else {
            return false;
        };
        tokio::time::timeout(self.timeout, store.ping())
            .await
            .unwrap_or(false)
    }

    fn require_store(&self) -> Result<&Arc<dyn AnalyticsStore>, StoreError> {
        self.store
            .as_ref()
            .ok_or_else(|| StoreError::Unavailable("no analytical store configured".to_string()))
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(self.timeout.as_millis() as u64)),
        }
    }
}
