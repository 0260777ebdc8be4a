//! [`RiskService`]: the decision orchestrator behind `check_risk`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use riskgate_core::{Config, RiskCheckResponse, TransactionRequest, ValidationError};

use crate::aggregator::{
    AnalyticsStore, BlacklistPage, BlacklistQuery, ContextAggregator, DecisionRecord,
    RealtimeStats, ReportRange, RiskReport, StoreError,
};
use crate::chain::evaluate_chain;
use crate::context::DecisionContext;
use crate::loader::{Result, RuleChainStore, RuleSet};
use crate::metrics::{DecisionEvent, MetricsSnapshot, RealtimeMetricsWindow};
use crate::scoring::score_to_level;

/// Realtime view: the in-process window, plus the store-side view of the
/// same window when the store can answer.
#[derive(Debug, Clone, Serialize)]
pub struct RealtimeMonitor {
    pub window: String,
    pub in_memory: MetricsSnapshot,
    /// Events held by this process and the ring buffer's capacity.
    pub buffered_events: usize,
    pub buffer_capacity: usize,
    /// `None` when the store is disabled, failing or timed out.
    pub store: Option<RealtimeStats>,
    pub store_available: bool,
}

/// Built once at startup and shared behind an `Arc`.
pub struct RiskService {
    rules: Arc<RuleChainStore>,
    aggregator: ContextAggregator,
    metrics: Arc<RealtimeMetricsWindow>,
}

impl RiskService {
    pub fn new(
        rules: Arc<RuleChainStore>,
        aggregator: ContextAggregator,
        metrics: Arc<RealtimeMetricsWindow>,
    ) -> Self {
        Self {
            rules,
            aggregator,
            metrics,
        }
    }

    /// Wire the service from configuration. `store = None` disables
    /// aggregation. Starts the rules file watcher when configured.
    pub fn from_config(config: &Config, store: Option<Arc<dyn AnalyticsStore>>) -> Result<Self> {
        let rules = Arc::new(RuleChainStore::open(
            config.rules.path.clone(),
            Duration::from_millis(config.rules.reload_interval_ms),
        ));
        if config.rules.watch {
            rules.watch()?;
        }
        let aggregator = match store {
            Some(store) => {
                ContextAggregator::new(store, Duration::from_millis(config.store.timeout_ms))
            }
            None => ContextAggregator::disabled(),
        };
        let metrics = Arc::new(RealtimeMetricsWindow::with_capacity(config.metrics.capacity));
        Ok(Self::new(rules, aggregator, metrics))
    }

    /// Evaluate one transaction.
    ///
    /// Store reads run concurrently and fall back to zero context; the rule
    /// set is taken once so the whole evaluation sees one consistent chain.
    /// The decision is written to the store (best effort) and to the
    /// realtime window after it is final.
    pub async fn check_risk(
        &self,
        request: &TransactionRequest,
    ) -> std::result::Result<RiskCheckResponse, ValidationError> {
        request.validate()?;
        let started = Instant::now();

        let (aggregates, in_blacklist) = self
            .aggregator
            .gather(&request.customer_id, request.account_id.as_deref())
            .await;
        let ctx = DecisionContext::from_request(request, aggregates, in_blacklist);

        self.poll_rules().await;
        let rule_set = self.rules.current();
        let result = evaluate_chain(&rule_set, &ctx);

        let risk_level = score_to_level(result.risk_score);
        let decision_id = Uuid::new_v4().to_string();
        let timestamp = Utc::now();
        let processing_time_ms = started.elapsed().as_millis() as u64;

        let record = DecisionRecord {
            decision_id: decision_id.clone(),
            timestamp,
            customer_id: request.customer_id.clone(),
            account_id: request.account_id.clone(),
            amount: request.amount,
            transaction_type: request.transaction_type.clone(),
            recipient_account_id: request.recipient_account_id.clone(),
            action: result.action,
            risk_score: result.risk_score,
            risk_level,
            processing_time_ms,
            triggered_rules: result.triggered_rules.clone(),
            reject_error_code: result.reject_error_code.clone(),
            message: result.message.clone(),
        };
        self.aggregator.record_decision(&record).await;

        self.metrics.record(DecisionEvent {
            timestamp,
            decision: result.action,
            risk_level,
            processing_time_ms,
            triggered_rules: result.triggered_rules.clone(),
            reject_error_code: result.reject_error_code.clone(),
            transaction_type: Some(request.transaction_type.clone()),
        });

        info!(
            decision_id = %decision_id,
            customer_id = %request.customer_id,
            transaction_type = %request.transaction_type,
            amount = request.amount,
            action = %result.action,
            risk_score = result.risk_score,
            risk_level = %risk_level,
            reject_error_code = ?result.reject_error_code,
            triggered = ?result.triggered_rules,
            processing_time_ms,
            "risk decision"
        );

        Ok(RiskCheckResponse {
            approved: result.is_approved(),
            risk_score: result.risk_score,
            risk_level,
            message: result.message,
            triggered_rules: result.triggered_rules,
            reject_error_code: result.reject_error_code,
            decision_id,
            processing_time_ms,
            timestamp,
        })
    }

    pub fn realtime_snapshot(&self, window: &str) -> MetricsSnapshot {
        self.metrics.snapshot(window)
    }

    /// Never fails: a store error only empties the `store` section.
    pub async fn realtime_monitor(&self, window: &str) -> RealtimeMonitor {
        let in_memory = self.metrics.snapshot(window);
        let store = match self.aggregator.realtime_stats(&in_memory.window).await {
            Ok(stats) => Some(stats),
            Err(e) => {
                debug!(window = %in_memory.window, error = %e, "store realtime stats unavailable");
                None
            }
        };
        RealtimeMonitor {
            window: in_memory.window.clone(),
            in_memory,
            buffered_events: self.metrics.buffered(),
            buffer_capacity: self.metrics.capacity(),
            store_available: store.is_some(),
            store,
        }
    }

    /// Polling reload, run on the blocking pool so a slow parse never
    /// stalls the async workers.
    async fn poll_rules(&self) {
        if !self.rules.reload_due() {
            return;
        }
        let rules = Arc::clone(&self.rules);
        if let Err(e) = tokio::task::spawn_blocking(move || rules.maybe_reload()).await {
            warn!(error = %e, "rule reload task failed, keeping current rule set");
        }
    }

    /// Forced reload of the rules file, on the blocking pool.
    pub async fn reload_rules(&self) -> Arc<RuleSet> {
        let rules = Arc::clone(&self.rules);
        match tokio::task::spawn_blocking(move || rules.reload()).await {
            Ok(set) => set,
            Err(e) => {
                warn!(error = %e, "rule reload task failed, keeping current rule set");
                self.rules.current()
            }
        }
    }

    pub fn rule_set(&self) -> Arc<RuleSet> {
        self.rules.current()
    }

    pub fn rule_store(&self) -> &RuleChainStore {
        &self.rules
    }

    pub fn aggregator(&self) -> &ContextAggregator {
        &self.aggregator
    }

    pub async fn list_blacklist(
        &self,
        query: &BlacklistQuery,
    ) -> std::result::Result<BlacklistPage, StoreError> {
        self.aggregator.list_blacklist(query).await
    }

    pub async fn report(&self, range: &ReportRange) -> std::result::Result<RiskReport, StoreError> {
        self.aggregator.report(range).await
    }

    /// Stop background activity (the rules file watcher).
    pub fn shutdown(&self) {
        self.rules.unwatch();
        info!("risk service shut down");
    }
}
