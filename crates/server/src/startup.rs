//! Server startup: analytical store selection and shared state wiring.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{info, warn};

use riskgate_core::Config;
use riskgate_rules::aggregator::{AnalyticsStore, MemoryStore};
use riskgate_rules::RiskService;

use crate::elasticsearch::EsAnalyticsStore;
use crate::state::AppState;

/// Pick the analytical store named by `ANALYTICS_BACKEND`.
///
/// `none` disables aggregation entirely; every decision then runs on the
/// zero-value context. Unknown names fall back to `none` with a warning.
/// Elasticsearch indices are created with explicit mappings when missing.
pub async fn build_store(config: &Config) -> anyhow::Result<Option<Arc<dyn AnalyticsStore>>> {
    let timeout = Duration::from_millis(config.store.timeout_ms);
    match config.store.backend.as_str() {
        "elasticsearch" | "es" => {
            let store = EsAnalyticsStore::from_config(&config.elasticsearch, timeout)
                .context("failed to build Elasticsearch client")?;
            info!(url = %config.elasticsearch.base_url(), "Elasticsearch store configured");
            store.ensure_indices().await;
            Ok(Some(Arc::new(store)))
        }
        "memory" => {
            info!("in-memory analytical store configured (not persisted)");
            Ok(Some(Arc::new(MemoryStore::new())))
        }
        "none" | "disabled" | "" => {
            info!("analytical store disabled, decisions use zero context");
            Ok(None)
        }
        other => {
            warn!(backend = other, "unknown ANALYTICS_BACKEND, running without a store");
            Ok(None)
        }
    }
}

/// Build `AppState`: store, rule chain store (plus optional watcher) and
/// the realtime window. The rules file is loaded leniently and an
/// unreachable store only logs a warning.
pub async fn build_app_state(config: Config) -> anyhow::Result<Arc<AppState>> {
    let store = build_store(&config).await?;
    let service = RiskService::from_config(&config, store)
        .context("failed to start rules file watcher")?;

    let aggregator = service.aggregator();
    if aggregator.is_enabled() && !aggregator.is_available().await {
        warn!(
            store = aggregator.backend_name(),
            "analytical store unreachable, decisions fall back to zero context"
        );
    }
    info!(
        store = service.aggregator().backend_name(),
        watching = service.rule_store().is_watching(),
        "risk service ready"
    );
    Ok(Arc::new(AppState::new(service, config)))
}
