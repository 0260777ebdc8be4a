//! [`AnalyticsStore`] over the Elasticsearch REST API.
//!
//! Talks plain JSON over `reqwest`: `_search` for aggregates, blacklist
//! lookups, reports and realtime stats, `_doc` for decision events. Every
//! request carries the store timeout so a hung cluster cannot stall a
//! decision. [`EsAnalyticsStore::ensure_indices`] creates both indices with
//! explicit mappings at startup.

mod query;


use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde_json::Value;
use tracing::{debug, info, warn};

use riskgate_core::config::ElasticsearchConfig;
use riskgate_rules::aggregator::{
    AnalyticsStore, BlacklistPage, BlacklistQuery, ContextAggregates, DecisionRecord, RealtimeStats,
    ReportRange, RiskReport, StoreError,
};

pub use query::*;

/// Longest error body echoed back into a [`StoreError::Http`].
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Clone)]
pub struct EsAnalyticsStore {
    client: reqwest::Client,
    base_url: String,
    username: Option<String>,
    password: Option<String>,
    events_index: String,
    blacklist_index: String,
    timeout: Duration,
}

impl EsAnalyticsStore {
    pub fn from_config(config: &ElasticsearchConfig, timeout: Duration) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Unavailable(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: config.base_url().trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
            events_index: config.events_index.clone(),
            blacklist_index: config.blacklist_index.clone(),
            timeout,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let request = self.client.request(method, self.url(path));
        match &self.username {
            Some(user) => request.basic_auth(user, self.password.as_deref()),
            None => request,
        }
    }

    fn map_transport(&self, e: reqwest::Error) -> StoreError {
        if e.is_timeout() {
            StoreError::Timeout(self.timeout.as_millis() as u64)
        } else {
            StoreError::Unavailable(e.to_string())
        }
    }

    /// Send a request with a JSON body and decode the JSON response.
    async fn send(&self, method: Method, path: &str, body: &Value) -> Result<Value, StoreError> {
        let response = self
            .request(method, path)
            .json(body)
            .send()
            .await
            .map_err(|e| self.map_transport(e))?;

        let status = response.status();
        if !status.is_success() {
            let mut message = response.text().await.unwrap_or_default();
            if message.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !message.is_char_boundary(cut) {
                    cut -= 1;
                }
                message.truncate(cut);
            }
            return Err(StoreError::Http {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))
    }

    async fn search(&self, index: &str, body: &Value) -> Result<Value, StoreError> {
        self.send(Method::POST, &format!("{}/_search", index), body).await
    }

    /// Create `index` with `mapping` unless it exists. Returns whether it
    /// was created.
    async fn ensure_index(&self, index: &str, mapping: &Value) -> Result<bool, StoreError> {
        let response = self
            .request(Method::HEAD, index)
            .send()
            .await
            .map_err(|e| self.map_transport(e))?;
        match response.status() {
            status if status.is_success() => return Ok(false),
            StatusCode::NOT_FOUND => {}
            status => {
                return Err(StoreError::Http {
                    status: status.as_u16(),
                    message: format!("existence check for index {} failed", index),
                })
            }
        }
        self.send(Method::PUT, index, mapping).await?;
        Ok(true)
    }

    /// Make sure the events and blacklist indices exist with keyword
    /// mappings. Failures are logged; the store stays usable and a later
    /// start retries.
    pub async fn ensure_indices(&self) {
        let indices = [
            (&self.events_index, events_index_mapping()),
            (&self.blacklist_index, blacklist_index_mapping()),
        ];
        for (index, mapping) in indices {
            match self.ensure_index(index, &mapping).await {
                Ok(true) => info!(index = %index, "created Elasticsearch index"),
                Ok(false) => debug!(index = %index, "Elasticsearch index already exists"),
                Err(e) => warn!(index = %index, error = %e, "could not ensure Elasticsearch index"),
            }
        }
    }
}

#[async_trait]
impl AnalyticsStore for EsAnalyticsStore {
    fn name(&self) -> &'static str {
        "elasticsearch"
    }

    async fn aggregate_counts_and_sum(&self, customer_id: &str) -> Result<ContextAggregates, StoreError> {
        let body = aggregate_query(customer_id, Utc::now());
        let response = self.search(&self.events_index, &body).await?;
        Ok(parse_aggregates(&response))
    }

    async fn is_blacklisted(&self, customer_id: &str, account_id: Option<&str>) -> Result<bool, StoreError> {
        let body = blacklist_membership_query(customer_id, account_id, Utc::now());
        let response = self.search(&self.blacklist_index, &body).await?;
        Ok(hits_total(&response) > 0)
    }

    async fn record_decision(&self, record: &DecisionRecord) -> Result<(), StoreError> {
        let path = format!("{}/_doc/{}", self.events_index, record.decision_id);
        self.send(Method::PUT, &path, &decision_document(record)).await?;
        debug!(decision_id = %record.decision_id, index = %self.events_index, "decision indexed");
        Ok(())
    }

    async fn search_blacklist(&self, query: &BlacklistQuery) -> Result<BlacklistPage, StoreError> {
        let body = blacklist_search_query(query, Utc::now());
        let response = self.search(&self.blacklist_index, &body).await?;
        Ok(parse_blacklist_page(&response, query))
    }

    async fn report(&self, range: &ReportRange) -> Result<RiskReport, StoreError> {
        let response = self.search(&self.events_index, &report_query(range)).await?;
        Ok(parse_report(&response, range))
    }

    async fn realtime_stats(&self, window: &str, since: DateTime<Utc>) -> Result<RealtimeStats, StoreError> {
        let response = self.search(&self.events_index, &realtime_query(since)).await?;
        Ok(parse_realtime_stats(&response, window, since, Utc::now()))
    }

    async fn ping(&self) -> bool {
        match self.request(Method::GET, "/").send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(error = %e, "Elasticsearch ping failed");
                false
            }
        }
    }
}
