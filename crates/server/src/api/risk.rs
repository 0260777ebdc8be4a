//! Risk endpoints: check, blacklist listing, report, realtime monitor and
//! rule chain management.

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use riskgate_core::{codes, RiskCheckResponse, TransactionRequest};
use riskgate_rules::aggregator::{BlacklistEntry, BlacklistQuery, BlacklistType, ReportRange, RiskReport};
use riskgate_rules::loader::RuleSet;
use riskgate_rules::schema::RuleSummary;
use riskgate_rules::RealtimeMonitor;

use crate::state::AppState;

use super::{ok, ApiError, Envelope};

type ApiResult<T> = Result<Json<Envelope<T>>, ApiError>;

// ── Check ────────────────────────────────────────────────────────

/// `POST /check`. Approve answers 200 with the decision; reject answers
/// 403 carrying the rule's error code and message.
pub async fn check(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<TransactionRequest>, JsonRejection>,
) -> ApiResult<RiskCheckResponse> {
    let Json(request) = payload.map_err(|e| ApiError::Invalid(e.body_text()))?;
    let decision = state.service.check_risk(&request).await?;
    if !decision.approved {
        return Err(ApiError::Rejected {
            error_code: decision
                .reject_error_code
                .clone()
                .unwrap_or_else(|| codes::RULE_REJECTED.to_string()),
            message: decision
                .message
                .clone()
                .unwrap_or_else(|| "transaction rejected by risk rules".to_string()),
        });
    }
    Ok(ok(decision))
}

// ── Blacklist ────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct BlacklistParams {
    #[serde(rename = "type")]
    pub blacklist_type: Option<String>,
    pub page: Option<u32>,
    #[serde(rename = "pageSize", alias = "page_size")]
    pub page_size: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlacklistListing {
    pub items: Vec<BlacklistEntry>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
}

/// `GET /blacklist?type=&page=&pageSize=`
pub async fn list_blacklist(
    State(state): State<Arc<AppState>>,
    params: Result<Query<BlacklistParams>, QueryRejection>,
) -> ApiResult<BlacklistListing> {
    let Query(params) = params.map_err(|e| ApiError::Invalid(e.body_text()))?;
    let blacklist_type = match params.blacklist_type.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(raw.parse::<BlacklistType>().map_err(ApiError::Invalid)?),
    };
    let query = BlacklistQuery::new(
        blacklist_type,
        params.page.unwrap_or(1),
        params.page_size.unwrap_or(20),
    );

    let page = state.service.list_blacklist(&query).await?;
    Ok(ok(BlacklistListing {
        items: page.entries,
        total: page.total,
        page: page.page,
        page_size: page.page_size,
    }))
}

// ── Report ───────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ReportParams {
    #[serde(alias = "from")]
    pub from_date: Option<String>,
    #[serde(alias = "to")]
    pub to_date: Option<String>,
}

/// `GET /report?from_date=&to_date=`. Date-only bounds cover whole days.
pub async fn report(
    State(state): State<Arc<AppState>>,
    params: Result<Query<ReportParams>, QueryRejection>,
) -> ApiResult<RiskReport> {
    let Query(params) = params.map_err(|e| ApiError::Invalid(e.body_text()))?;
    let (Some(from), Some(to)) = (params.from_date, params.to_date) else {
        return Err(ApiError::Invalid(
            "from_date and to_date are required".to_string(),
        ));
    };
    let range = ReportRange::parse(&from, &to).map_err(ApiError::Invalid)?;
    Ok(ok(state.service.report(&range).await?))
}

// ── Realtime monitor ─────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct MonitorParams {
    pub window: Option<String>,
}

/// `GET /monitor/realtime?window=5m`. The in-process window always
/// answers; the `store` section is null when the store is down.
pub async fn realtime_monitor(
    State(state): State<Arc<AppState>>,
    params: Result<Query<MonitorParams>, QueryRejection>,
) -> ApiResult<RealtimeMonitor> {
    let Query(params) = params.map_err(|e| ApiError::Invalid(e.body_text()))?;
    let window = params.window.unwrap_or_else(|| "5m".to_string());
    Ok(ok(state.service.realtime_monitor(&window).await))
}

// ── Rule chain ───────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct RuleChainView {
    pub path: String,
    pub score_reject_threshold: f64,
    pub total: usize,
    pub enabled: usize,
    pub loaded_at: DateTime<Utc>,
    pub warnings: Vec<String>,
    pub rules: Vec<RuleSummary>,
}

impl RuleChainView {
    fn new(state: &AppState, set: &RuleSet) -> Self {
        Self {
            path: state.service.rule_store().path().display().to_string(),
            score_reject_threshold: set.score_reject_threshold(),
            total: set.rules().len(),
            enabled: set.enabled_count(),
            loaded_at: set.loaded_at(),
            warnings: set.warnings().to_vec(),
            rules: set.summaries(),
        }
    }
}

/// `GET /rules`: the active chain in evaluation order.
pub async fn rules(State(state): State<Arc<AppState>>) -> ApiResult<RuleChainView> {
    let set = state.service.rule_set();
    Ok(ok(RuleChainView::new(&state, &set)))
}

/// `POST /rules/reload`: re-read the rules file now.
pub async fn reload_rules(State(state): State<Arc<AppState>>) -> ApiResult<RuleChainView> {
    let set = state.service.reload_rules().await;
    info!(
        rules = set.rules().len(),
        enabled = set.enabled_count(),
        "rule chain reloaded on request"
    );
    Ok(ok(RuleChainView::new(&state, &set)))
}
