//! HTTP handlers under `/api/v1/risk`, plus `/health`.
//!
//! Every risk endpoint answers with the same envelope:
//! `{code, message, data, timestamp}` on success and
//! `{code, message, errorCode, timestamp}` on failure.

mod health;
mod risk;


use std::any::Any;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, warn};

use riskgate_core::codes;
use riskgate_core::ValidationError;
use riskgate_rules::aggregator::StoreError;

pub use health::health;
pub use risk::{check, list_blacklist, realtime_monitor, reload_rules, report, rules};

// ── Envelope ─────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T: Serialize> {
    pub code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl<T: Serialize> Envelope<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: StatusCode::OK.as_u16(),
            message: "Success".to_string(),
            data: Some(data),
            error_code: None,
            timestamp: Utc::now(),
        }
    }
}

impl Envelope<()> {
    pub fn error(status: StatusCode, message: impl Into<String>, error_code: impl Into<String>) -> Self {
        Self {
            code: status.as_u16(),
            message: message.into(),
            data: None,
            error_code: Some(error_code.into()),
            timestamp: Utc::now(),
        }
    }
}

pub(crate) fn ok<T: Serialize>(data: T) -> Json<Envelope<T>> {
    Json(Envelope::success(data))
}

// ── Errors ───────────────────────────────────────────────────────

/// Every non-200 outcome of a risk endpoint.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The rule chain refused the transaction (403, `RKBxxx`).
    #[error("{message}")]
    Rejected { error_code: String, message: String },

    /// Malformed or invalid request (400, `RKS003`).
    #[error("{0}")]
    Invalid(String),

    /// The analytical store could not answer a read without fallback
    /// (503, `RKS002`).
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Anything else (500, `RKS001`).
    #[error("{0}")]
    Internal(String),
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        ApiError::Invalid(e.to_string())
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Rejected { .. } => StatusCode::FORBIDDEN,
            ApiError::Invalid(_) => StatusCode::BAD_REQUEST,
            ApiError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            ApiError::Rejected { error_code, .. } => error_code,
            ApiError::Invalid(_) => codes::INVALID_REQUEST,
            ApiError::Store(_) => codes::STORE_UNAVAILABLE,
            ApiError::Internal(_) => codes::INTERNAL,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Store(e) => {
                warn!(error = %e, "analytical store read failed");
                "service temporarily degraded".to_string()
            }
            ApiError::Internal(e) => {
                error!(error = %e, "internal error");
                e.clone()
            }
            other => other.to_string(),
        };
        let body = Envelope::error(status, message, self.error_code());
        (status, Json(body)).into_response()
    }
}

/// Panics inside a handler become a 500 `RKS001` envelope.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .cloned()
        .or_else(|| panic.downcast_ref::<&str>().map(|s| s.to_string()))
        .unwrap_or_else(|| "unknown panic".to_string());
    ApiError::Internal(format!("handler panicked: {}", detail)).into_response()
}
