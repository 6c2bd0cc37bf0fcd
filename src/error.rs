// src/error.rs
//! Error taxonomy for the ingestion layer and its HTTP mapping.
//!
//! Per-line and per-field problems never show up here; they are recovered
//! locally (skip or fallback). Everything in this module reaches the caller.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, error, warn};

/// A required setting is missing. Raised before any upstream I/O.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{what} is not configured: {hint}")]
pub struct ConfigError {
    /// Short name of the feature that cannot run.
    pub what: &'static str,
    /// Human-readable remediation.
    pub hint: String,
}

impl ConfigError {
    pub fn new(what: &'static str, hint: impl Into<String>) -> Self {
        Self {
            what,
            hint: hint.into(),
        }
    }
}

/// The upstream connection failed or dropped mid-stream.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("upstream transport error: {0}")]
pub struct TransportError(pub String);

impl TransportError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// The whole payload was unusable where structured JSON is mandatory.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("malformed agent response: {reason}")]
pub struct MalformedAgentResponse {
    pub reason: String,
    /// Leading part of the offending text, for logs.
    pub excerpt: String,
}

impl MalformedAgentResponse {
    const EXCERPT_CHARS: usize = 200;

    pub fn new(reason: impl Into<String>, raw: &str) -> Self {
        Self {
            reason: reason.into(),
            excerpt: raw.chars().take(Self::EXCERPT_CHARS).collect(),
        }
    }
}

/// Failures of a prompt-execution or webhook call before any data is relayed.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("upstream returned {status}: {detail}")]
    Status { status: u16, detail: String },
    #[error("prompt returned empty output")]
    EmptyOutput,
}

/// Request-level error returned by the HTTP handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{error}: {message}")]
    BadRequest {
        error: &'static str,
        message: &'static str,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("{context}: {source}")]
    Upstream {
        context: &'static str,
        #[source]
        source: UpstreamError,
    },
    #[error("{context}: {source}")]
    Malformed {
        context: &'static str,
        #[source]
        source: MalformedAgentResponse,
    },
}

impl ApiError {
    /// Stable label for logs.
    pub fn category(&self) -> &'static str {
        match self {
            ApiError::BadRequest { .. } => "bad_request",
            ApiError::Config(_) => "configuration",
            ApiError::Upstream { .. } => "transport",
            ApiError::Malformed { .. } => "malformed_response",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let category = self.category();
        let (status, body) = match &self {
            ApiError::BadRequest { error, message } => {
                debug!(category, error, "request rejected");
                (
                    StatusCode::BAD_REQUEST,
                    json!({ "error": error, "message": message }),
                )
            }
            ApiError::Config(e) => {
                error!(category, what = e.what, hint = %e.hint, "configuration missing");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": format!("{} is not configured", e.what), "message": e.hint }),
                )
            }
            ApiError::Upstream { context, source } => {
                warn!(category, error = %source, context, "upstream call failed");
                (
                    StatusCode::BAD_GATEWAY,
                    json!({
                        "error": context,
                        "message": "Upstream agent is unavailable. Try again shortly.",
                        "details": source.to_string(),
                    }),
                )
            }
            ApiError::Malformed { context, source } => {
                warn!(
                    category,
                    reason = %source.reason,
                    excerpt = %source.excerpt,
                    context,
                    "malformed agent response"
                );
                (
                    StatusCode::BAD_GATEWAY,
                    json!({
                        "error": context,
                        "message": "Analysis unavailable, try again.",
                    }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}
