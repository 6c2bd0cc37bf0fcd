// src/normalize/mod.rs
//! ResponseNormalizer: turns free-form model output into a fully populated
//! `AgentResult`. Missing or malformed fields get deterministic fallbacks;
//! only `ParseMode::Strict` can reject a payload as a whole.

pub mod confidence;
pub mod text;

use chrono::{DateTime, SecondsFormat, Utc};
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::MalformedAgentResponse;
pub use confidence::{Confidence, ConfidenceLevel};

pub const SUMMARY_FALLBACK: &str = "No summary available.";
pub const ANALYSIS_FALLBACK: &str = "No analysis available.";
pub const REASONING_FALLBACK: &str = "No reasoning provided.";

/// How a payload that is not a JSON object is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    /// Non-JSON text becomes the summary source; other fields fall back.
    Lenient,
    /// Non-JSON text is a `MalformedAgentResponse`.
    Strict,
}

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "normalize_fallbacks_total",
            "Fields filled with a fallback value during normalization."
        );
        describe_counter!(
            "normalize_malformed_total",
            "Payloads rejected as malformed in strict mode."
        );
        describe_counter!(
            "normalize_unparsed_total",
            "Payloads that were not JSON and were delivered as plain text."
        );
    });
}

/// The normalized momentum analysis. Required fields are always populated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentResult {
    pub ticker: String,
    pub summary: String,
    pub analysis: String,
    pub reasoning: String,
    pub confidence: Confidence,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub darkpool_summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub darkpool_analysis: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub darkpool_confidence: Option<Confidence>,
}

/// Normalize `raw_text` for `ticker`, stamping missing timestamps with "now".
pub fn normalize(
    ticker: &str,
    raw_text: &str,
    mode: ParseMode,
) -> Result<AgentResult, MalformedAgentResponse> {
    normalize_at(ticker, raw_text, mode, Utc::now())
}

/// Same as [`normalize`] with an explicit clock.
pub fn normalize_at(
    ticker: &str,
    raw_text: &str,
    mode: ParseMode,
    now: DateTime<Utc>,
) -> Result<AgentResult, MalformedAgentResponse> {
    ensure_metrics_described();
    let body = text::unwrap_fence(raw_text);

    let obj = match parse_object(body) {
        Ok(obj) => obj,
        Err(reason) => match mode {
            ParseMode::Strict => {
                counter!("normalize_malformed_total").increment(1);
                return Err(MalformedAgentResponse::new(reason, body));
            }
            ParseMode::Lenient => {
                warn!(ticker, reason, "agent output is not a JSON object, using raw text");
                counter!("normalize_unparsed_total").increment(1);
                return Ok(from_plain_text(ticker, body, now));
            }
        },
    };

    let analysis = non_empty_str(&obj, "analysis");
    let summary = non_empty_str(&obj, "summary")
        .or_else(|| analysis.as_deref().and_then(text::derive_summary))
        .unwrap_or_else(|| fallback("summary", SUMMARY_FALLBACK));
    let analysis = analysis.unwrap_or_else(|| fallback("analysis", ANALYSIS_FALLBACK));
    let reasoning =
        non_empty_str(&obj, "reasoning").unwrap_or_else(|| fallback("reasoning", REASONING_FALLBACK));

    let confidence = match Confidence::try_from_value(obj.get("confidence")) {
        Some(c) => c,
        None => {
            note_fallback("confidence");
            Confidence::default()
        }
    };

    let timestamp = non_empty_str(&obj, "timestamp").unwrap_or_else(|| {
        note_fallback("timestamp");
        iso(now)
    });

    Ok(AgentResult {
        ticker: ticker.to_string(),
        summary,
        analysis,
        reasoning,
        confidence,
        timestamp,
        darkpool_summary: non_empty_str(&obj, "darkpool_summary"),
        darkpool_analysis: non_empty_str(&obj, "darkpool_analysis"),
        darkpool_confidence: Confidence::try_from_value(obj.get("darkpool_confidence")),
    })
}

/// Parse a JSON object out of `body`, or say why not.
pub fn parse_object(body: &str) -> Result<Map<String, Value>, &'static str> {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(obj)) => Ok(obj),
        Ok(_) => Err("payload is JSON but not an object"),
        Err(_) => Err("payload is not valid JSON"),
    }
}

fn from_plain_text(ticker: &str, body: &str, now: DateTime<Utc>) -> AgentResult {
    let summary = text::derive_summary(body).unwrap_or_else(|| fallback("summary", SUMMARY_FALLBACK));
    AgentResult {
        ticker: ticker.to_string(),
        summary,
        analysis: fallback("analysis", ANALYSIS_FALLBACK),
        reasoning: fallback("reasoning", REASONING_FALLBACK),
        confidence: Confidence::default(),
        timestamp: iso(now),
        darkpool_summary: None,
        darkpool_analysis: None,
        darkpool_confidence: None,
    }
}

fn non_empty_str(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

fn fallback(field: &'static str, literal: &str) -> String {
    note_fallback(field);
    literal.to_string()
}

fn note_fallback(field: &'static str) {
    debug!(field, "field fallback applied");
    counter!("normalize_fallbacks_total", "field" => field).increment(1);
}

pub fn iso(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}
