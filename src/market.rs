// src/market.rs
//! Market overview: a prompt whose output must be structured JSON.
//! Parsed in strict mode; anything unusable is a `MalformedAgentResponse`.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::MalformedAgentResponse;
use crate::normalize::{self, text};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeDirection {
    Up,
    Down,
    Flat,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentStatus {
    Bullish,
    Bearish,
    Neutral,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketSession {
    Pre,
    Regular,
    After,
    Closed,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MarketMetric {
    pub ticker: String,
    pub name: String,
    pub price: Option<f64>,
    pub change: f64,
    pub change_direction: ChangeDirection,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketSentiment {
    pub status: SentimentStatus,
    pub label: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MarketStatus {
    pub is_open: bool,
    pub session: MarketSession,
    pub next_open: Option<String>,
    pub next_close: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TickerError {
    pub ticker: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MarketOverview {
    pub metrics: Vec<MarketMetric>,
    pub sentiment: MarketSentiment,
    pub market_status: MarketStatus,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<TickerError>>,
}

pub fn parse_market_overview(raw_text: &str) -> Result<MarketOverview, MalformedAgentResponse> {
    parse_market_overview_at(raw_text, Utc::now())
}

/// Only the three sections are mandatory. Inside them, a field of the wrong
/// type or an unknown enum word degrades to its default instead of failing.
pub fn parse_market_overview_at(
    raw_text: &str,
    now: DateTime<Utc>,
) -> Result<MarketOverview, MalformedAgentResponse> {
    let body = text::unwrap_fence(raw_text);
    let obj = normalize::parse_object(body).map_err(|r| MalformedAgentResponse::new(r, body))?;

    let missing = |section: &str| {
        MalformedAgentResponse::new(format!("invalid market overview data: missing {section}"), body)
    };
    let metrics = obj
        .get("metrics")
        .and_then(Value::as_array)
        .ok_or_else(|| missing("metrics"))?;
    let sentiment = obj
        .get("sentiment")
        .and_then(Value::as_object)
        .ok_or_else(|| missing("sentiment"))?;
    let market_status = obj
        .get("marketStatus")
        .and_then(Value::as_object)
        .ok_or_else(|| missing("marketStatus"))?;

    let metrics: Vec<MarketMetric> = metrics
        .iter()
        .filter_map(Value::as_object)
        .map(|m| MarketMetric {
            ticker: field(m, "ticker"),
            name: field(m, "name"),
            price: field(m, "price"),
            change: field(m, "change"),
            change_direction: field(m, "changeDirection"),
        })
        .collect();

    let timestamp = obj
        .get("timestamp")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map_or_else(|| normalize::iso(now), str::to_owned);

    let overview = MarketOverview {
        metrics,
        sentiment: MarketSentiment {
            status: field(sentiment, "status"),
            label: field(sentiment, "label"),
            description: field(sentiment, "description"),
        },
        market_status: MarketStatus {
            is_open: field(market_status, "isOpen"),
            session: field(market_status, "session"),
            next_open: field(market_status, "nextOpen"),
            next_close: field(market_status, "nextClose"),
        },
        timestamp,
        errors: obj.get("errors").and_then(Value::as_array).map(|errs| {
            errs.iter()
                .filter_map(Value::as_object)
                .map(|e| TickerError {
                    ticker: field(e, "ticker"),
                    message: field(e, "message"),
                })
                .collect()
        }),
    };
    debug!(metrics = overview.metrics.len(), "market overview parsed");
    Ok(overview)
}

/// Decode one field, falling back to the type's default when absent or mistyped.
fn field<T: DeserializeOwned + Default>(obj: &Map<String, Value>, key: &str) -> T {
    obj.get(key)
        .and_then(|v| T::deserialize(v).ok())
        .unwrap_or_default()
}
