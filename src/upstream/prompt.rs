// src/upstream/prompt.rs
//! Prompt-execution API (OpenAI Responses with a stored prompt and MCP tools).

use std::time::{Duration, Instant};

use async_trait::async_trait;
use metrics::{describe_histogram, histogram};
use once_cell::sync::OnceCell;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::read_error_detail;
use crate::config::PromptSettings;
use crate::error::UpstreamError;

const RESPONSES_BETA_HEADER: &str = "responses=v1";
const MCP_SERVER_LABEL: &str = "alphatide_mcp";

pub const MOMENTUM_TOOLS: &[&str] = &[
    "darkpool_recent",
    "darkpool_ticker",
    "analyst_ratings",
    "analyst_upgrades",
    "analyst_downgrades",
    "analyst_buy_ratings",
    "earnings_afterhours",
    "earnings_premarket",
    "earnings_historical",
    "flow_greek",
    "flow_net_premium",
    "flow_spot_exposures",
    "flow_analyze",
    "flow_nope",
    "greeks_exposure",
    "max_pain",
    "open_interest",
    "options_activity",
    "volatility_realized",
    "volatility_stats",
    "volatility_term_structure",
    "volatility_analyze",
    "market_status",
    "quote",
    "price_intraday",
    "sma",
    "ema",
    "market_news",
];

pub const MARKET_OVERVIEW_TOOLS: &[&str] = &["quote", "market_status", "price_intraday"];

/// One prompt execution: the user message plus the MCP tools it may call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptRequest {
    pub user_text: String,
    pub allowed_tools: &'static [&'static str],
}

impl PromptRequest {
    pub fn momentum(ticker: &str) -> Self {
        Self {
            user_text: format!("Analyze momentum for {ticker}."),
            allowed_tools: MOMENTUM_TOOLS,
        }
    }

    pub fn market_overview() -> Self {
        Self {
            user_text: "Fetch current market overview data.".to_string(),
            allowed_tools: MARKET_OVERVIEW_TOOLS,
        }
    }

    /// JSON body for `POST /v1/responses`.
    pub fn to_body(&self, settings: &PromptSettings) -> Value {
        json!({
            "prompt": { "id": settings.prompt_id },
            "input": [{
                "role": "user",
                "content": [{ "type": "input_text", "text": self.user_text }],
            }],
            "reasoning": { "summary": "auto" },
            "tools": [{
                "type": "mcp",
                "allowed_tools": self.allowed_tools,
                "require_approval": "never",
                "server_label": MCP_SERVER_LABEL,
                "server_url": settings.mcp_url,
                "headers": { "x-api-key": settings.mcp_key },
            }],
            "store": false,
            "include": ["reasoning.encrypted_content"],
        })
    }
}

/// Seam between handlers and the prompt backend. Returns the raw model text.
#[async_trait]
pub trait PromptClient: Send + Sync {
    async fn run(
        &self,
        settings: &PromptSettings,
        request: &PromptRequest,
    ) -> Result<String, UpstreamError>;

    /// Provider name for diagnostics.
    fn provider_name(&self) -> &'static str;
}

pub struct OpenAiPromptClient {
    http: reqwest::Client,
    timeout: Duration,
}

impl OpenAiPromptClient {
    pub fn new(http: reqwest::Client, timeout: Duration) -> Self {
        Self { http, timeout }
    }
}

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_histogram!("prompt_request_ms", "Prompt execution latency in milliseconds.");
    });
}

#[async_trait]
impl PromptClient for OpenAiPromptClient {
    async fn run(
        &self,
        settings: &PromptSettings,
        request: &PromptRequest,
    ) -> Result<String, UpstreamError> {
        ensure_metrics_described();
        let started = Instant::now();

        let resp = self
            .http
            .post(format!("{}/v1/responses", settings.api_base))
            .bearer_auth(&settings.api_key)
            .header("OpenAI-Beta", RESPONSES_BETA_HEADER)
            .timeout(self.timeout)
            .json(&request.to_body(settings))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let detail = read_error_detail(resp).await;
            warn!(status = status.as_u16(), detail = %detail, "prompt request failed");
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                detail,
            });
        }

        let body: Value = resp.json().await?;
        let elapsed = started.elapsed().as_millis() as f64;
        histogram!("prompt_request_ms").record(elapsed);

        let text = extract_response_text(&body).ok_or(UpstreamError::EmptyOutput)?;
        debug!(elapsed_ms = elapsed, chars = text.len(), "prompt raw output received");
        Ok(text)
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}

/// `output_text` if non-empty, else the first non-empty `output[].content[].text`.
pub fn extract_response_text(body: &Value) -> Option<String> {
    let trimmed_str = |v: &Value| {
        v.as_str()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
    };

    if let Some(t) = body.get("output_text").and_then(trimmed_str) {
        return Some(t);
    }

    body.get("output")
        .and_then(Value::as_array)?
        .iter()
        .filter_map(|o| o.get("content").and_then(Value::as_array))
        .flatten()
        .find_map(|piece| piece.get("text").and_then(trimmed_str))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_text_wins_when_present() {
        let body = json!({ "output_text": "  {\"summary\":\"x\"} ", "output": [] });
        assert_eq!(extract_response_text(&body).as_deref(), Some("{\"summary\":\"x\"}"));
    }

    #[test]
    fn nested_output_is_searched_in_order() {
        let body = json!({
            "output_text": "   ",
            "output": [
                { "type": "reasoning", "summary": [] },
                { "type": "mcp_call", "content": [{ "type": "output_text", "text": "" }] },
                { "type": "message", "content": [
                    { "type": "output_text", "text": "first" },
                    { "type": "output_text", "text": "second" }
                ]}
            ]
        });
        assert_eq!(extract_response_text(&body).as_deref(), Some("first"));
    }

    #[test]
    fn no_text_anywhere_is_none() {
        assert_eq!(extract_response_text(&json!({ "output": [{ "content": [] }] })), None);
        assert_eq!(extract_response_text(&json!({})), None);
    }

    #[test]
    fn request_body_carries_prompt_and_tools() {
        let settings = PromptSettings {
            api_base: "http://localhost".into(),
            api_key: "sk".into(),
            mcp_url: "http://mcp".into(),
            mcp_key: "mk".into(),
            prompt_id: "pmpt_42".into(),
        };
        let body = PromptRequest::momentum("TSLA").to_body(&settings);
        assert_eq!(body["prompt"]["id"], "pmpt_42");
        assert_eq!(body["input"][0]["content"][0]["text"], "Analyze momentum for TSLA.");
        assert_eq!(body["tools"][0]["headers"]["x-api-key"], "mk");
        assert_eq!(body["tools"][0]["allowed_tools"].as_array().unwrap().len(), MOMENTUM_TOOLS.len());
        assert_eq!(body["store"], false);
    }
}
