// src/upstream/mod.rs
//! HTTP clients for the two agent backends.

pub mod prompt;
pub mod webhook;

use std::time::Duration;

use serde_json::Value;

pub use prompt::{OpenAiPromptClient, PromptClient, PromptRequest};
pub use webhook::{ChatRequest, WebhookClient};

/// Shared reqwest client. No overall timeout: webhook streams are long-lived,
/// prompt calls set their own per-request timeout.
pub fn build_http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(concat!("agent-ingest/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(10))
        .build()
        .unwrap_or_default()
}

/// Read a failed response body and pull out the most specific message.
pub async fn read_error_detail(resp: reqwest::Response) -> String {
    let status = resp.status();
    match resp.text().await {
        Ok(body) => error_detail_message(&body)
            .unwrap_or_else(|| format!("request failed ({})", status.as_u16())),
        Err(_) => format!("request failed ({})", status.as_u16()),
    }
}

/// `message`, then `error` (string or `{message}`), then the JSON/raw text itself.
pub fn error_detail_message(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }
    let Ok(v) = serde_json::from_str::<Value>(body) else {
        return Some(body.to_string());
    };
    if let Some(m) = v.get("message").and_then(Value::as_str) {
        return Some(m.to_string());
    }
    match v.get("error") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(e) => Some(
            e.get("message")
                .and_then(Value::as_str)
                .map(str::to_owned)
                .unwrap_or_else(|| e.to_string()),
        ),
        None => Some(v.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_message_prefers_most_specific_field() {
        assert_eq!(
            error_detail_message(r#"{"message":"rate limited"}"#).as_deref(),
            Some("rate limited")
        );
        assert_eq!(
            error_detail_message(r#"{"error":{"message":"bad prompt id","type":"invalid"}}"#)
                .as_deref(),
            Some("bad prompt id")
        );
        assert_eq!(
            error_detail_message(r#"{"error":"nope"}"#).as_deref(),
            Some("nope")
        );
        assert_eq!(
            error_detail_message(r#"{"error":{"code":7}}"#).as_deref(),
            Some(r#"{"code":7}"#)
        );
        assert_eq!(
            error_detail_message("Bad Gateway").as_deref(),
            Some("Bad Gateway")
        );
        assert_eq!(error_detail_message("  "), None);
    }
}
