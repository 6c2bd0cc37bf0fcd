// src/upstream/webhook.rs
//! Workflow webhook: POST the chat input, get back a streamed NDJSON body.

use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt};
use serde::Serialize;
use tracing::{debug, info};

use super::read_error_detail;
use crate::error::UpstreamError;

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    #[serde(rename = "chatInput")]
    pub chat_input: String,
    pub model: String,
    #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

#[derive(Clone)]
pub struct WebhookClient {
    http: reqwest::Client,
}

impl WebhookClient {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Open the upstream stream. Non-2xx answers are reported before any
    /// byte is relayed, with the upstream body as detail.
    pub async fn open_stream(
        &self,
        url: &str,
        req: &ChatRequest,
    ) -> Result<BoxStream<'static, Result<Bytes, reqwest::Error>>, UpstreamError> {
        debug!(
            model = %req.model,
            session_id = req.session_id.as_deref().unwrap_or("-"),
            input_len = req.chat_input.len(),
            "sending chat input to webhook"
        );

        let resp = self
            .http
            .post(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(req)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let detail = read_error_detail(resp).await;
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                detail,
            });
        }

        info!(status = status.as_u16(), "webhook accepted, relaying stream");
        Ok(resp.bytes_stream().boxed())
    }
}
