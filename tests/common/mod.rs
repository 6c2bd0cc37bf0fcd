// tests/common/mod.rs
//
// Shared helpers: a throwaway local HTTP server standing in for the agent
// backends, and a frame collector implementing the relay sink.

#![allow(dead_code)]

use agent_ingest::error::TransportError;
use agent_ingest::relay::{FrameSink, SinkClosed};
use async_trait::async_trait;
use axum::Router;
use bytes::Bytes;

/// Serve `router` on an ephemeral localhost port and return its base URL.
pub async fn spawn_server(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock upstream");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("mock upstream");
    });
    format!("http://{addr}")
}

#[derive(Default)]
pub struct Collect {
    pub frames: Vec<Bytes>,
    pub failed: Option<String>,
}

impl Collect {
    /// Decoded `content` of every frame, in order.
    pub fn contents(&self) -> Vec<String> {
        self.frames.iter().map(|f| frame_content(f)).collect()
    }
}

#[async_trait]
impl FrameSink for Collect {
    async fn send_frame(&mut self, frame: Bytes) -> Result<(), SinkClosed> {
        self.frames.push(frame);
        Ok(())
    }

    async fn fail(&mut self, error: &TransportError) {
        self.failed = Some(error.to_string());
    }
}

/// Parse one `data: {...}\n\n` frame and return its content.
pub fn frame_content(frame: &[u8]) -> String {
    let text = std::str::from_utf8(frame).expect("utf8 frame");
    let json = text
        .strip_prefix("data: ")
        .and_then(|t| t.strip_suffix("\n\n"))
        .unwrap_or_else(|| panic!("not an SSE data frame: {text:?}"));
    let v: serde_json::Value = serde_json::from_str(json).expect("frame json");
    v["content"].as_str().expect("content string").to_string()
}

/// Split an SSE body into frame contents.
pub fn sse_contents(body: &str) -> Vec<String> {
    body.split_inclusive("\n\n")
        .filter(|f| !f.trim().is_empty())
        .map(|f| frame_content(f.as_bytes()))
        .collect()
}
