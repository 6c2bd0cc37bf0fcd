// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod config;
pub mod error;
pub mod market;
pub mod metrics;
pub mod normalize;
pub mod relay;
pub mod upstream;

// ---- Re-exports for stable public API ----
pub use crate::api::{router, AppState};
pub use crate::error::{ApiError, ConfigError, MalformedAgentResponse, TransportError};
pub use crate::normalize::{normalize, AgentResult, Confidence, ConfidenceLevel, ParseMode};
pub use crate::relay::relay;

use axum::Router;
use tracing::info;

/// Build the full application from the process environment.
/// `/metrics` is mounted only when `METRICS_ENABLED=1`.
pub fn app_from_env() -> anyhow::Result<Router> {
    let state = AppState::from_env();
    info!(
        webhook = state.config.webhook_url.is_some(),
        prompt_key = state.config.openai_api_key.is_some(),
        stream_deadline_secs = state.config.stream_deadline.as_secs(),
        "agent config loaded"
    );

    let mut app = router(state);
    if crate::metrics::Metrics::enabled_by_env() {
        let m = crate::metrics::Metrics::init()?;
        app = app.merge(m.router());
        info!("metrics endpoint enabled at /metrics");
    }
    Ok(app)
}
