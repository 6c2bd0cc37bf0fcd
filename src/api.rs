// src/api.rs
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, State},
    http::{
        header::{CACHE_CONTROL, CONNECTION, CONTENT_TYPE},
        StatusCode,
    },
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::config::{AgentConfig, PromptKind};
use crate::error::ApiError;
use crate::market::{parse_market_overview, MarketOverview};
use crate::normalize::{normalize, AgentResult, ParseMode};
use crate::relay;
use crate::upstream::{
    build_http_client, ChatRequest, OpenAiPromptClient, PromptClient, PromptRequest, WebhookClient,
};

const MOMENTUM_FAILED: &str = "Momentum analysis failed";
const OVERVIEW_FAILED: &str = "Market overview failed";
const CHAT_FAILED: &str = "Failed to process chat message";

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AgentConfig>,
    pub webhook: WebhookClient,
    pub prompt: Arc<dyn PromptClient>,
}

impl AppState {
    pub fn new(config: AgentConfig, prompt: Arc<dyn PromptClient>) -> Self {
        Self {
            config: Arc::new(config),
            webhook: WebhookClient::new(build_http_client()),
            prompt,
        }
    }

    /// Production wiring: env config + the real prompt client.
    pub fn from_env() -> Self {
        let config = AgentConfig::from_env();
        let prompt = OpenAiPromptClient::new(build_http_client(), config.prompt_timeout);
        Self::new(config, Arc::new(prompt))
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/api/assistant", post(chat_stream))
        .route("/api/n8n-chat", post(chat_stream))
        .route(
            "/api/analyze-momentum",
            post(analyze_momentum).get(momentum_method_not_allowed),
        )
        .route("/api/market-overview", get(market_overview))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Trim, uppercase, and accept 1–6 letters or dots.
pub fn normalize_ticker(raw: &str) -> Option<String> {
    static RE: OnceCell<Regex> = OnceCell::new();
    let re = RE.get_or_init(|| Regex::new(r"^[A-Z.]{1,6}$").unwrap());
    let upper = raw.trim().to_uppercase();
    re.is_match(&upper).then_some(upper)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    model: Option<String>,
}

async fn chat_stream(
    State(state): State<AppState>,
    body: Result<Json<ChatBody>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Some(ChatBody {
        message: Some(message),
        session_id,
        model,
    }) = body.ok().map(|Json(b)| b)
    else {
        return Err(ApiError::BadRequest {
            error: "Invalid chat message",
            message: "Provide a non-empty `message` to send to the assistant.",
        });
    };
    if message.trim().is_empty() {
        return Err(ApiError::BadRequest {
            error: "Invalid chat message",
            message: "Provide a non-empty `message` to send to the assistant.",
        });
    }

    let url = state.config.webhook()?;
    let req = ChatRequest {
        chat_input: message,
        model: model
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| state.config.default_model.clone()),
        session_id,
    };
    info!(model = %req.model, "chat request received");

    let upstream = state
        .webhook
        .open_stream(url, &req)
        .await
        .map_err(|source| ApiError::Upstream {
            context: CHAT_FAILED,
            source,
        })?;

    let frames = relay::spawn(upstream, state.config.stream_deadline);
    Ok((
        [
            (CONTENT_TYPE, "text/event-stream"),
            (CACHE_CONTROL, "no-cache"),
            (CONNECTION, "keep-alive"),
        ],
        Body::from_stream(frames),
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
struct MomentumBody {
    #[serde(default)]
    ticker: Option<String>,
}

async fn analyze_momentum(
    State(state): State<AppState>,
    body: Result<Json<MomentumBody>, JsonRejection>,
) -> Result<Json<AgentResult>, ApiError> {
    let ticker = body
        .ok()
        .and_then(|Json(b)| b.ticker)
        .as_deref()
        .and_then(normalize_ticker)
        .ok_or(ApiError::BadRequest {
            error: "Invalid ticker symbol",
            message: "Provide a valid ticker symbol to analyze momentum.",
        })?;

    let settings = state.config.prompt(PromptKind::Momentum)?;
    let raw = state
        .prompt
        .run(&settings, &PromptRequest::momentum(&ticker))
        .await
        .map_err(|source| ApiError::Upstream {
            context: MOMENTUM_FAILED,
            source,
        })?;

    let result = normalize(&ticker, &raw, ParseMode::Lenient).map_err(|source| {
        ApiError::Malformed {
            context: MOMENTUM_FAILED,
            source,
        }
    })?;
    info!(
        ticker = %result.ticker,
        confidence = %result.confidence,
        provider = state.prompt.provider_name(),
        "momentum analysis ready"
    );
    Ok(Json(result))
}

async fn momentum_method_not_allowed() -> impl IntoResponse {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({
            "error": "Method Not Allowed",
            "message": "Use POST to analyze momentum.",
        })),
    )
}

async fn market_overview(State(state): State<AppState>) -> Result<Json<MarketOverview>, ApiError> {
    let settings = state.config.prompt(PromptKind::MarketOverview)?;
    let raw = state
        .prompt
        .run(&settings, &PromptRequest::market_overview())
        .await
        .map_err(|source| ApiError::Upstream {
            context: OVERVIEW_FAILED,
            source,
        })?;

    let overview = parse_market_overview(&raw).map_err(|source| ApiError::Malformed {
        context: OVERVIEW_FAILED,
        source,
    })?;
    Ok(Json(overview))
}
