// src/config/agent.rs
use std::env;
use std::time::Duration;

use crate::error::ConfigError;

pub const ENV_WEBHOOK_URL: &str = "AGENT_WEBHOOK_URL";
/// Name used by the original front end; still honoured as a fallback.
pub const ENV_WEBHOOK_URL_LEGACY: &str = "NEXT_PUBLIC_N8N_WEBHOOK_URL";
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_OPENAI_API_BASE: &str = "OPENAI_API_BASE";
pub const ENV_MCP_URL: &str = "ALPHATIDE_MCP_URL";
pub const ENV_MCP_KEY: &str = "ALPHATIDE_MCP_KEY";
pub const ENV_MOMENTUM_PROMPT_ID: &str = "MOMENTUM_PROMPT_ID";
pub const ENV_MARKET_OVERVIEW_PROMPT_ID: &str = "MARKET_OVERVIEW_PROMPT_ID";
pub const ENV_DEFAULT_MODEL: &str = "AGENT_DEFAULT_MODEL";
pub const ENV_STREAM_DEADLINE_SECS: &str = "AGENT_STREAM_DEADLINE_SECS";
pub const ENV_PROMPT_TIMEOUT_SECS: &str = "AGENT_PROMPT_TIMEOUT_SECS";

pub const DEFAULT_API_BASE: &str = "https://api.openai.com";
pub const DEFAULT_MODEL: &str = "claude-4-5";
const DEFAULT_STREAM_DEADLINE_SECS: u64 = 300;
const DEFAULT_PROMPT_TIMEOUT_SECS: u64 = 120;

/// Which stored prompt a request runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    Momentum,
    MarketOverview,
}

impl PromptKind {
    pub fn label(&self) -> &'static str {
        match self {
            PromptKind::Momentum => "Momentum prompt",
            PromptKind::MarketOverview => "Market overview",
        }
    }

    pub fn id_env(&self) -> &'static str {
        match self {
            PromptKind::Momentum => ENV_MOMENTUM_PROMPT_ID,
            PromptKind::MarketOverview => ENV_MARKET_OVERVIEW_PROMPT_ID,
        }
    }
}

/// Everything needed to call the prompt-execution API once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSettings {
    pub api_base: String,
    pub api_key: String,
    pub mcp_url: String,
    pub mcp_key: String,
    pub prompt_id: String,
}

/// Process configuration. Every upstream setting is optional here; handlers
/// validate what they need before doing any I/O.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    pub webhook_url: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_api_base: String,
    pub mcp_url: Option<String>,
    pub mcp_key: Option<String>,
    pub momentum_prompt_id: Option<String>,
    pub market_overview_prompt_id: Option<String>,
    pub default_model: String,
    pub stream_deadline: Duration,
    pub prompt_timeout: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl AgentConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|k| env::var(k).ok())
    }

    /// Build from any key lookup. Blank values count as missing.
    pub fn from_lookup<F>(get: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |k: &str| {
            get(k)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let secs = |k: &str, default: u64| {
            get(k)
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|&n| n > 0)
                .unwrap_or(default)
        };

        Self {
            webhook_url: get(ENV_WEBHOOK_URL).or_else(|| get(ENV_WEBHOOK_URL_LEGACY)),
            openai_api_key: get(ENV_OPENAI_API_KEY),
            openai_api_base: get(ENV_OPENAI_API_BASE)
                .map(|b| b.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            mcp_url: get(ENV_MCP_URL),
            mcp_key: get(ENV_MCP_KEY),
            momentum_prompt_id: get(ENV_MOMENTUM_PROMPT_ID),
            market_overview_prompt_id: get(ENV_MARKET_OVERVIEW_PROMPT_ID),
            default_model: get(ENV_DEFAULT_MODEL).unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            stream_deadline: Duration::from_secs(secs(
                ENV_STREAM_DEADLINE_SECS,
                DEFAULT_STREAM_DEADLINE_SECS,
            )),
            prompt_timeout: Duration::from_secs(secs(
                ENV_PROMPT_TIMEOUT_SECS,
                DEFAULT_PROMPT_TIMEOUT_SECS,
            )),
        }
    }

    pub fn webhook(&self) -> Result<&str, ConfigError> {
        self.webhook_url.as_deref().ok_or_else(|| {
            ConfigError::new(
                "Webhook URL",
                format!("Set {ENV_WEBHOOK_URL} to the workflow webhook endpoint."),
            )
        })
    }

    /// Validate the settings for `kind`, in the order an operator fixes them.
    pub fn prompt(&self, kind: PromptKind) -> Result<PromptSettings, ConfigError> {
        let api_key = self.openai_api_key.clone().ok_or_else(|| {
            ConfigError::new(kind.label(), format!("Set {ENV_OPENAI_API_KEY} in your environment."))
        })?;
        let (Some(mcp_url), Some(mcp_key)) = (self.mcp_url.clone(), self.mcp_key.clone()) else {
            return Err(ConfigError::new(
                kind.label(),
                format!("Configure {ENV_MCP_URL} and {ENV_MCP_KEY} to enable MCP access."),
            ));
        };
        let prompt_id = match kind {
            PromptKind::Momentum => self.momentum_prompt_id.clone(),
            PromptKind::MarketOverview => self.market_overview_prompt_id.clone(),
        }
        .ok_or_else(|| {
            ConfigError::new(
                kind.label(),
                format!("Set {} with your OpenAI prompt identifier.", kind.id_env()),
            )
        })?;

        Ok(PromptSettings {
            api_base: self.openai_api_base.clone(),
            api_key,
            mcp_url,
            mcp_key,
            prompt_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn cfg(pairs: &[(&str, &str)]) -> AgentConfig {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AgentConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let c = AgentConfig::default();
        assert_eq!(c.openai_api_base, DEFAULT_API_BASE);
        assert_eq!(c.default_model, DEFAULT_MODEL);
        assert_eq!(c.stream_deadline, Duration::from_secs(300));
        assert!(c.webhook().is_err());
    }

    #[test]
    fn blank_values_count_as_missing_and_legacy_webhook_is_used() {
        let c = cfg(&[
            (ENV_WEBHOOK_URL, "   "),
            (ENV_WEBHOOK_URL_LEGACY, "http://n8n.local/webhook/abc"),
            (ENV_OPENAI_API_BASE, "http://proxy.local/"),
            (ENV_STREAM_DEADLINE_SECS, "0"),
        ]);
        assert_eq!(c.webhook().unwrap(), "http://n8n.local/webhook/abc");
        assert_eq!(c.openai_api_base, "http://proxy.local");
        assert_eq!(c.stream_deadline, Duration::from_secs(300));
    }

    #[test]
    fn prompt_validation_reports_first_missing_setting() {
        let err = cfg(&[]).prompt(PromptKind::Momentum).unwrap_err();
        assert!(err.hint.contains(ENV_OPENAI_API_KEY));

        let err = cfg(&[(ENV_OPENAI_API_KEY, "sk-test"), (ENV_MCP_URL, "http://mcp")])
            .prompt(PromptKind::Momentum)
            .unwrap_err();
        assert!(err.hint.contains(ENV_MCP_KEY));

        let c = cfg(&[
            (ENV_OPENAI_API_KEY, "sk-test"),
            (ENV_MCP_URL, "http://mcp"),
            (ENV_MCP_KEY, "k"),
            (ENV_MOMENTUM_PROMPT_ID, "pmpt_1"),
        ]);
        let err = c.prompt(PromptKind::MarketOverview).unwrap_err();
        assert!(err.hint.contains(ENV_MARKET_OVERVIEW_PROMPT_ID));
        assert_eq!(err.what, "Market overview");

        let ok = c.prompt(PromptKind::Momentum).unwrap();
        assert_eq!(ok.prompt_id, "pmpt_1");
        assert_eq!(ok.api_base, DEFAULT_API_BASE);
    }
}
