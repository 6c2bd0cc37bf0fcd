// tests/config_env.rs
//
// Environment-driven configuration. Mutates process env, so serialized.

use std::env;
use std::time::Duration;

use agent_ingest::config::{AgentConfig, PromptKind};
use serial_test::serial;

const KEYS: &[&str] = &[
    "AGENT_WEBHOOK_URL",
    "NEXT_PUBLIC_N8N_WEBHOOK_URL",
    "OPENAI_API_KEY",
    "OPENAI_API_BASE",
    "ALPHATIDE_MCP_URL",
    "ALPHATIDE_MCP_KEY",
    "MOMENTUM_PROMPT_ID",
    "MARKET_OVERVIEW_PROMPT_ID",
    "AGENT_DEFAULT_MODEL",
    "AGENT_STREAM_DEADLINE_SECS",
    "AGENT_PROMPT_TIMEOUT_SECS",
];

fn clear() {
    for k in KEYS {
        env::remove_var(k);
    }
}

#[test]
#[serial]
fn from_env_reads_every_setting() {
    clear();
    env::set_var("AGENT_WEBHOOK_URL", "http://n8n.local/webhook/chat");
    env::set_var("OPENAI_API_KEY", " sk-live ");
    env::set_var("OPENAI_API_BASE", "http://gateway.local/");
    env::set_var("ALPHATIDE_MCP_URL", "http://mcp.local");
    env::set_var("ALPHATIDE_MCP_KEY", "mk");
    env::set_var("MARKET_OVERVIEW_PROMPT_ID", "pmpt_overview");
    env::set_var("AGENT_DEFAULT_MODEL", "gpt-4.1");
    env::set_var("AGENT_STREAM_DEADLINE_SECS", "45");
    env::set_var("AGENT_PROMPT_TIMEOUT_SECS", "not-a-number");

    let cfg = AgentConfig::from_env();
    assert_eq!(cfg.webhook().unwrap(), "http://n8n.local/webhook/chat");
    assert_eq!(cfg.default_model, "gpt-4.1");
    assert_eq!(cfg.stream_deadline, Duration::from_secs(45));
    assert_eq!(cfg.prompt_timeout, Duration::from_secs(120));

    let overview = cfg.prompt(PromptKind::MarketOverview).unwrap();
    assert_eq!(overview.api_key, "sk-live");
    assert_eq!(overview.api_base, "http://gateway.local");

    let err = cfg.prompt(PromptKind::Momentum).unwrap_err();
    assert!(err.hint.contains("MOMENTUM_PROMPT_ID"));
    clear();
}

#[test]
#[serial]
fn empty_env_reports_missing_webhook() {
    clear();
    let cfg = AgentConfig::from_env();
    let err = cfg.webhook().unwrap_err();
    assert!(err.to_string().contains("AGENT_WEBHOOK_URL"));
}
