// src/config/mod.rs
pub mod agent;

pub use agent::{AgentConfig, PromptKind, PromptSettings};
