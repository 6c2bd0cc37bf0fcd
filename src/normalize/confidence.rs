// src/normalize/confidence.rs
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Longest leading decimal number, so `"85%"` and `"72 (moderate)"` still score.
fn leading_number(s: &str) -> Option<f64> {
    static RE: OnceCell<Regex> = OnceCell::new();
    let re = RE.get_or_init(|| Regex::new(r"^[+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?").unwrap());
    re.find(s.trim()).and_then(|m| m.as_str().parse::<f64>().ok())
}

/// Qualitative confidence as reported by the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

impl ConfidenceLevel {
    pub fn parse(s: &str) -> Option<Self> {
        let t = s.trim();
        if t.eq_ignore_ascii_case("low") {
            Some(Self::Low)
        } else if t.eq_ignore_ascii_case("medium") {
            Some(Self::Medium)
        } else if t.eq_ignore_ascii_case("high") {
            Some(Self::High)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// Normalized confidence: a 0–100 score or a qualitative word.
/// Serializes as a bare JSON number or the lowercase word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Confidence {
    Numeric(u8),
    Qualitative(ConfidenceLevel),
}

impl Default for Confidence {
    fn default() -> Self {
        Confidence::Numeric(0)
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Confidence::Numeric(n) => write!(f, "{n}"),
            Confidence::Qualitative(l) => f.write_str(l.as_str()),
        }
    }
}

impl Confidence {
    /// The confidence normalization rule. Unusable input is `None`; callers that
    /// need a value take `Confidence::default()` (`0`).
    pub fn try_from_value(raw: Option<&Value>) -> Option<Self> {
        match raw? {
            Value::Number(n) => n.as_f64().and_then(Self::from_score),
            Value::String(s) => ConfidenceLevel::parse(s)
                .map(Confidence::Qualitative)
                .or_else(|| leading_number(s).and_then(Self::from_score)),
            _ => None,
        }
    }

    /// Clamp to `[0, 100]` and round to the nearest integer. Non-finite input is rejected.
    pub fn from_score(score: f64) -> Option<Self> {
        if !score.is_finite() {
            return None;
        }
        Some(Confidence::Numeric(score.clamp(0.0, 100.0).round() as u8))
    }
}
