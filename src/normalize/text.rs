// src/normalize/text.rs
//! Text helpers for model output: fence unwrapping and summary derivation.

use once_cell::sync::OnceCell;
use regex::Regex;

fn fence_re() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"(?is)```[ \t]*(?:json)?[ \t]*\r?\n?(.*?)```").unwrap())
}

/// Extract the content of the first Markdown code fence, or the trimmed text.
/// An opening fence that is never closed is stripped.
pub fn unwrap_fence(raw: &str) -> &str {
    if let Some(inner) = fence_re().captures(raw).and_then(|c| c.get(1)) {
        return inner.as_str().trim();
    }
    let t = raw.trim();
    match t.strip_prefix("```") {
        Some(rest) => match rest.split_once('\n') {
            Some((_tag, body)) => body.trim(),
            None => rest.trim(),
        },
        None => t,
    }
}

/// First sentence: the shortest prefix ending in `.`, `!` or `?` that is
/// followed by whitespace or the end of the text.
pub fn first_sentence(text: &str) -> Option<&str> {
    let t = text.trim();
    let mut it = t.char_indices().peekable();
    while let Some((i, c)) = it.next() {
        if matches!(c, '.' | '!' | '?') {
            let at_boundary = it.peek().map_or(true, |(_, next)| next.is_whitespace());
            if at_boundary {
                let s = t[..i + c.len_utf8()].trim();
                if !s.is_empty() {
                    return Some(s);
                }
            }
        }
    }
    None
}

pub fn first_nonblank_line(text: &str) -> Option<&str> {
    text.lines().map(str::trim).find(|l| !l.is_empty())
}

/// Summary derived from longer text: first sentence, else first non-blank line.
pub fn derive_summary(text: &str) -> Option<String> {
    first_sentence(text)
        .or_else(|| first_nonblank_line(text))
        .map(str::to_owned)
}
