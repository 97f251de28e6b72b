//! Tolerant extraction of suggestions from free-form model output.
//!
//! Models are asked for a JSON array of strings but routinely wrap it in
//! prose, fenced code blocks or reasoning traces. Extraction order:
//!
//! 1. Strip `<think>` / `<reasoning>` segments
//! 2. A fenced ```` ```json ```` block, if present, is the candidate
//! 3. Otherwise the last top-level `[...]` span that parses as strings
//! 4. Anything else falls back to the whole cleaned text as one suggestion
//!
//! Output that is empty once cleaned (blank, or nothing but reasoning)
//! yields no suggestions at all rather than one empty string; the pipeline
//! reports that as a generation failure.

use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::domain::Suggestion;

fn reasoning_pairs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)<think>.*?</think>|<reasoning>.*?</reasoning>")
            .expect("reasoning pair pattern is valid")
    })
}

/// A closing marker whose opener was part of the prompt template
fn dangling_close() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)^.*</(?:think|reasoning)>").expect("dangling close pattern is valid")
    })
}

/// An opener that was never closed (output cut off mid-reasoning)
fn dangling_open() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)<(?:think|reasoning)>.*$").expect("dangling open pattern is valid")
    })
}

fn json_fence() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)```json[ \t]*\r?\n?(.*?)```").expect("json fence pattern is valid")
    })
}

/// Remove reasoning segments and trim the result
pub fn strip_reasoning(raw: &str) -> String {
    let text = reasoning_pairs().replace_all(raw, "");
    let text = dangling_close().replace(&text, "");
    let text = dangling_open().replace(&text, "");
    text.trim().to_string()
}

/// Inner content of the first ```` ```json ```` fenced block
pub fn fenced_json(text: &str) -> Option<&str> {
    json_fence()
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
}

/// All complete top-level `[...]` spans, in order of appearance.
///
/// Quote tracking only applies inside a span, so apostrophes in surrounding
/// prose cannot desynchronise the scanner.
pub fn top_level_arrays(text: &str) -> Vec<&str> {
    let mut spans = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' if depth > 0 => in_string = true,
            '[' => {
                if depth == 0 {
                    start = i;
                }
                depth += 1;
            }
            ']' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    spans.push(&text[start..=i]);
                }
            }
            _ => {}
        }
    }

    spans
}

fn parse_string_array(candidate: &str) -> Option<Vec<String>> {
    serde_json::from_str::<Vec<String>>(candidate).ok()
}

/// Recover an ordered list of suggestions from raw model text
pub fn extract_suggestions(raw: &str) -> Vec<Suggestion> {
    let cleaned = strip_reasoning(raw);

    let parsed = if let Some(fenced) = fenced_json(&cleaned) {
        debug!("Using fenced json block");
        parse_string_array(fenced)
    } else {
        top_level_arrays(&cleaned)
            .into_iter()
            .rev()
            .find_map(parse_string_array)
    };

    match parsed {
        Some(items) => items.into_iter().map(Suggestion::from).collect(),
        None => {
            warn!(
                chars = cleaned.len(),
                "No JSON string array in model output, using raw text"
            );
            if cleaned.is_empty() {
                Vec::new()
            } else {
                vec![Suggestion::new(cleaned)]
            }
        }
    }
}
