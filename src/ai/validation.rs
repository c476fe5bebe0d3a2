//! Backend Response Extraction
//!
//! Models rarely return bare JSON: responses arrive fenced in markdown code
//! blocks or wrapped in prose. This module recovers the JSON payload before
//! shape validation happens downstream.

use serde_json::Value;

use crate::types::{FlowError, Result};

/// Extract a JSON value from a raw model response.
///
/// Tries, in order: direct parse, fenced ```json blocks, and the outermost
/// `{...}` or `[...]` span found in the text.
pub fn extract_json_from_response(raw: &str) -> Result<Value> {
    let trimmed = raw.trim();

    if let Ok(value) = serde_json::from_str(trimmed) {
        return Ok(value);
    }

    if let Some(fenced) = extract_fenced_block(trimmed)
        && let Ok(value) = serde_json::from_str(fenced.trim())
    {
        return Ok(value);
    }

    if let Some(span) = extract_outermost_span(trimmed)
        && let Ok(value) = serde_json::from_str(span)
    {
        return Ok(value);
    }

    Err(FlowError::Json(format!(
        "no JSON payload found in response ({} chars)",
        raw.len()
    )))
}

/// Contents of the first ``` fenced block, if any
fn extract_fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after_fence = &text[start + 3..];
    // Skip an optional language tag on the fence line
    let body_start = after_fence.find('\n')? + 1;
    let body = &after_fence[body_start..];
    let end = body.find("```")?;
    Some(&body[..end])
}

/// The outermost `{...}` or `[...]` span in the text
fn extract_outermost_span(text: &str) -> Option<&str> {
    let open = text.find(['{', '['])?;
    let close_char = if text.as_bytes()[open] == b'{' { '}' } else { ']' };
    let close = text.rfind(close_char)?;
    if close > open {
        Some(&text[open..=close])
    } else {
        None
    }
}
