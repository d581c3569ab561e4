//! Tolerant JSON recovery for model output that wraps an object in prose.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};

use crate::error::{PipelineError, PipelineResult};

/// Parses `raw` as `T`, recovering from surrounding prose.
///
/// Attempts, in order: the whole text, the body of a fenced code block, the
/// first balanced `{...}` span, and the span from the first `{` to the last
/// `}`. Fails with [`PipelineError::Parse`] carrying the raw text.
pub fn parse_json<T: DeserializeOwned>(raw: &str) -> PipelineResult<T> {
    let mut last_error = String::from("no json object found");

    for candidate in candidates(raw) {
        match serde_json::from_str::<T>(candidate) {
            Ok(value) => return Ok(value),
            Err(e) => last_error = e.to_string(),
        }
    }

    Err(PipelineError::parse(last_error, raw))
}

/// `deserialize_with` helper: an explicit `null` becomes the type's default.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Candidate spans worth handing to serde, most literal first, without duplicates.
fn candidates(raw: &str) -> Vec<&str> {
    let trimmed = raw.trim();
    let mut spans = vec![trimmed];

    if let Some(fenced) = fenced_block(trimmed) {
        spans.push(fenced);
    }
    if let Some(balanced) = first_balanced_object(trimmed) {
        spans.push(balanced);
    }
    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            spans.push(&trimmed[start..=end]);
        }
    }

    let mut seen = std::collections::HashSet::new();
    spans.retain(|s| !s.is_empty() && seen.insert(*s));
    spans
}

fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after = &text[start + 3..];
    let body_start = after.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after[body_start..];
    let end = body.find("```")?;
    Some(body[..end].trim())
}

/// First `{...}` whose braces balance, ignoring braces inside JSON strings.
fn first_balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}
