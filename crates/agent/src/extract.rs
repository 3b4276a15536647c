//! Tolerant JSON extraction from oracle text.
//!
//! Oracles are asked to emit nothing but one JSON object; what actually
//! arrives ranges from clean JSON to fenced markdown to JSON buried in
//! prose. Three ordered attempts before giving up:
//!
//! 1. strict parse of the whole text
//! 2. unwrap of a fenced code block (```json or bare ```)
//! 3. balanced-brace scan for an object containing a discriminator key —
//!    `"tools"` (multi-tool) first, then `"tool"` (single-tool)

/// Extract one JSON object from raw oracle text. Returns `None` when no
/// attempt produces an object.
pub fn extract_intent_json(raw: &str) -> Option<serde_json::Value> {
    let trimmed = raw.trim();

    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed)
        && value.is_object()
    {
        return Some(value);
    }

    if let Some(inner) = unwrap_fenced(trimmed)
        && let Ok(value) = serde_json::from_str::<serde_json::Value>(inner.trim())
        && value.is_object()
    {
        return Some(value);
    }

    for key in ["\"tools\"", "\"tool\""] {
        if let Some(value) = scan_for_object(trimmed, key) {
            return Some(value);
        }
    }

    None
}

/// Pull the body out of the first fenced code block, tolerating an
/// optional language tag after the opening fence.
fn unwrap_fenced(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after = &text[start + 3..];
    let body_start = after.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after[body_start..];
    let end = body.find("```")?;
    Some(&body[..end])
}

/// Scan for the first balanced `{...}` slice that contains `key` and
/// parses as a JSON object.
fn scan_for_object(text: &str, key: &str) -> Option<serde_json::Value> {
    if !text.contains(key) {
        return None;
    }
    for (index, ch) in text.char_indices() {
        if ch != '{' {
            continue;
        }
        let Some(slice) = balanced_slice(&text[index..]) else {
            continue;
        };
        if !slice.contains(key) {
            continue;
        }
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(slice)
            && value.is_object()
        {
            return Some(value);
        }
    }
    None
}

/// The shortest balanced `{...}` prefix of `text`, respecting JSON string
/// literals and escapes.
fn balanced_slice(text: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (index, ch) in text.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(&text[..index + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}
