use crate::error::AgentError;

/// Pull the decision object out of a model reply.
///
/// Providers without a JSON mode tend to wrap the object in a markdown fence
/// or put a sentence in front of it. Accepted shapes, in order:
/// - the whole reply is an object: `{"action": "BUY"}`
/// - a fenced block: ```json\n{...}\n```
/// - the first balanced `{ ... }` anywhere in the text
pub fn extract_decision(text: &str) -> Result<serde_json::Value, AgentError> {
    let trimmed = text.trim();

    let candidates = [
        Some(trimmed.to_string()),
        fenced_block(trimmed),
        first_object(trimmed),
    ];
    for candidate in candidates.into_iter().flatten() {
        if let Ok(value @ serde_json::Value::Object(_)) =
            serde_json::from_str::<serde_json::Value>(&candidate)
        {
            return Ok(value);
        }
    }

    Err(AgentError::Parse(format!(
        "no JSON object in reply (length={})",
        text.len()
    )))
}

fn fenced_block(text: &str) -> Option<String> {
    let start_markers = ["```json\n", "```json\r\n", "```JSON\n", "```\n", "```\r\n"];

    start_markers.iter().find_map(|marker| {
        let start = text.find(marker)? + marker.len();
        let end = text[start..].find("```")?;
        Some(text[start..start + end].trim().to_string())
    })
}

/// First balanced `{ ... }`, ignoring braces inside string literals.
fn first_object(text: &str) -> Option<String> {
    let mut depth = 0usize;
    let mut start = None;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in text.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape_next = true,
            '"' if start.is_some() => in_string = !in_string,
            '{' if !in_string => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' if !in_string && depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    return start.map(|s| text[s..=i].to_string());
                }
            }
            _ => {}
        }
    }

    None
}
