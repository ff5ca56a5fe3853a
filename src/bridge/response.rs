use time::OffsetDateTime;
use uuid::Uuid;

use crate::core::entities::{
    ChatCompletionChoice, ChatCompletionResponse, ResponseMessage,
};

/// Translate a non-streaming backend response into the caller-facing shape.
/// The backend payload is loosely specified: it may be a single event object,
/// a list of events, or something else entirely.
pub fn to_chat_response(adk_response: &serde_json::Value, model: &str) -> ChatCompletionResponse {
    let content = extract_content(adk_response);
    ChatCompletionResponse {
        id: format!("chatcmpl-{}", Uuid::new_v4()),
        object: "chat.completion",
        created: OffsetDateTime::now_utc().unix_timestamp(),
        model: model.to_string(),
        choices: vec![ChatCompletionChoice {
            index: 0,
            message: ResponseMessage { role: "assistant", content },
            finish_reason: Some("stop".into()),
        }],
    }
}

/// Ordered fallback chain over the possible backend shapes:
/// 1. list → recurse on the last (most complete) element, empty list → "",
/// 2. non-object → stringified as-is,
/// 3. `content.parts[].text` concatenated,
/// 4. best-effort: first top-level string field longer than 10 characters.
fn extract_content(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Array(items) => match items.last() {
            Some(last) => extract_content(last),
            None => String::new(),
        },
        serde_json::Value::Object(map) => {
            if let Some(parts) = value.pointer("/content/parts").and_then(|p| p.as_array()) {
                let mut text = String::new();
                for part in parts {
                    if let Some(t) = part.get("text").and_then(|t| t.as_str()) {
                        text.push_str(t);
                    }
                }
                return text;
            }
            // The >10 threshold is inherited and arbitrary; it can miss short
            // legitimate answers. Kept as-is, logged as best effort.
            for (key, v) in map {
                if let Some(s) = v.as_str() {
                    if s.len() > 10 {
                        tracing::warn!(
                            %key,
                            "no content.parts in backend response, using best-effort string field"
                        );
                        return s.to_string();
                    }
                }
            }
            tracing::warn!("backend response had no extractable text content");
            String::new()
        }
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
