use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Serialize)]
struct OpenAiDelta {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
}

#[derive(Serialize)]
struct OpenAiChoiceDelta {
    index: u32,
    delta: OpenAiDelta,
    finish_reason: Option<&'static str>,
}

#[derive(Serialize)]
struct OpenAiStreamChunk {
    id: String,
    object: &'static str,
    created: i64,
    model: String,
    choices: Vec<OpenAiChoiceDelta>,
}

pub fn new_chat_id() -> String {
    format!("chatcmpl-{}", Uuid::new_v4())
}

fn chunk(chat_id: &str, model: &str, delta: OpenAiDelta, finish_reason: Option<&'static str>) -> serde_json::Value {
    let out = OpenAiStreamChunk {
        id: chat_id.to_string(),
        object: "chat.completion.chunk",
        created: OffsetDateTime::now_utc().unix_timestamp(),
        model: model.to_string(),
        choices: vec![OpenAiChoiceDelta { index: 0, delta, finish_reason }],
    };
    serde_json::to_value(out).unwrap_or_else(|_| serde_json::json!({}))
}

/// Incremental content chunk with no finish reason.
pub fn delta_chunk(chat_id: &str, model: &str, content: &str) -> serde_json::Value {
    chunk(
        chat_id,
        model,
        OpenAiDelta { role: None, content: Some(content.to_string()) },
        None,
    )
}

/// Final chunk: empty delta, `finish_reason="stop"`.
pub fn finish_chunk(chat_id: &str, model: &str) -> serde_json::Value {
    chunk(chat_id, model, OpenAiDelta { role: None, content: None }, Some("stop"))
}

/// In-band error chunk for failures after the stream is committed.
pub fn error_chunk(model: &str, message: &str) -> serde_json::Value {
    chunk(
        &new_chat_id(),
        model,
        OpenAiDelta { role: None, content: Some(format!("[Error: {message}]")) },
        Some("error"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta_chunk_carries_content_without_finish() {
        let v = delta_chunk("chatcmpl-1", "agent", "hi");
        assert_eq!(v["object"], "chat.completion.chunk");
        assert_eq!(v["choices"][0]["delta"]["content"], "hi");
        assert_eq!(v["choices"][0]["finish_reason"], serde_json::Value::Null);
        assert_eq!(v["choices"][0]["index"], 0);
    }

    #[test]
    fn finish_chunk_has_empty_delta_and_stop() {
        let v = finish_chunk("chatcmpl-1", "agent");
        assert_eq!(v["choices"][0]["finish_reason"], "stop");
        assert_eq!(v["choices"][0]["delta"], serde_json::json!({}));
    }

    #[test]
    fn error_chunk_is_visible_in_band() {
        let v = error_chunk("agent", "backend_timeout");
        assert_eq!(v["choices"][0]["finish_reason"], "error");
        assert_eq!(v["choices"][0]["delta"]["content"], "[Error: backend_timeout]");
        assert!(v["id"].as_str().unwrap().starts_with("chatcmpl-"));
    }
}
