use crate::backend::AdkError;
use crate::core::entities::{
    AdkMessage, AdkPart, AdkRunRequest, ChatCompletionRequest, MessageContent, Role,
};
use crate::multimodal::MultimodalConverter;

/// Translate a caller request into the backend's session + multi-part run
/// request. The backend is stateful, so only the last (user) message is sent;
/// prior turns live in the backend session.
pub async fn to_adk_request(
    request: &ChatCompletionRequest,
    default_app: &str,
    converter: &dyn MultimodalConverter,
) -> Result<AdkRunRequest, AdkError> {
    let last = request
        .messages
        .last()
        .ok_or_else(|| AdkError::InvalidRequest("messages cannot be empty".into()))?;
    if last.role != Role::User {
        return Err(AdkError::InvalidRequest("last message must be from user".into()));
    }

    if let Some(t) = request.temperature {
        tracing::debug!(temperature = t, "temperature accepted but not forwarded to the backend");
    }

    let user_id = request.user.clone().unwrap_or_else(|| "anonymous".to_string());
    // Deterministic so repeated calls from one user reuse the backend session.
    let session_id = format!("session_{user_id}");

    let parts = match &last.content {
        MessageContent::Text(text) => vec![AdkPart::text(text.clone())],
        MessageContent::Parts(parts) => converter.convert(parts).await?,
    };

    let app_name =
        if request.model.is_empty() { default_app.to_string() } else { request.model.clone() };

    Ok(AdkRunRequest {
        app_name,
        user_id,
        session_id,
        streaming: request.stream,
        new_message: AdkMessage { role: "user".into(), parts },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::entities::{ChatMessage, ContentPart};
    use crate::multimodal::InlineConverter;

    fn request(messages: Vec<ChatMessage>, user: Option<&str>, stream: bool) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: "agent".into(),
            messages,
            stream,
            user: user.map(String::from),
            temperature: None,
        }
    }

    fn user_text(text: &str) -> ChatMessage {
        ChatMessage { role: Role::User, content: MessageContent::Text(text.into()) }
    }

    #[tokio::test]
    async fn empty_messages_rejected_before_any_backend_call() {
        let err = to_adk_request(&request(vec![], None, false), "agent", &InlineConverter)
            .await
            .unwrap_err();
        assert!(matches!(err, AdkError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn last_message_must_be_user() {
        let msgs = vec![
            user_text("hi"),
            ChatMessage { role: Role::Assistant, content: MessageContent::Text("hello".into()) },
        ];
        let err = to_adk_request(&request(msgs, None, false), "agent", &InlineConverter)
            .await
            .unwrap_err();
        assert!(matches!(err, AdkError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn plain_text_becomes_single_text_part() {
        let req =
            to_adk_request(&request(vec![user_text("hello")], Some("alice"), true), "agent", &InlineConverter)
                .await
                .unwrap();
        assert_eq!(req.user_id, "alice");
        assert_eq!(req.session_id, "session_alice");
        assert!(req.streaming);
        assert_eq!(req.new_message.parts.len(), 1);
        assert_eq!(req.new_message.parts[0].text.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn missing_user_defaults_to_anonymous() {
        let req = to_adk_request(&request(vec![user_text("hi")], None, false), "agent", &InlineConverter)
            .await
            .unwrap();
        assert_eq!(req.user_id, "anonymous");
        assert_eq!(req.session_id, "session_anonymous");
    }

    #[tokio::test]
    async fn empty_model_falls_back_to_default_app() {
        let mut r = request(vec![user_text("hi")], None, false);
        r.model = String::new();
        let req = to_adk_request(&r, "default-agent", &InlineConverter).await.unwrap();
        assert_eq!(req.app_name, "default-agent");
    }

    #[tokio::test]
    async fn part_content_goes_through_converter() {
        let msgs = vec![ChatMessage {
            role: Role::User,
            content: MessageContent::Parts(vec![ContentPart::Text { text: "look".into() }]),
        }];
        let req = to_adk_request(&request(msgs, Some("bob"), false), "agent", &InlineConverter)
            .await
            .unwrap();
        assert_eq!(req.new_message.parts.len(), 1);
        assert_eq!(req.new_message.parts[0].text.as_deref(), Some("look"));
    }
}
