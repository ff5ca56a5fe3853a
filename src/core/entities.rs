use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// OpenAI message content: either a plain string or an ordered list of parts.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: MediaUrl },
    AudioUrl { audio_url: MediaUrl },
    VideoUrl { video_url: MediaUrl },
    InputAudio { input_audio: InputAudio },
    File { file: FileContent },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MediaUrl {
    pub url: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InputAudio {
    /// Base64-encoded audio payload.
    pub data: String,
    /// Container format, e.g. "mp3", "wav", "flac".
    pub format: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FileContent {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: MessageContent,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub stream: bool,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ResponseMessage {
    pub role: &'static str,
    pub content: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct ChatCompletionChoice {
    pub index: u32,
    pub message: ResponseMessage,
    pub finish_reason: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub object: &'static str,
    pub created: i64,
    pub model: String,
    pub choices: Vec<ChatCompletionChoice>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ModelInfo {
    pub id: String,
    pub object: &'static str,
    pub created: i64,
    pub owned_by: &'static str,
}

#[derive(Clone, Debug, Serialize)]
pub struct ListModelsResponse {
    pub object: &'static str,
    pub data: Vec<ModelInfo>,
}

// ADK wire types. The backend speaks camelCase multi-part messages.

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AdkInlineData {
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    pub data: String,
}

/// One backend content part. Exactly one of `text` / `inlineData` is set.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AdkPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(rename = "inlineData", default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<AdkInlineData>,
}

impl AdkPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: Some(text.into()), inline_data: None }
    }

    pub fn inline_data(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            text: None,
            inline_data: Some(AdkInlineData { mime_type: mime_type.into(), data: data.into() }),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AdkMessage {
    pub role: String,
    pub parts: Vec<AdkPart>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdkRunRequest {
    pub app_name: String,
    pub user_id: String,
    pub session_id: String,
    pub streaming: bool,
    pub new_message: AdkMessage,
}

impl AdkRunRequest {
    /// Colon-joined registry key identifying this backend conversation context.
    pub fn session_key(&self) -> String {
        format!("{}:{}:{}", self.app_name, self.user_id, self.session_id)
    }
}
