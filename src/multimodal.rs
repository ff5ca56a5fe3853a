use crate::backend::AdkError;
use crate::core::entities::{AdkPart, ContentPart};

/// Converts caller content parts into backend-native parts. Treated as an
/// opaque collaborator by the bridge; implementations may fetch, transcode or
/// extract as they see fit.
#[async_trait::async_trait]
pub trait MultimodalConverter: Send + Sync {
    async fn convert(&self, parts: &[ContentPart]) -> Result<Vec<AdkPart>, AdkError>;
}

/// Converter for payloads that are already inline: text, base64 audio/file
/// data and `data:` URLs. Remote URLs are not fetched here; they are logged
/// and skipped.
pub struct InlineConverter;

fn parse_data_url(url: &str) -> Option<(String, String)> {
    let rest = url.strip_prefix("data:")?;
    let (mime, data) = rest.split_once(";base64,")?;
    if mime.is_empty() {
        return None;
    }
    Some((mime.to_string(), data.to_string()))
}

#[async_trait::async_trait]
impl MultimodalConverter for InlineConverter {
    async fn convert(&self, parts: &[ContentPart]) -> Result<Vec<AdkPart>, AdkError> {
        let mut out = Vec::new();
        for part in parts {
            match part {
                ContentPart::Text { text } => out.push(AdkPart::text(text.clone())),
                ContentPart::ImageUrl { image_url }
                | ContentPart::AudioUrl { audio_url: image_url }
                | ContentPart::VideoUrl { video_url: image_url } => {
                    match parse_data_url(&image_url.url) {
                        Some((mime, data)) => out.push(AdkPart::inline_data(mime, data)),
                        None => {
                            tracing::warn!(url = %image_url.url, "skipping non-inline media URL");
                        }
                    }
                }
                ContentPart::InputAudio { input_audio } => {
                    let mime = format!("audio/{}", input_audio.format);
                    out.push(AdkPart::inline_data(mime, input_audio.data.clone()));
                }
                ContentPart::File { file } => {
                    if let Some(data) = &file.data {
                        let mime = file
                            .mime_type
                            .clone()
                            .unwrap_or_else(|| "application/octet-stream".to_string());
                        out.push(AdkPart::inline_data(mime, data.clone()));
                    } else if let Some((mime, data)) =
                        file.url.as_deref().and_then(parse_data_url)
                    {
                        out.push(AdkPart::inline_data(mime, data));
                    } else {
                        tracing::warn!(
                            filename = file.filename.as_deref().unwrap_or("<unnamed>"),
                            "skipping file part without inline data"
                        );
                    }
                }
            }
        }
        if out.is_empty() {
            return Err(AdkError::InvalidRequest(
                "no convertible content parts in message".into(),
            ));
        }
        Ok(out)
    }
}
