use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::config::Settings;

#[derive(thiserror::Error, Debug)]
pub enum AuthError {
    #[error("You didn't provide an API key. Pass it in an Authorization header using Bearer auth.")]
    Missing,
    #[error("Invalid API key provided.")]
    Invalid,
}

/// Check the caller's Bearer key against the configured key list.
/// When `require_api_key` is off every request passes.
pub fn verify_api_key(headers: &HeaderMap, settings: &Settings) -> Result<(), AuthError> {
    if !settings.require_api_key {
        return Ok(());
    }
    let bearer = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .ok_or(AuthError::Missing)?;
    if settings.api_keys.iter().any(|k| k == bearer) {
        Ok(())
    } else {
        tracing::warn!("invalid API key presented");
        Err(AuthError::Invalid)
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let code = match self {
            AuthError::Missing => "missing_api_key",
            AuthError::Invalid => "invalid_api_key",
        };
        let body = serde_json::json!({
            "error": {
                "message": self.to_string(),
                "type": "invalid_request_error",
                "code": code
            }
        });
        (StatusCode::UNAUTHORIZED, Json(body)).into_response()
    }
}
