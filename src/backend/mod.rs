use thiserror::Error;

pub mod client;

pub use client::{AdkClient, BackendHealth};

#[derive(Error, Debug)]
pub enum AdkError {
    #[error("invalid_request: {0}")]
    InvalidRequest(String),
    #[error("backend_timeout")]
    Timeout,
    #[error("backend_unavailable: {0}")]
    Unavailable(String),
    #[error("backend_rejected ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("backend_fault ({status}): {message}")]
    Fault { status: u16, message: String },
    #[error("malformed_payload: {0}")]
    Malformed(String),
}

impl AdkError {
    pub fn from_status(status: u16, message: String) -> Self {
        if status >= 500 {
            AdkError::Fault { status, message }
        } else {
            AdkError::Rejected { status, message }
        }
    }

    /// Heuristic: a run call failing with 400 or any 5xx may indicate a
    /// corrupted backend session that a delete/recreate cycle can repair.
    pub fn is_session_corruption(&self) -> bool {
        match self {
            AdkError::Rejected { status, .. } => *status == 400,
            AdkError::Fault { .. } => true,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for AdkError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AdkError::Timeout
        } else {
            AdkError::Unavailable(e.to_string())
        }
    }
}

impl axum::response::IntoResponse for AdkError {
    fn into_response(self) -> axum::response::Response {
        use axum::{http::StatusCode, Json};
        let (code, kind) = match &self {
            AdkError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request_error"),
            AdkError::Timeout => (StatusCode::GATEWAY_TIMEOUT, "backend_timeout"),
            AdkError::Unavailable(_) => (StatusCode::BAD_GATEWAY, "backend_unavailable"),
            AdkError::Rejected { .. } => (StatusCode::BAD_REQUEST, "backend_rejected"),
            AdkError::Fault { .. } => (StatusCode::BAD_GATEWAY, "backend_fault"),
            AdkError::Malformed(_) => (StatusCode::BAD_GATEWAY, "malformed_payload"),
        };
        let body = serde_json::json!({
            "error": {
                "message": self.to_string(),
                "type": kind
            }
        });
        (code, Json(body)).into_response()
    }
}

/// Session provisioning calls the registry needs from the backend.
/// `Ok(true)` means the outcome counts as settled (created / already exists,
/// deleted / not found); `Ok(false)` means the backend refused; `Err` is a
/// transport failure.
#[async_trait::async_trait]
pub trait SessionBackend: Send + Sync {
    async fn create_session(
        &self,
        app_name: &str,
        user_id: &str,
        session_id: &str,
    ) -> Result<bool, AdkError>;

    async fn delete_session(
        &self,
        app_name: &str,
        user_id: &str,
        session_id: &str,
    ) -> Result<bool, AdkError>;
}
