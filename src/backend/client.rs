use std::time::{Duration, Instant};

use eventsource_stream::Eventsource;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use reqwest::{header, Client};
use serde::Serialize;

use crate::backend::{AdkError, SessionBackend};
use crate::config::Settings;
use crate::core::entities::AdkRunRequest;

/// HTTP client for the ADK backend: run calls, session lifecycle, health.
pub struct AdkClient {
    http: Client,
    base: String,
    session_timeout: Duration,
    health_timeout: Duration,
}

#[derive(Clone, Debug, Serialize)]
pub struct BackendHealth {
    pub healthy: bool,
    pub adk_backend: &'static str,
    pub adk_host: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AdkClient {
    pub fn new(settings: &Settings) -> anyhow::Result<Self> {
        // Long default timeout covers the conversational run calls; session
        // and health calls override it per request.
        let http = Client::builder()
            .timeout(Duration::from_secs(settings.run_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base: settings.adk_host.trim_end_matches('/').to_string(),
            session_timeout: Duration::from_secs(settings.session_timeout_secs),
            health_timeout: Duration::from_secs(settings.health_timeout_secs),
        })
    }

    /// Non-streaming run call. Returns the raw backend JSON (object or array).
    pub async fn run(&self, req: &AdkRunRequest) -> Result<serde_json::Value, AdkError> {
        let url = format!("{}/run", self.base);
        tracing::debug!(%url, session = %req.session_key(), "sending run request");
        let resp = self
            .http
            .post(&url)
            .header(header::CONTENT_TYPE, "application/json")
            .json(req)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(AdkError::from_status(status.as_u16(), text));
        }
        resp.json().await.map_err(|e| AdkError::Malformed(e.to_string()))
    }

    /// Streaming run call. Yields the `data:` payload of each SSE event; the
    /// SSE parser already strips comment and blank lines.
    pub async fn run_sse(
        &self,
        req: &AdkRunRequest,
    ) -> Result<BoxStream<'static, Result<String, AdkError>>, AdkError> {
        let url = format!("{}/run_sse", self.base);
        tracing::debug!(%url, session = %req.session_key(), "opening run_sse stream");
        let resp = self
            .http
            .post(&url)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::ACCEPT, "text/event-stream")
            .json(req)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(AdkError::from_status(status.as_u16(), text));
        }
        let stream = resp.bytes_stream().eventsource().map(|item| match item {
            Ok(event) => Ok(event.data),
            Err(eventsource_stream::EventStreamError::Transport(e)) => Err(AdkError::from(e)),
            Err(e) => Err(AdkError::Malformed(e.to_string())),
        });
        Ok(Box::pin(stream))
    }

    pub async fn create_session(
        &self,
        app_name: &str,
        user_id: &str,
        session_id: &str,
    ) -> Result<u16, AdkError> {
        let url = format!("{}/apps/{}/users/{}/sessions", self.base, app_name, user_id);
        let resp = self
            .http
            .post(&url)
            .timeout(self.session_timeout)
            .json(&serde_json::json!({ "sessionId": session_id }))
            .send()
            .await?;
        Ok(resp.status().as_u16())
    }

    pub async fn delete_session(
        &self,
        app_name: &str,
        user_id: &str,
        session_id: &str,
    ) -> Result<u16, AdkError> {
        let url = format!(
            "{}/apps/{}/users/{}/sessions/{}",
            self.base, app_name, user_id, session_id
        );
        let resp = self.http.delete(&url).timeout(self.session_timeout).send().await?;
        Ok(resp.status().as_u16())
    }

    /// Probe the backend root with a short timeout.
    pub async fn health(&self) -> BackendHealth {
        let start = Instant::now();
        let result = self
            .http
            .get(format!("{}/", self.base))
            .timeout(self.health_timeout)
            .send()
            .await;
        match result {
            Ok(resp) => {
                let status = resp.status().as_u16();
                let latency = start.elapsed().as_millis() as u64;
                if status < 500 {
                    BackendHealth {
                        healthy: true,
                        adk_backend: "healthy",
                        adk_host: self.base.clone(),
                        latency_ms: Some(latency),
                        status_code: Some(status),
                        error: None,
                    }
                } else {
                    BackendHealth {
                        healthy: false,
                        adk_backend: "unhealthy",
                        adk_host: self.base.clone(),
                        latency_ms: Some(latency),
                        status_code: Some(status),
                        error: Some(format!("HTTP {status}")),
                    }
                }
            }
            Err(e) => {
                let state = if e.is_timeout() { "timeout" } else { "unreachable" };
                BackendHealth {
                    healthy: false,
                    adk_backend: state,
                    adk_host: self.base.clone(),
                    latency_ms: None,
                    status_code: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl SessionBackend for AdkClient {
    async fn create_session(
        &self,
        app_name: &str,
        user_id: &str,
        session_id: &str,
    ) -> Result<bool, AdkError> {
        let status = AdkClient::create_session(self, app_name, user_id, session_id).await?;
        // 409 means the session already exists on the backend side.
        Ok(matches!(status, 200 | 201 | 409))
    }

    async fn delete_session(
        &self,
        app_name: &str,
        user_id: &str,
        session_id: &str,
    ) -> Result<bool, AdkError> {
        let status = AdkClient::delete_session(self, app_name, user_id, session_id).await?;
        Ok(matches!(status, 200 | 204 | 404))
    }
}
