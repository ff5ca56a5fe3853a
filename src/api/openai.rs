use std::convert::Infallible;
use std::time::Instant;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures_util::StreamExt;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::api::openai_adapter;
use crate::auth;
use crate::bridge::{self, DedupPolicy, StreamFrame};
use crate::core::entities::{
    AdkRunRequest, ChatCompletionRequest, ListModelsResponse, ModelInfo,
};
use crate::history::TurnRecord;
use crate::metrics;
use crate::routing::AppState;

/// `X-Session-ID` / `X-User-ID` headers override the request's `user` field
/// so one caller can hold several independent conversations. Without any
/// identity, each request gets a throwaway session.
fn apply_session_overrides(request: &mut ChatCompletionRequest, headers: &HeaderMap) {
    let header_str =
        |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(String::from);
    if let Some(session) = header_str("x-session-id") {
        request.user = Some(session);
    } else if let Some(user) = header_str("x-user-id") {
        request.user = Some(user);
    } else if request.user.is_none() {
        let temp = format!("temp_{}", &Uuid::new_v4().simple().to_string()[..8]);
        tracing::debug!(user = %temp, "no caller identity, using throwaway session");
        request.user = Some(temp);
    }
}

fn record_outcome(model: &str, stream: bool, status: &str, started: Instant) {
    let stream_label = if stream { "true" } else { "false" };
    metrics::REQUESTS_TOTAL.with_label_values(&[model, stream_label, status]).inc();
    metrics::REQUEST_DURATION
        .with_label_values(&[model, stream_label])
        .observe(started.elapsed().as_secs_f64());
}

/// Holds the active-stream gauge up for the lifetime of one SSE response, so
/// it is released even when the caller disconnects mid-flight.
struct StreamGuard;

impl StreamGuard {
    fn new() -> Self {
        metrics::ACTIVE_STREAMS.inc();
        StreamGuard
    }
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        metrics::ACTIVE_STREAMS.dec();
    }
}

pub async fn chat_completions(
    State(app): State<AppState>,
    headers: HeaderMap,
    Json(mut request): Json<ChatCompletionRequest>,
) -> Response {
    if let Err(e) = auth::verify_api_key(&headers, &app.settings) {
        return e.into_response();
    }
    apply_session_overrides(&mut request, &headers);

    let model_name = request.model.clone();
    let started = Instant::now();

    let adk_request = match bridge::request::to_adk_request(
        &request,
        &app.settings.app_name,
        app.converter.as_ref(),
    )
    .await
    {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(error = %e, "rejecting chat completion request");
            record_outcome(&model_name, request.stream, "invalid", started);
            return e.into_response();
        }
    };

    app.registry
        .ensure(&adk_request.app_name, &adk_request.user_id, &adk_request.session_id)
        .await;

    if request.stream {
        stream_completion(app, adk_request, model_name, started).await
    } else {
        blocking_completion(app, adk_request, model_name, started).await
    }
}

async fn blocking_completion(
    app: AppState,
    adk_request: AdkRunRequest,
    model_name: String,
    started: Instant,
) -> Response {
    match app.client.run(&adk_request).await {
        Ok(value) => {
            let response = bridge::response::to_chat_response(&value, &model_name);
            let content = response.choices[0].message.content.clone();
            metrics::OUTPUT_CHARS_TOTAL
                .with_label_values(&[model_name.as_str()])
                .inc_by(content.chars().count() as u64);
            record_outcome(&model_name, false, "success", started);
            app.history
                .record_turn(TurnRecord {
                    session_id: adk_request.session_id.clone(),
                    user_id: adk_request.user_id.clone(),
                    role: "assistant",
                    content,
                    request_id: response.id.clone(),
                    model: model_name,
                    latency_ms: started.elapsed().as_millis() as u64,
                })
                .await;
            Json(response).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, session = %adk_request.session_key(), "run call failed");
            if e.is_session_corruption() {
                app.registry
                    .reset(&adk_request.app_name, &adk_request.user_id, &adk_request.session_id)
                    .await;
            }
            record_outcome(&model_name, false, "error", started);
            e.into_response()
        }
    }
}

async fn stream_completion(
    app: AppState,
    mut adk_request: AdkRunRequest,
    model_name: String,
    started: Instant,
) -> Response {
    adk_request.streaming = true;

    let events = match app.client.run_sse(&adk_request).await {
        Ok(s) => s,
        Err(e) => {
            // The stream is not committed yet, so an out-of-band error is
            // still possible here.
            tracing::error!(error = %e, session = %adk_request.session_key(), "run_sse call failed");
            if e.is_session_corruption() {
                app.registry
                    .reset(&adk_request.app_name, &adk_request.user_id, &adk_request.session_id)
                    .await;
            }
            record_outcome(&model_name, true, "error", started);
            return e.into_response();
        }
    };

    let chat_id = openai_adapter::new_chat_id();
    let frames = bridge::reconcile(events, DedupPolicy::OverlapStrip);

    let sse = async_stream::stream! {
        let _guard = StreamGuard::new();
        futures_util::pin_mut!(frames);
        let mut final_text = String::new();
        let mut status = "success";
        while let Some(frame) = frames.next().await {
            match frame {
                StreamFrame::Delta(delta) => {
                    final_text.push_str(&delta);
                    let data = openai_adapter::delta_chunk(&chat_id, &model_name, &delta);
                    yield Ok::<Event, Infallible>(Event::default().data(data.to_string()));
                }
                StreamFrame::Finish => {
                    let data = openai_adapter::finish_chunk(&chat_id, &model_name);
                    yield Ok(Event::default().data(data.to_string()));
                    yield Ok(Event::default().data("[DONE]"));
                    break;
                }
                StreamFrame::Error(message) => {
                    status = "error";
                    let data = openai_adapter::error_chunk(&model_name, &message);
                    yield Ok(Event::default().data(data.to_string()));
                    yield Ok(Event::default().data("[DONE]"));
                    break;
                }
            }
        }
        metrics::OUTPUT_CHARS_TOTAL
            .with_label_values(&[model_name.as_str()])
            .inc_by(final_text.chars().count() as u64);
        record_outcome(&model_name, true, status, started);
        if status == "success" {
            app.history
                .record_turn(TurnRecord {
                    session_id: adk_request.session_id.clone(),
                    user_id: adk_request.user_id.clone(),
                    role: "assistant",
                    content: final_text,
                    request_id: chat_id.clone(),
                    model: model_name.clone(),
                    latency_ms: started.elapsed().as_millis() as u64,
                })
                .await;
        }
    };

    Sse::new(sse).into_response()
}

pub async fn list_models(State(app): State<AppState>, headers: HeaderMap) -> Response {
    if let Err(e) = auth::verify_api_key(&headers, &app.settings) {
        return e.into_response();
    }
    let body = ListModelsResponse {
        object: "list",
        data: vec![ModelInfo {
            id: app.settings.app_name.clone(),
            object: "model",
            created: OffsetDateTime::now_utc().unix_timestamp(),
            owned_by: "adk",
        }],
    };
    Json(body).into_response()
}

pub async fn health(State(app): State<AppState>) -> Response {
    let backend = app.client.health().await;
    let body = serde_json::json!({
        "status": if backend.healthy { "ok" } else { "degraded" },
        "backend": backend,
    });
    Json(body).into_response()
}

pub async fn list_sessions(State(app): State<AppState>, headers: HeaderMap) -> Response {
    if let Err(e) = auth::verify_api_key(&headers, &app.settings) {
        return e.into_response();
    }
    let sessions = app.registry.list_cached().await;
    Json(serde_json::json!({ "sessions": sessions })).into_response()
}

pub async fn delete_session(
    State(app): State<AppState>,
    headers: HeaderMap,
    Path((app_name, user_id, session_id)): Path<(String, String, String)>,
) -> Response {
    if let Err(e) = auth::verify_api_key(&headers, &app.settings) {
        return e.into_response();
    }
    let success = app.registry.delete(&app_name, &user_id, &session_id).await;
    Json(serde_json::json!({
        "success": success,
        "app_name": app_name,
        "user_id": user_id,
        "session_id": session_id,
    }))
    .into_response()
}

pub async fn reset_session(
    State(app): State<AppState>,
    headers: HeaderMap,
    Path((app_name, user_id, session_id)): Path<(String, String, String)>,
) -> Response {
    if let Err(e) = auth::verify_api_key(&headers, &app.settings) {
        return e.into_response();
    }
    app.registry.reset(&app_name, &user_id, &session_id).await;
    Json(serde_json::json!({
        "success": true,
        "action": "reset",
        "app_name": app_name,
        "user_id": user_id,
        "session_id": session_id,
    }))
    .into_response()
}
