//! Streaming reconciliation engine.
//!
//! Consumes the backend's SSE event payloads (cumulative snapshots), applies
//! the content differ per stream, and yields strictly incremental frames. The
//! frame sequence always ends with exactly one `Finish` or `Error`, whether
//! the backend sent its terminator, ended silently, or failed mid-stream.

use futures_util::{Stream, StreamExt};
use uuid::Uuid;

use crate::backend::AdkError;
use crate::bridge::differ::{self, DedupPolicy, DiffOutcome};
use crate::metrics;

/// Literal sentinel the backend sends as its last SSE data payload.
const STREAM_TERMINATOR: &str = "[DONE]";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamFrame {
    /// Incremental content the caller has not seen yet.
    Delta(String),
    /// Backend stream completed; emit the finish chunk and the terminal marker.
    Finish,
    /// Backend stream failed mid-flight; emit an in-band error chunk and the
    /// terminal marker.
    Error(String),
}

/// Per-call reconciliation state. One tracker per streaming call; sharing a
/// tracker across calls leaks content between callers.
pub struct StreamTracker {
    key: String,
    previously_sent: String,
    policy: DedupPolicy,
}

impl StreamTracker {
    pub fn new(policy: DedupPolicy) -> Self {
        // Request-scoped key; wall-clock keys collide for calls started in
        // the same second.
        Self { key: Uuid::new_v4().to_string(), previously_sent: String::new(), policy }
    }

    /// Reduce one cumulative snapshot to the text not yet emitted, updating
    /// the tracker with whatever is returned.
    pub fn apply(&mut self, snapshot: &str) -> Option<String> {
        let outcome = differ::diff(snapshot, &self.previously_sent, self.policy);
        match &outcome {
            DiffOutcome::Reset(_) => {
                metrics::CONTENT_RESETS.inc();
                tracing::warn!(tracker = %self.key, "snapshot reset in stream");
            }
            DiffOutcome::Skip if !self.previously_sent.is_empty() => {
                metrics::FRAGMENTS_DISCARDED.inc();
            }
            _ => {}
        }
        let emission = outcome.into_emission()?;
        if emission.is_empty() {
            return None;
        }
        self.previously_sent.push_str(&emission);
        Some(emission)
    }
}

/// Cumulative text carried by one backend event, if any. Tries
/// `content.parts[].text`, then a flat `text` field, then a flat string-valued
/// `data` field.
fn extract_event_content(event: &serde_json::Value) -> Option<String> {
    if let Some(parts) = event.pointer("/content/parts").and_then(|p| p.as_array()) {
        let mut text = String::new();
        for part in parts {
            if let Some(t) = part.get("text").and_then(|t| t.as_str()) {
                text.push_str(t);
            }
        }
        if !text.is_empty() {
            return Some(text);
        }
    }
    if let Some(t) = event.get("text").and_then(|t| t.as_str()) {
        return Some(t.to_string());
    }
    if let Some(t) = event.get("data").and_then(|t| t.as_str()) {
        return Some(t.to_string());
    }
    None
}

/// Drive the backend event stream and yield caller-facing frames. Events are
/// processed strictly in arrival order; only the reconciliation state is
/// retained, never the event history.
pub fn reconcile<S>(events: S, policy: DedupPolicy) -> impl Stream<Item = StreamFrame>
where
    S: Stream<Item = Result<String, AdkError>>,
{
    async_stream::stream! {
        let mut tracker = StreamTracker::new(policy);
        futures_util::pin_mut!(events);
        while let Some(item) = events.next().await {
            match item {
                Ok(data) => {
                    if data.trim() == STREAM_TERMINATOR {
                        yield StreamFrame::Finish;
                        return;
                    }
                    let event: serde_json::Value = match serde_json::from_str(&data) {
                        Ok(v) => v,
                        Err(e) => {
                            tracing::warn!(error = %e, "skipping unparseable stream event");
                            continue;
                        }
                    };
                    let Some(snapshot) = extract_event_content(&event) else {
                        continue;
                    };
                    if let Some(delta) = tracker.apply(&snapshot) {
                        yield StreamFrame::Delta(delta);
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "backend stream failed mid-flight");
                    yield StreamFrame::Error(e.to_string());
                    return;
                }
            }
        }
        // Backend closed without its terminator; the caller still gets a
        // well-formed ending.
        yield StreamFrame::Finish;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    fn event(text: &str) -> Result<String, AdkError> {
        Ok(serde_json::json!({"content": {"parts": [{"text": text}]}}).to_string())
    }

    async fn run(events: Vec<Result<String, AdkError>>) -> Vec<StreamFrame> {
        reconcile(stream::iter(events), DedupPolicy::OverlapStrip)
            .collect::<Vec<_>>()
            .await
    }

    #[tokio::test]
    async fn cumulative_snapshots_become_deltas() {
        let frames = run(vec![
            event("Hello"),
            event("Hello, world"),
            event("Hello, world!"),
            Ok(STREAM_TERMINATOR.to_string()),
        ])
        .await;
        assert_eq!(
            frames,
            vec![
                StreamFrame::Delta("Hello".into()),
                StreamFrame::Delta(", world".into()),
                StreamFrame::Delta("!".into()),
                StreamFrame::Finish,
            ]
        );
    }

    #[tokio::test]
    async fn exact_repeat_emits_nothing() {
        let frames = run(vec![event("Hello"), event("Hello")]).await;
        assert_eq!(frames, vec![StreamFrame::Delta("Hello".into()), StreamFrame::Finish]);
    }

    #[tokio::test]
    async fn overlap_is_stripped_not_reset() {
        let frames = run(vec![event("The cat sat"), event("sat on the mat")]).await;
        assert_eq!(
            frames,
            vec![
                StreamFrame::Delta("The cat sat".into()),
                StreamFrame::Delta(" on the mat".into()),
                StreamFrame::Finish,
            ]
        );
    }

    #[tokio::test]
    async fn stream_without_terminator_still_finishes() {
        let frames = run(vec![event("Hi")]).await;
        assert_eq!(frames, vec![StreamFrame::Delta("Hi".into()), StreamFrame::Finish]);
    }

    #[tokio::test]
    async fn timeout_after_delta_yields_error_then_stops() {
        let frames = run(vec![event("partial answer"), Err(AdkError::Timeout)]).await;
        assert_eq!(
            frames,
            vec![
                StreamFrame::Delta("partial answer".into()),
                StreamFrame::Error("backend_timeout".into()),
            ]
        );
    }

    #[tokio::test]
    async fn malformed_event_is_skipped_not_fatal() {
        let frames = run(vec![
            event("Hello"),
            Ok("{not json".to_string()),
            event("Hello!"),
        ])
        .await;
        assert_eq!(
            frames,
            vec![
                StreamFrame::Delta("Hello".into()),
                StreamFrame::Delta("!".into()),
                StreamFrame::Finish,
            ]
        );
    }

    #[tokio::test]
    async fn contentless_events_are_ignored() {
        let frames = run(vec![
            Ok(serde_json::json!({"usageMetadata": {"totalTokenCount": 3}}).to_string()),
            event("Hi"),
        ])
        .await;
        assert_eq!(frames, vec![StreamFrame::Delta("Hi".into()), StreamFrame::Finish]);
    }

    #[tokio::test]
    async fn flat_text_and_data_fields_are_fallbacks() {
        let frames = run(vec![
            Ok(serde_json::json!({"text": "one"}).to_string()),
            Ok(serde_json::json!({"data": "one two"}).to_string()),
        ])
        .await;
        assert_eq!(
            frames,
            vec![
                StreamFrame::Delta("one".into()),
                StreamFrame::Delta(" two".into()),
                StreamFrame::Finish,
            ]
        );
    }

    #[tokio::test]
    async fn concatenated_deltas_equal_final_snapshot() {
        let snapshots =
            ["The", "The quick", "The quick brown", "The quick brown fox jumps"];
        let frames = run(snapshots.iter().map(|s| event(s)).collect()).await;
        let joined: String = frames
            .iter()
            .filter_map(|f| match f {
                StreamFrame::Delta(d) => Some(d.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(joined, *snapshots.last().unwrap());
    }

    #[tokio::test]
    async fn reconciliation_is_deterministic() {
        let events = || {
            vec![
                event("a"),
                event("ab"),
                event("ab"),
                event("abc"),
                Ok(STREAM_TERMINATOR.to_string()),
            ]
        };
        assert_eq!(run(events()).await, run(events()).await);
    }

    #[tokio::test]
    async fn reset_emits_full_snapshot() {
        let frames = run(vec![event("first thought"), event("unrelated output")]).await;
        assert_eq!(
            frames,
            vec![
                StreamFrame::Delta("first thought".into()),
                StreamFrame::Delta("unrelated output".into()),
                StreamFrame::Finish,
            ]
        );
    }

    #[tokio::test]
    async fn fragment_policy_discards_short_stale_snapshot() {
        let events = vec![event("a complete long answer here"), event("answer")];
        let frames = reconcile(stream::iter(events), DedupPolicy::FragmentDiscard)
            .collect::<Vec<_>>()
            .await;
        assert_eq!(
            frames,
            vec![
                StreamFrame::Delta("a complete long answer here".into()),
                StreamFrame::Finish,
            ]
        );
    }

    #[test]
    fn trackers_are_call_scoped() {
        let mut a = StreamTracker::new(DedupPolicy::OverlapStrip);
        let mut b = StreamTracker::new(DedupPolicy::OverlapStrip);
        assert_ne!(a.key, b.key);
        assert_eq!(a.apply("Hello").as_deref(), Some("Hello"));
        // A fresh tracker has seen nothing, regardless of other calls.
        assert_eq!(b.apply("Hello").as_deref(), Some("Hello"));
    }
}
