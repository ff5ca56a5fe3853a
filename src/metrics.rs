use axum::response::IntoResponse;
use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, register_int_gauge,
    Encoder, HistogramVec, IntCounter, IntCounterVec, IntGauge, TextEncoder,
};

lazy_static! {
    /// Total number of chat completion requests processed
    pub static ref REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "adk_bridge_requests_total",
        "Total number of chat completion requests processed",
        &["model", "stream", "status"]
    )
    .unwrap();

    /// Request duration in seconds
    pub static ref REQUEST_DURATION: HistogramVec = register_histogram_vec!(
        "adk_bridge_request_duration_seconds",
        "Request duration in seconds",
        &["model", "stream"],
        vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]
    )
    .unwrap();

    /// Output size in characters (token-ish sizing; no tokenizer for backend models)
    pub static ref OUTPUT_CHARS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "adk_bridge_output_chars_total",
        "Total characters of reconciled output handed to callers",
        &["model"]
    )
    .unwrap();

    /// Cumulative-snapshot resets observed by the content differ
    pub static ref CONTENT_RESETS: IntCounter = register_int_counter!(
        "adk_bridge_content_resets_total",
        "Total number of content resets detected during stream reconciliation"
    )
    .unwrap();

    /// Stale/fragment events discarded during stream reconciliation
    pub static ref FRAGMENTS_DISCARDED: IntCounter = register_int_counter!(
        "adk_bridge_fragments_discarded_total",
        "Total number of stale or fragment events discarded during stream reconciliation"
    )
    .unwrap();

    /// Number of streaming calls currently in flight
    pub static ref ACTIVE_STREAMS: IntGauge =
        register_int_gauge!("adk_bridge_active_streams", "Number of streaming calls in flight")
            .unwrap();
}

/// Export metrics in Prometheus text format
pub fn export_metrics() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Metrics handler for /metrics endpoint
pub async fn metrics_handler() -> axum::response::Response {
    match export_metrics() {
        Ok(metrics) => (
            axum::http::StatusCode::OK,
            [(
                axum::http::header::CONTENT_TYPE,
                "text/plain; version=0.0.4",
            )],
            metrics,
        )
            .into_response(),
        Err(e) => (
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to export metrics: {}", e),
        )
            .into_response(),
    }
}
