//! Prometheus metrics handler

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Initialize the Prometheus metrics exporter
pub fn init_metrics() -> PrometheusHandle {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus recorder");

    describe_counter!(
        "calls_initiated_total",
        "Total number of outbound calls initiated"
    );
    describe_counter!(
        "calls_completed_total",
        "Total number of calls that completed normally"
    );
    describe_counter!(
        "calls_failed_total",
        "Total number of calls that failed"
    );
    describe_counter!(
        "webhook_events_total",
        "Total number of provider webhook deliveries received"
    );
    describe_counter!(
        "audio_frames_total",
        "Total number of inbound audio frames relayed"
    );
    describe_gauge!(
        "bridge_active_sessions",
        "Number of live realtime AI sessions"
    );

    handle
}

/// HTTP metrics handler
pub async fn metrics_handler(
    axum::extract::State(prometheus_handle): axum::extract::State<PrometheusHandle>,
) -> Response {
    let metrics = prometheus_handle.render();
    (StatusCode::OK, metrics).into_response()
}
