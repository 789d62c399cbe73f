//! API Router configuration

use super::agent_handler::{create_agent, delete_agent, get_agent, list_agents, update_agent};
use super::call_handler::{get_call, initiate_call, list_calls, update_call_status, AppState};
use super::dto::ApiResponse;
use super::media_ws::media_stream_handler;
use super::metrics_handler::metrics_handler;
use super::webhook_handler::{handle_audio_stream, handle_call_event};
use axum::{
    routing::{delete, get, post, put},
    Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the API router
pub fn build_router(state: AppState, prometheus_handle: PrometheusHandle) -> Router {
    // Health check route
    let health_routes = Router::new().route("/health", get(health_check));

    // Call management routes
    let call_routes = Router::new()
        .route("/api/calls", post(initiate_call))
        .route("/api/calls", get(list_calls))
        .route("/api/calls/:id", get(get_call))
        .route("/api/calls/:id/status", put(update_call_status));

    // Agent management routes
    let agent_routes = Router::new()
        .route("/api/agents", post(create_agent))
        .route("/api/agents", get(list_agents))
        .route("/api/agents/:id", get(get_agent))
        .route("/api/agents/:id", put(update_agent))
        .route("/api/agents/:id", delete(delete_agent));

    // Provider webhook routes
    let webhook_routes = Router::new()
        .route(
            "/api/webhooks/call_webhooks/handle_call_event",
            post(handle_call_event),
        )
        .route(
            "/api/webhooks/call_webhooks/handle_audio_stream",
            post(handle_audio_stream),
        );

    // Media stream route
    let media_routes = Router::new().route("/api/media-stream/:call_id", get(media_stream_handler));

    // Metrics route (separate state)
    let metrics_routes = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(prometheus_handle);

    // Combine routes with state
    Router::new()
        .merge(health_routes)
        .merge(call_routes)
        .merge(agent_routes)
        .merge(webhook_routes)
        .merge(media_routes)
        .with_state(state)
        .merge(metrics_routes)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Health check
async fn health_check() -> Json<ApiResponse<String>> {
    Json(ApiResponse::success("ok".to_string()))
}
