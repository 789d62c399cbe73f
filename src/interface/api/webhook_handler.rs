//! Provider-facing webhook endpoints
//!
//! These endpoints always answer HTTP 200 with a structured JSON body;
//! a 5xx would trigger the provider's retry storm. The call-event body
//! may be JSON or form-encoded and is merged with the query string, the
//! query carrying the correlation ids embedded in the callback URLs.

use super::call_handler::AppState;
use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use bytes::Bytes;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::debug;

/// Handle a call-lifecycle webhook from the provider
pub async fn handle_call_event(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Json<Value> {
    let mut payload = parse_loose_body(&body);

    // Body fields take precedence over the echoed query string.
    for (key, value) in query {
        payload.entry(key).or_insert(Value::String(value));
    }

    let headers = lowercase_headers(&headers);
    let reply = state
        .dispatcher
        .handle_call_event(&body, &payload, &headers)
        .await;

    Json(reply.to_json())
}

/// Handle one media-stream audio frame
pub async fn handle_audio_stream(
    State(state): State<AppState>,
    body: Bytes,
) -> Json<Value> {
    let payload = parse_loose_body(&body);
    let reply = state.dispatcher.handle_audio_frame(&payload).await;
    Json(reply.to_json())
}

/// Parse an arbitrary provider body into a loose key/value map
///
/// JSON objects pass through; form-encoded bodies are lifted into string
/// values; anything else becomes an empty map (correlation may still
/// succeed via the query string).
fn parse_loose_body(body: &[u8]) -> Map<String, Value> {
    if body.is_empty() {
        return Map::new();
    }

    if let Ok(Value::Object(map)) = serde_json::from_slice::<Value>(body) {
        return map;
    }

    let text = match std::str::from_utf8(body) {
        Ok(text) => text,
        Err(e) => {
            debug!("Non-UTF-8 webhook body: {}", e);
            return Map::new();
        }
    };

    match serde_urlencoded::from_str::<Vec<(String, String)>>(text) {
        Ok(pairs) => pairs
            .into_iter()
            .map(|(key, value)| (key, Value::String(value)))
            .collect(),
        Err(e) => {
            debug!("Unparseable webhook body: {}", e);
            Map::new()
        }
    }
}

fn lowercase_headers(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_ascii_lowercase(), value.to_string()))
        })
        .collect()
}
