//! Media-stream WebSocket endpoint
//!
//! The provider's `<Stream>` directive opens a WebSocket carrying the same
//! frame JSON as the audio-stream POST endpoint. Inbound frames feed the
//! audio bridge; the agent's audio is streamed back as playAudio events.

use super::call_handler::AppState;
use crate::domain::shared::value_objects::CallId;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::Response,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use futures::{sink::SinkExt, stream::StreamExt};
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// WebSocket upgrade handler
pub async fn media_stream_handler(
    ws: WebSocketUpgrade,
    Path(call_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_media_socket(socket, state, CallId::from_uuid(call_id)))
}

/// Handle one media-stream connection
async fn handle_media_socket(socket: WebSocket, state: AppState, call_id: CallId) {
    let (mut sender, mut receiver) = socket.split();

    info!("Media stream connected for call {}", call_id);

    let outbound = state.bridge.subscribe_outbound(call_id).await;

    // Relay agent audio back to the provider.
    let mut send_task = tokio::spawn(async move {
        let mut outbound = match outbound {
            Some(rx) => rx,
            None => {
                debug!("No live session for call {}; nothing to play", call_id);
                return;
            }
        };

        while let Ok(frame) = outbound.recv().await {
            let event = serde_json::json!({
                "event": "playAudio",
                "media": {"payload": BASE64.encode(&frame)},
            });
            if sender.send(Message::Text(event.to_string())).await.is_err() {
                debug!("Media stream client for call {} disconnected", call_id);
                break;
            }
        }
    });

    // Feed caller audio into the bridge.
    let dispatcher = state.dispatcher.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    let mut payload = match serde_json::from_str::<Value>(&text) {
                        Ok(Value::Object(map)) => map,
                        _ => {
                            debug!("Unparseable media frame for call {}", call_id);
                            continue;
                        }
                    };
                    // Stream frames identify the call through the socket
                    // path, not the payload.
                    payload
                        .entry("call_id".to_string())
                        .or_insert(Value::String(call_id.to_string()));

                    let reply = dispatcher.handle_audio_frame(&payload).await;
                    if let crate::application::WebhookReply::Error { message } = reply {
                        warn!("Media frame rejected for call {}: {}", call_id, message);
                    }
                }
                Message::Close(_) => {
                    info!("Media stream for call {} closed by provider", call_id);
                    break;
                }
                _ => {}
            }
        }
    });

    // Wait for either direction to finish
    tokio::select! {
        _ = (&mut send_task) => {
            recv_task.abort();
        }
        _ = (&mut recv_task) => {
            send_task.abort();
        }
    }

    info!("Media stream disconnected for call {}", call_id);
}
