//! OpenAI Realtime API connector
//!
//! Opens one WebSocket session per call, configures it with the agent's
//! instructions, and pumps audio both ways until the call ends. Audio is
//! exchanged in the provider's G.711 u-law framing so no transcoding
//! happens in this process.

use super::{RealtimeChannel, RealtimeConnector, RealtimeEvent};
use crate::config::RealtimeConfig;
use crate::domain::shared::error::DomainError;
use crate::domain::shared::result::Result;
use crate::domain::shared::value_objects::CallId;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use serde_json::json;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::Message;
use tracing::{debug, info, warn};

const REALTIME_MODEL: &str = "gpt-4o-realtime-preview";
const CHANNEL_CAPACITY: usize = 64;

/// Connector for the OpenAI Realtime API
pub struct OpenAiRealtimeConnector {
    config: RealtimeConfig,
}

impl OpenAiRealtimeConnector {
    pub fn new(config: RealtimeConfig) -> Self {
        Self { config }
    }

    fn session_url(&self) -> String {
        if self.config.endpoint.contains("model=") {
            self.config.endpoint.clone()
        } else {
            format!("{}?model={}", self.config.endpoint, REALTIME_MODEL)
        }
    }
}

#[async_trait::async_trait]
impl RealtimeConnector for OpenAiRealtimeConnector {
    async fn connect(
        &self,
        call_id: CallId,
        instructions: String,
        voice: Option<String>,
    ) -> Result<RealtimeChannel> {
        let api_key = self.config.api_key.as_ref().ok_or_else(|| {
            DomainError::Processing("OpenAI API key not configured".to_string())
        })?;

        let mut request = self
            .session_url()
            .into_client_request()
            .map_err(|e| DomainError::Processing(format!("Invalid realtime endpoint: {}", e)))?;

        let auth_value = HeaderValue::from_str(&format!("Bearer {}", api_key))
            .map_err(|e| DomainError::Processing(format!("Invalid API key: {}", e)))?;
        request.headers_mut().insert("Authorization", auth_value);
        request
            .headers_mut()
            .insert("OpenAI-Beta", HeaderValue::from_static("realtime=v1"));

        let (ws_stream, _) = connect_async(request)
            .await
            .map_err(|e| DomainError::Processing(format!("Realtime connect failed: {}", e)))?;

        info!("Realtime session connected for call {}", call_id);

        let (mut sink, mut stream) = ws_stream.split();

        // Configure the session before any audio flows.
        let session_update = json!({
            "type": "session.update",
            "session": {
                "modalities": ["text", "audio"],
                "instructions": instructions,
                "voice": voice.unwrap_or_else(|| "alloy".to_string()),
                "input_audio_format": "g711_ulaw",
                "output_audio_format": "g711_ulaw",
            }
        });
        sink.send(Message::Text(session_update.to_string()))
            .await
            .map_err(|e| DomainError::Processing(format!("Realtime handshake failed: {}", e)))?;

        let (audio_tx, mut audio_rx) = mpsc::channel::<Bytes>(CHANNEL_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel::<RealtimeEvent>(CHANNEL_CAPACITY);
        let (close_tx, mut close_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut close_rx => {
                        debug!("Realtime session for call {} closing", call_id);
                        let _ = sink.send(Message::Close(None)).await;
                        break;
                    }
                    frame = audio_rx.recv() => match frame {
                        Some(frame) => {
                            let append = json!({
                                "type": "input_audio_buffer.append",
                                "audio": BASE64.encode(&frame),
                            });
                            if sink.send(Message::Text(append.to_string())).await.is_err() {
                                let _ = event_tx.send(RealtimeEvent::Closed).await;
                                break;
                            }
                        }
                        None => {
                            let _ = sink.send(Message::Close(None)).await;
                            break;
                        }
                    },
                    message = stream.next() => match message {
                        Some(Ok(Message::Text(text))) => {
                            handle_server_event(call_id, &text, &event_tx).await;
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            let _ = event_tx.send(RealtimeEvent::Closed).await;
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            warn!("Realtime session error for call {}: {}", call_id, e);
                            let _ = event_tx.send(RealtimeEvent::Closed).await;
                            break;
                        }
                    }
                }
            }
            debug!("Realtime session task for call {} finished", call_id);
        });

        Ok(RealtimeChannel {
            audio_tx,
            event_rx,
            close_tx,
        })
    }
}

async fn handle_server_event(
    call_id: CallId,
    text: &str,
    event_tx: &mpsc::Sender<RealtimeEvent>,
) {
    let event: serde_json::Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            warn!("Unparseable realtime event for call {}: {}", call_id, e);
            return;
        }
    };

    match event.get("type").and_then(|t| t.as_str()) {
        Some("response.audio.delta") => {
            if let Some(delta) = event.get("delta").and_then(|d| d.as_str()) {
                match BASE64.decode(delta) {
                    Ok(audio) => {
                        let _ = event_tx.send(RealtimeEvent::Audio(Bytes::from(audio))).await;
                    }
                    Err(e) => warn!("Bad audio delta for call {}: {}", call_id, e),
                }
            }
        }
        Some("response.audio_transcript.done") => {
            if let Some(transcript) = event.get("transcript").and_then(|t| t.as_str()) {
                let _ = event_tx
                    .send(RealtimeEvent::Transcript(transcript.to_string()))
                    .await;
            }
        }
        Some("error") => {
            warn!("Realtime backend error for call {}: {}", call_id, event);
        }
        _ => {}
    }
}
