//! Webhook dispatcher
//!
//! Receives provider callbacks, resolves them to a call/agent pair,
//! classifies the event, and drives the state machine. Every outcome,
//! including failure, becomes a well-formed JSON reply: the provider must
//! always get HTTP 200 or it will retry and pile up duplicate deliveries.

use crate::application::bridge::{AudioBridge, SESSION_ERROR_KEY};
use crate::application::locks::CallLocks;
use crate::domain::agent::{Agent, AgentRepository};
use crate::domain::call::event::{string_field, WebhookEvent};
use crate::domain::call::record::{CallRecord, Transition};
use crate::domain::call::repository::CallRecordRepository;
use crate::domain::call::status::CallStatus;
use crate::domain::shared::error::DomainError;
use crate::domain::shared::result::Result;
use crate::domain::shared::value_objects::{AgentId, CallId};
use crate::infrastructure::telephony::signature::{self, NONCE_HEADER, SIGNATURE_HEADER};
use crate::infrastructure::telephony::StreamDirective;
use metrics::counter;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Reply returned to the provider, always serialized with HTTP 200
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookReply {
    /// Streaming directive for an answered call
    Stream { content: String },
    /// Event acknowledged (acted on or deliberately ignored)
    Ack,
    /// Audio frame accepted
    AudioProcessed,
    /// Structured error; nothing was mutated unless stated otherwise
    Error { message: String },
}

impl WebhookReply {
    pub fn error(message: impl Into<String>) -> Self {
        WebhookReply::Error {
            message: message.into(),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            WebhookReply::Stream { content } => json!({
                "content": content,
                "content_type": "application/xml",
            }),
            WebhookReply::Ack => json!({
                "status": "success",
                "message": "Event processed",
            }),
            WebhookReply::AudioProcessed => json!({
                "status": "audio_processed",
            }),
            WebhookReply::Error { message } => json!({
                "error": message,
            }),
        }
    }
}

/// Dispatches provider webhooks into state-machine transitions
pub struct WebhookDispatcher {
    calls: Arc<dyn CallRecordRepository>,
    agents: Arc<dyn AgentRepository>,
    locks: Arc<CallLocks>,
    bridge: Arc<AudioBridge>,
    /// Webhook deliveries are signature-checked when this is configured
    auth_token: Option<String>,
}

impl WebhookDispatcher {
    pub fn new(
        calls: Arc<dyn CallRecordRepository>,
        agents: Arc<dyn AgentRepository>,
        locks: Arc<CallLocks>,
        bridge: Arc<AudioBridge>,
        auth_token: Option<String>,
    ) -> Self {
        Self {
            calls,
            agents,
            locks,
            bridge,
            auth_token,
        }
    }

    /// Handle a call-lifecycle webhook
    ///
    /// `body` is the merged query-string + body payload; `headers` carry
    /// lowercased header names. `raw_body` is the unparsed body used for
    /// signature verification.
    pub async fn handle_call_event(
        &self,
        raw_body: &[u8],
        body: &Map<String, Value>,
        headers: &HashMap<String, String>,
    ) -> WebhookReply {
        counter!("webhook_events_total").increment(1);

        if let Some(reply) = self.check_signature(raw_body, headers) {
            return reply;
        }

        match self.dispatch_call_event(body, headers).await {
            Ok(reply) => reply,
            // Correlation and lookup failures reply with their bare message
            // ("Call ID not provided", "Call record not found", ...).
            Err(DomainError::Correlation(message))
            | Err(DomainError::NotFound(message))
            | Err(DomainError::Validation(message)) => WebhookReply::error(message),
            Err(e) => {
                warn!("Webhook processing failed: {}", e);
                WebhookReply::error(format!("Failed to process webhook: {}", e))
            }
        }
    }

    /// Handle one media-stream audio frame
    pub async fn handle_audio_frame(&self, body: &Map<String, Value>) -> WebhookReply {
        let payload = body
            .get("media")
            .and_then(|media| media.get("payload"))
            .and_then(|payload| payload.as_str());
        let call_id = string_field(body, "call_id");

        let (payload, call_id) = match (payload, call_id) {
            (Some(payload), Some(call_id)) => (payload, call_id),
            // Keep-alive and marker events carry no audio; acknowledge them.
            _ => return WebhookReply::AudioProcessed,
        };

        let call_id: CallId = match call_id.parse() {
            Ok(id) => id,
            Err(_) => return WebhookReply::error("Call record not found"),
        };

        let sequence = body
            .get("sequenceNumber")
            .and_then(|value| value.as_u64())
            .or_else(|| {
                body.get("sequenceNumber")
                    .and_then(|value| value.as_str())
                    .and_then(|value| value.parse().ok())
            })
            .unwrap_or(0);

        match self.bridge.handle_frame(call_id, payload, sequence).await {
            Ok(()) => WebhookReply::AudioProcessed,
            Err(DomainError::NotFound(message)) => WebhookReply::error(message),
            Err(e) => {
                warn!("Audio frame processing failed for call {}: {}", call_id, e);
                WebhookReply::error(format!("Audio processing failed: {}", e))
            }
        }
    }

    fn check_signature(
        &self,
        raw_body: &[u8],
        headers: &HashMap<String, String>,
    ) -> Option<WebhookReply> {
        let token = self.auth_token.as_ref()?;
        let provided = headers.get(SIGNATURE_HEADER)?;
        let nonce = match headers.get(NONCE_HEADER) {
            Some(nonce) => nonce,
            None => return Some(WebhookReply::error("invalid webhook signature")),
        };

        if signature::verify(token, nonce, raw_body, provided) {
            None
        } else {
            warn!("Webhook signature verification failed");
            Some(WebhookReply::error("invalid webhook signature"))
        }
    }

    async fn dispatch_call_event(
        &self,
        body: &Map<String, Value>,
        headers: &HashMap<String, String>,
    ) -> Result<WebhookReply> {
        let call_id = field_or_header(body, headers, "call_id")
            .ok_or_else(|| DomainError::Correlation("Call ID not provided".to_string()))?;
        let call_id: CallId = call_id
            .parse()
            .map_err(|_| DomainError::NotFound("Call record not found".to_string()))?;

        let record = self
            .calls
            .find_by_id(call_id)
            .await?
            .ok_or_else(|| DomainError::NotFound("Call record not found".to_string()))?;

        let event = WebhookEvent::classify(body);
        match event {
            WebhookEvent::Answered => {
                // Only the answer path needs the agent: its prompt
                // parameterizes the streaming directive.
                let agent_id = field_or_header(body, headers, "agent_id")
                    .ok_or_else(|| DomainError::Correlation("Agent ID not provided".to_string()))?;
                let agent_id: AgentId = agent_id
                    .parse()
                    .map_err(|_| DomainError::NotFound("Agent not found".to_string()))?;
                let agent = self
                    .agents
                    .find_by_id(agent_id)
                    .await?
                    .ok_or_else(|| DomainError::NotFound("Agent not found".to_string()))?;

                self.handle_answered(record, agent).await
            }
            WebhookEvent::Hangup => self.handle_terminal(record, CallStatus::Completed, None).await,
            WebhookEvent::Failed { cause } => {
                self.handle_terminal(record, CallStatus::Failed, Some(cause))
                    .await
            }
            WebhookEvent::Unknown => {
                info!("Ignoring unrecognized webhook event for call {}", call_id);
                Ok(WebhookReply::Ack)
            }
        }
    }

    async fn handle_answered(&self, record: CallRecord, agent: Agent) -> Result<WebhookReply> {
        let guard = self.locks.acquire(record.id).await;
        let mut current = self
            .calls
            .find_by_id(record.id)
            .await?
            .unwrap_or(record);

        if current.is_terminal() {
            // Late or retried answer for a call that already ended; never
            // restart streaming.
            drop(guard);
            return Ok(WebhookReply::Ack);
        }

        if current.call_status != CallStatus::Answered {
            current.answer()?;
            self.calls.save(&current).await?;
            info!("Call {} answered", current.id);
        }

        if let Err(e) = self.bridge.open(&current, &agent).await {
            // The PSTN leg is live; record the failure but keep the call.
            warn!("Realtime session setup failed for call {}: {}", current.id, e);
            let mut updates = Map::new();
            updates.insert(SESSION_ERROR_KEY.to_string(), Value::from(e.to_string()));
            current.merge_metadata(updates);
            self.calls.save(&current).await?;
        }
        drop(guard);

        let directive = StreamDirective::new(&agent.prompt, current.id);
        Ok(WebhookReply::Stream {
            content: directive.to_xml(),
        })
    }

    async fn handle_terminal(
        &self,
        record: CallRecord,
        status: CallStatus,
        cause: Option<String>,
    ) -> Result<WebhookReply> {
        let guard = self.locks.acquire(record.id).await;
        let mut current = self
            .calls
            .find_by_id(record.id)
            .await?
            .unwrap_or(record);

        let outcome = match status {
            CallStatus::Failed => {
                current.fail(cause.unwrap_or_else(|| "Unknown error".to_string()))
            }
            _ => current.complete(),
        };

        match outcome {
            Ok(Transition::Applied) => {
                self.calls.save(&current).await?;
                match status {
                    CallStatus::Failed => counter!("calls_failed_total").increment(1),
                    _ => counter!("calls_completed_total").increment(1),
                }
                info!("Call {} reached {}", current.id, current.call_status);
            }
            Ok(Transition::Ignored) => {
                info!("Duplicate {} webhook for call {} ignored", status, current.id);
            }
            Err(e) => {
                // Cross-terminal deliveries (completed after failed and the
                // reverse) are absorbed; the first terminal state wins.
                info!("Terminal webhook for call {} not applied: {}", current.id, e);
            }
        }
        drop(guard);

        self.bridge.close(current.id).await;
        self.locks.release(current.id).await;

        Ok(WebhookReply::Ack)
    }
}

fn field_or_header(
    body: &Map<String, Value>,
    headers: &HashMap<String, String>,
    key: &str,
) -> Option<String> {
    string_field(body, key).or_else(|| headers.get(key).cloned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::agent::CreateAgent;
    use crate::infrastructure::persistence::memory::{
        InMemoryAgentRepository, InMemoryCallRecordRepository,
    };
    use crate::infrastructure::realtime::{MockRealtimeConnector, RealtimeChannel};
    use tokio::sync::{mpsc, oneshot};

    struct Harness {
        dispatcher: WebhookDispatcher,
        calls: Arc<InMemoryCallRecordRepository>,
        agent: Agent,
        record: CallRecord,
    }

    async fn setup(auth_token: Option<String>) -> Harness {
        let calls = Arc::new(InMemoryCallRecordRepository::new());
        let agents = Arc::new(InMemoryAgentRepository::new());
        let locks = Arc::new(CallLocks::new());

        let agent = Agent::new(CreateAgent {
            name: "Ava".to_string(),
            prompt: "You are a scheduling assistant.".to_string(),
            voice_settings: None,
            personality_settings: None,
        });
        agents.create(&agent).await.unwrap();

        let mut record = CallRecord::new(
            agent.id,
            "+15551234567".to_string(),
            "+15559876543".to_string(),
        );
        record.accept("R1".to_string()).unwrap();
        calls.save(&record).await.unwrap();

        let mut connector = MockRealtimeConnector::new();
        connector.expect_connect().returning(|_, _, _| {
            let (audio_tx, mut audio_rx) = mpsc::channel(8);
            let (_event_tx, event_rx) = mpsc::channel(8);
            let (close_tx, _close_rx) = oneshot::channel();
            tokio::spawn(async move { while audio_rx.recv().await.is_some() {} });
            Ok(RealtimeChannel {
                audio_tx,
                event_rx,
                close_tx,
            })
        });

        let bridge = Arc::new(AudioBridge::new(
            Arc::new(connector),
            calls.clone(),
            locks.clone(),
        ));

        let dispatcher = WebhookDispatcher::new(
            calls.clone(),
            agents,
            locks,
            bridge,
            auth_token,
        );

        Harness {
            dispatcher,
            calls,
            agent,
            record,
        }
    }

    fn body(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[tokio::test]
    async fn test_missing_call_id() {
        let harness = setup(None).await;

        let reply = harness
            .dispatcher
            .handle_call_event(b"", &body(json!({"CallStatus": "answered"})), &HashMap::new())
            .await;

        assert_eq!(reply, WebhookReply::error("Call ID not provided"));
        // Nothing was mutated.
        let stored = harness
            .calls
            .find_by_id(harness.record.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.call_status, CallStatus::Initiated);
    }

    #[tokio::test]
    async fn test_unknown_call() {
        let harness = setup(None).await;

        let reply = harness
            .dispatcher
            .handle_call_event(
                b"",
                &body(json!({"call_id": CallId::new().to_string(), "CallStatus": "completed"})),
                &HashMap::new(),
            )
            .await;

        assert_eq!(reply, WebhookReply::error("Call record not found"));
    }

    #[tokio::test]
    async fn test_answered_returns_stream_directive() {
        let harness = setup(None).await;

        let reply = harness
            .dispatcher
            .handle_call_event(
                b"",
                &body(json!({
                    "call_id": harness.record.id.to_string(),
                    "agent_id": harness.agent.id.to_string(),
                    "CallStatus": "answered",
                })),
                &HashMap::new(),
            )
            .await;

        match reply {
            WebhookReply::Stream { content } => {
                assert!(content.contains("You are a scheduling assistant."));
                assert!(content.contains(&harness.record.id.to_string()));
            }
            other => panic!("Expected stream directive, got {:?}", other),
        }

        let stored = harness
            .calls
            .find_by_id(harness.record.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.call_status, CallStatus::Answered);
    }

    #[tokio::test]
    async fn test_answered_without_agent_id() {
        let harness = setup(None).await;

        let reply = harness
            .dispatcher
            .handle_call_event(
                b"",
                &body(json!({
                    "call_id": harness.record.id.to_string(),
                    "CallStatus": "answered",
                })),
                &HashMap::new(),
            )
            .await;

        assert_eq!(reply, WebhookReply::error("Agent ID not provided"));
    }

    #[tokio::test]
    async fn test_hangup_completes_call_without_agent_id() {
        let harness = setup(None).await;

        let reply = harness
            .dispatcher
            .handle_call_event(
                b"",
                &body(json!({
                    "call_id": harness.record.id.to_string(),
                    "CallStatus": "completed",
                })),
                &HashMap::new(),
            )
            .await;

        assert_eq!(reply, WebhookReply::Ack);

        let stored = harness
            .calls
            .find_by_id(harness.record.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.call_status, CallStatus::Completed);
        assert!(stored.ended_at.is_some());
        assert!(stored.duration_seconds.is_some());
    }

    #[tokio::test]
    async fn test_duplicate_hangup_is_idempotent() {
        let harness = setup(None).await;
        let payload = body(json!({
            "call_id": harness.record.id.to_string(),
            "event": "hangup",
        }));

        harness
            .dispatcher
            .handle_call_event(b"", &payload, &HashMap::new())
            .await;
        let first = harness
            .calls
            .find_by_id(harness.record.id)
            .await
            .unwrap()
            .unwrap();

        let reply = harness
            .dispatcher
            .handle_call_event(b"", &payload, &HashMap::new())
            .await;
        assert_eq!(reply, WebhookReply::Ack);

        let second = harness
            .calls
            .find_by_id(harness.record.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(second.ended_at, first.ended_at);
        assert_eq!(second.duration_seconds, first.duration_seconds);
    }

    #[tokio::test]
    async fn test_failed_event_captures_hangup_cause() {
        let harness = setup(None).await;

        let reply = harness
            .dispatcher
            .handle_call_event(
                b"",
                &body(json!({
                    "call_id": harness.record.id.to_string(),
                    "CallStatus": "failed",
                    "HangupCause": "NO_ANSWER",
                })),
                &HashMap::new(),
            )
            .await;

        assert_eq!(reply, WebhookReply::Ack);

        let stored = harness
            .calls
            .find_by_id(harness.record.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.call_status, CallStatus::Failed);
        assert_eq!(stored.error_message.as_deref(), Some("NO_ANSWER"));
    }

    #[tokio::test]
    async fn test_unknown_event_acknowledged_without_mutation() {
        let harness = setup(None).await;

        let reply = harness
            .dispatcher
            .handle_call_event(
                b"",
                &body(json!({
                    "call_id": harness.record.id.to_string(),
                    "CallStatus": "ringing",
                })),
                &HashMap::new(),
            )
            .await;

        assert_eq!(reply, WebhookReply::Ack);

        let stored = harness
            .calls
            .find_by_id(harness.record.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.call_status, CallStatus::Initiated);
    }

    #[tokio::test]
    async fn test_signature_verification() {
        let harness = setup(Some("secret-token".to_string())).await;
        let raw = br#"{"CallStatus":"completed"}"#;
        let payload = body(json!({
            "call_id": harness.record.id.to_string(),
            "CallStatus": "completed",
        }));

        // Tampered signature is rejected and nothing is mutated.
        let mut headers = HashMap::new();
        headers.insert(SIGNATURE_HEADER.to_string(), "bm90LXZhbGlk".to_string());
        headers.insert(NONCE_HEADER.to_string(), "nonce-1".to_string());

        let reply = harness
            .dispatcher
            .handle_call_event(raw, &payload, &headers)
            .await;
        assert_eq!(reply, WebhookReply::error("invalid webhook signature"));

        let stored = harness
            .calls
            .find_by_id(harness.record.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.call_status, CallStatus::Initiated);

        // A valid signature passes.
        let mut headers = HashMap::new();
        headers.insert(
            SIGNATURE_HEADER.to_string(),
            signature::sign("secret-token", "nonce-1", raw),
        );
        headers.insert(NONCE_HEADER.to_string(), "nonce-1".to_string());

        let reply = harness
            .dispatcher
            .handle_call_event(raw, &payload, &headers)
            .await;
        assert_eq!(reply, WebhookReply::Ack);
    }

    #[tokio::test]
    async fn test_audio_frame_updates_metadata() {
        use crate::application::bridge::LAST_SEQUENCE_KEY;
        use base64::engine::general_purpose::STANDARD as BASE64;
        use base64::Engine;

        let harness = setup(None).await;

        let reply = harness
            .dispatcher
            .handle_audio_frame(&body(json!({
                "media": {"payload": BASE64.encode(b"\x7f\x7f")},
                "call_id": harness.record.id.to_string(),
                "sequenceNumber": 7,
            })))
            .await;

        assert_eq!(reply, WebhookReply::AudioProcessed);

        let stored = harness
            .calls
            .find_by_id(harness.record.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            stored.call_metadata.get(LAST_SEQUENCE_KEY),
            Some(&Value::from(7))
        );
    }

    #[tokio::test]
    async fn test_audio_frame_without_payload_acknowledged() {
        let harness = setup(None).await;

        let reply = harness
            .dispatcher
            .handle_audio_frame(&body(json!({"event": "start"})))
            .await;
        assert_eq!(reply, WebhookReply::AudioProcessed);
    }
}
