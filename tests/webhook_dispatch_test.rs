//! Webhook Dispatch Integration Tests
//!
//! Exercises duplicate deliveries, correlation failures, metadata merging,
//! audio frame tracking, and the stale-call watchdog over in-memory stores.

use std::collections::HashMap;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::{json, Map, Value};
use tokio::sync::{mpsc, oneshot};

use voxdial::application::bridge::{GAP_COUNT_KEY, LAST_SEQUENCE_KEY};
use voxdial::application::watchdog::STALE_CALL_ERROR;
use voxdial::application::{
    AudioBridge, CallLocks, CallService, Watchdog, WebhookDispatcher, WebhookReply,
};
use voxdial::config::WatchdogConfig;
use voxdial::domain::agent::{Agent, AgentRepository, CreateAgent};
use voxdial::domain::call::{CallRecord, CallRecordRepository, CallStatus};
use voxdial::domain::shared::value_objects::CallId;
use voxdial::infrastructure::persistence::{InMemoryAgentRepository, InMemoryCallRecordRepository};
use voxdial::infrastructure::realtime::{RealtimeChannel, RealtimeConnector};
use voxdial::infrastructure::telephony::{OutboundCallRequest, TelephonyGateway};
use voxdial::Result;

struct AcceptingGateway;

#[async_trait::async_trait]
impl TelephonyGateway for AcceptingGateway {
    async fn place_call(&self, _request: &OutboundCallRequest) -> Result<String> {
        Ok("R1".to_string())
    }
}

struct StubConnector;

#[async_trait::async_trait]
impl RealtimeConnector for StubConnector {
    async fn connect(
        &self,
        _call_id: CallId,
        _instructions: String,
        _voice: Option<String>,
    ) -> Result<RealtimeChannel> {
        let (audio_tx, mut audio_rx) = mpsc::channel(8);
        let (_event_tx, event_rx) = mpsc::channel(8);
        let (close_tx, _close_rx) = oneshot::channel();
        tokio::spawn(async move { while audio_rx.recv().await.is_some() {} });
        Ok(RealtimeChannel {
            audio_tx,
            event_rx,
            close_tx,
        })
    }
}

struct TestApp {
    calls: Arc<InMemoryCallRecordRepository>,
    locks: Arc<CallLocks>,
    bridge: Arc<AudioBridge>,
    service: CallService,
    dispatcher: WebhookDispatcher,
    agent: Agent,
}

async fn setup() -> TestApp {
    let calls = Arc::new(InMemoryCallRecordRepository::new());
    let agents = Arc::new(InMemoryAgentRepository::new());
    let locks = Arc::new(CallLocks::new());

    let agent = Agent::new(CreateAgent {
        name: "Ava".to_string(),
        prompt: "You are a collections reminder agent.".to_string(),
        voice_settings: None,
        personality_settings: None,
    });
    agents.create(&agent).await.expect("Failed to create agent");

    let bridge = Arc::new(AudioBridge::new(
        Arc::new(StubConnector),
        calls.clone(),
        locks.clone(),
    ));

    let service = CallService::new(
        calls.clone(),
        agents.clone(),
        Arc::new(AcceptingGateway),
        locks.clone(),
        "http://localhost:8000".to_string(),
    );

    let dispatcher = WebhookDispatcher::new(
        calls.clone(),
        agents,
        locks.clone(),
        bridge.clone(),
        None,
    );

    TestApp {
        calls,
        locks,
        bridge,
        service,
        dispatcher,
        agent,
    }
}

fn webhook_body(value: Value) -> Map<String, Value> {
    value.as_object().expect("webhook body must be an object").clone()
}

async fn initiated_call(app: &TestApp) -> CallRecord {
    app.service
        .initiate_call(app.agent.id, "+15551234567", "+15559876543")
        .await
        .expect("Initiation failed")
}

#[tokio::test]
async fn test_missing_call_id_mutates_nothing() {
    let app = setup().await;
    let record = initiated_call(&app).await;

    let reply = app
        .dispatcher
        .handle_call_event(
            b"",
            &webhook_body(json!({"CallStatus": "completed"})),
            &HashMap::new(),
        )
        .await;

    assert_eq!(reply.to_json(), json!({"error": "Call ID not provided"}));

    let stored = app.calls.find_by_id(record.id).await.unwrap().unwrap();
    assert_eq!(stored.call_status, CallStatus::Initiated);
    assert!(stored.ended_at.is_none());
}

#[tokio::test]
async fn test_duplicate_hangup_preserves_timing() {
    let app = setup().await;
    let record = initiated_call(&app).await;

    let hangup = webhook_body(json!({
        "call_id": record.id.to_string(),
        "event": "hangup",
    }));

    app.dispatcher
        .handle_call_event(b"", &hangup, &HashMap::new())
        .await;
    let first = app.calls.find_by_id(record.id).await.unwrap().unwrap();
    assert_eq!(first.call_status, CallStatus::Completed);

    // Provider retries the same delivery.
    let reply = app
        .dispatcher
        .handle_call_event(b"", &hangup, &HashMap::new())
        .await;
    assert_eq!(reply, WebhookReply::Ack);

    let second = app.calls.find_by_id(record.id).await.unwrap().unwrap();
    assert_eq!(second.ended_at, first.ended_at);
    assert_eq!(second.duration_seconds, first.duration_seconds);
}

#[tokio::test]
async fn test_completed_after_failed_keeps_first_terminal_state() {
    let app = setup().await;
    let record = initiated_call(&app).await;

    app.dispatcher
        .handle_call_event(
            b"",
            &webhook_body(json!({
                "call_id": record.id.to_string(),
                "CallStatus": "failed",
                "HangupCause": "NO_ANSWER",
            })),
            &HashMap::new(),
        )
        .await;

    let reply = app
        .dispatcher
        .handle_call_event(
            b"",
            &webhook_body(json!({
                "call_id": record.id.to_string(),
                "CallStatus": "completed",
            })),
            &HashMap::new(),
        )
        .await;
    assert_eq!(reply, WebhookReply::Ack);

    let stored = app.calls.find_by_id(record.id).await.unwrap().unwrap();
    assert_eq!(stored.call_status, CallStatus::Failed);
    assert_eq!(stored.error_message.as_deref(), Some("NO_ANSWER"));
}

#[tokio::test]
async fn test_admin_metadata_merge() {
    let app = setup().await;
    let record = initiated_call(&app).await;

    let mut first = Map::new();
    first.insert("a".to_string(), Value::from(1));
    app.service
        .update_call_status(record.id, "answered", Some(first))
        .await
        .unwrap();

    let mut second = Map::new();
    second.insert("b".to_string(), Value::from(2));
    let updated = app
        .service
        .update_call_status(record.id, "completed", Some(second))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(updated.call_metadata.get("a"), Some(&Value::from(1)));
    assert_eq!(updated.call_metadata.get("b"), Some(&Value::from(2)));
}

#[tokio::test]
async fn test_audio_frames_track_sequence_and_gaps() {
    let app = setup().await;
    let record = initiated_call(&app).await;

    // Answer first so the bridge session exists.
    app.dispatcher
        .handle_call_event(
            b"",
            &webhook_body(json!({
                "call_id": record.id.to_string(),
                "agent_id": app.agent.id.to_string(),
                "CallStatus": "answered",
            })),
            &HashMap::new(),
        )
        .await;
    assert!(app.bridge.is_open(record.id).await);

    let payload = BASE64.encode(b"\x7f\x00\x7f\x00");
    for sequence in [1u64, 2, 5, 4] {
        let reply = app
            .dispatcher
            .handle_audio_frame(&webhook_body(json!({
                "media": {"payload": payload.as_str()},
                "call_id": record.id.to_string(),
                "sequenceNumber": sequence,
            })))
            .await;
        assert_eq!(reply.to_json(), json!({"status": "audio_processed"}));
    }

    let stored = app.calls.find_by_id(record.id).await.unwrap().unwrap();
    assert_eq!(
        stored.call_metadata.get(LAST_SEQUENCE_KEY),
        Some(&Value::from(5))
    );
    assert!(
        stored
            .call_metadata
            .get(GAP_COUNT_KEY)
            .and_then(|value| value.as_u64())
            .unwrap()
            >= 1
    );

    // Terminal transition tears the session down.
    app.dispatcher
        .handle_call_event(
            b"",
            &webhook_body(json!({
                "call_id": record.id.to_string(),
                "CallStatus": "completed",
            })),
            &HashMap::new(),
        )
        .await;
    assert!(!app.bridge.is_open(record.id).await);
}

#[tokio::test]
async fn test_audio_frame_for_unknown_call() {
    let app = setup().await;

    let reply = app
        .dispatcher
        .handle_audio_frame(&webhook_body(json!({
            "media": {"payload": BASE64.encode(b"\x7f")},
            "call_id": CallId::new().to_string(),
            "sequenceNumber": 1,
        })))
        .await;

    assert_eq!(reply.to_json(), json!({"error": "Call record not found"}));
}

#[tokio::test]
async fn test_watchdog_reaps_stale_calls() {
    let app = setup().await;
    let record = initiated_call(&app).await;

    // Age the record past the inactivity window.
    let mut aged = app.calls.find_by_id(record.id).await.unwrap().unwrap();
    aged.created_at = chrono::Utc::now() - chrono::Duration::hours(2);
    app.calls.save(&aged).await.unwrap();

    let watchdog = Watchdog::new(
        app.calls.clone(),
        app.locks.clone(),
        app.bridge.clone(),
        WatchdogConfig {
            sweep_interval_secs: 60,
            inactivity_window_secs: 3600,
        },
    );

    let reaped = watchdog.sweep_once().await.unwrap();
    assert_eq!(reaped, 1);

    let stored = app.calls.find_by_id(record.id).await.unwrap().unwrap();
    assert_eq!(stored.call_status, CallStatus::Failed);
    assert_eq!(stored.error_message.as_deref(), Some(STALE_CALL_ERROR));
    assert!(stored.ended_at.is_some());

    // A second sweep finds nothing.
    assert_eq!(watchdog.sweep_once().await.unwrap(), 0);
}
