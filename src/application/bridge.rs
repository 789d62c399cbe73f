//! Audio bridge between the provider media stream and realtime AI sessions
//!
//! One realtime session per call, opened when the call is answered and
//! torn down on the terminal transition. Inbound frames are forwarded in
//! arrival order; the last observed sequence number and a gap counter are
//! persisted in the call record's metadata for observability.

use crate::application::locks::CallLocks;
use crate::domain::call::repository::CallRecordRepository;
use crate::domain::shared::error::DomainError;
use crate::domain::shared::result::Result;
use crate::domain::shared::value_objects::CallId;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::Bytes;
use metrics::{counter, gauge};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, Mutex};
use tracing::{debug, info, warn};

use crate::domain::agent::Agent;
use crate::domain::call::record::CallRecord;
use crate::infrastructure::realtime::{RealtimeChannel, RealtimeConnector, RealtimeEvent};

/// Metadata key: highest audio sequence number observed for the call
pub const LAST_SEQUENCE_KEY: &str = "last_audio_sequence";
/// Metadata key: count of frames that arrived out of sequence order
pub const GAP_COUNT_KEY: &str = "audio_gap_count";
/// Metadata key: recorded when the realtime session could not be opened
pub const SESSION_ERROR_KEY: &str = "realtime_session_error";

const OUTBOUND_CAPACITY: usize = 64;

struct BridgeSession {
    audio_tx: mpsc::Sender<Bytes>,
    outbound_tx: broadcast::Sender<Bytes>,
    close_tx: Option<oneshot::Sender<()>>,
}

/// Relays audio both ways for answered calls
pub struct AudioBridge {
    connector: Arc<dyn RealtimeConnector>,
    calls: Arc<dyn CallRecordRepository>,
    locks: Arc<CallLocks>,
    sessions: Mutex<HashMap<CallId, BridgeSession>>,
}

impl AudioBridge {
    pub fn new(
        connector: Arc<dyn RealtimeConnector>,
        calls: Arc<dyn CallRecordRepository>,
        locks: Arc<CallLocks>,
    ) -> Self {
        Self {
            connector,
            calls,
            locks,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Open the realtime session for an answered call
    ///
    /// Idempotent: a duplicate answer event for a call with a live session
    /// is a no-op. A setup failure is returned to the caller but must not
    /// fail the call itself; the provider keeps the leg alive regardless.
    pub async fn open(&self, record: &CallRecord, agent: &Agent) -> Result<()> {
        {
            let sessions = self.sessions.lock().await;
            if sessions.contains_key(&record.id) {
                debug!("Session already open for call {}", record.id);
                return Ok(());
            }
        }

        let voice = agent
            .voice_settings
            .as_ref()
            .and_then(|settings| settings.get("voice"))
            .and_then(|value| value.as_str())
            .map(|value| value.to_string());

        let channel = self
            .connector
            .connect(record.id, agent.prompt.clone(), voice)
            .await?;
        let RealtimeChannel {
            audio_tx,
            mut event_rx,
            close_tx,
        } = channel;

        let (outbound_tx, _) = broadcast::channel(OUTBOUND_CAPACITY);

        let call_id = record.id;
        let calls = self.calls.clone();
        let locks = self.locks.clone();
        let pump_outbound = outbound_tx.clone();
        tokio::spawn(async move {
            while let Some(event) = event_rx.recv().await {
                match event {
                    RealtimeEvent::Audio(frame) => {
                        // No receiver just means the provider stream is not
                        // attached yet; the frame is dropped.
                        let _ = pump_outbound.send(frame);
                    }
                    RealtimeEvent::Transcript(text) => {
                        let guard = locks.acquire(call_id).await;
                        match calls.find_by_id(call_id).await {
                            Ok(Some(mut record)) => {
                                record.append_transcript(&text);
                                if let Err(e) = calls.save(&record).await {
                                    warn!("Transcript save failed for call {}: {}", call_id, e);
                                }
                            }
                            Ok(None) => {}
                            Err(e) => {
                                warn!("Transcript lookup failed for call {}: {}", call_id, e)
                            }
                        }
                        drop(guard);
                    }
                    RealtimeEvent::Closed => break,
                }
            }
            debug!("Event pump for call {} finished", call_id);
        });

        let session = BridgeSession {
            audio_tx,
            outbound_tx,
            close_tx: Some(close_tx),
        };
        self.sessions.lock().await.insert(record.id, session);
        gauge!("bridge_active_sessions").increment(1.0);
        info!("Audio bridge opened for call {}", record.id);

        Ok(())
    }

    /// Relay one inbound audio frame and track its sequence number
    pub async fn handle_frame(
        &self,
        call_id: CallId,
        payload_b64: &str,
        sequence: u64,
    ) -> Result<()> {
        let frame = BASE64
            .decode(payload_b64)
            .map(Bytes::from)
            .map_err(|e| DomainError::Processing(format!("Invalid audio payload: {}", e)))?;

        let guard = self.locks.acquire(call_id).await;
        let mut record = self
            .calls
            .find_by_id(call_id)
            .await?
            .ok_or_else(|| DomainError::NotFound("Call record not found".to_string()))?;

        let last = record
            .call_metadata
            .get(LAST_SEQUENCE_KEY)
            .and_then(|value| value.as_u64());
        let gaps = record
            .call_metadata
            .get(GAP_COUNT_KEY)
            .and_then(|value| value.as_u64())
            .unwrap_or(0);

        let mut updates = Map::new();
        match last {
            Some(last) => {
                if sequence != last + 1 {
                    // Gap or reordering; count it and keep the high-water mark.
                    updates.insert(GAP_COUNT_KEY.to_string(), Value::from(gaps + 1));
                }
                updates.insert(
                    LAST_SEQUENCE_KEY.to_string(),
                    Value::from(sequence.max(last)),
                );
            }
            None => {
                updates.insert(LAST_SEQUENCE_KEY.to_string(), Value::from(sequence));
            }
        }
        record.merge_metadata(updates);
        self.calls.save(&record).await?;
        drop(guard);

        counter!("audio_frames_total").increment(1);

        let audio_tx = {
            let sessions = self.sessions.lock().await;
            sessions.get(&call_id).map(|session| session.audio_tx.clone())
        };
        if let Some(audio_tx) = audio_tx {
            if audio_tx.send(frame).await.is_err() {
                warn!("Realtime session for call {} is gone; dropping frame", call_id);
            }
        }

        Ok(())
    }

    /// Subscribe to the AI audio destined for the provider stream
    pub async fn subscribe_outbound(&self, call_id: CallId) -> Option<broadcast::Receiver<Bytes>> {
        let sessions = self.sessions.lock().await;
        sessions
            .get(&call_id)
            .map(|session| session.outbound_tx.subscribe())
    }

    /// Tear down the session for a call that reached a terminal state
    ///
    /// Idempotent; closing a call without a session is a no-op.
    pub async fn close(&self, call_id: CallId) {
        let session = self.sessions.lock().await.remove(&call_id);
        if let Some(mut session) = session {
            if let Some(close_tx) = session.close_tx.take() {
                let _ = close_tx.send(());
            }
            gauge!("bridge_active_sessions").decrement(1.0);
            info!("Audio bridge closed for call {}", call_id);
        }
    }

    /// Whether a call currently has a live session
    pub async fn is_open(&self, call_id: CallId) -> bool {
        self.sessions.lock().await.contains_key(&call_id)
    }
}
