//! Realtime conversational-AI session integration
//!
//! The AI backend is an external collaborator reached over a WebSocket.
//! The bridge talks to it through a narrow channel pair: audio frames go
//! in, audio/transcript events come out, and dropping the close handle
//! tears the session down.

pub mod openai;

use crate::domain::shared::result::Result;
use crate::domain::shared::value_objects::CallId;
use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};

/// Event emitted by a live realtime session
#[derive(Debug, Clone)]
pub enum RealtimeEvent {
    /// Audio frame to relay back to the provider media stream
    Audio(Bytes),
    /// Completed transcript fragment of the agent's speech
    Transcript(String),
    /// The backend closed the session
    Closed,
}

/// Handles to one live realtime session
pub struct RealtimeChannel {
    /// Inbound caller audio, in provider frame encoding
    pub audio_tx: mpsc::Sender<Bytes>,
    /// Session events, consumed by the audio bridge
    pub event_rx: mpsc::Receiver<RealtimeEvent>,
    /// Explicit teardown; dropping it closes the session too
    pub close_tx: oneshot::Sender<()>,
}

/// Connector port for opening realtime sessions
///
/// One session per call, opened at answer time with the agent's prompt as
/// session instructions.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait RealtimeConnector: Send + Sync {
    async fn connect(
        &self,
        call_id: CallId,
        instructions: String,
        voice: Option<String>,
    ) -> Result<RealtimeChannel>;
}

pub use openai::OpenAiRealtimeConnector;
