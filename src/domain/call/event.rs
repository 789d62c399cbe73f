//! Provider webhook event classification
//!
//! Provider payloads are loosely typed and vary by event. They are kept as
//! untyped JSON at the boundary and projected here into a small closed set
//! before any state-machine logic touches them.

use serde_json::{Map, Value};

/// Classified provider call event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEvent {
    /// Callee answered; media streaming should begin
    Answered,
    /// Call ended normally
    Hangup,
    /// Provider reported the call failed
    Failed { cause: String },
    /// Event shape the state machine does not act on
    Unknown,
}

impl WebhookEvent {
    /// Project a raw provider payload into a classified event
    ///
    /// The provider reports the event either via an `event`/`Event` field
    /// or via its `CallStatus` field; both spellings are honored.
    pub fn classify(body: &Map<String, Value>) -> Self {
        let event_type = string_field(body, "event").or_else(|| string_field(body, "Event"));
        let call_status = string_field(body, "CallStatus");

        if event_type.as_deref() == Some("AnswerUrl") || call_status.as_deref() == Some("answered")
        {
            return WebhookEvent::Answered;
        }

        if event_type.as_deref() == Some("hangup") || call_status.as_deref() == Some("completed") {
            return WebhookEvent::Hangup;
        }

        if call_status.as_deref() == Some("failed") {
            let cause = string_field(body, "HangupCause")
                .unwrap_or_else(|| "Unknown error".to_string());
            return WebhookEvent::Failed { cause };
        }

        WebhookEvent::Unknown
    }
}

/// Read a string field, accepting non-string JSON scalars as their string form
pub fn string_field(body: &Map<String, Value>, key: &str) -> Option<String> {
    match body.get(key) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    }
}
