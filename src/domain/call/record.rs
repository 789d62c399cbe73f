//! Call record aggregate
//!
//! The durable record of one outbound call attempt. It owns every status
//! transition and the timing bookkeeping that terminal transitions imply;
//! once terminal, a record is an immutable audit trail.

use crate::domain::call::status::CallStatus;
use crate::domain::shared::error::DomainError;
use crate::domain::shared::result::Result;
use crate::domain::shared::value_objects::{AgentId, CallId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Metadata key set when a terminal event reports an end time earlier than
/// the start time. The duration is floored to zero and the anomaly kept
/// observable instead of being silently discarded.
pub const DURATION_ANOMALY_KEY: &str = "duration_anomaly";

/// Outcome of a requested status transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The record moved to the new status
    Applied,
    /// The record was already in the requested terminal status; duplicate
    /// provider deliveries land here and must not disturb timing fields
    Ignored,
}

/// Call record aggregate root
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallRecord {
    pub id: CallId,
    pub agent_id: AgentId,
    /// Provider call identifier, unknown until the gateway accepts
    pub plivo_call_id: Option<String>,
    pub from_number: String,
    pub to_number: String,
    pub call_status: CallStatus,
    pub duration_seconds: Option<i64>,
    pub transcript: Option<String>,
    pub call_metadata: Map<String, Value>,
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl CallRecord {
    /// Create a new record in `initiating`
    pub fn new(agent_id: AgentId, from_number: String, to_number: String) -> Self {
        let now = Utc::now();
        Self {
            id: CallId::new(),
            agent_id,
            plivo_call_id: None,
            from_number,
            to_number,
            call_status: CallStatus::Initiating,
            duration_seconds: None,
            transcript: None,
            call_metadata: Map::new(),
            error_message: None,
            started_at: now,
            ended_at: None,
            created_at: now,
        }
    }

    /// Gateway accepted the outbound request
    pub fn accept(&mut self, plivo_call_id: String) -> Result<Transition> {
        let outcome = self.transition_to(CallStatus::Initiated)?;
        if outcome == Transition::Applied {
            self.plivo_call_id = Some(plivo_call_id);
        }
        Ok(outcome)
    }

    /// Provider reported the call answered
    pub fn answer(&mut self) -> Result<Transition> {
        self.transition_to(CallStatus::Answered)
    }

    /// Provider reported a normal hangup
    pub fn complete(&mut self) -> Result<Transition> {
        self.transition_to(CallStatus::Completed)
    }

    /// Gateway rejection or provider failure event
    ///
    /// The first failure wins: a later, possibly less specific, error never
    /// overwrites an earlier one.
    pub fn fail(&mut self, error_message: impl Into<String>) -> Result<Transition> {
        let outcome = self.transition_to(CallStatus::Failed)?;
        if self.error_message.is_none() {
            self.error_message = Some(error_message.into());
        }
        Ok(outcome)
    }

    /// Request a transition to `new_status`, enforcing the transition table
    ///
    /// Re-requesting the terminal status the record is already in is an
    /// idempotent no-op, so duplicate webhook deliveries stay harmless.
    pub fn transition_to(&mut self, new_status: CallStatus) -> Result<Transition> {
        if self.call_status == new_status && new_status.is_terminal() {
            return Ok(Transition::Ignored);
        }

        if !self.call_status.can_transition_to(new_status) {
            return Err(DomainError::InvalidStateTransition(format!(
                "Cannot transition call {} from {} to {}",
                self.id, self.call_status, new_status
            )));
        }

        self.call_status = new_status;

        if new_status.is_terminal() {
            self.finalize_timing(Utc::now());
        }

        Ok(Transition::Applied)
    }

    /// Merge new keys into `call_metadata`
    ///
    /// Merges are additive: existing keys not named in `updates` survive.
    pub fn merge_metadata(&mut self, updates: Map<String, Value>) {
        for (key, value) in updates {
            self.call_metadata.insert(key, value);
        }
    }

    /// Append a fragment to the running transcript
    pub fn append_transcript(&mut self, fragment: &str) {
        match &mut self.transcript {
            Some(existing) => {
                existing.push('\n');
                existing.push_str(fragment);
            }
            None => self.transcript = Some(fragment.to_string()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.call_status.is_terminal()
    }

    /// Set `ended_at` and derive `duration_seconds`
    ///
    /// A negative computed duration (clock skew, out-of-order terminal
    /// events) is floored to 0 and flagged under `duration_anomaly`.
    fn finalize_timing(&mut self, ended_at: DateTime<Utc>) {
        self.ended_at = Some(ended_at);

        let seconds = (ended_at - self.started_at).num_seconds();
        if seconds < 0 {
            self.call_metadata
                .insert(DURATION_ANOMALY_KEY.to_string(), Value::Bool(true));
            self.duration_seconds = Some(0);
        } else {
            self.duration_seconds = Some(seconds);
        }
    }
}
