//! Call status value object

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Call lifecycle status
///
/// Statuses are a closed set; the administrative override parses into this
/// enum and is validated against the same transition table as webhook-driven
/// transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallStatus {
    /// Record created, provider request not yet accepted
    Initiating,
    /// Provider accepted the outbound call request
    Initiated,
    /// Callee answered and media is flowing
    Answered,
    /// Call ended normally
    Completed,
    /// Call failed (gateway rejection or provider failure event)
    Failed,
}

impl CallStatus {
    /// Check if a state transition is valid
    pub fn can_transition_to(&self, new_status: CallStatus) -> bool {
        use CallStatus::*;

        match (self, new_status) {
            // From Initiating. Answered is tolerated here: the provider's
            // answer callback can beat the gateway-acceptance write.
            (Initiating, Initiated) => true,
            (Initiating, Answered) => true,
            (Initiating, Failed) => true,

            // From Initiated. Completed is reachable without an answer
            // event when the hangup callback arrives first.
            (Initiated, Answered) => true,
            (Initiated, Completed) => true,
            (Initiated, Failed) => true,

            // From Answered
            (Answered, Completed) => true,
            (Answered, Failed) => true,

            // Terminal states never transition
            (Completed, _) => false,
            (Failed, _) => false,

            // All other transitions are invalid
            _ => false,
        }
    }

    /// Terminal statuses carry `ended_at` and a computed duration
    pub fn is_terminal(&self) -> bool {
        matches!(self, CallStatus::Completed | CallStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CallStatus::Initiating => "initiating",
            CallStatus::Initiated => "initiated",
            CallStatus::Answered => "answered",
            CallStatus::Completed => "completed",
            CallStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for CallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CallStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initiating" => Ok(CallStatus::Initiating),
            "initiated" => Ok(CallStatus::Initiated),
            "answered" => Ok(CallStatus::Answered),
            "completed" => Ok(CallStatus::Completed),
            "failed" => Ok(CallStatus::Failed),
            other => Err(format!("Unknown call status: {}", other)),
        }
    }
}
