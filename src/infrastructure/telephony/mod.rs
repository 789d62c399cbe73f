//! Telephony provider integration
//!
//! The gateway port is the narrow seam to the provider's call-creation
//! API; webhook callback URLs and the streaming directive document live
//! here too since their shapes are provider-defined.

pub mod plivo;
pub mod signature;
pub mod xml;

use crate::domain::shared::result::Result;
use crate::domain::shared::value_objects::{AgentId, CallId};

/// Outbound call-creation request handed to the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundCallRequest {
    pub from_number: String,
    pub to_number: String,
    pub answer_url: String,
    pub hangup_url: String,
}

/// Telephony gateway port
///
/// `place_call` returns the provider's request identifier on acceptance.
/// Rejections and transport failures surface as `DomainError::Gateway`;
/// the caller records them into the call record instead of raising.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait TelephonyGateway: Send + Sync {
    async fn place_call(&self, request: &OutboundCallRequest) -> Result<String>;
}

/// Webhook callback URLs for one call
///
/// Both URLs point at the call-event webhook endpoint and embed the call
/// id so the provider echoes it back; the answer URL additionally carries
/// the agent id, the hangup URL a fixed `event=hangup` marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackUrls {
    pub answer_url: String,
    pub hangup_url: String,
}

impl CallbackUrls {
    pub fn for_call(base_url: &str, call_id: CallId, agent_id: AgentId) -> Self {
        let endpoint = format!(
            "{}/api/webhooks/call_webhooks/handle_call_event",
            base_url.trim_end_matches('/')
        );

        Self {
            answer_url: format!("{}?call_id={}&agent_id={}", endpoint, call_id, agent_id),
            hangup_url: format!("{}?call_id={}&event=hangup", endpoint, call_id),
        }
    }
}

pub use plivo::PlivoGateway;
pub use xml::StreamDirective;
