//! voxdial - outbound AI voice-agent calls
//!
//! Places outbound calls through a telephony provider and bridges each
//! answered leg to a realtime conversational-AI session driven by a
//! stored agent profile. Provider webhooks drive the call state machine.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod interface;

// Re-export commonly used types
pub use domain::shared::error::DomainError;
pub use domain::shared::result::Result;
