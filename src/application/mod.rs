//! Application layer - Use cases and application services
//!
//! This layer orchestrates domain objects to fulfill use cases: call
//! initiation and queries, webhook dispatch, audio bridging, and the
//! stale-call watchdog. Per-call serialization lives here too.

pub mod bridge;
pub mod call_service;
pub mod locks;
pub mod watchdog;
pub mod webhook;

pub use bridge::AudioBridge;
pub use call_service::CallService;
pub use locks::CallLocks;
pub use watchdog::Watchdog;
pub use webhook::{WebhookDispatcher, WebhookReply};
