//! Call bounded context - manages the lifecycle of outbound calls

pub mod event;
pub mod record;
pub mod repository;
pub mod status;

pub use event::WebhookEvent;
pub use record::{CallRecord, Transition};
pub use repository::CallRecordRepository;
pub use status::CallStatus;
