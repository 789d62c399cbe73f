//! API interface implementations

pub mod agent_handler;
pub mod call_handler;
pub mod dto;
pub mod media_ws;
pub mod metrics_handler;
pub mod router;
pub mod webhook_handler;

pub use call_handler::AppState;
pub use metrics_handler::init_metrics;
pub use router::build_router;
