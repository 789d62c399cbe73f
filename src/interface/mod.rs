//! Interface layer - External interfaces (REST API, webhooks, WebSocket)

pub mod api;
