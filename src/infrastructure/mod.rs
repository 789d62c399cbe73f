//! Infrastructure layer - Technical implementations
//!
//! This layer contains:
//! - Repository implementations
//! - Telephony provider integration
//! - Realtime AI session integration

pub mod persistence;
pub mod realtime;
pub mod telephony;
