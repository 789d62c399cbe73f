//! Call record repository interface

use crate::domain::call::record::CallRecord;
use crate::domain::shared::result::Result;
use crate::domain::shared::value_objects::CallId;
use chrono::{DateTime, Utc};

/// Repository interface for the CallRecord aggregate
///
/// Defined in the domain layer as a trait (port) and implemented in the
/// infrastructure layer (adapter).
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CallRecordRepository: Send + Sync {
    /// Find a call record by its ID
    async fn find_by_id(&self, id: CallId) -> Result<Option<CallRecord>>;

    /// Save a call record (insert or update)
    async fn save(&self, record: &CallRecord) -> Result<()>;

    /// List recent call records, newest first
    async fn list_recent(&self, limit: i64) -> Result<Vec<CallRecord>>;

    /// Find non-terminal calls created before `cutoff`
    ///
    /// Used by the watchdog to reap calls that never received a terminal
    /// provider event.
    async fn find_stale(&self, cutoff: DateTime<Utc>) -> Result<Vec<CallRecord>>;
}
