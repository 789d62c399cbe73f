//! Stale-call watchdog
//!
//! A call whose terminal webhook never arrives would otherwise sit in a
//! non-terminal status forever. The watchdog sweeps periodically and fails
//! calls that have been inactive past the configured window, tearing down
//! any bridge session they still hold.

use crate::application::bridge::AudioBridge;
use crate::application::locks::CallLocks;
use crate::config::WatchdogConfig;
use crate::domain::call::repository::CallRecordRepository;
use crate::domain::shared::result::Result;
use chrono::{Duration as ChronoDuration, Utc};
use metrics::counter;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

pub const STALE_CALL_ERROR: &str = "call timed out without terminal event";

pub struct Watchdog {
    calls: Arc<dyn CallRecordRepository>,
    locks: Arc<CallLocks>,
    bridge: Arc<AudioBridge>,
    config: WatchdogConfig,
}

impl Watchdog {
    pub fn new(
        calls: Arc<dyn CallRecordRepository>,
        locks: Arc<CallLocks>,
        bridge: Arc<AudioBridge>,
        config: WatchdogConfig,
    ) -> Self {
        Self {
            calls,
            locks,
            bridge,
            config,
        }
    }

    /// Spawn the periodic sweep task; returns None when disabled
    pub fn spawn(self: Arc<Self>) -> Option<JoinHandle<()>> {
        if self.config.inactivity_window_secs == 0 {
            info!("Watchdog disabled (inactivity window is 0)");
            return None;
        }

        let interval = Duration::from_secs(self.config.sweep_interval_secs.max(1));
        info!(
            "Watchdog started: sweeping every {}s, window {}s",
            interval.as_secs(),
            self.config.inactivity_window_secs
        );

        Some(tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                if let Err(e) = self.sweep_once().await {
                    warn!("Watchdog sweep failed: {}", e);
                }
            }
        }))
    }

    /// Run one sweep; returns the number of calls reaped
    pub async fn sweep_once(&self) -> Result<usize> {
        let cutoff = Utc::now()
            - ChronoDuration::seconds(self.config.inactivity_window_secs as i64);

        let stale = self.calls.find_stale(cutoff).await?;
        let mut reaped = 0;

        for candidate in stale {
            let guard = self.locks.acquire(candidate.id).await;
            let mut record = match self.calls.find_by_id(candidate.id).await? {
                Some(record) => record,
                None => continue,
            };

            // Re-check under the lock; a terminal webhook may have landed
            // between the listing and now.
            if record.is_terminal() || record.created_at >= cutoff {
                continue;
            }

            if record.fail(STALE_CALL_ERROR).is_ok() {
                self.calls.save(&record).await?;
                counter!("calls_failed_total").increment(1);
                warn!("Watchdog failed stale call {}", record.id);
                reaped += 1;
            }
            drop(guard);

            self.bridge.close(record.id).await;
            self.locks.release(record.id).await;
        }

        Ok(reaped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::call::record::CallRecord;
    use crate::domain::call::status::CallStatus;
    use crate::domain::shared::value_objects::AgentId;
    use crate::infrastructure::persistence::memory::InMemoryCallRecordRepository;
    use crate::infrastructure::realtime::MockRealtimeConnector;

    fn watchdog(
        calls: Arc<InMemoryCallRecordRepository>,
        window_secs: u64,
    ) -> Watchdog {
        let locks = Arc::new(CallLocks::new());
        let bridge = Arc::new(AudioBridge::new(
            Arc::new(MockRealtimeConnector::new()),
            calls.clone(),
            locks.clone(),
        ));
        Watchdog::new(
            calls,
            locks,
            bridge,
            WatchdogConfig {
                sweep_interval_secs: 60,
                inactivity_window_secs: window_secs,
            },
        )
    }

    #[tokio::test]
    async fn test_sweep_fails_stale_calls_only() {
        let calls = Arc::new(InMemoryCallRecordRepository::new());

        let mut stale = CallRecord::new(AgentId::new(), "+1".to_string(), "+2".to_string());
        stale.accept("R1".to_string()).unwrap();
        stale.created_at = Utc::now() - ChronoDuration::hours(2);
        calls.save(&stale).await.unwrap();

        let fresh = CallRecord::new(AgentId::new(), "+1".to_string(), "+3".to_string());
        calls.save(&fresh).await.unwrap();

        let mut done = CallRecord::new(AgentId::new(), "+1".to_string(), "+4".to_string());
        done.created_at = Utc::now() - ChronoDuration::hours(2);
        done.accept("R2".to_string()).unwrap();
        done.complete().unwrap();
        calls.save(&done).await.unwrap();

        let reaped = watchdog(calls.clone(), 3600).sweep_once().await.unwrap();
        assert_eq!(reaped, 1);

        let swept = calls.find_by_id(stale.id).await.unwrap().unwrap();
        assert_eq!(swept.call_status, CallStatus::Failed);
        assert_eq!(swept.error_message.as_deref(), Some(STALE_CALL_ERROR));

        let untouched = calls.find_by_id(fresh.id).await.unwrap().unwrap();
        assert_eq!(untouched.call_status, CallStatus::Initiating);

        let terminal = calls.find_by_id(done.id).await.unwrap().unwrap();
        assert_eq!(terminal.call_status, CallStatus::Completed);
    }
}
