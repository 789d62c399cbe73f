//! Call use cases: initiation, queries, administrative updates

use crate::application::locks::CallLocks;
use crate::domain::agent::AgentRepository;
use crate::domain::call::record::CallRecord;
use crate::domain::call::repository::CallRecordRepository;
use crate::domain::call::status::CallStatus;
use crate::domain::shared::error::DomainError;
use crate::domain::shared::result::Result;
use crate::domain::shared::value_objects::{AgentId, CallId, PhoneNumber};
use crate::infrastructure::telephony::{CallbackUrls, OutboundCallRequest, TelephonyGateway};
use metrics::counter;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Application service for the call lifecycle
pub struct CallService {
    calls: Arc<dyn CallRecordRepository>,
    agents: Arc<dyn AgentRepository>,
    gateway: Arc<dyn TelephonyGateway>,
    locks: Arc<CallLocks>,
    base_url: String,
}

impl CallService {
    pub fn new(
        calls: Arc<dyn CallRecordRepository>,
        agents: Arc<dyn AgentRepository>,
        gateway: Arc<dyn TelephonyGateway>,
        locks: Arc<CallLocks>,
        base_url: String,
    ) -> Self {
        Self {
            calls,
            agents,
            locks,
            gateway,
            base_url,
        }
    }

    /// Initiate an outbound call driven by the given agent
    ///
    /// Validation failures (unknown or inactive agent, malformed numbers)
    /// are the only hard errors this returns. Gateway rejections and
    /// transport failures are recorded into the returned record as
    /// `failed` so initiation is always observable.
    pub async fn initiate_call(
        &self,
        agent_id: AgentId,
        from_number: &str,
        to_number: &str,
    ) -> Result<CallRecord> {
        let from = PhoneNumber::parse(from_number).map_err(DomainError::Validation)?;
        let to = PhoneNumber::parse(to_number).map_err(DomainError::Validation)?;

        self.agents
            .find_active_by_id(agent_id)
            .await?
            .ok_or_else(|| {
                DomainError::Validation(format!(
                    "Agent with ID {} not found or inactive",
                    agent_id
                ))
            })?;

        let record = CallRecord::new(agent_id, from.to_string(), to.to_string());
        self.calls.save(&record).await?;
        counter!("calls_initiated_total").increment(1);
        info!(
            "Initiating call {} for agent {}: {} -> {}",
            record.id, agent_id, from, to
        );

        let urls = CallbackUrls::for_call(&self.base_url, record.id, agent_id);
        let placed = self
            .gateway
            .place_call(&OutboundCallRequest {
                from_number: from.to_string(),
                to_number: to.to_string(),
                answer_url: urls.answer_url,
                hangup_url: urls.hangup_url,
            })
            .await;

        // The provider learned the call id through the callback URLs the
        // moment the request went out, so a webhook can already be racing
        // this write. Re-read under the call lock before mutating.
        let guard = self.locks.acquire(record.id).await;
        let mut current = self
            .calls
            .find_by_id(record.id)
            .await?
            .unwrap_or_else(|| record.clone());

        match placed {
            Ok(request_uuid) => match current.accept(request_uuid.clone()) {
                Ok(_) => {}
                Err(DomainError::InvalidStateTransition(_)) if !current.is_terminal() => {
                    // An answer webhook beat the acceptance write; keep the
                    // later status and only backfill the provider id.
                    debug!("Call {} advanced past initiated before acceptance", current.id);
                    current.plivo_call_id = Some(request_uuid);
                }
                Err(e) => {
                    debug!("Call {} acceptance skipped: {}", current.id, e);
                }
            },
            Err(e) => {
                warn!("Gateway rejected call {}: {}", current.id, e);
                if current.fail(e.to_string()).is_ok() {
                    counter!("calls_failed_total").increment(1);
                }
            }
        }

        self.calls.save(&current).await?;
        drop(guard);
        if current.is_terminal() {
            self.locks.release(current.id).await;
        }

        Ok(current)
    }

    /// Get recent call records, newest first
    pub async fn get_call_records(&self, limit: i64) -> Result<Vec<CallRecord>> {
        self.calls.list_recent(limit).await
    }

    /// Get a call record by its ID
    pub async fn get_call_record_by_id(&self, id: CallId) -> Result<Option<CallRecord>> {
        self.calls.find_by_id(id).await
    }

    /// Administrative status override
    ///
    /// Trusted operators and tests may force a status, but the value must
    /// parse into the closed status set and the transition must be legal;
    /// repeating the current terminal status is an idempotent no-op.
    pub async fn update_call_status(
        &self,
        id: CallId,
        status: &str,
        metadata: Option<Map<String, Value>>,
    ) -> Result<Option<CallRecord>> {
        let new_status: CallStatus = status.parse().map_err(DomainError::Validation)?;

        let guard = self.locks.acquire(id).await;
        let mut record = match self.calls.find_by_id(id).await? {
            Some(record) => record,
            None => return Ok(None),
        };

        record.transition_to(new_status)?;
        if let Some(metadata) = metadata {
            record.merge_metadata(metadata);
        }

        self.calls.save(&record).await?;
        drop(guard);
        if record.is_terminal() {
            self.locks.release(id).await;
        }

        info!("Call {} status set to {} by operator", id, new_status);
        Ok(Some(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::agent::{Agent, CreateAgent};
    use crate::infrastructure::persistence::memory::{
        InMemoryAgentRepository, InMemoryCallRecordRepository,
    };
    use crate::infrastructure::telephony::MockTelephonyGateway;

    async fn setup(
        gateway: MockTelephonyGateway,
    ) -> (CallService, Arc<InMemoryCallRecordRepository>, Agent) {
        let calls = Arc::new(InMemoryCallRecordRepository::new());
        let agents = Arc::new(InMemoryAgentRepository::new());

        let agent = Agent::new(CreateAgent {
            name: "Ava".to_string(),
            prompt: "You are a scheduling assistant.".to_string(),
            voice_settings: None,
            personality_settings: None,
        });
        agents.create(&agent).await.unwrap();

        let service = CallService::new(
            calls.clone(),
            agents,
            Arc::new(gateway),
            Arc::new(CallLocks::new()),
            "http://localhost:8000".to_string(),
        );

        (service, calls, agent)
    }

    #[tokio::test]
    async fn test_initiate_call_accepted() {
        let mut gateway = MockTelephonyGateway::new();
        gateway
            .expect_place_call()
            .withf(|request| {
                request.answer_url.contains("call_id=")
                    && request.hangup_url.contains("event=hangup")
            })
            .returning(|_| Ok("R1".to_string()));

        let (service, calls, agent) = setup(gateway).await;

        let record = service
            .initiate_call(agent.id, "+15551234567", "+15559876543")
            .await
            .unwrap();

        assert_eq!(record.call_status, CallStatus::Initiated);
        assert_eq!(record.plivo_call_id.as_deref(), Some("R1"));

        let stored = calls.find_by_id(record.id).await.unwrap().unwrap();
        assert_eq!(stored.call_status, CallStatus::Initiated);
    }

    #[tokio::test]
    async fn test_initiate_call_gateway_rejection_recorded_not_raised() {
        let mut gateway = MockTelephonyGateway::new();
        gateway
            .expect_place_call()
            .returning(|_| Err(DomainError::Gateway("Plivo API error: no funds".to_string())));

        let (service, calls, agent) = setup(gateway).await;

        let record = service
            .initiate_call(agent.id, "+15551234567", "+15559876543")
            .await
            .unwrap();

        assert_eq!(record.call_status, CallStatus::Failed);
        assert!(record.error_message.as_deref().unwrap().contains("no funds"));
        assert!(record.ended_at.is_some());

        let stored = calls.find_by_id(record.id).await.unwrap().unwrap();
        assert_eq!(stored.call_status, CallStatus::Failed);
    }

    #[tokio::test]
    async fn test_initiate_call_unknown_agent_creates_no_record() {
        let gateway = MockTelephonyGateway::new();
        let (service, calls, _) = setup(gateway).await;

        let result = service
            .initiate_call(AgentId::new(), "+15551234567", "+15559876543")
            .await;

        assert!(matches!(result, Err(DomainError::Validation(_))));
        assert!(calls.list_recent(50).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_initiate_call_inactive_agent_rejected() {
        let gateway = MockTelephonyGateway::new();
        let calls = Arc::new(InMemoryCallRecordRepository::new());
        let agents = Arc::new(InMemoryAgentRepository::new());

        let mut agent = Agent::new(CreateAgent {
            name: "Ava".to_string(),
            prompt: "prompt".to_string(),
            voice_settings: None,
            personality_settings: None,
        });
        agent.deactivate();
        agents.create(&agent).await.unwrap();

        let service = CallService::new(
            calls,
            agents,
            Arc::new(gateway),
            Arc::new(CallLocks::new()),
            "http://localhost:8000".to_string(),
        );

        let result = service
            .initiate_call(agent.id, "+15551234567", "+15559876543")
            .await;
        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[tokio::test]
    async fn test_update_call_status_rejects_unknown_status() {
        let mut gateway = MockTelephonyGateway::new();
        gateway
            .expect_place_call()
            .returning(|_| Ok("R1".to_string()));
        let (service, _, agent) = setup(gateway).await;

        let record = service
            .initiate_call(agent.id, "+15551234567", "+15559876543")
            .await
            .unwrap();

        let result = service
            .update_call_status(record.id, "ringing", None)
            .await;
        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[tokio::test]
    async fn test_update_call_status_merges_metadata() {
        let mut gateway = MockTelephonyGateway::new();
        gateway
            .expect_place_call()
            .returning(|_| Ok("R1".to_string()));
        let (service, _, agent) = setup(gateway).await;

        let record = service
            .initiate_call(agent.id, "+15551234567", "+15559876543")
            .await
            .unwrap();

        let mut first = Map::new();
        first.insert("a".to_string(), Value::from(1));
        service
            .update_call_status(record.id, "answered", Some(first))
            .await
            .unwrap();

        let mut second = Map::new();
        second.insert("b".to_string(), Value::from(2));
        let updated = service
            .update_call_status(record.id, "completed", Some(second))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.call_metadata.get("a"), Some(&Value::from(1)));
        assert_eq!(updated.call_metadata.get("b"), Some(&Value::from(2)));
        assert!(updated.ended_at.is_some());
    }

    #[tokio::test]
    async fn test_update_call_status_unknown_call() {
        let gateway = MockTelephonyGateway::new();
        let (service, _, _) = setup(gateway).await;

        let updated = service
            .update_call_status(CallId::new(), "completed", None)
            .await
            .unwrap();
        assert!(updated.is_none());
    }
}
