//! In-memory repository implementations
//!
//! Used by the integration tests and as the runtime fallback when no
//! database is configured. Maps are guarded by async RwLocks; the
//! per-call serialization that prevents lost updates lives above the
//! repository, in the application layer's lock registry.

use crate::domain::agent::{Agent, AgentRepository};
use crate::domain::call::record::CallRecord;
use crate::domain::call::repository::CallRecordRepository;
use crate::domain::shared::result::Result;
use crate::domain::shared::value_objects::{AgentId, CallId};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// In-memory call record store
#[derive(Default)]
pub struct InMemoryCallRecordRepository {
    records: RwLock<HashMap<CallId, CallRecord>>,
}

impl InMemoryCallRecordRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl CallRecordRepository for InMemoryCallRecordRepository {
    async fn find_by_id(&self, id: CallId) -> Result<Option<CallRecord>> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn save(&self, record: &CallRecord) -> Result<()> {
        self.records
            .write()
            .await
            .insert(record.id, record.clone());
        Ok(())
    }

    async fn list_recent(&self, limit: i64) -> Result<Vec<CallRecord>> {
        let mut records: Vec<CallRecord> = self.records.read().await.values().cloned().collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records.truncate(limit.max(0) as usize);
        Ok(records)
    }

    async fn find_stale(&self, cutoff: DateTime<Utc>) -> Result<Vec<CallRecord>> {
        let records = self
            .records
            .read()
            .await
            .values()
            .filter(|record| !record.is_terminal() && record.created_at < cutoff)
            .cloned()
            .collect();
        Ok(records)
    }
}

/// In-memory agent store
#[derive(Default)]
pub struct InMemoryAgentRepository {
    agents: RwLock<HashMap<AgentId, Agent>>,
}

impl InMemoryAgentRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl AgentRepository for InMemoryAgentRepository {
    async fn create(&self, agent: &Agent) -> Result<()> {
        self.agents.write().await.insert(agent.id, agent.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: AgentId) -> Result<Option<Agent>> {
        Ok(self.agents.read().await.get(&id).cloned())
    }

    async fn find_active_by_id(&self, id: AgentId) -> Result<Option<Agent>> {
        Ok(self
            .agents
            .read()
            .await
            .get(&id)
            .filter(|agent| agent.is_active)
            .cloned())
    }

    async fn list_active(&self) -> Result<Vec<Agent>> {
        let mut agents: Vec<Agent> = self
            .agents
            .read()
            .await
            .values()
            .filter(|agent| agent.is_active)
            .cloned()
            .collect();
        agents.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(agents)
    }

    async fn update(&self, agent: &Agent) -> Result<()> {
        self.agents.write().await.insert(agent.id, agent.clone());
        Ok(())
    }
}
