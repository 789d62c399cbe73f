//! PostgreSQL implementation of the agent repository

use crate::domain::agent::{Agent, AgentRepository};
use crate::domain::shared::error::DomainError;
use crate::domain::shared::result::Result;
use crate::domain::shared::value_objects::AgentId;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use tracing::{debug, error};
use uuid::Uuid;

#[derive(FromRow)]
struct AgentRow {
    id: Uuid,
    name: String,
    prompt: String,
    voice_settings: Option<String>,
    personality_settings: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<AgentRow> for Agent {
    fn from(r: AgentRow) -> Self {
        Agent {
            id: AgentId::from_uuid(r.id),
            name: r.name,
            prompt: r.prompt,
            voice_settings: r
                .voice_settings
                .and_then(|raw| serde_json::from_str(&raw).ok()),
            personality_settings: r
                .personality_settings
                .and_then(|raw| serde_json::from_str(&raw).ok()),
            is_active: r.is_active,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

const SELECT_COLUMNS: &str = r#"
    SELECT id, name, prompt, voice_settings, personality_settings,
           is_active, created_at, updated_at
    FROM agents
"#;

pub struct PgAgentRepository {
    pool: PgPool,
}

impl PgAgentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn encode_settings(
        settings: &Option<serde_json::Map<String, serde_json::Value>>,
    ) -> Result<Option<String>> {
        settings
            .as_ref()
            .map(|map| {
                serde_json::to_string(map)
                    .map_err(|e| DomainError::Internal(format!("Settings serialization: {}", e)))
            })
            .transpose()
    }
}

#[async_trait::async_trait]
impl AgentRepository for PgAgentRepository {
    async fn create(&self, agent: &Agent) -> Result<()> {
        debug!("Creating agent: {}", agent.id);

        sqlx::query(
            r#"
            INSERT INTO agents (
                id, name, prompt, voice_settings, personality_settings,
                is_active, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(agent.id.as_uuid())
        .bind(&agent.name)
        .bind(&agent.prompt)
        .bind(Self::encode_settings(&agent.voice_settings)?)
        .bind(Self::encode_settings(&agent.personality_settings)?)
        .bind(agent.is_active)
        .bind(agent.created_at)
        .bind(agent.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to create agent: {}", e);
            DomainError::Internal(format!("Database error: {}", e))
        })?;

        Ok(())
    }

    async fn find_by_id(&self, id: AgentId) -> Result<Option<Agent>> {
        let row = sqlx::query_as::<_, AgentRow>(&format!("{} WHERE id = $1", SELECT_COLUMNS))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to get agent: {}", e);
                DomainError::Internal(format!("Database error: {}", e))
            })?;

        Ok(row.map(Agent::from))
    }

    async fn find_active_by_id(&self, id: AgentId) -> Result<Option<Agent>> {
        let row = sqlx::query_as::<_, AgentRow>(&format!(
            "{} WHERE id = $1 AND is_active = TRUE",
            SELECT_COLUMNS
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to get active agent: {}", e);
            DomainError::Internal(format!("Database error: {}", e))
        })?;

        Ok(row.map(Agent::from))
    }

    async fn list_active(&self) -> Result<Vec<Agent>> {
        let rows = sqlx::query_as::<_, AgentRow>(&format!(
            "{} WHERE is_active = TRUE ORDER BY created_at DESC",
            SELECT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to list agents: {}", e);
            DomainError::Internal(format!("Database error: {}", e))
        })?;

        Ok(rows.into_iter().map(Agent::from).collect())
    }

    async fn update(&self, agent: &Agent) -> Result<()> {
        debug!("Updating agent: {}", agent.id);

        let result = sqlx::query(
            r#"
            UPDATE agents
            SET name = $2, prompt = $3, voice_settings = $4,
                personality_settings = $5, is_active = $6, updated_at = $7
            WHERE id = $1
            "#,
        )
        .bind(agent.id.as_uuid())
        .bind(&agent.name)
        .bind(&agent.prompt)
        .bind(Self::encode_settings(&agent.voice_settings)?)
        .bind(Self::encode_settings(&agent.personality_settings)?)
        .bind(agent.is_active)
        .bind(agent.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to update agent: {}", e);
            DomainError::Internal(format!("Database error: {}", e))
        })?;

        if result.rows_affected() == 0 {
            return Err(DomainError::NotFound(format!("Agent not found: {}", agent.id)));
        }

        Ok(())
    }
}
