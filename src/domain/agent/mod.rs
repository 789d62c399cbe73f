//! Agent bounded context - AI personas that drive conversations
//!
//! An agent is a stored prompt plus voice/personality settings. The call
//! core reads an agent's prompt and id; profile management is simple
//! persistence with a soft-deactivate lifecycle.

use crate::domain::shared::result::Result;
use crate::domain::shared::value_objects::AgentId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Agent entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub name: String,
    /// Natural-language instructions handed to the realtime AI session
    pub prompt: String,
    pub voice_settings: Option<Map<String, Value>>,
    pub personality_settings: Option<Map<String, Value>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Agent {
    pub fn new(data: CreateAgent) -> Self {
        let now = Utc::now();
        Self {
            id: AgentId::new(),
            name: data.name,
            prompt: data.prompt,
            voice_settings: data.voice_settings,
            personality_settings: data.personality_settings,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a partial update; absent fields are left untouched
    pub fn apply_update(&mut self, data: UpdateAgent) {
        if let Some(name) = data.name {
            self.name = name;
        }
        if let Some(prompt) = data.prompt {
            self.prompt = prompt;
        }
        if let Some(voice_settings) = data.voice_settings {
            self.voice_settings = Some(voice_settings);
        }
        if let Some(personality_settings) = data.personality_settings {
            self.personality_settings = Some(personality_settings);
        }
        self.updated_at = Utc::now();
    }

    /// Soft delete: the row survives as history, inactive agents cannot
    /// be used to initiate calls
    pub fn deactivate(&mut self) {
        self.is_active = false;
        self.updated_at = Utc::now();
    }
}

/// Agent creation data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAgent {
    pub name: String,
    pub prompt: String,
    pub voice_settings: Option<Map<String, Value>>,
    pub personality_settings: Option<Map<String, Value>>,
}

/// Agent update data
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateAgent {
    pub name: Option<String>,
    pub prompt: Option<String>,
    pub voice_settings: Option<Map<String, Value>>,
    pub personality_settings: Option<Map<String, Value>>,
}

/// Agent repository trait
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait AgentRepository: Send + Sync {
    /// Create a new agent
    async fn create(&self, agent: &Agent) -> Result<()>;

    /// Find an agent by ID regardless of its active flag
    ///
    /// Webhook correlation must keep resolving agents that were
    /// deactivated mid-call.
    async fn find_by_id(&self, id: AgentId) -> Result<Option<Agent>>;

    /// Find an active agent by ID
    async fn find_active_by_id(&self, id: AgentId) -> Result<Option<Agent>>;

    /// List active agents, newest first
    async fn list_active(&self) -> Result<Vec<Agent>>;

    /// Persist an updated agent
    async fn update(&self, agent: &Agent) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn create_test_agent() -> Agent {
        Agent::new(CreateAgent {
            name: "Ava".to_string(),
            prompt: "You are a friendly scheduling assistant.".to_string(),
            voice_settings: None,
            personality_settings: None,
        })
    }

    #[test]
    fn test_new_agent_is_active() {
        let agent = create_test_agent();
        assert!(agent.is_active);
        assert_eq!(agent.name, "Ava");
    }

    #[test]
    fn test_partial_update() {
        let mut agent = create_test_agent();
        let voice = json!({"voice": "alloy"}).as_object().unwrap().clone();

        agent.apply_update(UpdateAgent {
            prompt: Some("You are a persistent sales agent.".to_string()),
            voice_settings: Some(voice),
            ..Default::default()
        });

        assert_eq!(agent.name, "Ava");
        assert_eq!(agent.prompt, "You are a persistent sales agent.");
        assert!(agent.voice_settings.is_some());
    }

    #[test]
    fn test_deactivate() {
        let mut agent = create_test_agent();
        agent.deactivate();
        assert!(!agent.is_active);
    }
}
