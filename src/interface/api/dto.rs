//! API DTOs

use crate::domain::agent::Agent;
use crate::domain::call::record::CallRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Generic API response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

/// Call record response
#[derive(Debug, Serialize, Deserialize)]
pub struct CallRecordResponse {
    pub id: Uuid,
    pub agent_id: Uuid,
    pub plivo_call_id: Option<String>,
    pub from_number: String,
    pub to_number: String,
    pub call_status: String,
    pub duration_seconds: Option<i64>,
    pub transcript: Option<String>,
    pub call_metadata: Map<String, Value>,
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<CallRecord> for CallRecordResponse {
    fn from(record: CallRecord) -> Self {
        CallRecordResponse {
            id: record.id.as_uuid(),
            agent_id: record.agent_id.as_uuid(),
            plivo_call_id: record.plivo_call_id,
            from_number: record.from_number,
            to_number: record.to_number,
            call_status: record.call_status.as_str().to_string(),
            duration_seconds: record.duration_seconds,
            transcript: record.transcript,
            call_metadata: record.call_metadata,
            error_message: record.error_message,
            started_at: record.started_at,
            ended_at: record.ended_at,
            created_at: record.created_at,
        }
    }
}

/// Call list response
#[derive(Debug, Serialize, Deserialize)]
pub struct CallListResponse {
    pub calls: Vec<CallRecordResponse>,
    pub total: usize,
}

/// Call initiation request
#[derive(Debug, Deserialize)]
pub struct InitiateCallRequest {
    pub agent_id: Uuid,
    pub from_number: String,
    pub to_number: String,
}

/// Administrative status override request
#[derive(Debug, Deserialize)]
pub struct UpdateCallStatusRequest {
    pub status: String,
    pub metadata: Option<Map<String, Value>>,
}

/// Agent response
#[derive(Debug, Serialize, Deserialize)]
pub struct AgentResponse {
    pub id: Uuid,
    pub name: String,
    pub prompt: String,
    pub voice_settings: Option<Map<String, Value>>,
    pub personality_settings: Option<Map<String, Value>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Agent> for AgentResponse {
    fn from(agent: Agent) -> Self {
        AgentResponse {
            id: agent.id.as_uuid(),
            name: agent.name,
            prompt: agent.prompt,
            voice_settings: agent.voice_settings,
            personality_settings: agent.personality_settings,
            is_active: agent.is_active,
            created_at: agent.created_at,
            updated_at: agent.updated_at,
        }
    }
}

/// Agent list response
#[derive(Debug, Serialize, Deserialize)]
pub struct AgentListResponse {
    pub agents: Vec<AgentResponse>,
    pub total: usize,
}

/// Agent creation request
#[derive(Debug, Deserialize)]
pub struct CreateAgentRequest {
    pub name: String,
    pub prompt: String,
    pub voice_settings: Option<Map<String, Value>>,
    pub personality_settings: Option<Map<String, Value>>,
}

/// Agent update request
#[derive(Debug, Deserialize)]
pub struct UpdateAgentRequest {
    pub name: Option<String>,
    pub prompt: Option<String>,
    pub voice_settings: Option<Map<String, Value>>,
    pub personality_settings: Option<Map<String, Value>>,
}

/// Soft-delete acknowledgment
#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub id: Uuid,
    pub deleted: bool,
}
