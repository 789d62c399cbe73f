//! Agent management API handlers

use super::call_handler::AppState;
use super::dto::{
    AgentListResponse, AgentResponse, ApiResponse, CreateAgentRequest, DeleteResponse,
    UpdateAgentRequest,
};
use crate::domain::agent::{Agent, CreateAgent, UpdateAgent};
use crate::domain::shared::value_objects::AgentId;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::{error, info};
use uuid::Uuid;

/// Create a new agent
pub async fn create_agent(
    State(state): State<AppState>,
    Json(req): Json<CreateAgentRequest>,
) -> (StatusCode, Json<ApiResponse<AgentResponse>>) {
    info!("API: Creating agent {}", req.name);

    let agent = Agent::new(CreateAgent {
        name: req.name,
        prompt: req.prompt,
        voice_settings: req.voice_settings,
        personality_settings: req.personality_settings,
    });

    match state.agent_repository.create(&agent).await {
        Ok(()) => (
            StatusCode::CREATED,
            Json(ApiResponse::success(agent.into())),
        ),
        Err(e) => {
            error!("API: Failed to create agent: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error(e.to_string())),
            )
        }
    }
}

/// List active agents
pub async fn list_agents(
    State(state): State<AppState>,
) -> (StatusCode, Json<ApiResponse<AgentListResponse>>) {
    match state.agent_repository.list_active().await {
        Ok(agents) => {
            let agents: Vec<AgentResponse> = agents.into_iter().map(AgentResponse::from).collect();
            let total = agents.len();
            (
                StatusCode::OK,
                Json(ApiResponse::success(AgentListResponse { agents, total })),
            )
        }
        Err(e) => {
            error!("API: Failed to list agents: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error(e.to_string())),
            )
        }
    }
}

/// Get an active agent by ID
pub async fn get_agent(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> (StatusCode, Json<ApiResponse<AgentResponse>>) {
    match state
        .agent_repository
        .find_active_by_id(AgentId::from_uuid(id))
        .await
    {
        Ok(Some(agent)) => (StatusCode::OK, Json(ApiResponse::success(agent.into()))),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error(format!("Agent {} not found", id))),
        ),
        Err(e) => {
            error!("API: Failed to get agent {}: {}", id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error(e.to_string())),
            )
        }
    }
}

/// Update an agent
pub async fn update_agent(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateAgentRequest>,
) -> (StatusCode, Json<ApiResponse<AgentResponse>>) {
    info!("API: Updating agent {}", id);

    let mut agent = match state
        .agent_repository
        .find_active_by_id(AgentId::from_uuid(id))
        .await
    {
        Ok(Some(agent)) => agent,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ApiResponse::error(format!("Agent {} not found", id))),
            )
        }
        Err(e) => {
            error!("API: Failed to get agent {}: {}", id, e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error(e.to_string())),
            );
        }
    };

    agent.apply_update(UpdateAgent {
        name: req.name,
        prompt: req.prompt,
        voice_settings: req.voice_settings,
        personality_settings: req.personality_settings,
    });

    match state.agent_repository.update(&agent).await {
        Ok(()) => (StatusCode::OK, Json(ApiResponse::success(agent.into()))),
        Err(e) => {
            error!("API: Failed to update agent {}: {}", id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error(e.to_string())),
            )
        }
    }
}

/// Soft-delete an agent
pub async fn delete_agent(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> (StatusCode, Json<ApiResponse<DeleteResponse>>) {
    info!("API: Deactivating agent {}", id);

    let mut agent = match state
        .agent_repository
        .find_active_by_id(AgentId::from_uuid(id))
        .await
    {
        Ok(Some(agent)) => agent,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ApiResponse::error(format!("Agent {} not found", id))),
            )
        }
        Err(e) => {
            error!("API: Failed to get agent {}: {}", id, e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error(e.to_string())),
            );
        }
    };

    agent.deactivate();
    match state.agent_repository.update(&agent).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse::success(DeleteResponse { id, deleted: true })),
        ),
        Err(e) => {
            error!("API: Failed to deactivate agent {}: {}", id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error(e.to_string())),
            )
        }
    }
}
