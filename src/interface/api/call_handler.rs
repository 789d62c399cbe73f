//! Call management API handlers

use super::dto::{
    ApiResponse, CallListResponse, CallRecordResponse, InitiateCallRequest,
    UpdateCallStatusRequest,
};
use crate::application::{AudioBridge, CallService, WebhookDispatcher};
use crate::domain::shared::error::DomainError;
use crate::domain::shared::value_objects::{AgentId, CallId};
use crate::domain::agent::AgentRepository;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub call_service: Arc<CallService>,
    pub agent_repository: Arc<dyn AgentRepository>,
    pub dispatcher: Arc<WebhookDispatcher>,
    pub bridge: Arc<AudioBridge>,
}

/// Query parameters for listing calls
#[derive(Debug, Deserialize)]
pub struct ListCallsQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

/// Initiate an outbound call
pub async fn initiate_call(
    State(state): State<AppState>,
    Json(req): Json<InitiateCallRequest>,
) -> (StatusCode, Json<ApiResponse<CallRecordResponse>>) {
    info!(
        "API: Initiating call for agent {}: {} -> {}",
        req.agent_id, req.from_number, req.to_number
    );

    let agent_id = AgentId::from_uuid(req.agent_id);
    match state
        .call_service
        .initiate_call(agent_id, &req.from_number, &req.to_number)
        .await
    {
        Ok(record) => (
            StatusCode::CREATED,
            Json(ApiResponse::success(record.into())),
        ),
        Err(e @ DomainError::Validation(_)) => {
            (StatusCode::BAD_REQUEST, Json(ApiResponse::error(e.to_string())))
        }
        Err(e) => {
            error!("API: Failed to initiate call: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error(e.to_string())),
            )
        }
    }
}

/// List recent call records
pub async fn list_calls(
    State(state): State<AppState>,
    Query(query): Query<ListCallsQuery>,
) -> (StatusCode, Json<ApiResponse<CallListResponse>>) {
    match state.call_service.get_call_records(query.limit).await {
        Ok(records) => {
            let calls: Vec<CallRecordResponse> =
                records.into_iter().map(CallRecordResponse::from).collect();
            let total = calls.len();
            (
                StatusCode::OK,
                Json(ApiResponse::success(CallListResponse { calls, total })),
            )
        }
        Err(e) => {
            error!("API: Failed to list calls: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error(e.to_string())),
            )
        }
    }
}

/// Get a call record by ID
pub async fn get_call(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> (StatusCode, Json<ApiResponse<CallRecordResponse>>) {
    match state
        .call_service
        .get_call_record_by_id(CallId::from_uuid(id))
        .await
    {
        Ok(Some(record)) => (StatusCode::OK, Json(ApiResponse::success(record.into()))),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error(format!("Call {} not found", id))),
        ),
        Err(e) => {
            error!("API: Failed to get call {}: {}", id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error(e.to_string())),
            )
        }
    }
}

/// Administrative status override
pub async fn update_call_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateCallStatusRequest>,
) -> (StatusCode, Json<ApiResponse<CallRecordResponse>>) {
    info!("API: Setting call {} status to {}", id, req.status);

    match state
        .call_service
        .update_call_status(CallId::from_uuid(id), &req.status, req.metadata)
        .await
    {
        Ok(Some(record)) => (StatusCode::OK, Json(ApiResponse::success(record.into()))),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error(format!("Call {} not found", id))),
        ),
        Err(e) if e.is_client_error() => {
            (StatusCode::BAD_REQUEST, Json(ApiResponse::error(e.to_string())))
        }
        Err(e) => {
            error!("API: Failed to update call {}: {}", id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error(e.to_string())),
            )
        }
    }
}
