//! Agent handlers: global registry plus campaign assignments

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::database::{DbAgent, NewAgent};
use crate::error::EngineError;

use super::{created, ok, ApiResult, ApiState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAgentRequest {
    pub name: String,
    #[serde(default = "default_max_calls")]
    pub max_concurrent_calls: i64,
    pub livekit_agent_name: Option<String>,
}

fn default_max_calls() -> i64 {
    1
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignAgentRequest {
    pub agent_id: String,
    #[serde(default)]
    pub is_primary: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentDto {
    pub id: String,
    pub name: String,
    pub is_active: bool,
    pub max_concurrent_calls: i64,
    pub livekit_agent_name: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<DbAgent> for AgentDto {
    fn from(a: DbAgent) -> Self {
        Self {
            id: a.id,
            name: a.name,
            is_active: a.is_active,
            max_concurrent_calls: a.max_concurrent_calls,
            livekit_agent_name: a.livekit_agent_name,
            created_at: a.created_at,
        }
    }
}

/// `POST /api/v1/agents` — system admin only.
pub async fn create_agent(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(request): Json<CreateAgentRequest>,
) -> ApiResult<impl IntoResponse> {
    state.auth.authorize_admin(&headers)?;

    if request.name.trim().is_empty() {
        return Err(EngineError::validation("agent name is required").into());
    }

    let agent = state
        .db
        .create_agent(NewAgent {
            name: request.name.trim().to_string(),
            max_concurrent_calls: request.max_concurrent_calls,
            livekit_agent_name: request.livekit_agent_name,
        })
        .await?;
    Ok(created(AgentDto::from(agent)))
}

/// `GET /api/v1/agents`
pub async fn list_agents(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> ApiResult<impl IntoResponse> {
    state.auth.authorize_any(&headers)?;

    let agents = state.db.list_agents().await?;
    let dtos: Vec<AgentDto> = agents.into_iter().map(AgentDto::from).collect();
    Ok(ok(dtos))
}

/// `POST /api/v1/tenants/{tid}/campaigns/{cid}/agents`
pub async fn assign_agent(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path((tenant_id, campaign_id)): Path<(String, String)>,
    Json(request): Json<AssignAgentRequest>,
) -> ApiResult<impl IntoResponse> {
    state.auth.authorize_tenant(&headers, &tenant_id)?;

    state
        .db
        .get_campaign(&tenant_id, &campaign_id)
        .await
        .map_err(EngineError::from)?
        .ok_or_else(|| EngineError::not_found(format!("campaign {campaign_id}")))?;
    state
        .db
        .get_agent(&request.agent_id)
        .await
        .map_err(EngineError::from)?
        .ok_or_else(|| EngineError::not_found(format!("agent {}", request.agent_id)))?;

    state
        .db
        .assign_agent_to_campaign(&campaign_id, &request.agent_id, request.is_primary)
        .await?;
    Ok(created(json!({
        "campaignId": campaign_id,
        "agentId": request.agent_id,
        "isPrimary": request.is_primary,
    })))
}

/// `GET /api/v1/tenants/{tid}/campaigns/{cid}/agents`
pub async fn list_campaign_agents(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path((tenant_id, campaign_id)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    state.auth.authorize_tenant(&headers, &tenant_id)?;

    state
        .db
        .get_campaign(&tenant_id, &campaign_id)
        .await
        .map_err(EngineError::from)?
        .ok_or_else(|| EngineError::not_found(format!("campaign {campaign_id}")))?;

    let assignments = state.db.campaign_assignments(&campaign_id).await?;
    let dtos: Vec<serde_json::Value> = assignments
        .into_iter()
        .map(|a| {
            json!({
                "agentId": a.agent_id,
                "name": a.name,
                "maxConcurrentCalls": a.max_concurrent_calls,
                "livekitAgentName": a.livekit_agent_name,
                "isPrimary": a.is_primary,
                "assignedAt": a.assigned_at,
            })
        })
        .collect();
    Ok(ok(dtos))
}
