//! Campaign CRUD and control handlers

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::agent::SelectionStrategy;
use crate::database::{CampaignStatus, DbCampaign, NewCampaign};
use crate::error::EngineError;

use super::{created, ok, ApiResult, ApiState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCampaignRequest {
    pub name: String,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: i64,
    #[serde(default)]
    pub retry_failed: bool,
    #[serde(default)]
    pub retry_attempts: i64,
    #[serde(default)]
    pub call_delay_ms: i64,
    pub sip_trunk_id: Option<String>,
    pub caller_id_number: Option<String>,
    pub agent_name: Option<String>,
}

fn default_max_concurrent() -> i64 {
    1
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCampaignRequest {
    pub name: Option<String>,
    pub max_concurrent: Option<i64>,
    pub retry_failed: Option<bool>,
    pub retry_attempts: Option<i64>,
    pub call_delay_ms: Option<i64>,
    pub sip_trunk_id: Option<String>,
    pub caller_id_number: Option<String>,
    pub agent_name: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct StartCampaignRequest {
    pub strategy: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignDto {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub status: String,
    pub max_concurrent: i64,
    pub retry_failed: bool,
    pub retry_attempts: i64,
    pub call_delay_ms: i64,
    pub sip_trunk_id: Option<String>,
    pub caller_id_number: Option<String>,
    pub agent_name: Option<String>,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub total_calls: i64,
    pub successful_calls: i64,
    pub failed_calls: i64,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<DbCampaign> for CampaignDto {
    fn from(c: DbCampaign) -> Self {
        Self {
            id: c.id,
            tenant_id: c.tenant_id,
            name: c.name,
            status: c.status,
            max_concurrent: c.max_concurrent,
            retry_failed: c.retry_failed,
            retry_attempts: c.retry_attempts,
            call_delay_ms: c.call_delay_ms,
            sip_trunk_id: c.sip_trunk_id,
            caller_id_number: c.caller_id_number,
            agent_name: c.agent_name,
            started_at: c.started_at,
            completed_at: c.completed_at,
            total_calls: c.total_calls,
            successful_calls: c.successful_calls,
            failed_calls: c.failed_calls,
            created_at: c.created_at,
        }
    }
}

/// `POST /api/v1/tenants/{tid}/campaigns`
pub async fn create_campaign(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(tenant_id): Path<String>,
    Json(request): Json<CreateCampaignRequest>,
) -> ApiResult<impl IntoResponse> {
    state.auth.authorize_tenant(&headers, &tenant_id)?;

    if request.name.trim().is_empty() {
        return Err(EngineError::validation("campaign name is required").into());
    }
    if state.db.get_tenant(&tenant_id).await?.is_none() {
        return Err(EngineError::not_found(format!("tenant {tenant_id}")).into());
    }

    let campaign = state
        .db
        .create_campaign(NewCampaign {
            tenant_id: tenant_id.clone(),
            name: request.name.trim().to_string(),
            max_concurrent: request.max_concurrent,
            retry_failed: request.retry_failed,
            retry_attempts: request.retry_attempts,
            call_delay_ms: request.call_delay_ms,
            sip_trunk_id: request.sip_trunk_id,
            caller_id_number: request.caller_id_number,
            agent_name: request.agent_name,
        })
        .await?;
    Ok(created(CampaignDto::from(campaign)))
}

/// `GET /api/v1/tenants/{tid}/campaigns`
pub async fn list_campaigns(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(tenant_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    state.auth.authorize_tenant(&headers, &tenant_id)?;

    let campaigns = state.db.list_campaigns(&tenant_id).await?;
    let dtos: Vec<CampaignDto> = campaigns.into_iter().map(CampaignDto::from).collect();
    Ok(ok(dtos))
}

/// `GET /api/v1/tenants/{tid}/campaigns/{id}`
pub async fn get_campaign(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path((tenant_id, campaign_id)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    state.auth.authorize_tenant(&headers, &tenant_id)?;

    let campaign = fetch_campaign(&state, &tenant_id, &campaign_id).await?;
    Ok(ok(CampaignDto::from(campaign)))
}

/// `PUT /api/v1/tenants/{tid}/campaigns/{id}` — rejected while active.
pub async fn update_campaign(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path((tenant_id, campaign_id)): Path<(String, String)>,
    Json(request): Json<UpdateCampaignRequest>,
) -> ApiResult<impl IntoResponse> {
    state.auth.authorize_tenant(&headers, &tenant_id)?;

    let campaign = fetch_campaign(&state, &tenant_id, &campaign_id).await?;
    if campaign.get_status() == Some(CampaignStatus::Active)
        || state.supervisor.is_running(&campaign_id)
    {
        return Err(EngineError::precondition(
            "campaign_active",
            "campaign cannot be modified while active",
        )
        .into());
    }

    sqlx::query(
        "UPDATE campaigns SET
            name = COALESCE(?, name),
            max_concurrent = COALESCE(?, max_concurrent),
            retry_failed = COALESCE(?, retry_failed),
            retry_attempts = COALESCE(?, retry_attempts),
            call_delay_ms = COALESCE(?, call_delay_ms),
            sip_trunk_id = COALESCE(?, sip_trunk_id),
            caller_id_number = COALESCE(?, caller_id_number),
            agent_name = COALESCE(?, agent_name)
         WHERE id = ? AND tenant_id = ?",
    )
    .bind(&request.name)
    .bind(request.max_concurrent)
    .bind(request.retry_failed)
    .bind(request.retry_attempts)
    .bind(request.call_delay_ms)
    .bind(&request.sip_trunk_id)
    .bind(&request.caller_id_number)
    .bind(&request.agent_name)
    .bind(&campaign_id)
    .bind(&tenant_id)
    .execute(state.db.pool())
    .await
    .map_err(EngineError::from)?;

    let campaign = fetch_campaign(&state, &tenant_id, &campaign_id).await?;
    Ok(ok(CampaignDto::from(campaign)))
}

/// `POST /api/v1/tenants/{tid}/campaigns/{id}/start`
pub async fn start_campaign(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path((tenant_id, campaign_id)): Path<(String, String)>,
    body: Option<Json<StartCampaignRequest>>,
) -> ApiResult<impl IntoResponse> {
    state.auth.authorize_tenant(&headers, &tenant_id)?;

    let strategy = body
        .and_then(|Json(b)| b.strategy)
        .map(|raw| {
            SelectionStrategy::parse(&raw).ok_or_else(|| {
                EngineError::validation(format!("unknown selection strategy: {raw}"))
            })
        })
        .transpose()?;

    state.supervisor.start_campaign(&tenant_id, &campaign_id, strategy).await?;
    Ok(ok(json!({ "campaignId": campaign_id, "status": "active" })))
}

/// `POST /api/v1/tenants/{tid}/campaigns/{id}/pause`
pub async fn pause_campaign(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path((tenant_id, campaign_id)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    state.auth.authorize_tenant(&headers, &tenant_id)?;
    state.supervisor.pause_campaign(&tenant_id, &campaign_id).await?;
    Ok(ok(json!({ "campaignId": campaign_id, "status": "paused" })))
}

/// `POST /api/v1/tenants/{tid}/campaigns/{id}/resume`
pub async fn resume_campaign(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path((tenant_id, campaign_id)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    state.auth.authorize_tenant(&headers, &tenant_id)?;
    state.supervisor.resume_campaign(&tenant_id, &campaign_id).await?;
    Ok(ok(json!({ "campaignId": campaign_id, "status": "active" })))
}

/// `POST /api/v1/tenants/{tid}/campaigns/{id}/stop`
pub async fn stop_campaign(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path((tenant_id, campaign_id)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    state.auth.authorize_tenant(&headers, &tenant_id)?;
    state.supervisor.stop_campaign(&tenant_id, &campaign_id).await?;
    Ok(ok(json!({ "campaignId": campaign_id, "status": "stopped" })))
}

/// `GET /api/v1/tenants/{tid}/campaigns/{id}/stats` — store aggregates,
/// plus a realtime block while the campaign runs in this process.
pub async fn campaign_stats(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path((tenant_id, campaign_id)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    state.auth.authorize_tenant(&headers, &tenant_id)?;

    let campaign = fetch_campaign(&state, &tenant_id, &campaign_id).await?;
    let lead_counts = state.db.campaign_lead_counts(&campaign_id).await?;
    let call_logs = state.db.count_call_logs(&campaign_id).await?;
    let realtime = state.supervisor.realtime_status(&campaign_id);

    Ok(ok(json!({
        "campaign": CampaignDto::from(campaign),
        "leads": {
            "total": lead_counts.total(),
            "pending": lead_counts.pending,
            "calling": lead_counts.calling,
            "completed": lead_counts.completed,
            "failed": lead_counts.failed,
        },
        "callLogs": call_logs,
        "realtime": realtime,
    })))
}

async fn fetch_campaign(
    state: &ApiState,
    tenant_id: &str,
    campaign_id: &str,
) -> ApiResult<DbCampaign> {
    Ok(state
        .db
        .get_campaign(tenant_id, campaign_id)
        .await
        .map_err(EngineError::from)?
        .ok_or_else(|| EngineError::not_found(format!("campaign {campaign_id}")))?)
}
