//! Provisioned phone-number handlers

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::database::{DbPhoneNumber, NewPhoneNumber};
use crate::error::EngineError;
use crate::phone::normalize_e164;

use super::{created, ok, ApiResult, ApiState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePhoneNumberRequest {
    pub number: String,
    pub provider_sid: Option<String>,
    #[serde(default = "default_number_type")]
    pub number_type: String,
    pub provider: Option<String>,
    pub campaign_id: Option<String>,
    pub livekit_trunk_id: Option<String>,
}

fn default_number_type() -> String {
    "LOCAL".to_string()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhoneNumberDto {
    pub id: String,
    pub tenant_id: String,
    pub number: String,
    pub provider_sid: Option<String>,
    pub number_type: String,
    pub provider: Option<String>,
    pub campaign_id: Option<String>,
    pub livekit_trunk_id: Option<String>,
    pub is_active: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<DbPhoneNumber> for PhoneNumberDto {
    fn from(p: DbPhoneNumber) -> Self {
        Self {
            id: p.id,
            tenant_id: p.tenant_id,
            number: p.number,
            provider_sid: p.provider_sid,
            number_type: p.number_type,
            provider: p.provider,
            campaign_id: p.campaign_id,
            livekit_trunk_id: p.livekit_trunk_id,
            is_active: p.is_active,
            created_at: p.created_at,
        }
    }
}

/// `POST /api/v1/tenants/{tid}/phone-numbers`
pub async fn create_phone_number(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(tenant_id): Path<String>,
    Json(request): Json<CreatePhoneNumberRequest>,
) -> ApiResult<impl IntoResponse> {
    state.auth.authorize_tenant(&headers, &tenant_id)?;

    let number = normalize_e164(&request.number, state.config.default_country_code.as_deref())?;
    if !matches!(request.number_type.as_str(), "LOCAL" | "MOBILE" | "TOLL_FREE") {
        return Err(EngineError::validation(format!(
            "unknown number type: {}",
            request.number_type
        ))
        .into());
    }
    if state.db.get_phone_number_by_number(&number).await?.is_some() {
        return Err(EngineError::conflict(format!("number {number} already provisioned")).into());
    }
    if let Some(campaign_id) = &request.campaign_id {
        state
            .db
            .get_campaign(&tenant_id, campaign_id)
            .await
            .map_err(EngineError::from)?
            .ok_or_else(|| EngineError::not_found(format!("campaign {campaign_id}")))?;
    }

    let phone_number = state
        .db
        .create_phone_number(NewPhoneNumber {
            tenant_id: tenant_id.clone(),
            number,
            provider_sid: request.provider_sid,
            number_type: request.number_type,
            provider: request.provider,
            campaign_id: request.campaign_id,
            livekit_trunk_id: request.livekit_trunk_id,
        })
        .await?;
    Ok(created(PhoneNumberDto::from(phone_number)))
}

/// `GET /api/v1/tenants/{tid}/phone-numbers`
pub async fn list_phone_numbers(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(tenant_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    state.auth.authorize_tenant(&headers, &tenant_id)?;

    let numbers = state.db.list_phone_numbers(&tenant_id).await?;
    let dtos: Vec<PhoneNumberDto> = numbers.into_iter().map(PhoneNumberDto::from).collect();
    Ok(ok(dtos))
}
