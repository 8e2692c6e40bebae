//! Tenant handlers

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::database::DbTenant;
use crate::error::EngineError;

use super::{created, ok, ApiResult, ApiState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTenantRequest {
    pub domain: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantDto {
    pub id: String,
    pub domain: String,
    pub is_active: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<DbTenant> for TenantDto {
    fn from(t: DbTenant) -> Self {
        Self { id: t.id, domain: t.domain, is_active: t.is_active, created_at: t.created_at }
    }
}

/// `POST /api/v1/tenants` — system admin only.
pub async fn create_tenant(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(request): Json<CreateTenantRequest>,
) -> ApiResult<impl IntoResponse> {
    state.auth.authorize_admin(&headers)?;

    let domain = request.domain.trim().to_lowercase();
    if domain.is_empty() {
        return Err(EngineError::validation("domain is required").into());
    }
    if state.db.get_tenant_by_domain(&domain).await?.is_some() {
        return Err(EngineError::conflict(format!("domain {domain} already exists")).into());
    }

    let tenant = state.db.create_tenant(&domain).await?;
    Ok(created(TenantDto::from(tenant)))
}

/// `GET /api/v1/tenants/{tenant_id}`
pub async fn get_tenant(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(tenant_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    state.auth.authorize_tenant(&headers, &tenant_id)?;

    let tenant = state
        .db
        .get_tenant(&tenant_id)
        .await?
        .ok_or_else(|| EngineError::not_found(format!("tenant {tenant_id}")))?;
    Ok(ok(TenantDto::from(tenant)))
}
