//! Lead ingest and stats handlers

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::database::{DbLead, NewLead};
use crate::error::EngineError;

use super::{created, ok, ApiResult, ApiState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkLeadsRequest {
    pub leads: Vec<LeadInput>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadInput {
    pub phone_number: String,
    pub name: Option<String>,
    #[serde(default)]
    pub priority: i64,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadDto {
    pub id: String,
    pub campaign_id: String,
    pub phone_number: String,
    pub name: Option<String>,
    pub priority: i64,
    pub status: String,
    pub attempts: i64,
    pub last_call_at: Option<chrono::DateTime<chrono::Utc>>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<DbLead> for LeadDto {
    fn from(l: DbLead) -> Self {
        Self {
            id: l.id,
            campaign_id: l.campaign_id,
            phone_number: l.phone_number,
            name: l.name,
            priority: l.priority,
            status: l.status,
            attempts: l.attempts,
            last_call_at: l.last_call_at,
            created_at: l.created_at,
        }
    }
}

/// `POST /api/v1/tenants/{tid}/campaigns/{cid}/leads/bulk`
///
/// Duplicate `(campaign, phoneNumber)` rows are skipped silently; the
/// response reports how many rows were actually created.
pub async fn bulk_create_leads(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path((tenant_id, campaign_id)): Path<(String, String)>,
    Json(request): Json<BulkLeadsRequest>,
) -> ApiResult<impl IntoResponse> {
    state.auth.authorize_tenant(&headers, &tenant_id)?;
    ensure_campaign(&state, &tenant_id, &campaign_id).await?;

    if request.leads.is_empty() {
        return Err(EngineError::validation("leads list is empty").into());
    }

    let mut new_leads = Vec::with_capacity(request.leads.len());
    for lead in &request.leads {
        let phone = lead.phone_number.trim();
        if phone.is_empty() {
            return Err(EngineError::validation("lead phoneNumber is required").into());
        }
        new_leads.push(NewLead {
            phone_number: phone.to_string(),
            name: lead.name.clone(),
            priority: lead.priority,
            metadata: lead.metadata.as_ref().map(|m| m.to_string()),
        });
    }

    let total = new_leads.len() as u64;
    let before: std::collections::HashSet<String> = state
        .db
        .pending_leads(&campaign_id)
        .await?
        .into_iter()
        .map(|l| l.id)
        .collect();
    let created_count = state.db.bulk_insert_leads(&tenant_id, &campaign_id, &new_leads).await?;

    // An active run picks up the newly created pending leads immediately;
    // rows that were skipped as duplicates are already queued.
    let fresh: Vec<DbLead> = state
        .db
        .pending_leads(&campaign_id)
        .await?
        .into_iter()
        .filter(|l| !before.contains(&l.id))
        .collect();
    state.supervisor.add_leads_if_running(&campaign_id, &fresh);

    Ok(created(json!({ "created": created_count, "total": total })))
}

/// `POST /api/v1/tenants/{tid}/campaigns/{cid}/leads/upload`
///
/// CSV body with a header line; accepts `phoneNumber|phone|number`,
/// `name`, `priority`, and `metadata` columns in any order.
pub async fn upload_leads_csv(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path((tenant_id, campaign_id)): Path<(String, String)>,
    body: String,
) -> ApiResult<impl IntoResponse> {
    state.auth.authorize_tenant(&headers, &tenant_id)?;
    ensure_campaign(&state, &tenant_id, &campaign_id).await?;

    let new_leads = parse_leads_csv(&body).map_err(EngineError::validation)?;
    if new_leads.is_empty() {
        return Err(EngineError::validation("csv contains no leads").into());
    }

    let total = new_leads.len() as u64;
    let created_count = state.db.bulk_insert_leads(&tenant_id, &campaign_id, &new_leads).await?;
    Ok(created(json!({ "created": created_count, "total": total })))
}

/// `GET /api/v1/tenants/{tid}/campaigns/{cid}/leads`
pub async fn list_leads(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path((tenant_id, campaign_id)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    state.auth.authorize_tenant(&headers, &tenant_id)?;
    ensure_campaign(&state, &tenant_id, &campaign_id).await?;

    let leads = state.db.list_leads(&tenant_id, &campaign_id).await?;
    let dtos: Vec<LeadDto> = leads.into_iter().map(LeadDto::from).collect();
    Ok(ok(dtos))
}

/// `GET /api/v1/tenants/{tid}/leads/stats`
pub async fn lead_stats(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Path(tenant_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    state.auth.authorize_tenant(&headers, &tenant_id)?;

    let stats = state.db.lead_stats(&tenant_id).await?;
    Ok(ok(json!({
        "total": stats.total,
        "pending": stats.pending,
        "calling": stats.calling,
        "completed": stats.completed,
        "failed": stats.failed,
    })))
}

async fn ensure_campaign(
    state: &ApiState,
    tenant_id: &str,
    campaign_id: &str,
) -> ApiResult<()> {
    state
        .db
        .get_campaign(tenant_id, campaign_id)
        .await
        .map_err(EngineError::from)?
        .ok_or_else(|| EngineError::not_found(format!("campaign {campaign_id}")))?;
    Ok(())
}

/// Header-driven CSV parsing; quoted fields are supported for metadata.
fn parse_leads_csv(body: &str) -> Result<Vec<NewLead>, String> {
    let mut lines = body.lines().filter(|l| !l.trim().is_empty());
    let header = lines.next().ok_or_else(|| "csv body is empty".to_string())?;

    let columns: Vec<String> =
        split_csv_line(header).iter().map(|c| c.trim().to_ascii_lowercase()).collect();
    let phone_idx = columns
        .iter()
        .position(|c| matches!(c.as_str(), "phonenumber" | "phone" | "number"))
        .ok_or_else(|| "csv is missing a phoneNumber/phone/number column".to_string())?;
    let name_idx = columns.iter().position(|c| c == "name");
    let priority_idx = columns.iter().position(|c| c == "priority");
    let metadata_idx = columns.iter().position(|c| c == "metadata");

    let mut leads = Vec::new();
    for (line_no, line) in lines.enumerate() {
        let fields = split_csv_line(line);
        let phone = fields
            .get(phone_idx)
            .map(|f| f.trim())
            .filter(|f| !f.is_empty())
            .ok_or_else(|| format!("row {} has no phone number", line_no + 2))?;

        let priority = match priority_idx.and_then(|i| fields.get(i)) {
            Some(raw) if !raw.trim().is_empty() => raw
                .trim()
                .parse::<i64>()
                .map_err(|_| format!("row {} has invalid priority: {raw}", line_no + 2))?,
            _ => 0,
        };

        leads.push(NewLead {
            phone_number: phone.to_string(),
            name: name_idx
                .and_then(|i| fields.get(i))
                .map(|f| f.trim().to_string())
                .filter(|f| !f.is_empty()),
            priority,
            metadata: metadata_idx
                .and_then(|i| fields.get(i))
                .map(|f| f.trim().to_string())
                .filter(|f| !f.is_empty()),
        });
    }
    Ok(leads)
}

fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                chars.next();
                current.push('"');
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                fields.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_parses_flexible_phone_column() {
        let leads = parse_leads_csv("phone,name,priority\n+15550001111,Ada,2\n+15550002222,,\n")
            .unwrap();
        assert_eq!(leads.len(), 2);
        assert_eq!(leads[0].phone_number, "+15550001111");
        assert_eq!(leads[0].name.as_deref(), Some("Ada"));
        assert_eq!(leads[0].priority, 2);
        assert_eq!(leads[1].priority, 0);
        assert!(leads[1].name.is_none());
    }

    #[test]
    fn csv_supports_quoted_metadata() {
        let leads =
            parse_leads_csv("number,metadata\n+15550001111,\"{\"\"k\"\":\"\"v,w\"\"}\"\n").unwrap();
        assert_eq!(leads[0].metadata.as_deref(), Some(r#"{"k":"v,w"}"#));
    }

    #[test]
    fn csv_without_phone_column_is_rejected() {
        assert!(parse_leads_csv("name,priority\nAda,1\n").is_err());
    }
}
