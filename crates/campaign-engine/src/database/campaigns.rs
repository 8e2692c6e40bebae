//! Campaign rows and queries
//!
//! Aggregate fields (`total_calls`, `successful_calls`, `failed_calls`,
//! `started_at`, `completed_at`) are written only by the event reconciler;
//! everything else is API-owned and frozen while the campaign is active.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use super::{CampaignStatus, DatabaseManager, LeadStatus};

#[derive(Debug, Clone)]
pub struct DbCampaign {
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
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub total_calls: i64,
    pub successful_calls: i64,
    pub failed_calls: i64,
    pub created_at: DateTime<Utc>,
}

impl DbCampaign {
    pub fn get_status(&self) -> Option<CampaignStatus> {
        CampaignStatus::parse(&self.status)
    }

    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self> {
        Ok(DbCampaign {
            id: row.try_get("id")?,
            tenant_id: row.try_get("tenant_id")?,
            name: row.try_get("name")?,
            status: row.try_get("status")?,
            max_concurrent: row.try_get("max_concurrent")?,
            retry_failed: row.try_get("retry_failed")?,
            retry_attempts: row.try_get("retry_attempts")?,
            call_delay_ms: row.try_get("call_delay_ms")?,
            sip_trunk_id: row.try_get("sip_trunk_id")?,
            caller_id_number: row.try_get("caller_id_number")?,
            agent_name: row.try_get("agent_name")?,
            started_at: row.try_get("started_at")?,
            completed_at: row.try_get("completed_at")?,
            total_calls: row.try_get("total_calls")?,
            successful_calls: row.try_get("successful_calls")?,
            failed_calls: row.try_get("failed_calls")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// Fields for a new campaign row.
#[derive(Debug, Clone)]
pub struct NewCampaign {
    pub tenant_id: String,
    pub name: String,
    pub max_concurrent: i64,
    pub retry_failed: bool,
    pub retry_attempts: i64,
    pub call_delay_ms: i64,
    pub sip_trunk_id: Option<String>,
    pub caller_id_number: Option<String>,
    pub agent_name: Option<String>,
}

/// Lead counts by status for one campaign.
#[derive(Debug, Clone, Copy, Default)]
pub struct LeadCounts {
    pub pending: i64,
    pub calling: i64,
    pub completed: i64,
    pub failed: i64,
}

impl LeadCounts {
    pub fn total(&self) -> i64 {
        self.pending + self.calling + self.completed + self.failed
    }
}

/// Final aggregates written when a campaign finishes.
#[derive(Debug, Clone, Copy, Default)]
pub struct CampaignAggregates {
    pub total_calls: i64,
    pub successful_calls: i64,
    pub failed_calls: i64,
}

const CAMPAIGN_COLUMNS: &str = "id, tenant_id, name, status, max_concurrent, retry_failed, \
    retry_attempts, call_delay_ms, sip_trunk_id, caller_id_number, agent_name, started_at, \
    completed_at, total_calls, successful_calls, failed_calls, created_at";

impl DatabaseManager {
    pub async fn create_campaign(&self, new: NewCampaign) -> Result<DbCampaign> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO campaigns (id, tenant_id, name, status, max_concurrent, retry_failed,
                retry_attempts, call_delay_ms, sip_trunk_id, caller_id_number, agent_name,
                created_at)
             VALUES (?, ?, ?, 'draft', ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&new.tenant_id)
        .bind(&new.name)
        .bind(new.max_concurrent.max(1))
        .bind(new.retry_failed)
        .bind(new.retry_attempts.max(0))
        .bind(new.call_delay_ms.max(0))
        .bind(&new.sip_trunk_id)
        .bind(&new.caller_id_number)
        .bind(&new.agent_name)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.get_campaign(&new.tenant_id, &id)
            .await?
            .ok_or_else(|| anyhow!("campaign {id} vanished after insert"))
    }

    /// Tenant-scoped fetch; a cross-tenant id comes back `None`.
    pub async fn get_campaign(&self, tenant_id: &str, id: &str) -> Result<Option<DbCampaign>> {
        let row = sqlx::query(&format!(
            "SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE id = ? AND tenant_id = ?"
        ))
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(DbCampaign::from_row(&row)?)),
            None => Ok(None),
        }
    }

    /// Unscoped fetch for the runtime/reconciler side.
    pub async fn get_campaign_by_id(&self, id: &str) -> Result<Option<DbCampaign>> {
        let row =
            sqlx::query(&format!("SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE id = ?"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some(row) => Ok(Some(DbCampaign::from_row(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn list_campaigns(&self, tenant_id: &str) -> Result<Vec<DbCampaign>> {
        let rows = sqlx::query(&format!(
            "SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE tenant_id = ? ORDER BY created_at DESC"
        ))
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        let mut campaigns = Vec::new();
        for row in rows {
            campaigns.push(DbCampaign::from_row(&row)?);
        }
        Ok(campaigns)
    }

    pub async fn set_campaign_status(&self, id: &str, status: CampaignStatus) -> Result<()> {
        sqlx::query("UPDATE campaigns SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_campaign_started(&self, id: &str) -> Result<()> {
        sqlx::query(
            "UPDATE campaigns SET status = 'active',
                started_at = COALESCE(started_at, ?),
                completed_at = NULL
             WHERE id = ?",
        )
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn set_campaign_stopped(&self, id: &str) -> Result<()> {
        sqlx::query("UPDATE campaigns SET status = 'stopped', completed_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_campaign_completed(
        &self,
        id: &str,
        aggregates: CampaignAggregates,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE campaigns SET status = 'completed', completed_at = ?,
                total_calls = ?, successful_calls = ?, failed_calls = ?
             WHERE id = ?",
        )
        .bind(Utc::now())
        .bind(aggregates.total_calls)
        .bind(aggregates.successful_calls)
        .bind(aggregates.failed_calls)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn campaign_lead_counts(&self, campaign_id: &str) -> Result<LeadCounts> {
        let rows = sqlx::query(
            "SELECT status, COUNT(*) as count FROM leads WHERE campaign_id = ? GROUP BY status",
        )
        .bind(campaign_id)
        .fetch_all(&self.pool)
        .await?;

        let mut counts = LeadCounts::default();
        for row in rows {
            let status: String = row.try_get("status")?;
            let count: i64 = row.try_get("count")?;
            match LeadStatus::parse(&status) {
                Some(LeadStatus::Pending) => counts.pending = count,
                Some(LeadStatus::Calling) => counts.calling = count,
                Some(LeadStatus::Completed) => counts.completed = count,
                Some(LeadStatus::Failed) => counts.failed = count,
                None => {}
            }
        }
        Ok(counts)
    }
}
