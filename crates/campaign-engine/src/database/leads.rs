//! Lead rows and queries

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use super::{DatabaseManager, LeadStatus};

#[derive(Debug, Clone)]
pub struct DbLead {
    pub id: String,
    pub tenant_id: String,
    pub campaign_id: String,
    pub phone_number: String,
    pub name: Option<String>,
    pub priority: i64,
    pub status: String,
    pub attempts: i64,
    pub metadata: Option<String>,
    pub last_call_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl DbLead {
    pub fn get_status(&self) -> Option<LeadStatus> {
        LeadStatus::parse(&self.status)
    }

    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self> {
        Ok(DbLead {
            id: row.try_get("id")?,
            tenant_id: row.try_get("tenant_id")?,
            campaign_id: row.try_get("campaign_id")?,
            phone_number: row.try_get("phone_number")?,
            name: row.try_get("name")?,
            priority: row.try_get("priority")?,
            status: row.try_get("status")?,
            attempts: row.try_get("attempts")?,
            metadata: row.try_get("metadata")?,
            last_call_at: row.try_get("last_call_at")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// One lead in a bulk ingest batch.
#[derive(Debug, Clone)]
pub struct NewLead {
    pub phone_number: String,
    pub name: Option<String>,
    pub priority: i64,
    pub metadata: Option<String>,
}

/// Tenant-wide lead totals by status.
#[derive(Debug, Clone, Copy, Default)]
pub struct LeadStats {
    pub total: i64,
    pub pending: i64,
    pub calling: i64,
    pub completed: i64,
    pub failed: i64,
}

const LEAD_COLUMNS: &str = "id, tenant_id, campaign_id, phone_number, name, priority, status, \
    attempts, metadata, last_call_at, created_at";

impl DatabaseManager {
    /// Insert a batch of leads, skipping `(campaign, phone_number)`
    /// duplicates silently. Returns how many rows were actually created.
    pub async fn bulk_insert_leads(
        &self,
        tenant_id: &str,
        campaign_id: &str,
        leads: &[NewLead],
    ) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();
        let mut created = 0u64;

        for lead in leads {
            let result = sqlx::query(
                "INSERT OR IGNORE INTO leads
                    (id, tenant_id, campaign_id, phone_number, name, priority, status,
                     attempts, metadata, created_at)
                 VALUES (?, ?, ?, ?, ?, ?, 'pending', 0, ?, ?)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(tenant_id)
            .bind(campaign_id)
            .bind(&lead.phone_number)
            .bind(&lead.name)
            .bind(lead.priority)
            .bind(&lead.metadata)
            .bind(now)
            .execute(&mut *tx)
            .await?;
            created += result.rows_affected();
        }

        tx.commit().await?;
        Ok(created)
    }

    /// Pending leads for a campaign in dispatch order: priority first
    /// (lower number dials earlier), insertion order within a priority.
    pub async fn pending_leads(&self, campaign_id: &str) -> Result<Vec<DbLead>> {
        let rows = sqlx::query(&format!(
            "SELECT {LEAD_COLUMNS} FROM leads
             WHERE campaign_id = ? AND status = 'pending'
             ORDER BY priority ASC, created_at ASC, rowid ASC"
        ))
        .bind(campaign_id)
        .fetch_all(&self.pool)
        .await?;

        let mut leads = Vec::new();
        for row in rows {
            leads.push(DbLead::from_row(&row)?);
        }
        Ok(leads)
    }

    pub async fn get_lead(&self, tenant_id: &str, lead_id: &str) -> Result<Option<DbLead>> {
        let row = sqlx::query(&format!(
            "SELECT {LEAD_COLUMNS} FROM leads WHERE id = ? AND tenant_id = ?"
        ))
        .bind(lead_id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(DbLead::from_row(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn list_leads(&self, tenant_id: &str, campaign_id: &str) -> Result<Vec<DbLead>> {
        let rows = sqlx::query(&format!(
            "SELECT {LEAD_COLUMNS} FROM leads
             WHERE tenant_id = ? AND campaign_id = ?
             ORDER BY priority ASC, created_at ASC"
        ))
        .bind(tenant_id)
        .bind(campaign_id)
        .fetch_all(&self.pool)
        .await?;

        let mut leads = Vec::new();
        for row in rows {
            leads.push(DbLead::from_row(&row)?);
        }
        Ok(leads)
    }

    pub async fn update_lead_status(&self, lead_id: &str, status: LeadStatus) -> Result<()> {
        sqlx::query("UPDATE leads SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(lead_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Dispatch-time transition: `pending → calling` with the new attempt
    /// count stamped on the row.
    pub async fn mark_lead_calling(&self, lead_id: &str, attempts: i64) -> Result<()> {
        sqlx::query(
            "UPDATE leads SET status = 'calling', attempts = ?, last_call_at = ? WHERE id = ?",
        )
        .bind(attempts)
        .bind(Utc::now())
        .bind(lead_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn set_lead_completed(&self, lead_id: &str) -> Result<()> {
        sqlx::query("UPDATE leads SET status = 'completed', last_call_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(lead_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Deleting a lead mid-call would orphan its in-flight record.
    pub async fn delete_lead(&self, tenant_id: &str, lead_id: &str) -> Result<bool> {
        let Some(lead) = self.get_lead(tenant_id, lead_id).await? else {
            return Ok(false);
        };
        if lead.get_status() == Some(LeadStatus::Calling) {
            bail!("lead {lead_id} is currently being called");
        }

        let result = sqlx::query("DELETE FROM leads WHERE id = ? AND tenant_id = ?")
            .bind(lead_id)
            .bind(tenant_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Find-or-create a lead for an inbound caller on a campaign number.
    pub async fn upsert_inbound_lead(
        &self,
        tenant_id: &str,
        campaign_id: &str,
        phone_number: &str,
    ) -> Result<DbLead> {
        let existing = sqlx::query(&format!(
            "SELECT {LEAD_COLUMNS} FROM leads WHERE campaign_id = ? AND phone_number = ?"
        ))
        .bind(campaign_id)
        .bind(phone_number)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = existing {
            return DbLead::from_row(&row);
        }

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO leads
                (id, tenant_id, campaign_id, phone_number, status, attempts, priority, created_at)
             VALUES (?, ?, ?, ?, 'calling', 0, 0, ?)",
        )
        .bind(&id)
        .bind(tenant_id)
        .bind(campaign_id)
        .bind(phone_number)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(DbLead {
            id,
            tenant_id: tenant_id.to_string(),
            campaign_id: campaign_id.to_string(),
            phone_number: phone_number.to_string(),
            name: None,
            priority: 0,
            status: "calling".to_string(),
            attempts: 0,
            metadata: None,
            last_call_at: None,
            created_at: now,
        })
    }

    pub async fn lead_stats(&self, tenant_id: &str) -> Result<LeadStats> {
        let rows = sqlx::query(
            "SELECT status, COUNT(*) as count FROM leads WHERE tenant_id = ? GROUP BY status",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        let mut stats = LeadStats::default();
        for row in rows {
            let status: String = row.try_get("status")?;
            let count: i64 = row.try_get("count")?;
            stats.total += count;
            match LeadStatus::parse(&status) {
                Some(LeadStatus::Pending) => stats.pending = count,
                Some(LeadStatus::Calling) => stats.calling = count,
                Some(LeadStatus::Completed) => stats.completed = count,
                Some(LeadStatus::Failed) => stats.failed = count,
                None => {}
            }
        }
        Ok(stats)
    }

    /// Startup recovery: leads left `calling` by a previous process have no
    /// runtime to finish them. Mark them failed and leave an audit trail.
    pub async fn mark_orphaned_calling_leads(&self) -> Result<u64> {
        let rows = sqlx::query(&format!(
            "SELECT {LEAD_COLUMNS} FROM leads WHERE status = 'calling'"
        ))
        .fetch_all(&self.pool)
        .await?;

        let mut orphaned = 0u64;
        for row in rows {
            let lead = DbLead::from_row(&row)?;
            let mut tx = self.pool.begin().await?;
            sqlx::query("UPDATE leads SET status = 'failed' WHERE id = ?")
                .bind(&lead.id)
                .execute(&mut *tx)
                .await?;
            sqlx::query(
                "INSERT INTO call_logs (id, campaign_id, lead_id, phone_number, status, error, created_at)
                 VALUES (?, ?, ?, ?, 'failed', 'orphaned', ?)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&lead.campaign_id)
            .bind(&lead.id)
            .bind(&lead.phone_number)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;
            tx.commit().await?;
            orphaned += 1;
        }
        Ok(orphaned)
    }
}
