//! Call-log rows and the transactional writes the reconciler performs

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use super::{CallLogStatus, DatabaseManager, LeadStatus};

#[derive(Debug, Clone)]
pub struct DbCallLog {
    pub id: String,
    pub campaign_id: Option<String>,
    pub lead_id: Option<String>,
    pub phone_number: String,
    pub status: String,
    pub call_sid: Option<String>,
    pub room_name: Option<String>,
    pub dispatch_id: Option<String>,
    pub duration_secs: Option<i64>,
    pub error: Option<String>,
    pub metadata: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl DbCallLog {
    pub fn get_status(&self) -> Option<CallLogStatus> {
        CallLogStatus::parse(&self.status)
    }

    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self> {
        Ok(DbCallLog {
            id: row.try_get("id")?,
            campaign_id: row.try_get("campaign_id")?,
            lead_id: row.try_get("lead_id")?,
            phone_number: row.try_get("phone_number")?,
            status: row.try_get("status")?,
            call_sid: row.try_get("call_sid")?,
            room_name: row.try_get("room_name")?,
            dispatch_id: row.try_get("dispatch_id")?,
            duration_secs: row.try_get("duration_secs")?,
            error: row.try_get("error")?,
            metadata: row.try_get("metadata")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewCallLog {
    pub campaign_id: Option<String>,
    pub lead_id: Option<String>,
    pub phone_number: String,
    pub status: String,
    pub call_sid: Option<String>,
    pub room_name: Option<String>,
    pub dispatch_id: Option<String>,
    pub duration_secs: Option<i64>,
    pub error: Option<String>,
    pub metadata: Option<String>,
}

impl NewCallLog {
    pub fn new(phone_number: &str, status: CallLogStatus) -> Self {
        Self {
            phone_number: phone_number.to_string(),
            status: status.as_str().to_string(),
            ..Default::default()
        }
    }
}

const CALL_LOG_COLUMNS: &str = "id, campaign_id, lead_id, phone_number, status, call_sid, \
    room_name, dispatch_id, duration_secs, error, metadata, created_at";

impl DatabaseManager {
    pub async fn insert_call_log(&self, new: NewCallLog) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO call_logs
                (id, campaign_id, lead_id, phone_number, status, call_sid, room_name,
                 dispatch_id, duration_secs, error, metadata, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&new.campaign_id)
        .bind(&new.lead_id)
        .bind(&new.phone_number)
        .bind(&new.status)
        .bind(&new.call_sid)
        .bind(&new.room_name)
        .bind(&new.dispatch_id)
        .bind(new.duration_secs)
        .bind(&new.error)
        .bind(&new.metadata)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(id)
    }

    /// Terminal-outcome write: lead status and its call-log row land in one
    /// transaction so a crash can't record one without the other.
    pub async fn finish_lead_with_log(
        &self,
        lead_id: &str,
        lead_status: LeadStatus,
        log: NewCallLog,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE leads SET status = ?, last_call_at = ? WHERE id = ?")
            .bind(lead_status.as_str())
            .bind(Utc::now())
            .bind(lead_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO call_logs
                (id, campaign_id, lead_id, phone_number, status, call_sid, room_name,
                 dispatch_id, duration_secs, error, metadata, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&log.campaign_id)
        .bind(&log.lead_id)
        .bind(&log.phone_number)
        .bind(&log.status)
        .bind(&log.call_sid)
        .bind(&log.room_name)
        .bind(&log.dispatch_id)
        .bind(log.duration_secs)
        .bind(&log.error)
        .bind(&log.metadata)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Call-ended path: locate by SIP call id or room name and close out the
    /// row. Returns the updated log when one matched.
    pub async fn complete_call_log(
        &self,
        call_sid: Option<&str>,
        room_name: Option<&str>,
        duration_secs: Option<i64>,
        disconnect_reason: Option<&str>,
    ) -> Result<Option<DbCallLog>> {
        let row = sqlx::query(&format!(
            "SELECT {CALL_LOG_COLUMNS} FROM call_logs
             WHERE (call_sid = ? AND call_sid IS NOT NULL)
                OR (room_name = ? AND room_name IS NOT NULL)
             ORDER BY created_at DESC LIMIT 1"
        ))
        .bind(call_sid)
        .bind(room_name)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else { return Ok(None) };
        let log = DbCallLog::from_row(&row)?;

        let metadata = match (&log.metadata, disconnect_reason) {
            (Some(existing), Some(reason)) => {
                let mut value: serde_json::Value = serde_json::from_str(existing)
                    .unwrap_or_else(|_| serde_json::json!({ "raw": existing }));
                if let Some(map) = value.as_object_mut() {
                    map.insert("disconnect_reason".into(), reason.into());
                }
                Some(value.to_string())
            }
            (None, Some(reason)) => {
                Some(serde_json::json!({ "disconnect_reason": reason }).to_string())
            }
            (existing, None) => existing.clone(),
        };

        sqlx::query(
            "UPDATE call_logs SET status = 'completed', duration_secs = ?, metadata = ?
             WHERE id = ?",
        )
        .bind(duration_secs)
        .bind(&metadata)
        .bind(&log.id)
        .execute(&self.pool)
        .await?;

        self.get_call_log(&log.id).await
    }

    pub async fn get_call_log(&self, id: &str) -> Result<Option<DbCallLog>> {
        let row =
            sqlx::query(&format!("SELECT {CALL_LOG_COLUMNS} FROM call_logs WHERE id = ?"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some(row) => Ok(Some(DbCallLog::from_row(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn list_call_logs(&self, campaign_id: &str, limit: i64) -> Result<Vec<DbCallLog>> {
        let rows = sqlx::query(&format!(
            "SELECT {CALL_LOG_COLUMNS} FROM call_logs
             WHERE campaign_id = ? ORDER BY created_at DESC LIMIT ?"
        ))
        .bind(campaign_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut logs = Vec::new();
        for row in rows {
            logs.push(DbCallLog::from_row(&row)?);
        }
        Ok(logs)
    }

    pub async fn count_call_logs(&self, campaign_id: &str) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM call_logs WHERE campaign_id = ?")
            .bind(campaign_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("count")?)
    }
}
