//! Provisioned phone-number rows; `number` is the inbound lookup key

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use super::DatabaseManager;

#[derive(Debug, Clone)]
pub struct DbPhoneNumber {
    pub id: String,
    pub tenant_id: String,
    pub number: String,
    pub provider_sid: Option<String>,
    pub number_type: String,
    pub provider: Option<String>,
    pub campaign_id: Option<String>,
    pub livekit_trunk_id: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl DbPhoneNumber {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self> {
        Ok(DbPhoneNumber {
            id: row.try_get("id")?,
            tenant_id: row.try_get("tenant_id")?,
            number: row.try_get("number")?,
            provider_sid: row.try_get("provider_sid")?,
            number_type: row.try_get("number_type")?,
            provider: row.try_get("provider")?,
            campaign_id: row.try_get("campaign_id")?,
            livekit_trunk_id: row.try_get("livekit_trunk_id")?,
            is_active: row.try_get("is_active")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewPhoneNumber {
    pub tenant_id: String,
    pub number: String,
    pub provider_sid: Option<String>,
    pub number_type: String,
    pub provider: Option<String>,
    pub campaign_id: Option<String>,
    pub livekit_trunk_id: Option<String>,
}

const PHONE_COLUMNS: &str = "id, tenant_id, number, provider_sid, number_type, provider, \
    campaign_id, livekit_trunk_id, is_active, created_at";

impl DatabaseManager {
    pub async fn create_phone_number(&self, new: NewPhoneNumber) -> Result<DbPhoneNumber> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO phone_numbers
                (id, tenant_id, number, provider_sid, number_type, provider, campaign_id,
                 livekit_trunk_id, is_active, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, 1, ?)",
        )
        .bind(&id)
        .bind(&new.tenant_id)
        .bind(&new.number)
        .bind(&new.provider_sid)
        .bind(&new.number_type)
        .bind(&new.provider)
        .bind(&new.campaign_id)
        .bind(&new.livekit_trunk_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(DbPhoneNumber {
            id,
            tenant_id: new.tenant_id,
            number: new.number,
            provider_sid: new.provider_sid,
            number_type: new.number_type,
            provider: new.provider,
            campaign_id: new.campaign_id,
            livekit_trunk_id: new.livekit_trunk_id,
            is_active: true,
            created_at: now,
        })
    }

    /// Inbound lookup by E.164 number, globally unique.
    pub async fn get_phone_number_by_number(&self, number: &str) -> Result<Option<DbPhoneNumber>> {
        let row = sqlx::query(&format!(
            "SELECT {PHONE_COLUMNS} FROM phone_numbers WHERE number = ? AND is_active = 1"
        ))
        .bind(number)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(DbPhoneNumber::from_row(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn list_phone_numbers(&self, tenant_id: &str) -> Result<Vec<DbPhoneNumber>> {
        let rows = sqlx::query(&format!(
            "SELECT {PHONE_COLUMNS} FROM phone_numbers WHERE tenant_id = ? ORDER BY created_at ASC"
        ))
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        let mut numbers = Vec::new();
        for row in rows {
            numbers.push(DbPhoneNumber::from_row(&row)?);
        }
        Ok(numbers)
    }
}
