//! Tenant rows and queries

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use super::DatabaseManager;

#[derive(Debug, Clone)]
pub struct DbTenant {
    pub id: String,
    pub domain: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl DbTenant {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self> {
        Ok(DbTenant {
            id: row.try_get("id")?,
            domain: row.try_get("domain")?,
            is_active: row.try_get("is_active")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl DatabaseManager {
    pub async fn create_tenant(&self, domain: &str) -> Result<DbTenant> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query("INSERT INTO tenants (id, domain, is_active, created_at) VALUES (?, ?, 1, ?)")
            .bind(&id)
            .bind(domain)
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(DbTenant { id, domain: domain.to_string(), is_active: true, created_at: now })
    }

    pub async fn get_tenant(&self, tenant_id: &str) -> Result<Option<DbTenant>> {
        let row = sqlx::query("SELECT id, domain, is_active, created_at FROM tenants WHERE id = ?")
            .bind(tenant_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(DbTenant::from_row(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn get_tenant_by_domain(&self, domain: &str) -> Result<Option<DbTenant>> {
        let row =
            sqlx::query("SELECT id, domain, is_active, created_at FROM tenants WHERE domain = ?")
                .bind(domain)
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some(row) => Ok(Some(DbTenant::from_row(&row)?)),
            None => Ok(None),
        }
    }
}
