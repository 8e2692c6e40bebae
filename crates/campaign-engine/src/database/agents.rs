//! Agent rows, campaign assignments, and the queries the selector runs

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use super::DatabaseManager;

#[derive(Debug, Clone)]
pub struct DbAgent {
    pub id: String,
    pub name: String,
    pub is_active: bool,
    pub max_concurrent_calls: i64,
    pub livekit_agent_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl DbAgent {
    /// Name the fabric dispatches this agent by.
    pub fn fabric_name(&self) -> &str {
        self.livekit_agent_name.as_deref().unwrap_or(&self.name)
    }

    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self> {
        Ok(DbAgent {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            is_active: row.try_get("is_active")?,
            max_concurrent_calls: row.try_get("max_concurrent_calls")?,
            livekit_agent_name: row.try_get("livekit_agent_name")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewAgent {
    pub name: String,
    pub max_concurrent_calls: i64,
    pub livekit_agent_name: Option<String>,
}

/// An agent joined with its campaign assignment, in selection order.
#[derive(Debug, Clone)]
pub struct DbAssignedAgent {
    pub agent_id: String,
    pub name: String,
    pub max_concurrent_calls: i64,
    pub livekit_agent_name: Option<String>,
    pub is_primary: bool,
    pub assigned_at: DateTime<Utc>,
}

impl DbAssignedAgent {
    pub fn fabric_name(&self) -> &str {
        self.livekit_agent_name.as_deref().unwrap_or(&self.name)
    }
}

impl DatabaseManager {
    pub async fn create_agent(&self, new: NewAgent) -> Result<DbAgent> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO agents (id, name, is_active, max_concurrent_calls, livekit_agent_name, created_at)
             VALUES (?, ?, 1, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&new.name)
        .bind(new.max_concurrent_calls.max(1))
        .bind(&new.livekit_agent_name)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(DbAgent {
            id,
            name: new.name,
            is_active: true,
            max_concurrent_calls: new.max_concurrent_calls.max(1),
            livekit_agent_name: new.livekit_agent_name,
            created_at: now,
        })
    }

    pub async fn get_agent(&self, agent_id: &str) -> Result<Option<DbAgent>> {
        let row = sqlx::query(
            "SELECT id, name, is_active, max_concurrent_calls, livekit_agent_name, created_at
             FROM agents WHERE id = ?",
        )
        .bind(agent_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(DbAgent::from_row(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn list_agents(&self) -> Result<Vec<DbAgent>> {
        let rows = sqlx::query(
            "SELECT id, name, is_active, max_concurrent_calls, livekit_agent_name, created_at
             FROM agents ORDER BY created_at ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut agents = Vec::new();
        for row in rows {
            agents.push(DbAgent::from_row(&row)?);
        }
        Ok(agents)
    }

    pub async fn assign_agent_to_campaign(
        &self,
        campaign_id: &str,
        agent_id: &str,
        is_primary: bool,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO campaign_agents (campaign_id, agent_id, is_primary, created_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(campaign_id, agent_id) DO UPDATE SET is_primary = excluded.is_primary",
        )
        .bind(campaign_id)
        .bind(agent_id)
        .bind(is_primary)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Active agents assigned to a campaign, in selection order:
    /// primary first, then assignment age.
    pub async fn campaign_assignments(&self, campaign_id: &str) -> Result<Vec<DbAssignedAgent>> {
        let rows = sqlx::query(
            "SELECT a.id as agent_id, a.name, a.max_concurrent_calls, a.livekit_agent_name,
                    ca.is_primary, ca.created_at as assigned_at
             FROM campaign_agents ca
             JOIN agents a ON a.id = ca.agent_id
             WHERE ca.campaign_id = ? AND a.is_active = 1
             ORDER BY ca.is_primary DESC, ca.created_at ASC",
        )
        .bind(campaign_id)
        .fetch_all(&self.pool)
        .await?;

        let mut assignments = Vec::new();
        for row in rows {
            assignments.push(DbAssignedAgent {
                agent_id: row.try_get("agent_id")?,
                name: row.try_get("name")?,
                max_concurrent_calls: row.try_get("max_concurrent_calls")?,
                livekit_agent_name: row.try_get("livekit_agent_name")?,
                is_primary: row.try_get("is_primary")?,
                assigned_at: row.try_get("assigned_at")?,
            });
        }
        Ok(assignments)
    }

    /// System fallback pool: the longest-registered active agent.
    pub async fn oldest_active_agent(&self) -> Result<Option<DbAgent>> {
        let row = sqlx::query(
            "SELECT id, name, is_active, max_concurrent_calls, livekit_agent_name, created_at
             FROM agents WHERE is_active = 1 ORDER BY created_at ASC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(DbAgent::from_row(&row)?)),
            None => Ok(None),
        }
    }
}
