//! # Async Database Management (sqlx + SQLite)
//!
//! Durable storage for the dialer: tenants, campaigns, leads, agents,
//! campaign-agent assignments, phone numbers, and call logs. Everything is
//! async over a pooled SQLite connection; related writes (lead + call-log)
//! go through explicit transactions.
//!
//! The schema is created by an idempotent initializer at connect time, so an
//! in-memory database is a complete fixture:
//!
//! ```rust
//! use dialflow_campaign_engine::database::DatabaseManager;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let db = DatabaseManager::new_in_memory().await?;
//! let agents = db.list_agents().await?;
//! assert!(agents.is_empty());
//! # Ok(())
//! # }
//! ```
//!
//! The store is the single source of truth for durable fields; the campaign
//! runtime's queue and in-flight views are derived from it and written back
//! only through the event reconciler.

mod agents;
mod call_logs;
mod campaigns;
mod leads;
mod phone_numbers;
mod tenants;

pub use agents::{DbAgent, DbAssignedAgent, NewAgent};
pub use call_logs::{DbCallLog, NewCallLog};
pub use campaigns::{CampaignAggregates, DbCampaign, LeadCounts, NewCampaign};
pub use leads::{DbLead, LeadStats, NewLead};
pub use phone_numbers::{DbPhoneNumber, NewPhoneNumber};
pub use tenants::DbTenant;

use std::str::FromStr;

use anyhow::{anyhow, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::info;

/// Main database manager using sqlx for async operations
#[derive(Clone)]
pub struct DatabaseManager {
    pool: SqlitePool,
}

impl DatabaseManager {
    /// Connect and bring the schema up to date.
    pub async fn new(database_url: &str) -> Result<Self> {
        info!("🗄️ Initializing database manager: {}", database_url);

        let in_memory = database_url.contains(":memory:");
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| anyhow!("invalid database url: {e}"))?
            .create_if_missing(true);

        // An in-memory database exists per-connection; cap the pool at one
        // so every query sees the same schema.
        let max_connections = if in_memory { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| anyhow!("failed to connect to database: {e}"))?;

        let db = Self { pool };
        db.init_schema().await?;

        info!("✅ Database manager initialized");
        Ok(db)
    }

    /// In-memory database for tests.
    pub async fn new_in_memory() -> Result<Self> {
        Self::new("sqlite::memory:").await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn begin_transaction(&self) -> Result<Transaction<'_, Sqlite>> {
        self.pool
            .begin()
            .await
            .map_err(|e| anyhow!("failed to start transaction: {e}"))
    }

    async fn init_schema(&self) -> Result<()> {
        let statements = [
            "CREATE TABLE IF NOT EXISTS tenants (
                id TEXT PRIMARY KEY,
                domain TEXT NOT NULL UNIQUE,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS campaigns (
                id TEXT PRIMARY KEY,
                tenant_id TEXT NOT NULL,
                name TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'draft',
                max_concurrent INTEGER NOT NULL DEFAULT 1,
                retry_failed INTEGER NOT NULL DEFAULT 0,
                retry_attempts INTEGER NOT NULL DEFAULT 0,
                call_delay_ms INTEGER NOT NULL DEFAULT 0,
                sip_trunk_id TEXT,
                caller_id_number TEXT,
                agent_name TEXT,
                started_at TEXT,
                completed_at TEXT,
                total_calls INTEGER NOT NULL DEFAULT 0,
                successful_calls INTEGER NOT NULL DEFAULT 0,
                failed_calls INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_campaigns_tenant ON campaigns(tenant_id)",
            "CREATE TABLE IF NOT EXISTS leads (
                id TEXT PRIMARY KEY,
                tenant_id TEXT NOT NULL,
                campaign_id TEXT NOT NULL,
                phone_number TEXT NOT NULL,
                name TEXT,
                priority INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL DEFAULT 'pending',
                attempts INTEGER NOT NULL DEFAULT 0,
                metadata TEXT,
                last_call_at TEXT,
                created_at TEXT NOT NULL
            )",
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_leads_unique
                ON leads(tenant_id, campaign_id, phone_number)",
            "CREATE INDEX IF NOT EXISTS idx_leads_campaign_status ON leads(campaign_id, status)",
            "CREATE TABLE IF NOT EXISTS agents (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 1,
                max_concurrent_calls INTEGER NOT NULL DEFAULT 1,
                livekit_agent_name TEXT,
                created_at TEXT NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS campaign_agents (
                campaign_id TEXT NOT NULL,
                agent_id TEXT NOT NULL,
                is_primary INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                PRIMARY KEY (campaign_id, agent_id)
            )",
            "CREATE TABLE IF NOT EXISTS phone_numbers (
                id TEXT PRIMARY KEY,
                tenant_id TEXT NOT NULL,
                number TEXT NOT NULL UNIQUE,
                provider_sid TEXT,
                number_type TEXT NOT NULL DEFAULT 'LOCAL',
                provider TEXT,
                campaign_id TEXT,
                livekit_trunk_id TEXT,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS call_logs (
                id TEXT PRIMARY KEY,
                campaign_id TEXT,
                lead_id TEXT,
                phone_number TEXT NOT NULL,
                status TEXT NOT NULL,
                call_sid TEXT,
                room_name TEXT,
                dispatch_id TEXT,
                duration_secs INTEGER,
                error TEXT,
                metadata TEXT,
                created_at TEXT NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_call_logs_campaign
                ON call_logs(campaign_id, created_at)",
            "CREATE INDEX IF NOT EXISTS idx_call_logs_sid ON call_logs(call_sid)",
        ];

        for statement in statements {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }
}

/// Campaign status enum for database operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CampaignStatus {
    Draft,
    Active,
    Paused,
    Stopped,
    Completed,
    Failed,
}

impl CampaignStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignStatus::Draft => "draft",
            CampaignStatus::Active => "active",
            CampaignStatus::Paused => "paused",
            CampaignStatus::Stopped => "stopped",
            CampaignStatus::Completed => "completed",
            CampaignStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(CampaignStatus::Draft),
            "active" => Some(CampaignStatus::Active),
            "paused" => Some(CampaignStatus::Paused),
            "stopped" => Some(CampaignStatus::Stopped),
            "completed" => Some(CampaignStatus::Completed),
            "failed" => Some(CampaignStatus::Failed),
            _ => None,
        }
    }

    /// Terminal states never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CampaignStatus::Stopped | CampaignStatus::Completed | CampaignStatus::Failed
        )
    }
}

/// Lead status enum for database operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeadStatus {
    Pending,
    Calling,
    Completed,
    Failed,
}

impl LeadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::Pending => "pending",
            LeadStatus::Calling => "calling",
            LeadStatus::Completed => "completed",
            LeadStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(LeadStatus::Pending),
            "calling" => Some(LeadStatus::Calling),
            "completed" => Some(LeadStatus::Completed),
            "failed" => Some(LeadStatus::Failed),
            _ => None,
        }
    }
}

/// Call log status enum for database operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallLogStatus {
    Ringing,
    Completed,
    Failed,
}

impl CallLogStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallLogStatus::Ringing => "ringing",
            CallLogStatus::Completed => "completed",
            CallLogStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ringing" => Some(CallLogStatus::Ringing),
            "completed" => Some(CallLogStatus::Completed),
            "failed" => Some(CallLogStatus::Failed),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_database_creation() {
        let db = DatabaseManager::new_in_memory().await.unwrap();
        let agents = db.list_agents().await.unwrap();
        assert!(agents.is_empty());
    }

    #[tokio::test]
    async fn test_send_safety() {
        let db = DatabaseManager::new_in_memory().await.unwrap();

        // Must compile without Send trait issues
        let handle = tokio::spawn(async move {
            let _agents = db.list_agents().await.unwrap();
        });

        handle.await.unwrap();
    }

    #[test]
    fn status_round_trips() {
        for s in ["draft", "active", "paused", "stopped", "completed", "failed"] {
            assert_eq!(CampaignStatus::parse(s).unwrap().as_str(), s);
        }
        for s in ["pending", "calling", "completed", "failed"] {
            assert_eq!(LeadStatus::parse(s).unwrap().as_str(), s);
        }
        assert!(CampaignStatus::Stopped.is_terminal());
        assert!(!CampaignStatus::Paused.is_terminal());
    }
}
