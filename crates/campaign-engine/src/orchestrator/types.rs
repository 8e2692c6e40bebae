//! Shared orchestrator data structures

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::agent::SelectionStrategy;
use crate::database::DbCampaign;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Everything a campaign runtime needs to dial, fixed at construction.
#[derive(Debug, Clone)]
pub struct CampaignRuntimeConfig {
    pub max_concurrent: usize,
    pub call_delay: Duration,
    pub retry_failed: bool,
    pub retry_attempts: u32,
    pub sip_trunk_id: String,
    pub caller_id_number: Option<String>,
    pub strategy: SelectionStrategy,
    pub default_country_code: Option<String>,
    /// Per-call fabric deadline.
    pub call_timeout: Duration,
    /// Sleep when saturated or waiting on in-flight calls.
    pub poll_interval: Duration,
}

impl CampaignRuntimeConfig {
    /// Derive runtime settings from a campaign row; `sip_trunk_id` must
    /// already be resolved (row value or deployment default).
    pub fn from_campaign(campaign: &DbCampaign, sip_trunk_id: String) -> Self {
        Self {
            max_concurrent: campaign.max_concurrent.max(1) as usize,
            call_delay: Duration::from_millis(campaign.call_delay_ms.max(0) as u64),
            retry_failed: campaign.retry_failed,
            retry_attempts: campaign.retry_attempts.max(0) as u32,
            sip_trunk_id,
            caller_id_number: campaign.caller_id_number.clone(),
            strategy: SelectionStrategy::default(),
            default_country_code: None,
            call_timeout: crate::config::DEFAULT_FABRIC_CALL_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// A lead as held in the runtime's pending queue. Derived from the store;
/// never the source of truth.
#[derive(Debug, Clone)]
pub struct QueuedLead {
    pub id: String,
    pub phone_number: String,
    pub name: Option<String>,
    pub priority: i64,
    pub attempts: u32,
    pub metadata: Option<String>,
}

/// One dispatched call whose terminal event has not yet been observed.
#[derive(Debug, Clone)]
pub struct InFlightCall {
    pub lead_id: String,
    pub phone_number: String,
    /// Filled once the selector has answered.
    pub agent_id: Option<String>,
    pub room_name: Option<String>,
    pub started_at: DateTime<Utc>,
}

/// Terminal-outcome counters for one run.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CampaignStats {
    pub total_calls: u64,
    pub successful_calls: u64,
    pub failed_calls: u64,
}

/// Public identity of a currently active call.
#[derive(Debug, Clone, Serialize)]
pub struct ActiveCallInfo {
    pub lead_id: String,
    pub phone_number: String,
    pub agent_id: Option<String>,
    pub room_name: Option<String>,
    pub started_at: DateTime<Utc>,
}

/// Point-in-time view of a runtime, served under `stats.realtime`.
#[derive(Debug, Clone, Serialize)]
pub struct CampaignStatusSnapshot {
    pub campaign_id: String,
    pub state: String,
    pub pending: usize,
    pub in_flight: Vec<ActiveCallInfo>,
    pub stats: CampaignStats,
}
