//! # Event Reconciler
//!
//! The only writer of runtime outcomes to the store. Consumes one
//! campaign's events in order (the supervisor gives each campaign its own
//! serial consumer task, which is what preserves per-lead write ordering)
//! and applies the durable transitions: lead status changes, call-log
//! appends in transactions, campaign aggregates.
//!
//! A failed write is logged and dropped — a single store hiccup must never
//! take down the process or wedge the campaign. Aggregates are eventually
//! consistent; per-lead/per-call-log writes are transactional.

use serde_json::json;
use tracing::{debug, error, info};

use crate::database::{
    CampaignAggregates, CallLogStatus, DatabaseManager, LeadStatus, NewCallLog,
};

use super::events::{CampaignEvent, CampaignEventKind};

#[derive(Clone)]
pub struct EventReconciler {
    db: DatabaseManager,
}

impl EventReconciler {
    pub fn new(db: DatabaseManager) -> Self {
        Self { db }
    }

    /// Apply one event's durable effects.
    pub async fn apply(&self, event: &CampaignEvent) -> anyhow::Result<()> {
        let campaign_id = &event.campaign_id;
        match &event.kind {
            CampaignEventKind::LeadsAdded { count } => {
                debug!("Campaign {} enqueued {} leads", campaign_id, count);
            }
            CampaignEventKind::CampaignStarted => {
                self.db.set_campaign_started(campaign_id).await?;
            }
            CampaignEventKind::CallStarted { lead } => {
                self.db.mark_lead_calling(&lead.lead_id, lead.attempts as i64).await?;
            }
            CampaignEventKind::CallCompleted { lead, result } => {
                let mut log = NewCallLog::new(&lead.phone_number, CallLogStatus::Completed);
                log.campaign_id = Some(campaign_id.clone());
                log.lead_id = Some(lead.lead_id.clone());
                log.call_sid = Some(result.sip_call_id.clone());
                log.room_name = Some(result.room_name.clone());
                log.dispatch_id = Some(result.dispatch_id.clone());
                log.metadata = Some(
                    json!({
                        "agent_id": result.agent_id,
                        "agent_name": result.agent_name,
                        "participant_id": result.participant_id,
                        "attempt": lead.attempts,
                    })
                    .to_string(),
                );
                self.db
                    .finish_lead_with_log(&lead.lead_id, LeadStatus::Completed, log)
                    .await?;
            }
            CampaignEventKind::CallFailed { lead, error, error_kind, will_retry } => {
                let mut log = NewCallLog::new(&lead.phone_number, CallLogStatus::Failed);
                log.campaign_id = Some(campaign_id.clone());
                log.lead_id = Some(lead.lead_id.clone());
                log.error = Some(error.clone());
                log.metadata = Some(
                    json!({ "error_kind": error_kind, "attempt": lead.attempts }).to_string(),
                );

                if *will_retry {
                    // The lead goes back to pending; only the failure itself
                    // is recorded.
                    self.db.update_lead_status(&lead.lead_id, LeadStatus::Pending).await?;
                    self.db.insert_call_log(log).await?;
                } else {
                    self.db
                        .finish_lead_with_log(&lead.lead_id, LeadStatus::Failed, log)
                        .await?;
                }
            }
            CampaignEventKind::CampaignPaused => {
                self.db
                    .set_campaign_status(campaign_id, crate::database::CampaignStatus::Paused)
                    .await?;
            }
            CampaignEventKind::CampaignResumed => {
                self.db
                    .set_campaign_status(campaign_id, crate::database::CampaignStatus::Active)
                    .await?;
            }
            CampaignEventKind::CampaignStopped => {
                self.db.set_campaign_stopped(campaign_id).await?;
            }
            CampaignEventKind::CampaignCompleted { stats } => {
                self.db
                    .set_campaign_completed(
                        campaign_id,
                        CampaignAggregates {
                            total_calls: stats.total_calls as i64,
                            successful_calls: stats.successful_calls as i64,
                            failed_calls: stats.failed_calls as i64,
                        },
                    )
                    .await?;
                info!(
                    "✅ Campaign {} reconciled as completed ({} calls)",
                    campaign_id, stats.total_calls
                );
            }
        }
        Ok(())
    }

    /// Apply and swallow: the per-campaign consumer loop calls this so one
    /// bad write never ends the loop.
    pub async fn apply_logged(&self, event: &CampaignEvent) {
        if let Err(err) = self.apply(event).await {
            error!(
                "Reconciler dropped event seq={} for campaign {}: {}",
                event.seq, event.campaign_id, err
            );
        }
    }
}
