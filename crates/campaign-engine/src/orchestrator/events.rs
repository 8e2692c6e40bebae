//! Campaign lifecycle event contract
//!
//! The runtime never touches the store. Every observable outcome is emitted
//! as a [`CampaignEvent`] on an unbounded channel; the reconciler consumes
//! the channel serially per campaign, which is what preserves per-lead write
//! ordering. Events carry a per-campaign monotonic `seq`.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use super::types::CampaignStats;

/// Identity of a lead as carried on call events.
#[derive(Debug, Clone)]
pub struct LeadRef {
    pub lead_id: String,
    pub phone_number: String,
    /// Attempt number this event belongs to (1-based).
    pub attempts: u32,
}

/// What a successful call initiation produced.
#[derive(Debug, Clone)]
pub struct CallResult {
    pub room_name: String,
    pub dispatch_id: String,
    pub sip_call_id: String,
    pub participant_id: String,
    pub agent_id: String,
    pub agent_name: String,
}

#[derive(Debug, Clone)]
pub enum CampaignEventKind {
    LeadsAdded { count: usize },
    CampaignStarted,
    CallStarted { lead: LeadRef },
    CallCompleted { lead: LeadRef, result: CallResult },
    CallFailed { lead: LeadRef, error: String, error_kind: String, will_retry: bool },
    CampaignPaused,
    CampaignResumed,
    CampaignStopped,
    CampaignCompleted { stats: CampaignStats },
}

#[derive(Debug, Clone)]
pub struct CampaignEvent {
    pub campaign_id: String,
    /// Monotonic within the campaign; gaps mean a dropped consumer, not a
    /// dropped emit.
    pub seq: u64,
    pub at: DateTime<Utc>,
    pub kind: CampaignEventKind,
}

/// Sending half handed to a campaign runtime.
pub struct EventSender {
    campaign_id: String,
    tx: mpsc::UnboundedSender<CampaignEvent>,
    seq: AtomicU64,
}

impl EventSender {
    pub fn emit(&self, kind: CampaignEventKind) {
        let event = CampaignEvent {
            campaign_id: self.campaign_id.clone(),
            seq: self.seq.fetch_add(1, Ordering::SeqCst),
            at: Utc::now(),
            kind,
        };
        // A closed receiver means the supervisor already tore the campaign
        // down; late in-flight outcomes are dropped by design.
        let _ = self.tx.send(event);
    }
}

/// Build the event channel for one campaign.
pub fn channel(campaign_id: &str) -> (EventSender, mpsc::UnboundedReceiver<CampaignEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        EventSender { campaign_id: campaign_id.to_string(), tx, seq: AtomicU64::new(0) },
        rx,
    )
}
