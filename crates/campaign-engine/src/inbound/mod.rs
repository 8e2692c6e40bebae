//! # Inbound Call Router
//!
//! Answers the fabric's SIP-INVITE webhook: resolve the dialed number to a
//! tenant/campaign, pick an agent, and tell the fabric which agent to join.
//! The response path is deliberately unconditional — a webhook that fails to
//! name an agent drops a live phone call — so persistence is best-effort
//! behind a bounded budget and every resolution failure degrades to the
//! configured default agent.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::agent::{AgentSelector, SelectionStrategy};
use crate::database::{CallLogStatus, DatabaseManager, DbPhoneNumber, NewCallLog};
use crate::phone::normalize_e164;

/// How long store writes may hold up the webhook response.
const DEFAULT_WRITE_BUDGET: Duration = Duration::from_secs(2);

/// The fabric's SIP-inbound webhook payload.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundCallRequest {
    #[serde(default)]
    pub call_id: String,
    #[serde(default)]
    pub trunk_id: String,
    #[serde(default)]
    pub trunk_phone_number: String,
    #[serde(default)]
    pub from_number: String,
    #[serde(default)]
    pub to_number: String,
    #[serde(default)]
    pub room_name: String,
}

/// What the fabric needs back: the agent to join and context to hand it.
#[derive(Debug, Clone, Serialize)]
pub struct InboundCallResponse {
    pub agent_name: String,
    pub metadata: String,
    pub attributes: HashMap<String, String>,
}

/// `room.finished` payload for the call-ended path.
#[derive(Debug, Clone, Deserialize)]
pub struct RoomFinishedEvent {
    #[serde(default)]
    pub call_id: Option<String>,
    #[serde(default)]
    pub room_name: Option<String>,
    #[serde(default)]
    pub duration_secs: Option<i64>,
    #[serde(default)]
    pub disconnect_reason: Option<String>,
}

pub struct InboundRouter {
    db: DatabaseManager,
    selector: Arc<AgentSelector>,
    default_agent_name: String,
    default_country_code: Option<String>,
    write_budget: Duration,
}

impl InboundRouter {
    pub fn new(
        db: DatabaseManager,
        selector: Arc<AgentSelector>,
        default_agent_name: &str,
        default_country_code: Option<String>,
    ) -> Self {
        Self {
            db,
            selector,
            default_agent_name: default_agent_name.to_string(),
            default_country_code,
            write_budget: DEFAULT_WRITE_BUDGET,
        }
    }

    #[cfg(test)]
    pub fn with_write_budget(mut self, budget: Duration) -> Self {
        self.write_budget = budget;
        self
    }

    /// Resolve an inbound call. Infallible by design: every error path
    /// still yields a usable agent name.
    pub async fn route(&self, request: &InboundCallRequest) -> InboundCallResponse {
        let to_number = normalize_e164(&request.to_number, self.default_country_code.as_deref())
            .unwrap_or_else(|_| request.to_number.clone());
        let from_number = normalize_e164(&request.from_number, self.default_country_code.as_deref())
            .unwrap_or_else(|_| request.from_number.clone());

        let phone_number = match self.db.get_phone_number_by_number(&to_number).await {
            Ok(found) => found,
            Err(err) => {
                warn!("Inbound lookup failed for {}: {}; using default agent", to_number, err);
                None
            }
        };

        let Some(phone_number) = phone_number else {
            info!("📵 Inbound call to unprovisioned number {}", to_number);
            let _ = timeout(
                self.write_budget,
                self.db.insert_call_log(unmatched_log(&request.call_id, &to_number, &from_number)),
            )
            .await;
            return self.respond(
                &self.default_agent_name,
                json!({ "call_type": "inbound", "resolution": "unmatched", "to": to_number }),
                &to_number,
                &from_number,
            );
        };

        let (agent_name, agent_id) = self.resolve_agent(&phone_number).await;

        // Lead upsert + initial call log, inside the write budget. The
        // response does not depend on either write landing.
        if let Some(campaign_id) = &phone_number.campaign_id {
            let persist = self.persist_inbound(
                &phone_number,
                campaign_id,
                &from_number,
                &request.call_id,
                &request.room_name,
                &agent_name,
                agent_id.as_deref(),
            );
            if timeout(self.write_budget, persist).await.is_err() {
                warn!(
                    "Inbound persistence for call {} exceeded its budget; responding anyway",
                    request.call_id
                );
            }
        }

        debug!(
            "📥 Inbound {} -> {} routed to agent {}",
            from_number, to_number, agent_name
        );
        self.respond(
            &agent_name,
            json!({
                "call_type": "inbound",
                "phone_number_id": phone_number.id,
                "tenant_id": phone_number.tenant_id,
                "campaign_id": phone_number.campaign_id,
                "agent_id": agent_id,
                "from": from_number,
                "to": to_number,
            }),
            &to_number,
            &from_number,
        )
    }

    /// Campaign-linked numbers use least-loaded selection over the
    /// campaign's agents; bare numbers take the store's oldest active
    /// agent; anything else is the system default.
    async fn resolve_agent(&self, phone_number: &DbPhoneNumber) -> (String, Option<String>) {
        if let Some(campaign_id) = &phone_number.campaign_id {
            match self.selector.select(campaign_id, SelectionStrategy::LeastLoaded).await {
                Ok(agent) => {
                    self.selector.load_tracker().increment(&agent.id);
                    return (agent.fabric_name, Some(agent.id));
                }
                Err(err) => {
                    warn!(
                        "Agent selection failed for inbound campaign {}: {}; using default",
                        campaign_id, err
                    );
                    return (self.default_agent_name.clone(), None);
                }
            }
        }

        match self.db.oldest_active_agent().await {
            Ok(Some(agent)) => {
                let name = agent.fabric_name().to_string();
                (name, Some(agent.id))
            }
            Ok(None) => (self.default_agent_name.clone(), None),
            Err(err) => {
                warn!("Agent lookup failed for inbound call: {}; using default", err);
                (self.default_agent_name.clone(), None)
            }
        }
    }

    async fn persist_inbound(
        &self,
        phone_number: &DbPhoneNumber,
        campaign_id: &str,
        from_number: &str,
        call_id: &str,
        room_name: &str,
        agent_name: &str,
        agent_id: Option<&str>,
    ) {
        let lead = match self
            .db
            .upsert_inbound_lead(&phone_number.tenant_id, campaign_id, from_number)
            .await
        {
            Ok(lead) => Some(lead),
            Err(err) => {
                warn!("Inbound lead upsert failed for {}: {}", from_number, err);
                None
            }
        };

        let mut log = NewCallLog::new(from_number, CallLogStatus::Ringing);
        log.campaign_id = Some(campaign_id.to_string());
        log.lead_id = lead.map(|l| l.id);
        log.call_sid = Some(call_id.to_string());
        log.room_name = if room_name.is_empty() { None } else { Some(room_name.to_string()) };
        log.metadata = Some(
            json!({
                "call_type": "inbound",
                "phone_number_id": phone_number.id,
                "tenant_id": phone_number.tenant_id,
                "agent_name": agent_name,
                "agent_id": agent_id,
            })
            .to_string(),
        );

        if let Err(err) = self.db.insert_call_log(log).await {
            warn!("Inbound call log insert failed for {}: {}", call_id, err);
        }
    }

    fn respond(
        &self,
        agent_name: &str,
        metadata: serde_json::Value,
        to_number: &str,
        from_number: &str,
    ) -> InboundCallResponse {
        let mut attributes = HashMap::new();
        attributes.insert("inbound".to_string(), "true".to_string());
        attributes.insert("phone_number".to_string(), to_number.to_string());
        attributes.insert("caller".to_string(), from_number.to_string());

        InboundCallResponse {
            agent_name: agent_name.to_string(),
            metadata: metadata.to_string(),
            attributes,
        }
    }

    /// Call-ended path: close out the call log and, when the log is tied to
    /// a lead, mark the lead completed.
    pub async fn handle_room_finished(&self, event: &RoomFinishedEvent) {
        let result = self
            .db
            .complete_call_log(
                event.call_id.as_deref(),
                event.room_name.as_deref(),
                event.duration_secs,
                event.disconnect_reason.as_deref(),
            )
            .await;

        match result {
            Ok(Some(log)) => {
                if let Some(agent_id) = log
                    .metadata
                    .as_deref()
                    .and_then(|m| serde_json::from_str::<serde_json::Value>(m).ok())
                    .and_then(|v| v.get("agent_id").and_then(|a| a.as_str()).map(String::from))
                {
                    self.selector.load_tracker().decrement(&agent_id);
                }
                if let Some(lead_id) = &log.lead_id {
                    if let Err(err) = self.db.set_lead_completed(lead_id).await {
                        warn!("Failed to complete lead {} on room finish: {}", lead_id, err);
                    }
                }
                debug!("Call log {} closed ({}s)", log.id, event.duration_secs.unwrap_or(0));
            }
            Ok(None) => {
                debug!(
                    "room.finished for unknown call (sid={:?}, room={:?})",
                    event.call_id, event.room_name
                );
            }
            Err(err) => warn!("Call-ended reconciliation failed: {}", err),
        }
    }
}

fn unmatched_log(call_id: &str, to_number: &str, from_number: &str) -> NewCallLog {
    let mut log = NewCallLog::new(from_number, CallLogStatus::Ringing);
    log.call_sid = if call_id.is_empty() { None } else { Some(call_id.to_string()) };
    log.metadata = Some(
        json!({ "call_type": "inbound", "resolution": "unmatched", "to": to_number }).to_string(),
    );
    log
}
