//! # Campaign Runtime
//!
//! Executes one campaign: a single cooperative drain loop pulls leads from
//! the pending queue in priority-then-FIFO order, spawns up to
//! `max_concurrent` parallel call tasks, paces dispatch by `call_delay`, and
//! emits lifecycle events. Pause, resume, and stop are flag-driven and
//! cooperative; in-flight calls are never aborted, and their outcomes are
//! still emitted after a stop.
//!
//! No error escapes the loop: a fabric failure, a selector failure, or an
//! unnormalizable number is a per-call failure event, optionally re-enqueued
//! at the tail of its priority band while attempts remain.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde_json::json;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info};

use dialflow_fabric::{SipParticipantRequest, TelephonyFabric};

use crate::agent::AgentSelector;
use crate::error::{EngineError, Result};
use crate::phone::normalize_e164;

use super::events::{CallResult, CampaignEventKind, EventSender, LeadRef};
use super::types::{
    ActiveCallInfo, CampaignRuntimeConfig, CampaignStats, CampaignStatusSnapshot, InFlightCall,
    QueuedLead,
};

pub struct CampaignRuntime {
    campaign_id: String,
    tenant_id: String,
    config: CampaignRuntimeConfig,
    fabric: Arc<dyn TelephonyFabric>,
    selector: Arc<AgentSelector>,
    events: EventSender,

    /// Pending queue, kept ordered by priority (lower dials earlier) with
    /// FIFO order inside a priority band. Owned by the runtime; external
    /// access only through operations.
    pending: Mutex<VecDeque<QueuedLead>>,
    in_flight: dashmap::DashMap<String, InFlightCall>,
    /// Failed leads between leaving `in_flight` and re-entering `pending`;
    /// keeps the completion check from firing inside that window.
    retrying: AtomicUsize,
    stats: Mutex<CampaignStats>,

    /// Drain loop liveness; false while paused or finished.
    running: AtomicBool,
    paused: AtomicBool,
    stopping: AtomicBool,
    stop_emitted: AtomicBool,
}

impl CampaignRuntime {
    pub fn new(
        campaign_id: &str,
        tenant_id: &str,
        config: CampaignRuntimeConfig,
        fabric: Arc<dyn TelephonyFabric>,
        selector: Arc<AgentSelector>,
        events: EventSender,
    ) -> Self {
        Self {
            campaign_id: campaign_id.to_string(),
            tenant_id: tenant_id.to_string(),
            config,
            fabric,
            selector,
            events,
            pending: Mutex::new(VecDeque::new()),
            in_flight: dashmap::DashMap::new(),
            retrying: AtomicUsize::new(0),
            stats: Mutex::new(CampaignStats::default()),
            running: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            stopping: AtomicBool::new(false),
            stop_emitted: AtomicBool::new(false),
        }
    }

    pub fn campaign_id(&self) -> &str {
        &self.campaign_id
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    /// Enqueue leads, preserving input order within each priority band.
    pub fn add_leads(&self, leads: Vec<QueuedLead>) {
        let count = leads.len();
        if count == 0 {
            return;
        }
        {
            let mut pending = self.pending.lock();
            for lead in leads {
                let at = pending
                    .iter()
                    .position(|queued| queued.priority > lead.priority)
                    .unwrap_or(pending.len());
                pending.insert(at, lead);
            }
        }
        self.events.emit(CampaignEventKind::LeadsAdded { count });
    }

    /// Begin draining. Idempotent while already running; rejected after a
    /// stop or with nothing to dial.
    pub fn start(self: &Arc<Self>) -> Result<()> {
        if self.stopping.load(Ordering::SeqCst) {
            return Err(EngineError::precondition(
                "campaign_stopped",
                "campaign has been stopped",
            ));
        }
        if self.config.sip_trunk_id.is_empty() {
            return Err(EngineError::precondition(
                "no_sip_trunk",
                "campaign has no SIP trunk configured",
            ));
        }
        if self.running.load(Ordering::SeqCst) {
            return Ok(());
        }
        if self.pending.lock().is_empty() && self.in_flight.is_empty() {
            return Err(EngineError::precondition(
                "no_pending_leads",
                "campaign has no pending leads",
            ));
        }

        self.paused.store(false, Ordering::SeqCst);
        self.running.store(true, Ordering::SeqCst);
        self.events.emit(CampaignEventKind::CampaignStarted);
        info!("🚀 Campaign {} started (max_concurrent={})", self.campaign_id, self.config.max_concurrent);
        self.spawn_drain_loop();
        Ok(())
    }

    /// Halt new dispatch; in-flight calls continue. Returns immediately.
    pub fn pause(&self) -> Result<()> {
        if self.stopping.load(Ordering::SeqCst) {
            return Err(EngineError::precondition("campaign_stopped", "campaign has been stopped"));
        }
        if !self.paused.swap(true, Ordering::SeqCst) {
            info!("⏸️ Campaign {} paused", self.campaign_id);
            self.events.emit(CampaignEventKind::CampaignPaused);
        }
        Ok(())
    }

    /// Clear the pause flag and re-enter the drain loop.
    pub fn resume(self: &Arc<Self>) -> Result<()> {
        if self.stopping.load(Ordering::SeqCst) {
            return Err(EngineError::precondition("campaign_stopped", "campaign has been stopped"));
        }
        if self.paused.swap(false, Ordering::SeqCst) {
            info!("▶️ Campaign {} resumed", self.campaign_id);
            self.events.emit(CampaignEventKind::CampaignResumed);
            if !self.running.swap(true, Ordering::SeqCst) {
                self.spawn_drain_loop();
            }
        }
        Ok(())
    }

    /// Cooperative stop: the loop exits after its current tick; in-flight
    /// calls run to their terminal events. Idempotent.
    pub fn stop(&self) {
        self.stopping.store(true, Ordering::SeqCst);
        if !self.stop_emitted.swap(true, Ordering::SeqCst) {
            info!("🛑 Campaign {} stopping", self.campaign_id);
            self.events.emit(CampaignEventKind::CampaignStopped);
        }
    }

    pub fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::SeqCst)
    }

    /// True once a stopped runtime has no in-flight calls left to reconcile.
    pub fn is_drained(&self) -> bool {
        self.in_flight.is_empty() && !self.running.load(Ordering::SeqCst)
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Stats plus the identity of currently active calls.
    pub fn status(&self) -> CampaignStatusSnapshot {
        let state = if self.stopping.load(Ordering::SeqCst) {
            if self.is_drained() { "stopped" } else { "stopping" }
        } else if self.paused.load(Ordering::SeqCst) {
            "paused"
        } else if self.running.load(Ordering::SeqCst) {
            "running"
        } else {
            "idle"
        };

        let in_flight = self
            .in_flight
            .iter()
            .map(|entry| {
                let call = entry.value();
                ActiveCallInfo {
                    lead_id: call.lead_id.clone(),
                    phone_number: call.phone_number.clone(),
                    agent_id: call.agent_id.clone(),
                    room_name: call.room_name.clone(),
                    started_at: call.started_at,
                }
            })
            .collect();

        CampaignStatusSnapshot {
            campaign_id: self.campaign_id.clone(),
            state: state.to_string(),
            pending: self.pending.lock().len(),
            in_flight,
            stats: *self.stats.lock(),
        }
    }

    fn spawn_drain_loop(self: &Arc<Self>) {
        let runtime = self.clone();
        tokio::spawn(async move {
            runtime.drain_loop().await;
        });
    }

    /// The single cooperative loop driving dispatch for this campaign.
    async fn drain_loop(self: Arc<Self>) {
        loop {
            if self.stopping.load(Ordering::SeqCst) {
                self.running.store(false, Ordering::SeqCst);
                debug!("Campaign {} drain loop exiting after stop", self.campaign_id);
                return;
            }

            if self.paused.load(Ordering::SeqCst) {
                self.running.store(false, Ordering::SeqCst);
                // A resume that raced the exit re-enters here instead of
                // stranding the queue.
                if !self.paused.load(Ordering::SeqCst)
                    && self
                        .running
                        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                        .is_ok()
                {
                    continue;
                }
                debug!("Campaign {} drain loop parked by pause", self.campaign_id);
                return;
            }

            let next = if self.in_flight.len() < self.config.max_concurrent {
                self.pop_next_lead()
            } else {
                None
            };

            match next {
                Some(mut lead) => {
                    lead.attempts += 1;
                    // Reserve the concurrency slot before the task runs so
                    // the cap holds even with zero call delay.
                    self.in_flight.insert(
                        lead.id.clone(),
                        InFlightCall {
                            lead_id: lead.id.clone(),
                            phone_number: lead.phone_number.clone(),
                            agent_id: None,
                            room_name: None,
                            started_at: Utc::now(),
                        },
                    );

                    let runtime = self.clone();
                    let task_lead = lead.clone();
                    tokio::spawn(async move {
                        runtime.start_call(task_lead).await;
                    });

                    let more_pending = !self.pending.lock().is_empty();
                    if more_pending && !self.config.call_delay.is_zero() {
                        sleep(self.config.call_delay).await;
                    }
                }
                None => {
                    if self.in_flight.is_empty()
                        && self.retrying.load(Ordering::SeqCst) == 0
                        && self.pending.lock().is_empty()
                    {
                        let stats = *self.stats.lock();
                        self.running.store(false, Ordering::SeqCst);
                        info!(
                            "🏁 Campaign {} completed: {} total, {} ok, {} failed",
                            self.campaign_id,
                            stats.total_calls,
                            stats.successful_calls,
                            stats.failed_calls
                        );
                        self.events.emit(CampaignEventKind::CampaignCompleted { stats });
                        return;
                    }
                    sleep(self.config.poll_interval).await;
                }
            }
        }
    }

    fn pop_next_lead(&self) -> Option<QueuedLead> {
        self.pending.lock().pop_front()
    }

    /// Retry re-enqueues go to the tail of their priority band.
    fn push_retry(&self, lead: QueuedLead) {
        let mut pending = self.pending.lock();
        let at = pending
            .iter()
            .position(|queued| queued.priority > lead.priority)
            .unwrap_or(pending.len());
        pending.insert(at, lead);
    }

    /// Dispatch one call and emit its terminal event. Never returns an
    /// error; every outcome becomes an event.
    async fn start_call(self: Arc<Self>, lead: QueuedLead) {
        let room_name = format!(
            "outbound-{}-{}-{}",
            self.campaign_id,
            Utc::now().timestamp_millis(),
            random_suffix(6)
        );
        let lead_ref = LeadRef {
            lead_id: lead.id.clone(),
            phone_number: lead.phone_number.clone(),
            attempts: lead.attempts,
        };

        self.events.emit(CampaignEventKind::CallStarted { lead: lead_ref.clone() });

        let mut counted_agent: Option<String> = None;
        let outcome = self.dial(&lead, &room_name, &mut counted_agent).await;

        match outcome {
            Ok(result) => {
                {
                    let mut stats = self.stats.lock();
                    stats.total_calls += 1;
                    stats.successful_calls += 1;
                }
                debug!(
                    "📞 Call to {} accepted (room={}, sip_call_id={})",
                    lead.phone_number, room_name, result.sip_call_id
                );
                self.events
                    .emit(CampaignEventKind::CallCompleted { lead: lead_ref, result });
            }
            Err(err) => {
                let will_retry =
                    self.config.retry_failed && lead.attempts <= self.config.retry_attempts;
                error!(
                    "❌ Call to {} failed (attempt {}): {}",
                    lead.phone_number, lead.attempts, err
                );

                if !will_retry {
                    let mut stats = self.stats.lock();
                    stats.total_calls += 1;
                    stats.failed_calls += 1;
                }

                // Emitted before the re-enqueue so this attempt's failure
                // always precedes the next attempt's call_started.
                self.events.emit(CampaignEventKind::CallFailed {
                    lead: lead_ref,
                    error: err.to_string(),
                    error_kind: error_kind(&err).to_string(),
                    will_retry,
                });

                if will_retry {
                    self.retrying.fetch_add(1, Ordering::SeqCst);
                    self.release_slot(&counted_agent, &lead.id);
                    self.push_retry(lead);
                    self.retrying.fetch_sub(1, Ordering::SeqCst);
                    return;
                }
            }
        }

        self.release_slot(&counted_agent, &lead.id);
    }

    /// Terminal bookkeeping: the load counter and the concurrency slot are
    /// released on every outcome, retries included.
    fn release_slot(&self, counted_agent: &Option<String>, lead_id: &str) {
        if let Some(agent_id) = counted_agent {
            self.selector.load_tracker().decrement(agent_id);
        }
        self.in_flight.remove(lead_id);
    }

    async fn dial(
        &self,
        lead: &QueuedLead,
        room_name: &str,
        counted_agent: &mut Option<String>,
    ) -> Result<CallResult> {
        let agent = self.selector.select(&self.campaign_id, self.config.strategy).await?;

        // Counter goes up before the fabric is touched; the caller's
        // cleanup decrements it on every outcome.
        self.selector.load_tracker().increment(&agent.id);
        *counted_agent = Some(agent.id.clone());
        if let Some(mut entry) = self.in_flight.get_mut(&lead.id) {
            entry.agent_id = Some(agent.id.clone());
            entry.room_name = Some(room_name.to_string());
        }

        let e164 =
            normalize_e164(&lead.phone_number, self.config.default_country_code.as_deref())?;

        let metadata = json!({
            "call_type": "outbound",
            "campaign_id": self.campaign_id,
            "tenant_id": self.tenant_id,
            "lead_id": lead.id,
            "lead_name": lead.name,
            "phone_number": e164,
            "attempt": lead.attempts,
        });

        // Dispatch precedes participant creation so the room has a live
        // agent by the time the SIP leg rings.
        let dispatch = timeout(
            self.config.call_timeout,
            self.fabric.create_agent_dispatch(room_name, &agent.fabric_name, metadata.clone()),
        )
        .await
        .map_err(|_| EngineError::timeout(format!("agent dispatch for {room_name}")))??;

        let mut request = SipParticipantRequest::new(&self.config.sip_trunk_id, &e164, room_name)
            .with_metadata(&metadata.to_string());
        if let Some(name) = &lead.name {
            request = request.with_name(name);
        }
        if let Some(caller_id) = &self.config.caller_id_number {
            request = request.with_caller_id(caller_id);
        }

        let participant = timeout(
            self.config.call_timeout,
            self.fabric.create_sip_participant(request),
        )
        .await
        .map_err(|_| EngineError::timeout(format!("sip participant for {room_name}")))??;

        Ok(CallResult {
            room_name: room_name.to_string(),
            dispatch_id: dispatch.id,
            sip_call_id: participant.sip_call_id,
            participant_id: participant.participant_id,
            agent_id: agent.id,
            agent_name: agent.name,
        })
    }
}

fn error_kind(err: &EngineError) -> &'static str {
    match err {
        EngineError::Telephony(fabric) => fabric.kind().as_str(),
        EngineError::Timeout(_) => "timeout",
        EngineError::Validation(_) => "validation",
        _ => "internal",
    }
}

fn random_suffix(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect::<String>()
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_suffix_has_requested_length() {
        let suffix = random_suffix(6);
        assert_eq!(suffix.len(), 6);
        assert!(suffix.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn error_kinds_map_to_machine_strings() {
        assert_eq!(error_kind(&EngineError::timeout("x")), "timeout");
        assert_eq!(error_kind(&EngineError::validation("x")), "validation");
        assert_eq!(
            error_kind(&EngineError::Telephony(dialflow_fabric::FabricError::transient("x"))),
            "transient"
        );
    }
}
