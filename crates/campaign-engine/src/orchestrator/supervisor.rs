//! # Campaign Supervisor
//!
//! Process-wide registry of running campaign runtimes. Validates start
//! requests against the store, wires each new runtime to its reconciler
//! consumer, routes pause/resume/stop, evicts finished runtimes, and drives
//! graceful shutdown with a bounded drain deadline.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{info, warn};

use dialflow_fabric::TelephonyFabric;

use crate::agent::{AgentSelector, SelectionStrategy};
use crate::config::AppConfig;
use crate::database::{CampaignStatus, DatabaseManager, DbLead};
use crate::error::{EngineError, Result};

use super::events::{self, CampaignEvent, CampaignEventKind};
use super::reconciler::EventReconciler;
use super::runtime::CampaignRuntime;
use super::types::{CampaignRuntimeConfig, CampaignStatusSnapshot, QueuedLead};

pub struct CampaignSupervisor {
    db: DatabaseManager,
    fabric: Arc<dyn TelephonyFabric>,
    selector: Arc<AgentSelector>,
    reconciler: EventReconciler,
    config: AppConfig,
    runtimes: Arc<DashMap<String, Arc<CampaignRuntime>>>,
}

impl CampaignSupervisor {
    pub fn new(
        db: DatabaseManager,
        fabric: Arc<dyn TelephonyFabric>,
        selector: Arc<AgentSelector>,
        config: AppConfig,
    ) -> Self {
        let reconciler = EventReconciler::new(db.clone());
        Self {
            db,
            fabric,
            selector,
            reconciler,
            config,
            runtimes: Arc::new(DashMap::new()),
        }
    }

    pub fn selector(&self) -> &Arc<AgentSelector> {
        &self.selector
    }

    /// Startup recovery: leads left `calling` by a previous process have no
    /// runtime to finish them; fail them with an audit trail and start the
    /// load tracker from zero.
    pub async fn recover(&self) -> Result<u64> {
        let orphaned = self.db.mark_orphaned_calling_leads().await?;
        if orphaned > 0 {
            warn!("⚠️ Marked {} orphaned in-flight leads as failed", orphaned);
        }
        self.selector.load_tracker().reset();
        Ok(orphaned)
    }

    /// Validate and launch a campaign run.
    pub async fn start_campaign(
        &self,
        tenant_id: &str,
        campaign_id: &str,
        strategy: Option<SelectionStrategy>,
    ) -> Result<()> {
        let campaign = self
            .db
            .get_campaign(tenant_id, campaign_id)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("campaign {campaign_id}")))?;

        if self.runtimes.contains_key(campaign_id)
            || campaign.get_status() == Some(CampaignStatus::Active)
        {
            return Err(EngineError::precondition(
                "campaign_active",
                "campaign is already active",
            ));
        }

        let sip_trunk_id = campaign
            .sip_trunk_id
            .clone()
            .or_else(|| self.config.outbound_trunk_id.clone())
            .ok_or_else(|| {
                EngineError::precondition("no_sip_trunk", "campaign has no SIP trunk configured")
            })?;

        let pending = self.db.pending_leads(campaign_id).await?;
        if pending.is_empty() {
            return Err(EngineError::precondition(
                "no_pending_leads",
                "campaign has no pending leads",
            ));
        }

        let mut runtime_config = CampaignRuntimeConfig::from_campaign(&campaign, sip_trunk_id);
        runtime_config.strategy = strategy.unwrap_or_default();
        runtime_config.default_country_code = self.config.default_country_code.clone();
        runtime_config.call_timeout = self.config.fabric_call_timeout;

        let (sender, receiver) = events::channel(campaign_id);
        let runtime = Arc::new(CampaignRuntime::new(
            campaign_id,
            tenant_id,
            runtime_config,
            self.fabric.clone(),
            self.selector.clone(),
            sender,
        ));
        runtime.add_leads(pending.iter().map(queued_from_row).collect());

        self.runtimes.insert(campaign_id.to_string(), runtime.clone());
        self.spawn_reconcile_loop(campaign_id, receiver);

        if let Err(err) = runtime.start() {
            self.runtimes.remove(campaign_id);
            return Err(err);
        }

        info!(
            "📣 Campaign {} launched with {} pending leads",
            campaign_id,
            runtime.status().pending
        );
        Ok(())
    }

    pub async fn pause_campaign(&self, tenant_id: &str, campaign_id: &str) -> Result<()> {
        self.running_runtime(tenant_id, campaign_id).await?.pause()
    }

    pub async fn resume_campaign(&self, tenant_id: &str, campaign_id: &str) -> Result<()> {
        match self.running_runtime(tenant_id, campaign_id).await {
            Ok(runtime) => runtime.resume(),
            Err(err) => {
                // A paused campaign can outlive its runtime (process
                // restart); resume then relaunches over the remaining leads.
                let campaign = self.db.get_campaign(tenant_id, campaign_id).await?;
                match campaign.and_then(|c| c.get_status()) {
                    Some(CampaignStatus::Paused) => {
                        self.start_campaign(tenant_id, campaign_id, None).await
                    }
                    _ => Err(err),
                }
            }
        }
    }

    pub async fn stop_campaign(&self, tenant_id: &str, campaign_id: &str) -> Result<()> {
        let runtime = self.running_runtime(tenant_id, campaign_id).await?;
        runtime.stop();

        // The runtime stays registered until its in-flight calls have
        // emitted terminal events, then leaves the registry.
        let runtimes = self.runtimes.clone();
        let campaign_id = campaign_id.to_string();
        tokio::spawn(async move {
            while !runtime.is_drained() {
                sleep(Duration::from_millis(250)).await;
            }
            runtimes.remove(&campaign_id);
        });
        Ok(())
    }

    /// Realtime snapshot for an active campaign, if one is running here.
    pub fn realtime_status(&self, campaign_id: &str) -> Option<CampaignStatusSnapshot> {
        self.runtimes.get(campaign_id).map(|runtime| runtime.status())
    }

    pub fn is_running(&self, campaign_id: &str) -> bool {
        self.runtimes.contains_key(campaign_id)
    }

    pub fn active_campaigns(&self) -> usize {
        self.runtimes.len()
    }

    /// Push freshly ingested leads into an already-running campaign.
    pub fn add_leads_if_running(&self, campaign_id: &str, leads: &[DbLead]) {
        if let Some(runtime) = self.runtimes.get(campaign_id) {
            runtime.add_leads(leads.iter().map(queued_from_row).collect());
        }
    }

    /// Stop every runtime and wait for in-flight calls up to the configured
    /// grace period; whatever remains is left for startup recovery.
    pub async fn shutdown(&self) {
        let active = self.runtimes.len();
        if active == 0 {
            return;
        }
        info!("🛑 Supervisor stopping {} active campaign(s)", active);
        for entry in self.runtimes.iter() {
            entry.value().stop();
        }

        let deadline = tokio::time::Instant::now() + self.config.shutdown_grace;
        loop {
            let in_flight: usize =
                self.runtimes.iter().map(|e| e.value().in_flight_count()).sum();
            if in_flight == 0 {
                info!("✅ All in-flight calls drained");
                break;
            }
            if tokio::time::Instant::now() >= deadline {
                warn!(
                    "⚠️ Shutdown deadline reached with {} call(s) in flight; they will be \
                     recovered as orphaned on next start",
                    in_flight
                );
                break;
            }
            sleep(Duration::from_millis(100)).await;
        }
        self.runtimes.clear();
    }

    async fn running_runtime(
        &self,
        tenant_id: &str,
        campaign_id: &str,
    ) -> Result<Arc<CampaignRuntime>> {
        // Tenant scoping first: a cross-tenant id must 404, never reveal
        // that a runtime exists.
        self.db
            .get_campaign(tenant_id, campaign_id)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("campaign {campaign_id}")))?;

        self.runtimes
            .get(campaign_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| {
                EngineError::precondition("campaign_not_active", "campaign is not active")
            })
    }

    fn spawn_reconcile_loop(
        &self,
        campaign_id: &str,
        mut receiver: mpsc::UnboundedReceiver<CampaignEvent>,
    ) {
        let reconciler = self.reconciler.clone();
        let runtimes = self.runtimes.clone();
        let campaign_id = campaign_id.to_string();

        tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                reconciler.apply_logged(&event).await;

                if matches!(event.kind, CampaignEventKind::CampaignCompleted { .. }) {
                    runtimes.remove(&campaign_id);
                }
            }
        });
    }
}

fn queued_from_row(lead: &DbLead) -> QueuedLead {
    QueuedLead {
        id: lead.id.clone(),
        phone_number: lead.phone_number.clone(),
        name: lead.name.clone(),
        priority: lead.priority,
        attempts: lead.attempts.max(0) as u32,
        metadata: lead.metadata.clone(),
    }
}
