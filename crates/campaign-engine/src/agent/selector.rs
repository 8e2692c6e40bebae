//! Strategy-driven agent selection with capacity-aware fallback

use std::sync::Arc;

use rand::Rng;
use tracing::{debug, warn};

use crate::database::{DatabaseManager, DbAssignedAgent};
use crate::error::Result;

use super::load::LoadTracker;
use super::SYSTEM_FALLBACK_AGENT_ID;

/// How to pick one agent from a campaign's assigned set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionStrategy {
    #[default]
    PrimaryFirst,
    RoundRobin,
    LeastLoaded,
    Random,
}

impl SelectionStrategy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "PRIMARY_FIRST" => Some(SelectionStrategy::PrimaryFirst),
            "ROUND_ROBIN" => Some(SelectionStrategy::RoundRobin),
            "LEAST_LOADED" => Some(SelectionStrategy::LeastLoaded),
            "RANDOM" => Some(SelectionStrategy::Random),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionStrategy::PrimaryFirst => "PRIMARY_FIRST",
            SelectionStrategy::RoundRobin => "ROUND_ROBIN",
            SelectionStrategy::LeastLoaded => "LEAST_LOADED",
            SelectionStrategy::Random => "RANDOM",
        }
    }
}

/// The selection result handed to the campaign runtime.
#[derive(Debug, Clone)]
pub struct SelectedAgent {
    pub id: String,
    pub name: String,
    /// Name the fabric dispatches by (may differ from the display name).
    pub fabric_name: String,
    pub max_concurrent_calls: u32,
    /// True when the fallback chain produced this agent rather than a
    /// campaign assignment.
    pub is_fallback: bool,
}

/// Chooses one agent per call. A value with injected dependencies, not a
/// global: the supervisor builds one and shares it between the outbound
/// runtimes and the inbound router.
pub struct AgentSelector {
    db: DatabaseManager,
    load: Arc<LoadTracker>,
    default_agent_name: String,
}

impl AgentSelector {
    pub fn new(db: DatabaseManager, load: Arc<LoadTracker>, default_agent_name: &str) -> Self {
        Self { db, load, default_agent_name: default_agent_name.to_string() }
    }

    pub fn load_tracker(&self) -> &Arc<LoadTracker> {
        &self.load
    }

    /// Select an agent for one call on `campaign_id`.
    ///
    /// Never fails to produce an agent: an empty assignment list or a fully
    /// saturated one falls back to the oldest active agent in the store and
    /// finally to the synthetic system default.
    pub async fn select(
        &self,
        campaign_id: &str,
        strategy: SelectionStrategy,
    ) -> Result<SelectedAgent> {
        let assignments = self.db.campaign_assignments(campaign_id).await?;

        if let Some(assigned) = self.pick(campaign_id, &assignments, strategy) {
            debug!(
                "🎯 Selected agent {} ({}) for campaign {} via {}",
                assigned.name,
                assigned.agent_id,
                campaign_id,
                strategy.as_str()
            );
            return Ok(SelectedAgent {
                id: assigned.agent_id.clone(),
                name: assigned.name.clone(),
                fabric_name: assigned.fabric_name().to_string(),
                max_concurrent_calls: assigned.max_concurrent_calls.max(1) as u32,
                is_fallback: false,
            });
        }

        self.fallback(campaign_id).await
    }

    /// Pure selection over an assignment snapshot; strategy semantics live
    /// here so they can be tested without dispatching anything.
    fn pick<'a>(
        &self,
        campaign_id: &str,
        assignments: &'a [DbAssignedAgent],
        strategy: SelectionStrategy,
    ) -> Option<&'a DbAssignedAgent> {
        if assignments.is_empty() {
            return None;
        }

        let has_capacity = |a: &DbAssignedAgent| {
            (self.load.active_calls(&a.agent_id) as i64) < a.max_concurrent_calls.max(1)
        };

        match strategy {
            SelectionStrategy::PrimaryFirst => assignments.iter().find(|a| has_capacity(a)),
            SelectionStrategy::RoundRobin => {
                // Cursor advances regardless of the outcome; an at-capacity
                // pick falls through to the primary-first scan.
                let cursor = self.load.next_round_robin(campaign_id);
                let candidate = &assignments[cursor % assignments.len()];
                if has_capacity(candidate) {
                    Some(candidate)
                } else {
                    assignments.iter().find(|a| has_capacity(a))
                }
            }
            SelectionStrategy::LeastLoaded => assignments
                .iter()
                .filter(|a| has_capacity(a))
                .min_by_key(|a| self.load.active_calls(&a.agent_id)),
            SelectionStrategy::Random => {
                let index = rand::thread_rng().gen_range(0..assignments.len());
                let candidate = &assignments[index];
                if has_capacity(candidate) {
                    Some(candidate)
                } else {
                    assignments.iter().find(|a| has_capacity(a))
                }
            }
        }
    }

    /// Oldest active agent in the store, then the synthetic system default.
    async fn fallback(&self, campaign_id: &str) -> Result<SelectedAgent> {
        if let Some(agent) = self.db.oldest_active_agent().await? {
            debug!(
                "Campaign {} has no selectable assignment; falling back to oldest agent {}",
                campaign_id, agent.id
            );
            return Ok(SelectedAgent {
                fabric_name: agent.fabric_name().to_string(),
                max_concurrent_calls: agent.max_concurrent_calls.max(1) as u32,
                id: agent.id,
                name: agent.name,
                is_fallback: true,
            });
        }

        warn!(
            "No active agents in store for campaign {}; using system default '{}'",
            campaign_id, self.default_agent_name
        );
        Ok(SelectedAgent {
            id: SYSTEM_FALLBACK_AGENT_ID.to_string(),
            name: self.default_agent_name.clone(),
            fabric_name: self.default_agent_name.clone(),
            max_concurrent_calls: u32::MAX,
            is_fallback: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::NewAgent;

    async fn fixture() -> (DatabaseManager, Arc<LoadTracker>) {
        let db = DatabaseManager::new_in_memory().await.unwrap();
        (db, Arc::new(LoadTracker::new()))
    }

    async fn seed_campaign(
        db: &DatabaseManager,
        agents: &[(&str, i64, bool)],
    ) -> (String, Vec<String>) {
        let tenant = db.create_tenant("selector-test.example").await.unwrap();
        let campaign = db
            .create_campaign(crate::database::NewCampaign {
                tenant_id: tenant.id.clone(),
                name: "test".into(),
                max_concurrent: 3,
                retry_failed: false,
                retry_attempts: 0,
                call_delay_ms: 0,
                sip_trunk_id: Some("ST_x".into()),
                caller_id_number: None,
                agent_name: None,
            })
            .await
            .unwrap();

        let mut ids = Vec::new();
        for (name, max_calls, primary) in agents {
            let agent = db
                .create_agent(NewAgent {
                    name: name.to_string(),
                    max_concurrent_calls: *max_calls,
                    livekit_agent_name: None,
                })
                .await
                .unwrap();
            db.assign_agent_to_campaign(&campaign.id, &agent.id, *primary).await.unwrap();
            ids.push(agent.id);
            // Assignment age must be distinguishable for ordering
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        (campaign.id, ids)
    }

    #[tokio::test]
    async fn primary_first_respects_capacity() {
        let (db, load) = fixture().await;
        let (campaign_id, ids) = seed_campaign(&db, &[("a1", 1, true), ("a2", 5, false)]).await;
        let selector = AgentSelector::new(db, load.clone(), "default-agent");

        let first = selector
            .select(&campaign_id, SelectionStrategy::PrimaryFirst)
            .await
            .unwrap();
        assert_eq!(first.id, ids[0]);

        // a1 saturated -> a2
        load.increment(&ids[0]);
        let second = selector
            .select(&campaign_id, SelectionStrategy::PrimaryFirst)
            .await
            .unwrap();
        assert_eq!(second.id, ids[1]);

        // a1 freed -> back to primary
        load.decrement(&ids[0]);
        let third = selector
            .select(&campaign_id, SelectionStrategy::PrimaryFirst)
            .await
            .unwrap();
        assert_eq!(third.id, ids[0]);
    }

    #[tokio::test]
    async fn round_robin_cycles_assignments() {
        let (db, load) = fixture().await;
        let (campaign_id, ids) =
            seed_campaign(&db, &[("a1", 5, true), ("a2", 5, false), ("a3", 5, false)]).await;
        let selector = AgentSelector::new(db, load, "default-agent");

        let picks = [
            selector.select(&campaign_id, SelectionStrategy::RoundRobin).await.unwrap().id,
            selector.select(&campaign_id, SelectionStrategy::RoundRobin).await.unwrap().id,
            selector.select(&campaign_id, SelectionStrategy::RoundRobin).await.unwrap().id,
            selector.select(&campaign_id, SelectionStrategy::RoundRobin).await.unwrap().id,
        ];
        assert_eq!(picks, [ids[0].clone(), ids[1].clone(), ids[2].clone(), ids[0].clone()]);
    }

    #[tokio::test]
    async fn least_loaded_prefers_idle_agent() {
        let (db, load) = fixture().await;
        let (campaign_id, ids) = seed_campaign(&db, &[("a1", 5, true), ("a2", 5, false)]).await;
        let selector = AgentSelector::new(db, load.clone(), "default-agent");

        load.increment(&ids[0]);
        load.increment(&ids[0]);
        load.increment(&ids[1]);

        let pick = selector
            .select(&campaign_id, SelectionStrategy::LeastLoaded)
            .await
            .unwrap();
        assert_eq!(pick.id, ids[1]);
    }

    #[tokio::test]
    async fn least_loaded_ties_break_by_order() {
        let (db, load) = fixture().await;
        let (campaign_id, ids) = seed_campaign(&db, &[("a1", 5, false), ("a2", 5, true)]).await;
        let selector = AgentSelector::new(db, load, "default-agent");

        // a2 is primary, so it orders first despite later assignment
        let pick = selector
            .select(&campaign_id, SelectionStrategy::LeastLoaded)
            .await
            .unwrap();
        assert_eq!(pick.id, ids[1]);
    }

    #[tokio::test]
    async fn saturated_assignments_fall_back_to_oldest_agent() {
        let (db, load) = fixture().await;
        let (campaign_id, ids) = seed_campaign(&db, &[("a1", 1, true)]).await;
        let selector = AgentSelector::new(db.clone(), load.clone(), "default-agent");

        load.increment(&ids[0]);
        let pick = selector
            .select(&campaign_id, SelectionStrategy::PrimaryFirst)
            .await
            .unwrap();
        // The only stored agent is also the oldest active one
        assert_eq!(pick.id, ids[0]);
        assert!(pick.is_fallback);
    }

    #[tokio::test]
    async fn empty_store_yields_system_default() {
        let (db, load) = fixture().await;
        let selector = AgentSelector::new(db, load, "default-agent");

        let pick = selector
            .select("missing-campaign", SelectionStrategy::PrimaryFirst)
            .await
            .unwrap();
        assert_eq!(pick.id, SYSTEM_FALLBACK_AGENT_ID);
        assert_eq!(pick.name, "default-agent");
        assert!(pick.is_fallback);
        assert_eq!(pick.max_concurrent_calls, u32::MAX);
    }

    #[tokio::test]
    async fn random_falls_through_when_saturated() {
        let (db, load) = fixture().await;
        let (campaign_id, ids) = seed_campaign(&db, &[("a1", 1, true), ("a2", 5, false)]).await;
        let selector = AgentSelector::new(db, load.clone(), "default-agent");

        load.increment(&ids[0]);
        for _ in 0..10 {
            let pick = selector
                .select(&campaign_id, SelectionStrategy::Random)
                .await
                .unwrap();
            assert_eq!(pick.id, ids[1], "saturated a1 must never be picked");
        }
    }
}
