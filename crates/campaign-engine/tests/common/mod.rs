//! Shared test fixtures: a scripted telephony fabric and store seeding

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use uuid::Uuid;

use dialflow_fabric::{
    AgentDispatch, FabricError, SipParticipantInfo, SipParticipantRequest, TelephonyFabric,
};

/// A fabric that answers from a script instead of a network: configurable
/// per-number failures, a simulated call-setup duration, and bookkeeping
/// the tests assert on.
#[derive(Default)]
pub struct MockFabric {
    /// Destination numbers whose participant creation always fails.
    pub fail_numbers: Mutex<HashSet<String>>,
    /// Simulated fabric latency per participant creation.
    pub call_duration: Mutex<Duration>,
    /// `(room_name, agent_name)` per dispatch, in arrival order.
    pub dispatches: Mutex<Vec<(String, String)>>,
    /// Destination numbers per participant creation, in arrival order.
    pub participants: Mutex<Vec<String>>,
    in_progress: AtomicUsize,
    max_in_progress: AtomicUsize,
}

impl MockFabric {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_number(&self, e164: &str) {
        self.fail_numbers.lock().insert(e164.to_string());
    }

    pub fn set_call_duration(&self, duration: Duration) {
        *self.call_duration.lock() = duration;
    }

    /// Highest number of concurrently in-progress participant creations
    /// observed; bounded by the campaign's `max_concurrent`.
    pub fn max_in_progress(&self) -> usize {
        self.max_in_progress.load(Ordering::SeqCst)
    }

    pub fn dispatch_agents(&self) -> Vec<String> {
        self.dispatches.lock().iter().map(|(_, agent)| agent.clone()).collect()
    }
}

#[async_trait]
impl TelephonyFabric for MockFabric {
    async fn create_agent_dispatch(
        &self,
        room_name: &str,
        agent_name: &str,
        _metadata: serde_json::Value,
    ) -> dialflow_fabric::Result<AgentDispatch> {
        self.dispatches.lock().push((room_name.to_string(), agent_name.to_string()));
        Ok(AgentDispatch {
            id: format!("AD_{}", Uuid::new_v4()),
            agent_name: agent_name.to_string(),
            room: room_name.to_string(),
        })
    }

    async fn create_sip_participant(
        &self,
        request: SipParticipantRequest,
    ) -> dialflow_fabric::Result<SipParticipantInfo> {
        let current = self.in_progress.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_progress.fetch_max(current, Ordering::SeqCst);

        let duration = *self.call_duration.lock();
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }

        self.in_progress.fetch_sub(1, Ordering::SeqCst);
        self.participants.lock().push(request.sip_call_to.clone());

        if self.fail_numbers.lock().contains(&request.sip_call_to) {
            return Err(FabricError::transient("scripted failure").with_code(503));
        }

        Ok(SipParticipantInfo {
            participant_id: format!("PA_{}", Uuid::new_v4()),
            participant_identity: request.participant_identity.clone(),
            sip_call_id: format!("SCL_{}", Uuid::new_v4()),
            room_name: request.room_name.clone(),
        })
    }
}
