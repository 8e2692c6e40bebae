//! Campaign runtime integration tests
//!
//! Drive the drain loop against a scripted fabric and assert on the emitted
//! event stream, then run the full supervisor → reconciler → store path.

mod common;

use std::sync::Arc;
use std::time::Duration;

use serial_test::serial;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::timeout;

use common::MockFabric;
use dialflow_campaign_engine::agent::{AgentSelector, LoadTracker, SelectionStrategy};
use dialflow_campaign_engine::database::{DatabaseManager, NewAgent, NewCampaign, NewLead};
use dialflow_campaign_engine::orchestrator::events::{self, CampaignEvent, CampaignEventKind};
use dialflow_campaign_engine::orchestrator::runtime::CampaignRuntime;
use dialflow_campaign_engine::orchestrator::types::{CampaignRuntimeConfig, QueuedLead};
use dialflow_campaign_engine::orchestrator::CampaignSupervisor;

const CAMPAIGN_ID: &str = "camp-under-test";
const TENANT_ID: &str = "tenant-under-test";

fn test_config(
    max_concurrent: usize,
    call_delay_ms: u64,
    retry_failed: bool,
    retry_attempts: u32,
) -> CampaignRuntimeConfig {
    CampaignRuntimeConfig {
        max_concurrent,
        call_delay: Duration::from_millis(call_delay_ms),
        retry_failed,
        retry_attempts,
        sip_trunk_id: "ST_test".to_string(),
        caller_id_number: None,
        strategy: SelectionStrategy::PrimaryFirst,
        default_country_code: None,
        call_timeout: Duration::from_secs(5),
        poll_interval: Duration::from_millis(50),
    }
}

fn leads(numbers: &[&str]) -> Vec<QueuedLead> {
    numbers
        .iter()
        .enumerate()
        .map(|(i, number)| QueuedLead {
            id: format!("lead-{i}"),
            phone_number: number.to_string(),
            name: None,
            priority: 0,
            attempts: 0,
            metadata: None,
        })
        .collect()
}

async fn build_runtime(
    db: &DatabaseManager,
    fabric: Arc<MockFabric>,
    config: CampaignRuntimeConfig,
) -> (Arc<CampaignRuntime>, UnboundedReceiver<CampaignEvent>, Arc<LoadTracker>) {
    let load = Arc::new(LoadTracker::new());
    let selector = Arc::new(AgentSelector::new(db.clone(), load.clone(), "default-agent"));
    let (sender, receiver) = events::channel(CAMPAIGN_ID);
    let runtime = Arc::new(CampaignRuntime::new(
        CAMPAIGN_ID,
        TENANT_ID,
        config,
        fabric,
        selector,
        sender,
    ));
    (runtime, receiver, load)
}

/// Drain the event channel until `campaign_completed` arrives.
async fn collect_until_completed(
    rx: &mut UnboundedReceiver<CampaignEvent>,
    limit: Duration,
) -> Vec<CampaignEvent> {
    let mut events = Vec::new();
    let deadline = tokio::time::Instant::now() + limit;
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        match timeout(remaining, rx.recv()).await {
            Ok(Some(event)) => {
                let done = matches!(event.kind, CampaignEventKind::CampaignCompleted { .. });
                events.push(event);
                if done {
                    return events;
                }
            }
            Ok(None) => panic!("event channel closed before campaign completed"),
            Err(_) => panic!(
                "timed out waiting for campaign completion after {} events",
                events.len()
            ),
        }
    }
}

fn count_kind(events: &[CampaignEvent], matcher: impl Fn(&CampaignEventKind) -> bool) -> usize {
    events.iter().filter(|e| matcher(&e.kind)).count()
}

#[tokio::test]
async fn small_success_run_completes_every_lead() {
    let db = DatabaseManager::new_in_memory().await.unwrap();
    let fabric = Arc::new(MockFabric::new());
    let (runtime, mut rx, _) =
        build_runtime(&db, fabric.clone(), test_config(2, 0, false, 0)).await;

    runtime.add_leads(leads(&["+15550000001", "+15550000002", "+15550000003"]));
    runtime.start().unwrap();

    let events = collect_until_completed(&mut rx, Duration::from_secs(10)).await;

    assert_eq!(count_kind(&events, |k| matches!(k, CampaignEventKind::CallStarted { .. })), 3);
    assert_eq!(count_kind(&events, |k| matches!(k, CampaignEventKind::CallCompleted { .. })), 3);
    assert_eq!(count_kind(&events, |k| matches!(k, CampaignEventKind::CallFailed { .. })), 0);

    // leads_added then campaign_started precede all call events
    assert!(matches!(events[0].kind, CampaignEventKind::LeadsAdded { count: 3 }));
    assert!(matches!(events[1].kind, CampaignEventKind::CampaignStarted));

    let Some(CampaignEventKind::CampaignCompleted { stats }) = events.last().map(|e| &e.kind)
    else {
        panic!("last event must be campaign_completed");
    };
    assert_eq!(stats.total_calls, 3);
    assert_eq!(stats.successful_calls, 3);
    assert_eq!(stats.failed_calls, 0);

    assert!(fabric.max_in_progress() <= 2, "concurrency cap violated");
}

#[tokio::test]
async fn every_terminal_event_has_one_prior_start() {
    let db = DatabaseManager::new_in_memory().await.unwrap();
    let fabric = Arc::new(MockFabric::new());
    fabric.fail_number("+15550000002");
    let (runtime, mut rx, _) =
        build_runtime(&db, fabric.clone(), test_config(3, 0, false, 0)).await;

    runtime.add_leads(leads(&["+15550000001", "+15550000002", "+15550000003"]));
    runtime.start().unwrap();
    let events = collect_until_completed(&mut rx, Duration::from_secs(10)).await;

    use std::collections::HashMap;
    let mut started: HashMap<String, usize> = HashMap::new();
    let mut terminal: HashMap<String, usize> = HashMap::new();
    for event in &events {
        match &event.kind {
            CampaignEventKind::CallStarted { lead } => {
                *started.entry(lead.lead_id.clone()).or_default() += 1;
            }
            CampaignEventKind::CallCompleted { lead, .. }
            | CampaignEventKind::CallFailed { lead, .. } => {
                let seen = started.get(&lead.lead_id).copied().unwrap_or(0);
                let term = terminal.entry(lead.lead_id.clone()).or_default();
                *term += 1;
                assert!(
                    *term <= seen,
                    "terminal event without a prior call_started for {}",
                    lead.lead_id
                );
            }
            _ => {}
        }
    }
    assert_eq!(started, terminal);
}

#[tokio::test]
#[serial]
async fn retry_then_fail_exhausts_attempts() {
    let db = DatabaseManager::new_in_memory().await.unwrap();
    let fabric = Arc::new(MockFabric::new());
    fabric.fail_number("+15550000002");
    let (runtime, mut rx, _) =
        build_runtime(&db, fabric.clone(), test_config(2, 0, true, 2)).await;

    runtime.add_leads(leads(&["+15550000001", "+15550000002", "+15550000003"]));
    runtime.start().unwrap();
    let events = collect_until_completed(&mut rx, Duration::from_secs(10)).await;

    let failures: Vec<(u32, bool)> = events
        .iter()
        .filter_map(|e| match &e.kind {
            CampaignEventKind::CallFailed { lead, will_retry, .. }
                if lead.phone_number == "+15550000002" =>
            {
                Some((lead.attempts, *will_retry))
            }
            _ => None,
        })
        .collect();

    // retryAttempts=2 means three dials: attempts 1 and 2 re-enqueue, 3 fails
    assert_eq!(failures, vec![(1, true), (2, true), (3, false)]);

    let Some(CampaignEventKind::CampaignCompleted { stats }) = events.last().map(|e| &e.kind)
    else {
        panic!("missing campaign_completed");
    };
    assert_eq!(stats.total_calls, 3);
    assert_eq!(stats.successful_calls, 2);
    assert_eq!(stats.failed_calls, 1);
}

#[tokio::test]
#[serial]
async fn primary_first_falls_back_at_capacity_and_returns() {
    let db = DatabaseManager::new_in_memory().await.unwrap();

    let a1 = db
        .create_agent(NewAgent {
            name: "A1".into(),
            max_concurrent_calls: 1,
            livekit_agent_name: None,
        })
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    let a2 = db
        .create_agent(NewAgent {
            name: "A2".into(),
            max_concurrent_calls: 5,
            livekit_agent_name: None,
        })
        .await
        .unwrap();
    db.assign_agent_to_campaign(CAMPAIGN_ID, &a1.id, true).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    db.assign_agent_to_campaign(CAMPAIGN_ID, &a2.id, false).await.unwrap();

    let fabric = Arc::new(MockFabric::new());
    fabric.set_call_duration(Duration::from_millis(400));
    let (runtime, mut rx, _) =
        build_runtime(&db, fabric.clone(), test_config(3, 60, false, 0)).await;

    runtime.add_leads(leads(&[
        "+15550000001",
        "+15550000002",
        "+15550000003",
        "+15550000004",
    ]));
    runtime.start().unwrap();
    collect_until_completed(&mut rx, Duration::from_secs(15)).await;

    // First call takes the primary; while it is in flight the next two land
    // on A2; once A1 frees up the fourth call takes it again.
    assert_eq!(fabric.dispatch_agents(), vec!["A1", "A2", "A2", "A1"]);
}

#[tokio::test]
#[serial]
async fn stop_during_flight_keeps_pending_leads() {
    let db = DatabaseManager::new_in_memory().await.unwrap();
    let fabric = Arc::new(MockFabric::new());
    fabric.set_call_duration(Duration::from_millis(300));
    let (runtime, mut rx, _) =
        build_runtime(&db, fabric.clone(), test_config(3, 0, false, 0)).await;

    let numbers: Vec<String> = (1..=10).map(|i| format!("+1555000{i:04}")).collect();
    let number_refs: Vec<&str> = numbers.iter().map(String::as_str).collect();
    runtime.add_leads(leads(&number_refs));
    runtime.start().unwrap();

    // Gather events in the background so we can stop mid-run.
    let collected = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let sink = collected.clone();
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            sink.lock().push(event);
        }
    });

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let completed = count_kind(&collected.lock(), |k| {
            matches!(k, CampaignEventKind::CallCompleted { .. })
        });
        if completed >= 2 {
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "no progress before stop");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    runtime.stop();
    runtime.stop(); // idempotent

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !runtime.is_drained() {
        assert!(tokio::time::Instant::now() < deadline, "runtime failed to drain");
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    // Give the collector a beat to see the trailing events.
    tokio::time::sleep(Duration::from_millis(100)).await;

    let events = collected.lock();
    let started = count_kind(&events, |k| matches!(k, CampaignEventKind::CallStarted { .. }));
    let terminal = count_kind(&events, |k| {
        matches!(
            k,
            CampaignEventKind::CallCompleted { .. } | CampaignEventKind::CallFailed { .. }
        )
    });

    // Every dispatched call still reached its terminal event.
    assert_eq!(started, terminal);
    // A second stop() does not emit a second campaign_stopped.
    assert_eq!(
        count_kind(&events, |k| matches!(k, CampaignEventKind::CampaignStopped)),
        1
    );
    assert_eq!(
        count_kind(&events, |k| matches!(k, CampaignEventKind::CampaignCompleted { .. })),
        0
    );

    let status = runtime.status();
    assert_eq!(status.state, "stopped");
    assert!(status.pending > 0, "undialed leads must remain pending");
}

#[tokio::test]
#[serial]
async fn pause_halts_dispatch_and_resume_finishes_the_run() {
    let db = DatabaseManager::new_in_memory().await.unwrap();
    let fabric = Arc::new(MockFabric::new());
    fabric.set_call_duration(Duration::from_millis(100));
    let (runtime, mut rx, _) =
        build_runtime(&db, fabric.clone(), test_config(2, 0, false, 0)).await;

    let numbers: Vec<String> = (1..=6).map(|i| format!("+1555000{i:04}")).collect();
    let number_refs: Vec<&str> = numbers.iter().map(String::as_str).collect();
    runtime.add_leads(leads(&number_refs));
    runtime.start().unwrap();

    let collected = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let sink = collected.clone();
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            sink.lock().push(event);
        }
    });

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let completed = count_kind(&collected.lock(), |k| {
            matches!(k, CampaignEventKind::CallCompleted { .. })
        });
        if completed >= 1 {
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "no progress before pause");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    runtime.pause().unwrap();
    // Let the current tick and in-flight calls settle, then verify dispatch
    // has actually stopped.
    tokio::time::sleep(Duration::from_millis(300)).await;
    let started_at_pause =
        count_kind(&collected.lock(), |k| matches!(k, CampaignEventKind::CallStarted { .. }));
    tokio::time::sleep(Duration::from_millis(300)).await;
    let started_later =
        count_kind(&collected.lock(), |k| matches!(k, CampaignEventKind::CallStarted { .. }));
    assert_eq!(started_at_pause, started_later, "paused campaign kept dispatching");

    runtime.resume().unwrap();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        if count_kind(&collected.lock(), |k| {
            matches!(k, CampaignEventKind::CampaignCompleted { .. })
        }) == 1
        {
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "campaign never completed after resume");
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    let events = collected.lock();
    assert_eq!(count_kind(&events, |k| matches!(k, CampaignEventKind::CampaignPaused)), 1);
    assert_eq!(count_kind(&events, |k| matches!(k, CampaignEventKind::CampaignResumed)), 1);
    assert_eq!(count_kind(&events, |k| matches!(k, CampaignEventKind::CallStarted { .. })), 6);
    assert_eq!(count_kind(&events, |k| matches!(k, CampaignEventKind::CallCompleted { .. })), 6);
}

#[tokio::test]
#[serial]
async fn concurrency_never_exceeds_cap() {
    let db = DatabaseManager::new_in_memory().await.unwrap();
    let fabric = Arc::new(MockFabric::new());
    fabric.set_call_duration(Duration::from_millis(50));
    let (runtime, mut rx, _) =
        build_runtime(&db, fabric.clone(), test_config(2, 0, false, 0)).await;

    let numbers: Vec<String> = (1..=10).map(|i| format!("+1555000{i:04}")).collect();
    let number_refs: Vec<&str> = numbers.iter().map(String::as_str).collect();
    runtime.add_leads(leads(&number_refs));
    runtime.start().unwrap();
    collect_until_completed(&mut rx, Duration::from_secs(15)).await;

    assert!(
        fabric.max_in_progress() <= 2,
        "observed {} concurrent calls with a cap of 2",
        fabric.max_in_progress()
    );
}

#[tokio::test]
async fn start_validates_preconditions() {
    let db = DatabaseManager::new_in_memory().await.unwrap();
    let fabric = Arc::new(MockFabric::new());

    // No pending leads
    let (runtime, _rx, _) = build_runtime(&db, fabric.clone(), test_config(1, 0, false, 0)).await;
    assert!(runtime.start().is_err());

    // No trunk
    let mut config = test_config(1, 0, false, 0);
    config.sip_trunk_id = String::new();
    let (runtime, _rx2, _) = build_runtime(&db, fabric.clone(), config).await;
    runtime.add_leads(leads(&["+15550000001"]));
    assert!(runtime.start().is_err());

    // Idempotent start emits campaign_started once
    let (runtime, mut rx, _) = build_runtime(&db, fabric, test_config(1, 0, false, 0)).await;
    runtime.add_leads(leads(&["+15550000001"]));
    runtime.start().unwrap();
    runtime.start().unwrap();
    let events = collect_until_completed(&mut rx, Duration::from_secs(10)).await;
    assert_eq!(count_kind(&events, |k| matches!(k, CampaignEventKind::CampaignStarted)), 1);
}

// === Supervisor end-to-end (runtime + reconciler + store) ===

async fn seed_store_campaign(
    db: &DatabaseManager,
    max_concurrent: i64,
    numbers: &[&str],
) -> (String, String) {
    let tenant = db.create_tenant("runtime-e2e.example").await.unwrap();
    let campaign = db
        .create_campaign(NewCampaign {
            tenant_id: tenant.id.clone(),
            name: "e2e".into(),
            max_concurrent,
            retry_failed: false,
            retry_attempts: 0,
            call_delay_ms: 0,
            sip_trunk_id: Some("ST_e2e".into()),
            caller_id_number: None,
            agent_name: None,
        })
        .await
        .unwrap();

    let new_leads: Vec<NewLead> = numbers
        .iter()
        .map(|n| NewLead {
            phone_number: n.to_string(),
            name: None,
            priority: 0,
            metadata: None,
        })
        .collect();
    db.bulk_insert_leads(&tenant.id, &campaign.id, &new_leads).await.unwrap();
    (tenant.id, campaign.id)
}

fn supervisor_fixture(
    db: &DatabaseManager,
    fabric: Arc<MockFabric>,
) -> Arc<CampaignSupervisor> {
    let load = Arc::new(LoadTracker::new());
    let selector = Arc::new(AgentSelector::new(db.clone(), load, "default-agent"));
    let config = dialflow_campaign_engine::config::AppConfig::default();
    Arc::new(CampaignSupervisor::new(db.clone(), fabric, selector, config))
}

#[tokio::test]
#[serial]
async fn supervisor_runs_campaign_to_completion_in_store() {
    let db = DatabaseManager::new_in_memory().await.unwrap();
    let (tenant_id, campaign_id) =
        seed_store_campaign(&db, 2, &["+15550000001", "+15550000002", "+15550000003"]).await;

    let fabric = Arc::new(MockFabric::new());
    let supervisor = supervisor_fixture(&db, fabric);
    supervisor.start_campaign(&tenant_id, &campaign_id, None).await.unwrap();

    // Starting twice while active is rejected
    let again = supervisor.start_campaign(&tenant_id, &campaign_id, None).await;
    assert!(again.is_err());

    let deadline = tokio::time::Instant::now() + Duration::from_secs(15);
    loop {
        let campaign = db.get_campaign(&tenant_id, &campaign_id).await.unwrap().unwrap();
        if campaign.status == "completed" {
            assert_eq!(campaign.total_calls, 3);
            assert_eq!(campaign.successful_calls, 3);
            assert_eq!(campaign.failed_calls, 0);
            assert!(campaign.completed_at.is_some());
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "campaign never completed");
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    let leads = db.list_leads(&tenant_id, &campaign_id).await.unwrap();
    assert!(leads.iter().all(|l| l.status == "completed"));

    let logs = db.list_call_logs(&campaign_id, 50).await.unwrap();
    assert_eq!(logs.len(), 3);
    assert!(logs.iter().all(|l| l.status == "completed" && l.call_sid.is_some()));

    // Runtime evicted after completion
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while supervisor.is_running(&campaign_id) {
        assert!(tokio::time::Instant::now() < deadline, "runtime never evicted");
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

#[tokio::test]
#[serial]
async fn supervisor_stop_persists_stopped_status() {
    let db = DatabaseManager::new_in_memory().await.unwrap();
    let numbers: Vec<String> = (1..=8).map(|i| format!("+1555000{i:04}")).collect();
    let number_refs: Vec<&str> = numbers.iter().map(String::as_str).collect();
    let (tenant_id, campaign_id) = seed_store_campaign(&db, 2, &number_refs).await;

    let fabric = Arc::new(MockFabric::new());
    fabric.set_call_duration(Duration::from_millis(300));
    let supervisor = supervisor_fixture(&db, fabric);
    supervisor.start_campaign(&tenant_id, &campaign_id, None).await.unwrap();

    tokio::time::sleep(Duration::from_millis(150)).await;
    supervisor.stop_campaign(&tenant_id, &campaign_id).await.unwrap();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let campaign = db.get_campaign(&tenant_id, &campaign_id).await.unwrap().unwrap();
        if campaign.status == "stopped" && !supervisor.is_running(&campaign_id) {
            assert!(campaign.completed_at.is_some());
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "stop never settled");
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    let counts = db.campaign_lead_counts(&campaign_id).await.unwrap();
    assert!(counts.pending > 0, "undialed leads must stay pending after stop");
}

#[tokio::test]
async fn supervisor_start_rejects_bad_campaigns() {
    let db = DatabaseManager::new_in_memory().await.unwrap();
    let fabric = Arc::new(MockFabric::new());
    let supervisor = supervisor_fixture(&db, fabric);

    // Unknown campaign
    let err = supervisor.start_campaign("t", "missing", None).await.unwrap_err();
    assert!(matches!(err, dialflow_campaign_engine::error::EngineError::NotFound(_)));

    // Campaign without leads
    let tenant = db.create_tenant("starter.example").await.unwrap();
    let campaign = db
        .create_campaign(NewCampaign {
            tenant_id: tenant.id.clone(),
            name: "empty".into(),
            max_concurrent: 1,
            retry_failed: false,
            retry_attempts: 0,
            call_delay_ms: 0,
            sip_trunk_id: Some("ST_x".into()),
            caller_id_number: None,
            agent_name: None,
        })
        .await
        .unwrap();
    let err = supervisor.start_campaign(&tenant.id, &campaign.id, None).await.unwrap_err();
    assert!(matches!(
        err,
        dialflow_campaign_engine::error::EngineError::Precondition { .. }
    ));

    // Cross-tenant start answers NotFound
    let other = db.create_tenant("other.example").await.unwrap();
    let err = supervisor.start_campaign(&other.id, &campaign.id, None).await.unwrap_err();
    assert!(matches!(err, dialflow_campaign_engine::error::EngineError::NotFound(_)));
}
