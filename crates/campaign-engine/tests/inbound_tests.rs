//! Inbound router integration tests

use std::sync::Arc;

use dialflow_campaign_engine::agent::{AgentSelector, LoadTracker};
use dialflow_campaign_engine::database::{DatabaseManager, NewAgent, NewCampaign, NewPhoneNumber};
use dialflow_campaign_engine::inbound::{InboundCallRequest, InboundRouter, RoomFinishedEvent};

const DEFAULT_AGENT: &str = "telephony-agent";

fn request(from: &str, to: &str) -> InboundCallRequest {
    InboundCallRequest {
        call_id: "CALL-1".to_string(),
        trunk_id: "ST_in".to_string(),
        trunk_phone_number: to.to_string(),
        from_number: from.to_string(),
        to_number: to.to_string(),
        room_name: "inbound-room-1".to_string(),
    }
}

async fn fixture() -> (DatabaseManager, Arc<LoadTracker>, InboundRouter) {
    let db = DatabaseManager::new_in_memory().await.unwrap();
    let load = Arc::new(LoadTracker::new());
    let selector = Arc::new(AgentSelector::new(db.clone(), load.clone(), DEFAULT_AGENT));
    let router = InboundRouter::new(db.clone(), selector, DEFAULT_AGENT, None);
    (db, load, router)
}

#[tokio::test]
async fn unmatched_number_still_gets_an_agent() {
    let (db, _load, router) = fixture().await;

    let response = router.route(&request("+15550001111", "+15559990000")).await;
    assert_eq!(response.agent_name, DEFAULT_AGENT);
    assert!(!response.agent_name.is_empty());
    assert!(response.metadata.contains("unmatched"));
    assert_eq!(response.attributes.get("inbound").map(String::as_str), Some("true"));
    assert_eq!(
        response.attributes.get("caller").map(String::as_str),
        Some("+15550001111")
    );

    // One audit row with unmatched provenance, tied to no campaign
    let log = db
        .complete_call_log(Some("CALL-1"), None, Some(5), Some("hangup"))
        .await
        .unwrap()
        .expect("unmatched call should have left a ringing log");
    assert!(log.campaign_id.is_none());
    assert!(log.metadata.unwrap().contains("unmatched"));
}

#[tokio::test]
async fn campaign_number_routes_to_assigned_agent_and_persists() {
    let (db, load, router) = fixture().await;

    let tenant = db.create_tenant("inbound.example").await.unwrap();
    let campaign = db
        .create_campaign(NewCampaign {
            tenant_id: tenant.id.clone(),
            name: "inbound".into(),
            max_concurrent: 2,
            retry_failed: false,
            retry_attempts: 0,
            call_delay_ms: 0,
            sip_trunk_id: Some("ST_in".into()),
            caller_id_number: None,
            agent_name: None,
        })
        .await
        .unwrap();
    let agent = db
        .create_agent(NewAgent {
            name: "support-bot".into(),
            max_concurrent_calls: 3,
            livekit_agent_name: Some("support-bot-lk".into()),
        })
        .await
        .unwrap();
    db.assign_agent_to_campaign(&campaign.id, &agent.id, true).await.unwrap();
    db.create_phone_number(NewPhoneNumber {
        tenant_id: tenant.id.clone(),
        number: "+15557770000".into(),
        provider_sid: None,
        number_type: "LOCAL".into(),
        provider: None,
        campaign_id: Some(campaign.id.clone()),
        livekit_trunk_id: Some("ST_in".into()),
    })
    .await
    .unwrap();

    let response = router.route(&request("+15550001111", "+15557770000")).await;

    // Dispatch name is the fabric-facing one
    assert_eq!(response.agent_name, "support-bot-lk");
    let metadata: serde_json::Value = serde_json::from_str(&response.metadata).unwrap();
    assert_eq!(metadata["call_type"], "inbound");
    assert_eq!(metadata["campaign_id"], campaign.id.as_str());
    assert_eq!(metadata["tenant_id"], tenant.id.as_str());

    // Inbound call occupies agent capacity until the room finishes
    assert_eq!(load.active_calls(&agent.id), 1);

    // Lead upserted for the caller
    let leads = db.list_leads(&tenant.id, &campaign.id).await.unwrap();
    assert_eq!(leads.len(), 1);
    assert_eq!(leads[0].phone_number, "+15550001111");
    assert_eq!(leads[0].status, "calling");

    // Repeat caller does not create a second lead
    let _ = router.route(&request("+15550001111", "+15557770000")).await;
    let leads = db.list_leads(&tenant.id, &campaign.id).await.unwrap();
    assert_eq!(leads.len(), 1);

    // Ringing call log written with the call id
    let logs = db.list_call_logs(&campaign.id, 10).await.unwrap();
    assert!(!logs.is_empty());
    assert_eq!(logs[0].status, "ringing");
    assert_eq!(logs[0].call_sid.as_deref(), Some("CALL-1"));
}

#[tokio::test]
async fn room_finished_closes_log_and_lead() {
    let (db, load, router) = fixture().await;

    let tenant = db.create_tenant("finish.example").await.unwrap();
    let campaign = db
        .create_campaign(NewCampaign {
            tenant_id: tenant.id.clone(),
            name: "finish".into(),
            max_concurrent: 2,
            retry_failed: false,
            retry_attempts: 0,
            call_delay_ms: 0,
            sip_trunk_id: Some("ST_in".into()),
            caller_id_number: None,
            agent_name: None,
        })
        .await
        .unwrap();
    let agent = db
        .create_agent(NewAgent {
            name: "closer".into(),
            max_concurrent_calls: 3,
            livekit_agent_name: None,
        })
        .await
        .unwrap();
    db.assign_agent_to_campaign(&campaign.id, &agent.id, true).await.unwrap();
    db.create_phone_number(NewPhoneNumber {
        tenant_id: tenant.id.clone(),
        number: "+15557771111".into(),
        provider_sid: None,
        number_type: "LOCAL".into(),
        provider: None,
        campaign_id: Some(campaign.id.clone()),
        livekit_trunk_id: None,
    })
    .await
    .unwrap();

    let _ = router.route(&request("+15550002222", "+15557771111")).await;
    assert_eq!(load.active_calls(&agent.id), 1);

    router
        .handle_room_finished(&RoomFinishedEvent {
            call_id: Some("CALL-1".to_string()),
            room_name: None,
            duration_secs: Some(42),
            disconnect_reason: Some("callee_hangup".to_string()),
        })
        .await;

    let logs = db.list_call_logs(&campaign.id, 10).await.unwrap();
    assert_eq!(logs[0].status, "completed");
    assert_eq!(logs[0].duration_secs, Some(42));
    assert!(logs[0].metadata.as_deref().unwrap().contains("callee_hangup"));

    let leads = db.list_leads(&tenant.id, &campaign.id).await.unwrap();
    assert_eq!(leads[0].status, "completed");
    assert!(leads[0].last_call_at.is_some());

    // Capacity released
    assert_eq!(load.active_calls(&agent.id), 0);
}
