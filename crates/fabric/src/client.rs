//! HTTP client for the fabric's Twirp endpoints

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::error::{kind_for_status, FabricError, Result};
use crate::token::AccessToken;
use crate::types::*;
use crate::TelephonyFabric;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for a fabric deployment.
#[derive(Debug, Clone)]
pub struct FabricConfig {
    /// Base URL, e.g. `https://fabric.example.com`.
    pub url: String,
    pub api_key: String,
    pub api_secret: String,
    /// Per-request deadline. Elapsing it surfaces as a `timeout` error.
    pub request_timeout: Duration,
}

impl Default for FabricConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: String::new(),
            api_secret: String::new(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Stateless Twirp client. Cheap to clone; holds no call state.
#[derive(Clone, Debug)]
pub struct FabricClient {
    config: FabricConfig,
    http: reqwest::Client,
}

impl FabricClient {
    pub fn new(config: FabricConfig) -> Result<Self> {
        if config.url.is_empty() {
            return Err(FabricError::permanent("fabric url not configured"));
        }
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| FabricError::permanent(format!("failed to build http client: {e}")))?;
        Ok(Self { config, http })
    }

    fn bearer(&self) -> Result<String> {
        AccessToken::new(&self.config.api_key, &self.config.api_secret)
            .server_grants()
            .to_jwt()
    }

    async fn twirp<Req, Resp>(&self, service: &str, method: &str, request: &Req) -> Result<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let url = format!(
            "{}/twirp/livekit.{}/{}",
            self.config.url.trim_end_matches('/'),
            service,
            method
        );
        debug!("fabric request: {} {}", service, method);

        let response = self
            .http
            .post(&url)
            .bearer_auth(self.bearer()?)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("fabric {}/{} answered {}: {}", service, method, status, body);
            return Err(FabricError::new(
                kind_for_status(status.as_u16()),
                format!("{service}/{method}: {body}"),
            )
            .with_code(status.as_u16()));
        }

        Ok(response.json::<Resp>().await?)
    }

    // === Provisioning surface (not on the call hot path) ===

    pub async fn create_sip_inbound_trunk(
        &self,
        trunk: SipInboundTrunk,
    ) -> Result<SipInboundTrunkInfo> {
        self.twirp("SIP", "CreateSIPInboundTrunk", &json!({ "trunk": trunk })).await
    }

    pub async fn update_sip_inbound_trunk(
        &self,
        sip_trunk_id: &str,
        trunk: SipInboundTrunk,
    ) -> Result<SipInboundTrunkInfo> {
        self.twirp(
            "SIP",
            "UpdateSIPInboundTrunk",
            &json!({ "sip_trunk_id": sip_trunk_id, "trunk": trunk }),
        )
        .await
    }

    pub async fn create_sip_outbound_trunk(
        &self,
        trunk: SipOutboundTrunk,
    ) -> Result<SipOutboundTrunkInfo> {
        self.twirp("SIP", "CreateSIPOutboundTrunk", &json!({ "trunk": trunk })).await
    }

    pub async fn update_sip_outbound_trunk(
        &self,
        sip_trunk_id: &str,
        trunk: SipOutboundTrunk,
    ) -> Result<SipOutboundTrunkInfo> {
        self.twirp(
            "SIP",
            "UpdateSIPOutboundTrunk",
            &json!({ "sip_trunk_id": sip_trunk_id, "trunk": trunk }),
        )
        .await
    }

    pub async fn delete_sip_trunk(&self, sip_trunk_id: &str) -> Result<()> {
        let _: serde_json::Value = self
            .twirp("SIP", "DeleteSIPTrunk", &json!({ "sip_trunk_id": sip_trunk_id }))
            .await?;
        Ok(())
    }

    pub async fn create_sip_dispatch_rule(
        &self,
        rule: SipDispatchRule,
    ) -> Result<SipDispatchRuleInfo> {
        self.twirp(
            "SIP",
            "CreateSIPDispatchRule",
            &json!({
                "name": rule.name,
                "trunk_ids": rule.trunk_ids,
                "rule": { "dispatch_rule_individual": { "room_prefix": rule.room_prefix } },
            }),
        )
        .await
    }

    pub async fn update_sip_dispatch_rule(
        &self,
        sip_dispatch_rule_id: &str,
        rule: SipDispatchRule,
    ) -> Result<SipDispatchRuleInfo> {
        self.twirp(
            "SIP",
            "UpdateSIPDispatchRule",
            &json!({
                "sip_dispatch_rule_id": sip_dispatch_rule_id,
                "name": rule.name,
                "trunk_ids": rule.trunk_ids,
                "rule": { "dispatch_rule_individual": { "room_prefix": rule.room_prefix } },
            }),
        )
        .await
    }

    pub async fn delete_sip_dispatch_rule(&self, sip_dispatch_rule_id: &str) -> Result<()> {
        let _: serde_json::Value = self
            .twirp(
                "SIP",
                "DeleteSIPDispatchRule",
                &json!({ "sip_dispatch_rule_id": sip_dispatch_rule_id }),
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl TelephonyFabric for FabricClient {
    async fn create_agent_dispatch(
        &self,
        room_name: &str,
        agent_name: &str,
        metadata: serde_json::Value,
    ) -> Result<AgentDispatch> {
        let request = CreateAgentDispatchRequest {
            agent_name: agent_name.to_string(),
            room: room_name.to_string(),
            metadata: if metadata.is_null() { None } else { Some(metadata.to_string()) },
        };
        self.twirp("AgentDispatchService", "CreateDispatch", &request).await
    }

    async fn create_sip_participant(
        &self,
        request: SipParticipantRequest,
    ) -> Result<SipParticipantInfo> {
        if request.sip_trunk_id.is_empty() {
            return Err(FabricError::permanent("sip participant requires a trunk id"));
        }
        self.twirp("SIP", "CreateSIPParticipant", &request).await
    }
}
