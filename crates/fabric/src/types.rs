//! Request and response types for the fabric's Twirp surface
//!
//! Field names follow the platform's protobuf JSON encoding; optional fields
//! are skipped on requests and defaulted on responses so the client tolerates
//! older fabric versions.

use serde::{Deserialize, Serialize};

/// Options for creating the SIP participant that dials a number into a room.
#[derive(Debug, Clone, Serialize)]
pub struct SipParticipantRequest {
    pub sip_trunk_id: String,
    pub sip_call_to: String,
    pub room_name: String,
    pub participant_identity: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub participant_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub participant_metadata: Option<String>,
    /// Caller id presented on the PSTN leg, when the trunk permits it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sip_number: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub play_dialtone: bool,
}

impl SipParticipantRequest {
    pub fn new(trunk_id: &str, e164: &str, room_name: &str) -> Self {
        Self {
            sip_trunk_id: trunk_id.to_string(),
            sip_call_to: e164.to_string(),
            room_name: room_name.to_string(),
            participant_identity: format!("sip-{e164}"),
            participant_name: None,
            participant_metadata: None,
            sip_number: None,
            play_dialtone: false,
        }
    }

    pub fn with_identity(mut self, identity: &str) -> Self {
        self.participant_identity = identity.to_string();
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.participant_name = Some(name.to_string());
        self
    }

    pub fn with_metadata(mut self, metadata: &str) -> Self {
        self.participant_metadata = Some(metadata.to_string());
        self
    }

    pub fn with_caller_id(mut self, number: &str) -> Self {
        self.sip_number = Some(number.to_string());
        self
    }
}

/// The fabric's answer to a participant creation request.
#[derive(Debug, Clone, Deserialize)]
pub struct SipParticipantInfo {
    pub participant_id: String,
    #[serde(default)]
    pub participant_identity: String,
    pub sip_call_id: String,
    #[serde(default)]
    pub room_name: String,
}

/// An agent bound to a room.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentDispatch {
    pub id: String,
    #[serde(default)]
    pub agent_name: String,
    #[serde(default)]
    pub room: String,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct CreateAgentDispatchRequest {
    pub agent_name: String,
    pub room: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<String>,
}

/// Inbound trunk: numbers the fabric answers on.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SipInboundTrunk {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub numbers: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_addresses: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SipInboundTrunkInfo {
    pub sip_trunk_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub numbers: Vec<String>,
}

/// Outbound trunk: the interconnect calls are placed through.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SipOutboundTrunk {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub address: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub numbers: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub auth_username: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub auth_password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SipOutboundTrunkInfo {
    pub sip_trunk_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub numbers: Vec<String>,
}

/// A dispatch rule routing inbound calls on a trunk into rooms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SipDispatchRule {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub trunk_ids: Vec<String>,
    /// Each caller lands in its own room under this prefix.
    pub room_prefix: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SipDispatchRuleInfo {
    pub sip_dispatch_rule_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub trunk_ids: Vec<String>,
}
