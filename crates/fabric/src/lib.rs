//! # Telephony Fabric Client
//!
//! Stateless client for a LiveKit-compatible real-time media/SIP platform
//! (the "telephony fabric"). The campaign engine drives two hot-path
//! operations through the [`TelephonyFabric`] trait:
//!
//! 1. [`TelephonyFabric::create_agent_dispatch`] — bind a named AI agent to a
//!    room so the fabric has a live callee before the phone leg exists.
//! 2. [`TelephonyFabric::create_sip_participant`] — initiate the SIP leg that
//!    rings the destination number into the same room.
//!
//! Trunk and dispatch-rule provisioning is exposed on the concrete
//! [`FabricClient`] only; it is not part of the call hot path.
//!
//! All failures surface as [`FabricError`] with a machine-readable kind
//! (`transient`, `permanent`, `auth`, `not-found`, `timeout`). The client
//! never retries internally; callers decide what a failure means for the
//! call or campaign at hand.
//!
//! ## Quick Start
//!
//! ```no_run
//! use dialflow_fabric::{FabricClient, FabricConfig, SipParticipantRequest, TelephonyFabric};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = FabricClient::new(FabricConfig {
//!     url: "https://fabric.example.com".into(),
//!     api_key: "APIxxxxxxxx".into(),
//!     api_secret: "secret".into(),
//!     ..Default::default()
//! })?;
//!
//! let dispatch = client
//!     .create_agent_dispatch("outbound-room-1", "telephony-agent", serde_json::json!({}))
//!     .await?;
//! println!("agent dispatched: {}", dispatch.id);
//!
//! let participant = client
//!     .create_sip_participant(
//!         SipParticipantRequest::new("ST_trunk", "+15550001111", "outbound-room-1"),
//!     )
//!     .await?;
//! println!("sip call id: {}", participant.sip_call_id);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod token;
pub mod types;

pub use client::{FabricClient, FabricConfig};
pub use error::{FabricError, FabricErrorKind, Result};
pub use token::AccessToken;
pub use types::{
    AgentDispatch, SipDispatchRule, SipDispatchRuleInfo, SipInboundTrunk, SipInboundTrunkInfo,
    SipOutboundTrunk, SipOutboundTrunkInfo, SipParticipantInfo, SipParticipantRequest,
};

use async_trait::async_trait;

/// The call-path seam between the campaign engine and the fabric.
///
/// The engine only ever needs these two operations while dialing; keeping the
/// trait this narrow lets tests drive the campaign runtime with a scripted
/// fabric instead of a network.
#[async_trait]
pub trait TelephonyFabric: Send + Sync {
    /// Bind the named agent to `room_name`. Must be called before the SIP
    /// leg is created so the callee side of the room is already live.
    async fn create_agent_dispatch(
        &self,
        room_name: &str,
        agent_name: &str,
        metadata: serde_json::Value,
    ) -> Result<AgentDispatch>;

    /// Create the SIP participant that dials `request.sip_call_to` through
    /// the trunk into the room.
    async fn create_sip_participant(
        &self,
        request: SipParticipantRequest,
    ) -> Result<SipParticipantInfo>;
}
