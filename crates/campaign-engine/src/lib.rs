//! # Dialflow Campaign Engine
//!
//! Orchestration core for outbound voice-calling campaigns over a real-time
//! media/SIP platform (the "telephony fabric"), plus the inbound router that
//! resolves calls arriving on provisioned numbers to the right AI agent.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                 HTTP API                    │
//! │   campaign control · lead ingest · webhooks │
//! ├─────────────────────────────────────────────┤
//! │             CampaignSupervisor              │
//! │  ┌───────────────┐   ┌──────────────────┐   │
//! │  │ Campaign      │──▶│ Event            │   │
//! │  │ Runtime(s)    │   │ Reconciler       │   │
//! │  └──────┬────────┘   └────────┬─────────┘   │
//! │         │ AgentSelector       │             │
//! │         │ + LoadTracker       ▼             │
//! │  ┌──────▼────────┐   ┌──────────────────┐   │
//! │  │ Telephony     │   │ DatabaseManager  │   │
//! │  │ Fabric        │   │ (SQLite / sqlx)  │   │
//! │  └───────────────┘   └──────────────────┘   │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! Each active campaign runs as one cooperative drain loop that spawns up to
//! `max_concurrent` call tasks. Call tasks talk to the fabric through the
//! [`dialflow_fabric::TelephonyFabric`] trait and report back exclusively via
//! typed [`orchestrator::events::CampaignEvent`]s; the reconciler is the only
//! component that writes runtime outcomes to the store.

pub mod agent;
pub mod api;
pub mod config;
pub mod database;
pub mod error;
pub mod inbound;
pub mod orchestrator;
pub mod phone;
pub mod server;

/// Common imports for applications embedding the engine.
pub mod prelude {
    pub use crate::agent::{AgentSelector, LoadTracker, SelectionStrategy};
    pub use crate::config::AppConfig;
    pub use crate::database::DatabaseManager;
    pub use crate::error::{EngineError, Result};
    pub use crate::inbound::InboundRouter;
    pub use crate::orchestrator::events::{CampaignEvent, CampaignEventKind};
    pub use crate::orchestrator::runtime::CampaignRuntime;
    pub use crate::orchestrator::supervisor::CampaignSupervisor;
    pub use crate::server::{DialerServer, DialerServerBuilder};
    pub use dialflow_fabric::{FabricClient, FabricConfig, TelephonyFabric};
}
