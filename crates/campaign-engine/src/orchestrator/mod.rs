//! # Campaign Orchestration
//!
//! The runtime layer that turns a campaign row and its pending leads into
//! paced, bounded-concurrency outbound calls, and turns the resulting
//! lifecycle events back into durable state.
//!
//! ```text
//! start ──▶ CampaignSupervisor ──creates──▶ CampaignRuntime (drain loop)
//!                 │                              │ spawns call tasks
//!                 │                              ▼
//!                 │                    TelephonyFabric (dispatch + SIP leg)
//!                 │                              │
//!                 │           CampaignEvent channel (seq'd, per campaign)
//!                 │                              ▼
//!                 └─────evicts◀───── EventReconciler ──writes──▶ store
//! ```
//!
//! Ordering guarantees live at this layer: `call_started(lead)` precedes the
//! lead's terminal event, `campaign_started` precedes any `call_*`, and
//! `campaign_completed` follows every terminal `call_*`, all by construction
//! of the emit points. Per-campaign reconciliation is serial; nothing is
//! ordered across campaigns.
//!
//! ## Modules
//!
//! - [`runtime`]: the per-campaign drain loop and call tasks
//! - [`supervisor`]: process-wide registry, validation, shutdown
//! - [`reconciler`]: event → store writes
//! - [`events`]: the typed event contract
//! - [`types`]: shared runtime data structures

pub mod events;
pub mod reconciler;
pub mod runtime;
pub mod supervisor;
pub mod types;

pub use events::{CampaignEvent, CampaignEventKind};
pub use reconciler::EventReconciler;
pub use runtime::CampaignRuntime;
pub use supervisor::CampaignSupervisor;
pub use types::{CampaignRuntimeConfig, CampaignStats, CampaignStatusSnapshot, QueuedLead};
