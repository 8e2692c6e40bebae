//! # Agent Selection and Load Tracking
//!
//! Chooses one AI agent per call and tracks how many calls each agent is
//! currently carrying. Selection reads campaign assignments from the store
//! and live counters from the [`LoadTracker`]; the four strategies differ
//! only in which in-capacity agent they prefer:
//!
//! - **PrimaryFirst** — walk the assignment order (primary first, then
//!   assignment age) and take the first agent under its cap.
//! - **RoundRobin** — advance a per-campaign cursor; an at-capacity pick
//!   falls through to the primary-first scan (cursor still advances).
//! - **LeastLoaded** — minimum active calls among in-capacity agents,
//!   ties broken by assignment order.
//! - **Random** — uniform over the assignments; an at-capacity pick falls
//!   through to the primary-first scan.
//!
//! When nothing fits — or the campaign has no assignments — selection falls
//! back to the oldest active agent in the store, then to a synthetic
//! `system-default` record so a call always has a destination.
//!
//! The tracker is process-local and intentionally not durable; the
//! supervisor resets it at startup (orphaned in-flight leads are failed
//! rather than re-adopted). Selection reads the counter and the runtime
//! increments it afterwards, so two racing selections can over-commit an
//! agent by one. That slack is bounded by the number of concurrent
//! selections and accepted.

pub mod load;
pub mod selector;

pub use load::LoadTracker;
pub use selector::{AgentSelector, SelectedAgent, SelectionStrategy};

/// Synthetic agent id used when no stored agent is selectable.
pub const SYSTEM_FALLBACK_AGENT_ID: &str = "system-default";
