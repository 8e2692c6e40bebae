//! Error types for the campaign engine
//!
//! One enum spans the whole engine so the HTTP layer can map every failure
//! onto a status code and machine-readable error code in one place. The
//! campaign runtime itself never returns these across its boundary — call
//! outcomes travel as events — but construction, control operations, and the
//! API surface do.

use thiserror::Error;

use dialflow_fabric::FabricError;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Bad input from a caller: missing phone, invalid E.164, empty batch.
    #[error("validation error: {0}")]
    Validation(String),

    /// Token valid but not allowed to act on this tenant.
    #[error("authorization error: {0}")]
    Authorization(String),

    /// Resource missing — also returned for cross-tenant access so that
    /// existence never leaks across tenants.
    #[error("not found: {0}")]
    NotFound(String),

    /// Duplicate name/number.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Operation not valid in the current state (start without trunk,
    /// mutate while active, ...). Carries a machine code for API clients.
    #[error("precondition failed [{code}]: {message}")]
    Precondition { code: String, message: String },

    /// A fabric call failed; kind and provider code ride along.
    #[error(transparent)]
    Telephony(#[from] FabricError),

    /// A deadline elapsed.
    #[error("timeout: {0}")]
    Timeout(String),

    /// Store failures and anything unmapped.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl EngineError {
    pub fn validation(msg: impl Into<String>) -> Self {
        EngineError::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        EngineError::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        EngineError::Conflict(msg.into())
    }

    pub fn authorization(msg: impl Into<String>) -> Self {
        EngineError::Authorization(msg.into())
    }

    pub fn precondition(code: impl Into<String>, msg: impl Into<String>) -> Self {
        EngineError::Precondition { code: code.into(), message: msg.into() }
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        EngineError::Timeout(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        EngineError::Internal(anyhow::anyhow!(msg.into()))
    }

    /// Stable machine code surfaced in API error envelopes.
    pub fn code(&self) -> &str {
        match self {
            EngineError::Validation(_) => "validation_error",
            EngineError::Authorization(_) => "forbidden",
            EngineError::NotFound(_) => "not_found",
            EngineError::Conflict(_) => "conflict",
            EngineError::Precondition { code, .. } => code,
            EngineError::Telephony(_) => "telephony_error",
            EngineError::Timeout(_) => "timeout",
            EngineError::Internal(_) => "internal_error",
        }
    }
}

impl From<sqlx::Error> for EngineError {
    fn from(err: sqlx::Error) -> Self {
        EngineError::Internal(anyhow::Error::new(err).context("database error"))
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
