//! Error types for the telephony fabric client

use thiserror::Error;

/// Machine-readable classification of a fabric failure.
///
/// The campaign runtime treats every kind as a per-call failure; the
/// distinction matters for call-log records and operator diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FabricErrorKind {
    /// The fabric was unreachable or answered with a retryable status.
    Transient,
    /// The fabric rejected the request; retrying the same request will fail.
    Permanent,
    /// Credentials were missing, expired, or lacked the required grant.
    Auth,
    /// The referenced trunk, room, or rule does not exist.
    NotFound,
    /// The per-call deadline elapsed before the fabric answered.
    Timeout,
}

impl FabricErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FabricErrorKind::Transient => "transient",
            FabricErrorKind::Permanent => "permanent",
            FabricErrorKind::Auth => "auth",
            FabricErrorKind::NotFound => "not-found",
            FabricErrorKind::Timeout => "timeout",
        }
    }
}

impl std::fmt::Display for FabricErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("fabric {kind} error: {message}")]
pub struct FabricError {
    pub kind: FabricErrorKind,
    pub message: String,
    /// Provider status code when the fabric answered with one.
    pub provider_code: Option<u16>,
}

impl FabricError {
    pub fn new(kind: FabricErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), provider_code: None }
    }

    pub fn with_code(mut self, code: u16) -> Self {
        self.provider_code = Some(code);
        self
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(FabricErrorKind::Transient, message)
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self::new(FabricErrorKind::Permanent, message)
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(FabricErrorKind::Auth, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(FabricErrorKind::NotFound, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(FabricErrorKind::Timeout, message)
    }

    pub fn kind(&self) -> FabricErrorKind {
        self.kind
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == FabricErrorKind::Timeout
    }
}

impl From<reqwest::Error> for FabricError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FabricError::timeout(err.to_string())
        } else if err.is_connect() {
            FabricError::transient(err.to_string())
        } else if err.is_decode() {
            FabricError::permanent(format!("malformed fabric response: {err}"))
        } else {
            FabricError::transient(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, FabricError>;

/// Map an HTTP status the fabric answered with onto an error kind.
pub(crate) fn kind_for_status(status: u16) -> FabricErrorKind {
    match status {
        401 | 403 => FabricErrorKind::Auth,
        404 => FabricErrorKind::NotFound,
        408 => FabricErrorKind::Timeout,
        429 => FabricErrorKind::Transient,
        s if s >= 500 => FabricErrorKind::Transient,
        _ => FabricErrorKind::Permanent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert_eq!(kind_for_status(401), FabricErrorKind::Auth);
        assert_eq!(kind_for_status(403), FabricErrorKind::Auth);
        assert_eq!(kind_for_status(404), FabricErrorKind::NotFound);
        assert_eq!(kind_for_status(429), FabricErrorKind::Transient);
        assert_eq!(kind_for_status(500), FabricErrorKind::Transient);
        assert_eq!(kind_for_status(503), FabricErrorKind::Transient);
        assert_eq!(kind_for_status(400), FabricErrorKind::Permanent);
        assert_eq!(kind_for_status(422), FabricErrorKind::Permanent);
    }

    #[test]
    fn error_display_includes_kind() {
        let err = FabricError::not_found("trunk ST_missing").with_code(404);
        assert_eq!(err.to_string(), "fabric not-found error: trunk ST_missing");
        assert_eq!(err.provider_code, Some(404));
    }
}
