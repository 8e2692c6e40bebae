//! Engine configuration
//!
//! Everything operationally tunable arrives through environment variables;
//! `AppConfig::from_env` reads them once at startup and the rest of the
//! engine receives plain values. Secrets (fabric API secret, JWT key) never
//! appear in logs.

use std::env;
use std::time::Duration;

use crate::error::{EngineError, Result};

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_AGENT_NAME: &str = "telephony-agent";
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(10);
pub const DEFAULT_FABRIC_CALL_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);
pub const DEFAULT_RATE_LIMIT_MAX: u32 = 300;

/// Well-known account id allowed to cross tenant boundaries.
pub const SYSTEM_ADMIN_ACCOUNT_ID: &str = "00000000-0000-0000-0000-00000000b40d";

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// HTTP listen port (`PORT`).
    pub port: u16,
    /// Store connection (`DATABASE_URL`), e.g. `sqlite:dialflow.db`.
    pub database_url: String,

    /// Fabric endpoint and credentials (`LIVEKIT_URL` / `LIVEKIT_API_KEY` /
    /// `LIVEKIT_API_SECRET`).
    pub livekit_url: String,
    pub livekit_api_key: String,
    pub livekit_api_secret: String,
    /// Default trunks (`LIVEKIT_OUTBOUND_TRUNK_ID` / `LIVEKIT_INBOUND_TRUNK_ID`).
    pub outbound_trunk_id: Option<String>,
    pub inbound_trunk_id: Option<String>,

    /// RS256 public key PEM verifying API bearer tokens (`JWT_PUBLIC_KEY`).
    pub jwt_public_key: Option<String>,

    /// API rate limit (`RATE_LIMIT_WINDOW_MS` / `RATE_LIMIT_MAX_REQUESTS`).
    pub rate_limit_window: Duration,
    pub rate_limit_max_requests: u32,
    /// CORS allowlist (`CORS_ORIGIN`); `*` or unset allows any origin.
    pub cors_origin: Option<String>,

    /// System fallback agent name (`DEFAULT_AGENT_NAME`).
    pub default_agent_name: String,
    /// Dial-prefix policy for numbers without `+` (`DEFAULT_COUNTRY_CODE`).
    /// Unset means ambiguous numbers are rejected rather than guessed.
    pub default_country_code: Option<String>,

    /// Supervisor drain deadline on shutdown (`SHUTDOWN_GRACE_SECS`).
    pub shutdown_grace: Duration,
    /// Per-call fabric deadline (`FABRIC_CALL_TIMEOUT_SECS`).
    pub fabric_call_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            database_url: "sqlite::memory:".to_string(),
            livekit_url: String::new(),
            livekit_api_key: String::new(),
            livekit_api_secret: String::new(),
            outbound_trunk_id: None,
            inbound_trunk_id: None,
            jwt_public_key: None,
            rate_limit_window: DEFAULT_RATE_LIMIT_WINDOW,
            rate_limit_max_requests: DEFAULT_RATE_LIMIT_MAX,
            cors_origin: None,
            default_agent_name: DEFAULT_AGENT_NAME.to_string(),
            default_country_code: None,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            fabric_call_timeout: DEFAULT_FABRIC_CALL_TIMEOUT,
        }
    }
}

fn var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match var(name) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| EngineError::validation(format!("invalid value for {name}: {raw}"))),
    }
}

impl AppConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            port: parse_var("PORT")?.unwrap_or(defaults.port),
            database_url: var("DATABASE_URL").unwrap_or(defaults.database_url),
            livekit_url: var("LIVEKIT_URL").unwrap_or_default(),
            livekit_api_key: var("LIVEKIT_API_KEY").unwrap_or_default(),
            livekit_api_secret: var("LIVEKIT_API_SECRET").unwrap_or_default(),
            outbound_trunk_id: var("LIVEKIT_OUTBOUND_TRUNK_ID"),
            inbound_trunk_id: var("LIVEKIT_INBOUND_TRUNK_ID"),
            jwt_public_key: var("JWT_PUBLIC_KEY"),
            rate_limit_window: parse_var::<u64>("RATE_LIMIT_WINDOW_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.rate_limit_window),
            rate_limit_max_requests: parse_var("RATE_LIMIT_MAX_REQUESTS")?
                .unwrap_or(defaults.rate_limit_max_requests),
            cors_origin: var("CORS_ORIGIN"),
            default_agent_name: var("DEFAULT_AGENT_NAME")
                .unwrap_or(defaults.default_agent_name),
            default_country_code: var("DEFAULT_COUNTRY_CODE"),
            shutdown_grace: parse_var::<u64>("SHUTDOWN_GRACE_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.shutdown_grace),
            fabric_call_timeout: parse_var::<u64>("FABRIC_CALL_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.fabric_call_timeout),
        })
    }

    /// Fabric client settings derived from this configuration.
    pub fn fabric_config(&self) -> dialflow_fabric::FabricConfig {
        dialflow_fabric::FabricConfig {
            url: self.livekit_url.clone(),
            api_key: self.livekit_api_key.clone(),
            api_secret: self.livekit_api_secret.clone(),
            request_timeout: self.fabric_call_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = AppConfig::default();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.default_agent_name, DEFAULT_AGENT_NAME);
        assert_eq!(config.shutdown_grace, Duration::from_secs(10));
        assert_eq!(config.fabric_call_timeout, Duration::from_secs(30));
        assert!(config.default_country_code.is_none());
    }
}
