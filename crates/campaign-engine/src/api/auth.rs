//! Bearer-token verification and tenant scoping
//!
//! Tokens are RS256 JWTs whose `acct` claim names the account the caller
//! acts as. A token may act on exactly its own tenant, except the
//! well-known system-admin account, which crosses tenants. An `acct`
//! mismatch answers NotFound rather than Forbidden so existence never leaks
//! across tenants.

use axum::http::HeaderMap;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use tracing::warn;

use crate::config::SYSTEM_ADMIN_ACCOUNT_ID;
use crate::error::{EngineError, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct Claims {
    /// Account id the token acts as.
    pub acct: String,
    #[allow(dead_code)]
    pub exp: u64,
}

pub struct AuthVerifier {
    key: Option<DecodingKey>,
    validation: Validation,
}

impl AuthVerifier {
    /// Build from the configured RS256 public key PEM. With no key
    /// configured the verifier runs open (development mode): every request
    /// acts as the system admin.
    pub fn new(public_key_pem: Option<&str>) -> Result<Self> {
        let key = match public_key_pem {
            Some(pem) => Some(
                DecodingKey::from_rsa_pem(pem.as_bytes())
                    .map_err(|e| EngineError::validation(format!("invalid JWT_PUBLIC_KEY: {e}")))?,
            ),
            None => {
                warn!("🔓 JWT_PUBLIC_KEY not configured; API authentication is DISABLED");
                None
            }
        };

        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_exp = true;
        Ok(Self { key, validation })
    }

    /// Decode and validate the bearer token, returning its claims.
    pub fn verify(&self, headers: &HeaderMap) -> Result<Claims> {
        let Some(key) = &self.key else {
            return Ok(Claims { acct: SYSTEM_ADMIN_ACCOUNT_ID.to_string(), exp: u64::MAX });
        };

        let token = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or_else(|| EngineError::authorization("missing bearer token"))?;

        let data = decode::<Claims>(token, key, &self.validation)
            .map_err(|e| EngineError::authorization(format!("invalid token: {e}")))?;
        Ok(data.claims)
    }

    /// Verify the token and require it to act on `tenant_id`.
    pub fn authorize_tenant(&self, headers: &HeaderMap, tenant_id: &str) -> Result<Claims> {
        let claims = self.verify(headers)?;
        if claims.acct == tenant_id || claims.acct == SYSTEM_ADMIN_ACCOUNT_ID {
            Ok(claims)
        } else {
            Err(EngineError::not_found(format!("tenant {tenant_id}")))
        }
    }

    /// Verify the token and require the system-admin account.
    pub fn authorize_admin(&self, headers: &HeaderMap) -> Result<Claims> {
        let claims = self.verify(headers)?;
        if claims.acct == SYSTEM_ADMIN_ACCOUNT_ID {
            Ok(claims)
        } else {
            Err(EngineError::authorization("system admin account required"))
        }
    }

    /// Verify the token without scoping it (global read surfaces).
    pub fn authorize_any(&self, headers: &HeaderMap) -> Result<Claims> {
        self.verify(headers)
    }
}
