//! Fabric access-token minting
//!
//! The fabric authenticates API calls with a short-lived HS256 JWT signed by
//! the deployment's API key/secret pair. Grants are scoped to what the
//! dialer actually does: room administration, agent dispatch, and SIP call
//! control.

use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use crate::error::{FabricError, Result};

const DEFAULT_TTL_SECS: i64 = 600;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct VideoGrant {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_create: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_admin: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_join: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SipGrant {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    iss: String,
    sub: String,
    nbf: i64,
    exp: i64,
    video: VideoGrant,
    sip: SipGrant,
}

/// Builder for a fabric API token.
pub struct AccessToken {
    api_key: String,
    api_secret: String,
    identity: String,
    ttl_secs: i64,
    video: VideoGrant,
    sip: SipGrant,
}

impl AccessToken {
    pub fn new(api_key: &str, api_secret: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            api_secret: api_secret.to_string(),
            identity: "dialflow".to_string(),
            ttl_secs: DEFAULT_TTL_SECS,
            video: VideoGrant::default(),
            sip: SipGrant::default(),
        }
    }

    pub fn with_identity(mut self, identity: &str) -> Self {
        self.identity = identity.to_string();
        self
    }

    pub fn with_ttl_secs(mut self, ttl: i64) -> Self {
        self.ttl_secs = ttl;
        self
    }

    pub fn with_video_grant(mut self, grant: VideoGrant) -> Self {
        self.video = grant;
        self
    }

    pub fn with_sip_grant(mut self, grant: SipGrant) -> Self {
        self.sip = grant;
        self
    }

    /// Full server-side grants used by the dialer's API calls.
    pub fn server_grants(self) -> Self {
        self.with_video_grant(VideoGrant {
            room_create: Some(true),
            room_admin: Some(true),
            room_join: Some(true),
            agent: Some(true),
            room: None,
        })
        .with_sip_grant(SipGrant { admin: Some(true), call: Some(true) })
    }

    pub fn to_jwt(&self) -> Result<String> {
        if self.api_key.is_empty() || self.api_secret.is_empty() {
            return Err(FabricError::auth("fabric api key/secret not configured"));
        }
        let now = Utc::now().timestamp();
        let claims = Claims {
            iss: self.api_key.clone(),
            sub: self.identity.clone(),
            nbf: now,
            exp: now + self.ttl_secs,
            video: self.video.clone(),
            sip: self.sip.clone(),
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.api_secret.as_bytes()),
        )
        .map_err(|e| FabricError::auth(format!("failed to sign fabric token: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{decode, DecodingKey, Validation};

    #[test]
    fn token_round_trips_with_secret() {
        let jwt = AccessToken::new("APIkey", "sekrit")
            .with_identity("dialer-1")
            .server_grants()
            .to_jwt()
            .unwrap();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        let decoded = decode::<Claims>(
            &jwt,
            &DecodingKey::from_secret("sekrit".as_bytes()),
            &validation,
        )
        .unwrap();

        assert_eq!(decoded.claims.iss, "APIkey");
        assert_eq!(decoded.claims.sub, "dialer-1");
        assert_eq!(decoded.claims.sip.admin, Some(true));
        assert_eq!(decoded.claims.video.room_admin, Some(true));
    }

    #[test]
    fn empty_secret_is_rejected() {
        let err = AccessToken::new("APIkey", "").to_jwt().unwrap_err();
        assert_eq!(err.kind(), crate::FabricErrorKind::Auth);
    }
}
