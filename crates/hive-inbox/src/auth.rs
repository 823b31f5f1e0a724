//! Bearer-token auth for the message API.
//!
//! API keys (from the deployment config) are exchanged for short-lived
//! HMAC-SHA256-signed tokens: `base64url(payload).base64url(signature)`.
//! Verification is constant-time via the `hmac` crate.

use crate::error::{InboxError, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::Utc;
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

pub use hive_core::config::Role;

type HmacSha256 = Hmac<Sha256>;

// ---------------------------------------------------------------------------
// Claims
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Key name the token was issued to.
    pub sub: String,
    pub role: Role,
    /// Expiry, unix seconds.
    pub exp: i64,
}

impl Claims {
    pub fn require_send(&self) -> Result<()> {
        if self.role.can_send() {
            Ok(())
        } else {
            Err(InboxError::PermissionDenied {
                role: self.role.to_string(),
                action: "send messages".to_string(),
            })
        }
    }

    pub fn require_broadcast(&self) -> Result<()> {
        if self.role.can_broadcast() {
            Ok(())
        } else {
            Err(InboxError::PermissionDenied {
                role: self.role.to_string(),
                action: "broadcast".to_string(),
            })
        }
    }
}

// ---------------------------------------------------------------------------
// TokenService
// ---------------------------------------------------------------------------

pub struct TokenService {
    secret: Vec<u8>,
    ttl: chrono::Duration,
}

impl TokenService {
    /// `secret` is the base64url-encoded HMAC key from the config.
    pub fn new(secret: &str, ttl: chrono::Duration) -> Result<Self> {
        let secret = URL_SAFE_NO_PAD
            .decode(secret)
            .map_err(|e| InboxError::InvalidToken(format!("bad secret encoding: {e}")))?;
        if secret.is_empty() {
            return Err(InboxError::InvalidToken("empty auth secret".to_string()));
        }
        Ok(Self { secret, ttl })
    }

    pub fn issue(&self, sub: &str, role: Role) -> Result<String> {
        let claims = Claims {
            sub: sub.to_string(),
            role,
            exp: (Utc::now() + self.ttl).timestamp(),
        };
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims)?);
        let sig = URL_SAFE_NO_PAD.encode(self.sign(payload.as_bytes())?);
        Ok(format!("{payload}.{sig}"))
    }

    pub fn verify(&self, token: &str) -> Result<Claims> {
        let (payload, sig) = token
            .split_once('.')
            .ok_or_else(|| InboxError::InvalidToken("missing signature".to_string()))?;
        let sig = URL_SAFE_NO_PAD
            .decode(sig)
            .map_err(|e| InboxError::InvalidToken(format!("bad signature encoding: {e}")))?;

        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        mac.verify_slice(&sig)
            .map_err(|_| InboxError::InvalidToken("signature mismatch".to_string()))?;

        let claims: Claims = serde_json::from_slice(
            &URL_SAFE_NO_PAD
                .decode(payload)
                .map_err(|e| InboxError::InvalidToken(format!("bad payload encoding: {e}")))?,
        )?;

        if claims.exp < Utc::now().timestamp() {
            return Err(InboxError::TokenExpired);
        }
        Ok(claims)
    }

    fn mac(&self) -> Result<HmacSha256> {
        HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| InboxError::InvalidToken(format!("bad hmac key: {e}")))
    }

    fn sign(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut mac = self.mac()?;
        mac.update(data);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

/// Fresh random 32-byte secret, base64url. Written to the config at init.
pub fn generate_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Random API key with a recognizable prefix.
pub fn generate_api_key() -> String {
    let mut bytes = [0u8; 18];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("hk_{}", URL_SAFE_NO_PAD.encode(bytes))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> TokenService {
        TokenService::new(&generate_secret(), chrono::Duration::minutes(60)).unwrap()
    }

    #[test]
    fn issue_then_verify() {
        let service = service();
        let token = service.issue("dashboard", Role::ReadOnly).unwrap();
        let claims = service.verify(&token).unwrap();
        assert_eq!(claims.sub, "dashboard");
        assert_eq!(claims.role, Role::ReadOnly);
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let service = service();
        let token = service.issue("agent-1", Role::Agent).unwrap();
        let (payload, sig) = token.split_once('.').unwrap();
        let mut forged = payload.to_string();
        forged.replace_range(0..1, if &forged[0..1] == "A" { "B" } else { "A" });
        assert!(service.verify(&format!("{forged}.{sig}")).is_err());
    }

    #[test]
    fn token_from_other_secret_is_rejected() {
        let token = service().issue("x", Role::Admin).unwrap();
        assert!(service().verify(&token).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let service =
            TokenService::new(&generate_secret(), chrono::Duration::seconds(-10)).unwrap();
        let token = service.issue("x", Role::Agent).unwrap();
        assert!(matches!(service.verify(&token), Err(InboxError::TokenExpired)));
    }

    #[test]
    fn malformed_tokens_are_rejected() {
        let service = service();
        assert!(service.verify("").is_err());
        assert!(service.verify("no-dot-here").is_err());
        assert!(service.verify("a.b").is_err());
    }

    #[test]
    fn role_gates() {
        let claims = Claims {
            sub: "x".into(),
            role: Role::ReadOnly,
            exp: i64::MAX,
        };
        assert!(claims.require_send().is_err());

        let claims = Claims {
            sub: "x".into(),
            role: Role::Agent,
            exp: i64::MAX,
        };
        assert!(claims.require_send().is_ok());
        assert!(claims.require_broadcast().is_err());
    }

    #[test]
    fn generated_keys_are_distinct() {
        assert_ne!(generate_api_key(), generate_api_key());
        assert!(generate_api_key().starts_with("hk_"));
    }
}
