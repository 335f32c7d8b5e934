//! JWT token management
//!
//! Issues and verifies the stateless session tokens handed out at login.
//!
//! Tokens are never stored server-side, so there is no revocation: a leaked
//! token stays valid until its `exp`. Rotating `JWT_SECRET` invalidates every
//! outstanding token at once and is the only kill switch.

use crate::auth::Role;
use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Session lifetime when nothing else is configured
pub const DEFAULT_TOKEN_TTL_HOURS: i64 = 24;

/// JWT claims
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: Uuid,
    pub username: String,
    pub role: Role,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

/// Why a token was rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token signature does not match")]
    InvalidSignature,

    #[error("token has expired")]
    Expired,

    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("failed to encode token: {0}")]
    Encoding(String),
}

/// Signs and verifies session tokens with a single shared HMAC secret
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &[u8], ttl_hours: i64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            ttl: Duration::hours(ttl_hours),
        }
    }

    /// Service keyed with a random per-process secret.
    ///
    /// Tokens it issues die with the process.
    pub fn ephemeral(ttl_hours: i64) -> Self {
        let mut secret = [0u8; 64];
        rand::thread_rng().fill_bytes(&mut secret);
        Self::new(&secret, ttl_hours)
    }

    /// Token lifetime in seconds
    pub fn ttl_seconds(&self) -> i64 {
        self.ttl.num_seconds()
    }

    /// Issue a token for the given identity
    pub fn issue(&self, user_id: Uuid, username: &str, role: Role) -> Result<String, TokenError> {
        self.issue_at(user_id, username, role, Utc::now().timestamp())
    }

    pub(crate) fn issue_at(
        &self,
        user_id: Uuid,
        username: &str,
        role: Role,
        issued_at: i64,
    ) -> Result<String, TokenError> {
        let claims = Claims {
            sub: user_id,
            username: username.to_string(),
            role,
            iat: issued_at,
            exp: issued_at + self.ttl.num_seconds(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Encoding(e.to_string()))
    }

    /// Decode and validate a token. Fails closed.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                _ => TokenError::Malformed(e.to_string()),
            })?;

        // jsonwebtoken accepts exp == now; a token is valid only while now < exp.
        if claims.exp <= Utc::now().timestamp() {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn service() -> TokenService {
        TokenService::new(b"test_secret_key_for_testing_purposes", DEFAULT_TOKEN_TTL_HOURS)
    }

    #[test]
    fn test_issued_token_verifies_with_matching_claims() {
        let service = service();
        let id = Uuid::new_v4();
        let token = service.issue(id, "directora", Role::Subdireccion).unwrap();

        let claims = service.verify(&token).unwrap();
        assert_eq!(claims.sub, id);
        assert_eq!(claims.username, "directora");
        assert_eq!(claims.role, Role::Subdireccion);
    }

    #[test]
    fn test_expiry_is_24_hours_after_issue() {
        let service = service();
        let token = service.issue(Uuid::new_v4(), "admin", Role::Admin).unwrap();
        let claims = service.verify(&token).unwrap();
        assert_eq!(claims.exp - claims.iat, 24 * 3600);
    }

    #[test]
    fn test_expired_token_is_rejected_as_expired() {
        let service = service();
        let two_days_ago = Utc::now().timestamp() - 48 * 3600;
        let token = service
            .issue_at(Uuid::new_v4(), "admin", Role::Admin, two_days_ago)
            .unwrap();

        assert_eq!(service.verify(&token), Err(TokenError::Expired));
    }

    #[test]
    fn test_token_just_past_expiry_is_rejected() {
        let service = TokenService::new(b"secret", 1);
        let issued = Utc::now().timestamp() - 3600 - 5;
        let token = service.issue_at(Uuid::new_v4(), "a", Role::Admin, issued).unwrap();
        assert_eq!(service.verify(&token), Err(TokenError::Expired));
    }

    #[test]
    fn test_token_expiring_this_second_is_rejected() {
        let service = TokenService::new(b"secret", 1);
        let issued = Utc::now().timestamp() - 3600;
        let token = service.issue_at(Uuid::new_v4(), "a", Role::Admin, issued).unwrap();
        assert_eq!(service.verify(&token), Err(TokenError::Expired));
    }

    #[test]
    fn test_foreign_secret_is_rejected_as_invalid_signature() {
        let issuer = TokenService::new(b"secret-one", DEFAULT_TOKEN_TTL_HOURS);
        let verifier = TokenService::new(b"secret-two", DEFAULT_TOKEN_TTL_HOURS);
        let token = issuer.issue(Uuid::new_v4(), "admin", Role::Admin).unwrap();

        assert!(issuer.verify(&token).is_ok());
        assert_eq!(verifier.verify(&token), Err(TokenError::InvalidSignature));
    }

    #[test]
    fn test_malformed_tokens_are_rejected() {
        let service = service();
        for token in ["", "not.a.token", "invalid_token_format", "a.b"] {
            assert!(matches!(service.verify(token), Err(TokenError::Malformed(_))), "{token}");
        }
    }

    #[test]
    fn test_tampered_payload_is_rejected() {
        let service = service();
        let token = service.issue(Uuid::new_v4(), "capturista", Role::ControlEscolar).unwrap();
        let admin = service.issue(Uuid::new_v4(), "capturista", Role::Admin).unwrap();

        // Splice the admin payload onto the original signature.
        let parts: Vec<&str> = token.split('.').collect();
        let admin_parts: Vec<&str> = admin.split('.').collect();
        let forged = format!("{}.{}.{}", parts[0], admin_parts[1], parts[2]);

        assert_eq!(service.verify(&forged), Err(TokenError::InvalidSignature));
    }

    #[test]
    fn test_ephemeral_services_do_not_share_secrets() {
        let a = TokenService::ephemeral(DEFAULT_TOKEN_TTL_HOURS);
        let b = TokenService::ephemeral(DEFAULT_TOKEN_TTL_HOURS);
        let token = a.issue(Uuid::new_v4(), "admin", Role::Admin).unwrap();
        assert!(a.verify(&token).is_ok());
        assert!(b.verify(&token).is_err());
    }
}
