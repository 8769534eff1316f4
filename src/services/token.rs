//! Signed session tokens.
//!
//! Tokens are HS256 JWTs carrying [`Claims`]. A token alone is never enough to
//! authenticate: the session registry must also hold an active row for its
//! SHA-256 digest, which is what lets logout and expiry revoke a token that is
//! still cryptographically valid.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::User;

/// Claims embedded in every token.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Claims {
    /// Subject: the user's internal id.
    pub sub: i64,
    /// External student id.
    pub sid: String,
    pub email: String,
    /// Issued-at (UTC Unix seconds).
    pub iat: i64,
    /// Expiration (UTC Unix seconds).
    pub exp: i64,
    /// Unique token id; two logins in the same second still get distinct tokens.
    pub jti: String,
}

/// Why a presented token was rejected.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("Token expired")]
    Expired,

    #[error("Invalid token: {0}")]
    Invalid(String),
}

/// Signs and verifies tokens with one shared secret.
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec").finish_non_exhaustive()
    }
}

impl TokenCodec {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Issue a token for `user` valid from `now` until `expires_at`.
    pub fn sign(&self, user: &User, now: DateTime<Utc>, expires_at: DateTime<Utc>) -> Result<(String, Claims)> {
        let claims = Claims {
            sub: user.id,
            sid: user.student_id.clone(),
            email: user.email.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .context("Failed to sign session token")?;
        Ok((token, claims))
    }

    /// Check signature, structure and expiry, returning the embedded claims.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid(e.to_string()),
            })
    }
}

/// SHA-256 hex digest of a token; the only form the registry stores.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn user() -> User {
        let mut user = User::new("Ada".into(), "ada@example.com".into(), "hash".into());
        user.id = 42;
        user
    }

    fn codec() -> TokenCodec {
        TokenCodec::new("test-secret-that-is-long-enough-for-hmac")
    }

    #[test]
    fn test_sign_and_verify_embeds_identity() {
        let user = user();
        let now = Utc::now();
        let (token, issued) = codec().sign(&user, now, now + Duration::minutes(30)).unwrap();

        let claims = codec().verify(&token).expect("token should verify");
        assert_eq!(claims, issued);
        assert_eq!(claims.sub, 42);
        assert_eq!(claims.sid, user.student_id);
        assert_eq!(claims.email, "ada@example.com");
        assert_eq!(claims.exp - claims.iat, 30 * 60);
    }

    #[test]
    fn test_fresh_token_with_numeric_subject_verifies() {
        let now = Utc::now();
        let (token, _) = codec().sign(&user(), now, now + Duration::minutes(30)).unwrap();

        match codec().verify(&token) {
            Ok(claims) => assert_eq!(claims.sub, 42),
            Err(e) => panic!("fresh token rejected: {}", e),
        }
    }

    #[test]
    fn test_tokens_are_unique_per_issue() {
        let user = user();
        let now = Utc::now();
        let (a, _) = codec().sign(&user, now, now + Duration::minutes(30)).unwrap();
        let (b, _) = codec().sign(&user, now, now + Duration::minutes(30)).unwrap();
        assert_ne!(a, b);
        assert_ne!(hash_token(&a), hash_token(&b));
    }

    #[test]
    fn test_expired_token_rejected() {
        let now = Utc::now();
        let (token, _) = codec()
            .sign(&user(), now - Duration::hours(2), now - Duration::hours(1))
            .unwrap();
        assert!(matches!(codec().verify(&token), Err(TokenError::Expired)));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let now = Utc::now();
        let (token, _) = codec().sign(&user(), now, now + Duration::minutes(5)).unwrap();
        let other = TokenCodec::new("a-different-secret-entirely");
        assert!(matches!(other.verify(&token), Err(TokenError::Invalid(_))));
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(matches!(codec().verify("not.a.jwt"), Err(TokenError::Invalid(_))));
        assert!(matches!(codec().verify(""), Err(TokenError::Invalid(_))));
    }

    #[test]
    fn test_hash_token_is_sha256_hex() {
        let digest = hash_token("abc");
        assert_eq!(
            digest,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
