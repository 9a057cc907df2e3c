//! Password hashing and bearer-token issuance/validation.

use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// JWT claims carried by an access token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,        // User id
    pub exp: usize,         // Expiration time (Unix timestamp)
    pub iat: usize,         // Issued at (Unix timestamp)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    Invalid,
    Expired,
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::Invalid => write!(f, "Invalid authentication token"),
            AuthError::Expired => write!(f, "Authentication token expired"),
        }
    }
}

impl std::error::Error for AuthError {}

impl AuthError {
    pub fn status_code(&self) -> u16 {
        match self {
            AuthError::Invalid | AuthError::Expired => 401,
        }
    }
}

/// Hash a password with bcrypt (salted, slow by construction).
pub fn hash_password(password: &str) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(password, bcrypt::DEFAULT_COST)
}

/// Verify a password against a stored bcrypt hash.
/// A malformed hash verifies as `false` rather than erroring.
pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

/// Issues and validates HS256-signed access tokens for user ids.
pub struct TokenService {
    secret: String,
    ttl_secs: u64,
}

impl TokenService {
    pub fn new(secret: impl Into<String>, ttl_secs: u64) -> Self {
        TokenService {
            secret: secret.into(),
            ttl_secs,
        }
    }

    /// Sign a claim set for `user_id`, expiring after the configured TTL.
    pub fn issue(&self, user_id: i32) -> Result<String, AuthError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as usize;

        let claims = Claims {
            sub: user_id.to_string(),
            exp: now + self.ttl_secs as usize,
            iat: now,
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|_| AuthError::Invalid)
    }

    /// Verify signature and expiry, returning the user id the token was
    /// issued for.
    pub fn resolve(&self, token: &str) -> Result<i32, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 30;  // Allow 30 seconds leeway for clock skew

        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AuthError::Expired,
            _ => AuthError::Invalid,
        })?;

        token_data
            .claims
            .sub
            .parse::<i32>()
            .map_err(|_| AuthError::Invalid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_then_resolve_roundtrips() {
        let tokens = TokenService::new("test-secret", 1800);
        let token = tokens.issue(42).unwrap();
        assert_eq!(tokens.resolve(&token).unwrap(), 42);
    }

    #[test]
    fn expired_token_is_rejected_as_expired() {
        let tokens = TokenService::new("test-secret", 1800);
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs() as usize;
        // Expired well past the 30s validation leeway.
        let claims = Claims {
            sub: "7".to_string(),
            exp: now - 300,
            iat: now - 600,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();

        assert_eq!(tokens.resolve(&token), Err(AuthError::Expired));
    }

    #[test]
    fn token_signed_with_other_key_is_invalid() {
        let issuer = TokenService::new("secret-a", 1800);
        let verifier = TokenService::new("secret-b", 1800);
        let token = issuer.issue(1).unwrap();
        assert_eq!(verifier.resolve(&token), Err(AuthError::Invalid));
    }

    #[test]
    fn garbage_token_is_invalid() {
        let tokens = TokenService::new("test-secret", 1800);
        assert_eq!(tokens.resolve("not-a-jwt"), Err(AuthError::Invalid));
        assert_eq!(tokens.resolve(""), Err(AuthError::Invalid));
    }

    #[test]
    fn password_hash_verifies_and_rejects() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
    }

    #[test]
    fn malformed_hash_verifies_false() {
        assert!(!verify_password("anything", "not-a-bcrypt-hash"));
        assert!(!verify_password("anything", ""));
    }
}
