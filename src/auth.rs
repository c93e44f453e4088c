use bcrypt::{hash, verify};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;

use crate::config::Config;
use crate::models::AuthPayload;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),
    #[error("token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
    #[error("token subject is not a user id")]
    BadSubject,
}

pub fn hash_password(password: &str, cost: u32) -> Result<String, bcrypt::BcryptError> {
    hash(password, cost)
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, bcrypt::BcryptError> {
    verify(password, hash)
}

/// Issues and checks the bearer tokens handed out by `POST /users/token/`.
#[derive(Clone)]
pub struct Authenticator {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
    bcrypt_cost: u32,
}

impl Authenticator {
    pub fn new(secret: &[u8], ttl: Duration, bcrypt_cost: u32) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
            bcrypt_cost,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.jwt_secret.as_bytes(),
            Duration::seconds(config.token_ttl_secs),
            config.bcrypt_cost,
        )
    }

    pub fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        Ok(hash_password(password, self.bcrypt_cost)?)
    }

    pub fn create_jwt(&self, user_id: u64) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = AuthPayload {
            sub: user_id.to_string(),
            iat: now.timestamp() as usize,
            exp: (now + self.ttl).timestamp() as usize,
        };
        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    /// Returns the user id the token was issued for.
    pub fn validate_jwt(&self, token: &str) -> Result<u64, AuthError> {
        let token_data = decode::<AuthPayload>(token, &self.decoding, &Validation::new(Algorithm::HS256))?;
        token_data.claims.sub.parse().map_err(|_| AuthError::BadSubject)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authenticator() -> Authenticator {
        Authenticator::new(b"test-secret", Duration::minutes(5), 4)
    }

    #[test]
    fn test_password_hash_round_trip() {
        let auth = authenticator();
        let hashed = auth.hash_password("testpass123").unwrap();
        assert_ne!(hashed, "testpass123");
        assert!(verify_password("testpass123", &hashed).unwrap());
        assert!(!verify_password("wrong", &hashed).unwrap());
    }

    #[test]
    fn test_token_carries_user_id() {
        let auth = authenticator();
        let token = auth.create_jwt(42).unwrap();
        assert_eq!(auth.validate_jwt(&token).unwrap(), 42);
    }

    #[test]
    fn test_token_from_other_secret_is_rejected() {
        let token = authenticator().create_jwt(7).unwrap();
        let other = Authenticator::new(b"another-secret", Duration::minutes(5), 4);
        assert!(other.validate_jwt(&token).is_err());
        assert!(other.validate_jwt("not-a-token").is_err());
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let auth = Authenticator::new(b"test-secret", Duration::minutes(-10), 4);
        let token = auth.create_jwt(1).unwrap();
        assert!(auth.validate_jwt(&token).is_err());
    }
}
