//! # HS256 bearer tokens
//!
//! `sub` carries the numeric user id, `preferred_username` the handle.
//! `iss` must match the configured issuer and `exp` is mandatory.

use chrono::{Duration, Utc};
use domains::{AppError, Identity, IdentityVerifier, Result, UserId};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("JWT encoding failed: {0}")]
    Encoding(#[from] jsonwebtoken::errors::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub preferred_username: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &SecretString, issuer: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        Self {
            key: DecodingKey::from_secret(secret.expose_secret().as_bytes()),
            validation,
        }
    }
}

impl IdentityVerifier for JwtVerifier {
    fn verify(&self, token: &str) -> Result<Identity> {
        let data = decode::<Claims>(token, &self.key, &self.validation).map_err(|e| {
            debug!(error = %e, "rejected bearer token");
            AppError::Unauthenticated
        })?;
        let user_id = data.claims.sub.parse::<i64>().map_err(|_| {
            debug!(sub = %data.claims.sub, "token subject is not a user id");
            AppError::Unauthenticated
        })?;
        Ok(Identity {
            user_id: UserId(user_id),
            username: data.claims.preferred_username,
        })
    }
}

/// Mints tokens the way the authentication service does. Used by tests and
/// local tooling.
pub struct JwtIssuer {
    key: EncodingKey,
    issuer: String,
    ttl: Duration,
}

impl JwtIssuer {
    pub fn new(secret: &SecretString, issuer: &str, ttl: Duration) -> Self {
        Self {
            key: EncodingKey::from_secret(secret.expose_secret().as_bytes()),
            issuer: issuer.to_string(),
            ttl,
        }
    }

    pub fn issue(&self, identity: &Identity) -> std::result::Result<String, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            sub: identity.user_id.to_string(),
            preferred_username: identity.username.clone(),
            iss: self.issuer.clone(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.key)?)
    }
}
