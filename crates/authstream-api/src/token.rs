//! HS256 bearer tokens for signed-in users.

use std::sync::Arc;

use authstream_core::clock::Clock;
use chrono::TimeDelta;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::JwtConfig;

/// `role` claim of a privileged token.
pub const ADMIN_ROLE: &str = "admin";
/// `role` claim of an ordinary token.
pub const SHOPPER_ROLE: &str = "shopper";

/// Errors raised while issuing or validating tokens.
#[derive(Debug, Error)]
pub enum TokenError {
    /// Signing failed.
    #[error("token encoding failed: {0}")]
    Encoding(#[source] jsonwebtoken::errors::Error),

    /// Signature, issuer, audience or shape check failed.
    #[error("invalid token: {0}")]
    Invalid(#[source] jsonwebtoken::errors::Error),

    /// The token is past its `exp`.
    #[error("token expired")]
    Expired,

    /// The configured lifetime does not yield a representable expiry.
    #[error("token lifetime of {0} minutes is out of range")]
    Lifetime(i64),
}

/// Claims carried by every issued token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    /// Email the user signed in with.
    pub email: String,
    /// `admin` or `shopper`.
    pub role: String,
    /// Issuer.
    pub iss: String,
    /// Audience.
    pub aud: String,
    /// Issued-at, seconds since the epoch.
    pub iat: i64,
    /// Expiry, seconds since the epoch.
    pub exp: i64,
    /// Token id.
    pub jti: String,
}

impl Claims {
    /// Returns `true` for a token issued after a directory check.
    #[must_use]
    pub fn is_privileged(&self) -> bool {
        self.role == ADMIN_ROLE
    }
}

/// Issues and validates bearer tokens.
pub struct JwtTokenProvider {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    ttl_minutes: i64,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for JwtTokenProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtTokenProvider")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("ttl_minutes", &self.ttl_minutes)
            .finish_non_exhaustive()
    }
}

impl JwtTokenProvider {
    /// Creates a provider signing with `config.key`. Expiry is stamped and
    /// checked against `clock`.
    #[must_use]
    pub fn new(config: &JwtConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            encoding: EncodingKey::from_secret(config.key.as_bytes()),
            decoding: DecodingKey::from_secret(config.key.as_bytes()),
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            ttl_minutes: config.ttl_minutes,
            clock,
        }
    }

    /// Issues a token for user `id`.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Lifetime` if the expiry cannot be computed and
    /// `TokenError::Encoding` if signing fails.
    pub fn issue(&self, id: Uuid, email: &str, is_privileged: bool) -> Result<String, TokenError> {
        let now = self.clock.now();
        let expires = TimeDelta::try_minutes(self.ttl_minutes)
            .filter(|ttl| *ttl > TimeDelta::zero())
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or(TokenError::Lifetime(self.ttl_minutes))?;
        let claims = Claims {
            sub: id.to_string(),
            email: email.to_owned(),
            role: (if is_privileged { ADMIN_ROLE } else { SHOPPER_ROLE }).to_owned(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: now.timestamp(),
            exp: expires.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(TokenError::Encoding)
    }

    /// Verifies signature, issuer, audience and expiry and returns the claims.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Invalid` for a malformed or foreign token and
    /// `TokenError::Expired` once `exp` has passed.
    pub fn validate(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        // Expiry is checked against the injected clock below.
        validation.validate_exp = false;

        let claims = jsonwebtoken::decode::<Claims>(token, &self.decoding, &validation)
            .map_err(TokenError::Invalid)?
            .claims;

        if claims.exp <= self.clock.now().timestamp() {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }

    /// Returns the named claim rendered as a string, if present.
    #[must_use]
    pub fn claim(claims: &Claims, name: &str) -> Option<String> {
        let value = serde_json::to_value(claims).ok()?;
        match value.get(name)? {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}
