//! Identity resolution against provider-issued session tokens.

use std::fs;
use std::sync::Arc;

use async_trait::async_trait;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;

use crate::config::SessionConfig;
use crate::services::RevocationStore;

/// Claims carried by a provider-issued session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject (stable user id).
    pub sub: String,
    /// Session id, the revocation key.
    pub sid: String,
    /// Expiration time (Unix timestamp).
    pub exp: i64,
    /// Issued at (Unix timestamp).
    pub iat: i64,
}

/// Resolves an opaque session credential to a stable user id.
///
/// "Not authenticated" is a value, not an error: missing, malformed,
/// expired, and revoked tokens all resolve to `None`. An `Err` means the
/// provider-side infrastructure could not be consulted, and the caller
/// must deny.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, token: Option<&str>) -> Result<Option<String>, AppError>;
}

/// Production resolver: verifies the RS256 signature with the provider's
/// public key, then checks the session against the revocation list.
pub struct SessionVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
    revocations: Arc<dyn RevocationStore>,
}

impl SessionVerifier {
    pub fn new(
        config: &SessionConfig,
        revocations: Arc<dyn RevocationStore>,
    ) -> Result<Self, AppError> {
        let public_key_pem = fs::read_to_string(&config.public_key_path).map_err(|e| {
            AppError::ConfigError(anyhow::anyhow!(
                "Failed to read session public key from {}: {}",
                config.public_key_path,
                e
            ))
        })?;

        Self::from_pem(public_key_pem.as_bytes(), config.issuer.as_deref(), revocations)
    }

    pub fn from_pem(
        public_key_pem: &[u8],
        issuer: Option<&str>,
        revocations: Arc<dyn RevocationStore>,
    ) -> Result<Self, AppError> {
        let decoding_key = DecodingKey::from_rsa_pem(public_key_pem).map_err(|e| {
            AppError::ConfigError(anyhow::anyhow!("Failed to parse session public key: {}", e))
        })?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_exp = true;
        if let Some(issuer) = issuer {
            validation.set_issuer(&[issuer]);
        }

        tracing::info!("Session verifier initialized with RS256 public key");

        Ok(Self {
            decoding_key,
            validation,
            revocations,
        })
    }
}

#[async_trait]
impl IdentityResolver for SessionVerifier {
    async fn resolve(&self, token: Option<&str>) -> Result<Option<String>, AppError> {
        let token = match token {
            Some(token) => token,
            None => return Ok(None),
        };

        let claims = match decode::<SessionClaims>(token, &self.decoding_key, &self.validation) {
            Ok(data) => data.claims,
            Err(e) => {
                tracing::debug!(error = %e, "Session token failed verification");
                return Ok(None);
            }
        };

        // Fail closed: if the revocation list is unreachable we cannot
        // rule out a revoked session, so the error propagates and the
        // request is denied.
        let revoked = self.revocations.is_revoked(&claims.sid).await.map_err(|e| {
            tracing::error!(error = %e, "Revocation list unreachable");
            e
        })?;

        if revoked {
            tracing::debug!(session_id = %claims.sid, "Session is revoked");
            return Ok(None);
        }

        Ok(Some(claims.sub))
    }
}

/// Fixed token-to-user mapping for tests.
#[derive(Default)]
pub struct StaticIdentityResolver {
    sessions: std::collections::HashMap<String, String>,
}

impl StaticIdentityResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(mut self, token: impl Into<String>, user_id: impl Into<String>) -> Self {
        self.sessions.insert(token.into(), user_id.into());
        self
    }
}

#[async_trait]
impl IdentityResolver for StaticIdentityResolver {
    async fn resolve(&self, token: Option<&str>) -> Result<Option<String>, AppError> {
        Ok(token.and_then(|t| self.sessions.get(t).cloned()))
    }
}
