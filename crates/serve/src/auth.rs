//! The consumed authorization contract.

use async_trait::async_trait;
use std::collections::HashSet;
use thiserror::Error;
use tonic::metadata::MetadataMap;

/// Who a request is for, as resolved by the authorizer. Attached to request
/// logs and meter events.
#[derive(Debug, Clone, Default)]
pub struct Identity {
    /// The api key the credentials resolved to, if any.
    pub api_key_id: Option<String>,
    /// The user behind the credentials, if known.
    pub user_id: Option<String>,
    /// Client address as seen through proxies.
    pub real_ip: Option<String>,
}

/// Authorization rejections.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No usable credentials.
    #[error("missing or invalid credentials")]
    Unauthenticated,
    /// Valid credentials without access to this service.
    #[error("credentials do not grant access to this service")]
    PermissionDenied,
}

impl From<AuthError> for tonic::Status {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Unauthenticated => Self::unauthenticated(err.to_string()),
            AuthError::PermissionDenied => Self::permission_denied(err.to_string()),
        }
    }
}

/// Resolves request credentials into an [`Identity`].
///
/// Supplied by the embedding process; the server only calls `check` once
/// per request before doing any work.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Checks the request metadata.
    async fn check(&self, metadata: &MetadataMap) -> Result<Identity, AuthError>;
}

/// Accepts every request with an anonymous identity.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAuthenticator;

#[async_trait]
impl Authenticator for NoopAuthenticator {
    async fn check(&self, _metadata: &MetadataMap) -> Result<Identity, AuthError> {
        Ok(Identity::default())
    }
}

/// Validates `authorization: Bearer <token>` against a static token set.
#[derive(Debug, Clone, Default)]
pub struct BearerTokenAuthenticator {
    tokens: HashSet<String>,
}

impl BearerTokenAuthenticator {
    /// Creates an authenticator accepting exactly `tokens`.
    pub fn new(tokens: impl IntoIterator<Item = String>) -> Self {
        Self { tokens: tokens.into_iter().collect() }
    }
}

#[async_trait]
impl Authenticator for BearerTokenAuthenticator {
    async fn check(&self, metadata: &MetadataMap) -> Result<Identity, AuthError> {
        let header = metadata
            .get("authorization")
            .and_then(|value| value.to_str().ok())
            .ok_or(AuthError::Unauthenticated)?;
        let token = header.strip_prefix("Bearer ").ok_or(AuthError::Unauthenticated)?;
        if !self.tokens.contains(token) {
            return Err(AuthError::PermissionDenied);
        }
        Ok(Identity { api_key_id: Some(token.to_string()), ..Default::default() })
    }
}
