/// Subscription Authentication
///
/// Runs once per streaming handshake. The credential is the session token
/// supplied explicitly in the subscribe payload; cookies are never consulted.
/// Unlike the HTTP filters this path performs a live identity lookup, so it
/// is where revocation takes effect.

use std::sync::Arc;
use std::time::Duration;

use crate::auth::claims::Claims;
use crate::auth::jwt::{TokenCodec, TokenKind};
use crate::error::{AppError, AuthError};
use crate::identity::{bounded, IdentityStore, Member};

/// Identity bound to a subscription for the connection's lifetime
#[derive(Debug, Clone)]
pub struct SubscriptionContext {
    pub tracker: String,
    pub member: Member,
    pub claims: Claims,
}

pub struct SubscriptionAuthenticator {
    codec: Arc<TokenCodec>,
    store: Arc<dyn IdentityStore>,
    timeout: Duration,
}

impl SubscriptionAuthenticator {
    pub fn new(codec: Arc<TokenCodec>, store: Arc<dyn IdentityStore>, timeout: Duration) -> Self {
        Self {
            codec,
            store,
            timeout,
        }
    }

    pub async fn authenticate(&self, credential: &str) -> Result<SubscriptionContext, AppError> {
        self.authenticate_at(credential, chrono::Utc::now().timestamp())
            .await
    }

    /// Authenticate a handshake credential as of `now`
    ///
    /// # Errors
    /// - `Unauthorized("invalid or expired token")` for any token failure
    /// - `Unauthorized("revoked")` if the tracker is no longer live
    /// - `Store` if the live lookup fails
    pub async fn authenticate_at(
        &self,
        credential: &str,
        now: i64,
    ) -> Result<SubscriptionContext, AppError> {
        let claims = self.codec.verify_at(TokenKind::Session, credential.trim(), now).map_err(|e| {
            tracing::warn!(error = %e, "Subscription handshake rejected");
            AuthError::INVALID_TOKEN
        })?;

        let member = bounded(self.timeout, self.store.find_live(&claims.sub))
            .await?
            .ok_or_else(|| {
                tracing::warn!(tracker = %claims.sub, "Subscription for revoked tracker rejected");
                AuthError::REVOKED
            })?;

        tracing::info!(tracker = %claims.sub, handle = %member.handle, "Subscription authenticated");

        Ok(SubscriptionContext {
            tracker: claims.sub.clone(),
            member,
            claims,
        })
    }
}
