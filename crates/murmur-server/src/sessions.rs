//! Session issuing, verification and revocation.
//!
//! Tokens are self-contained (signed with the server's Ed25519 key), so
//! verification needs no database round-trip.  Logout is handled by a
//! revocation table keyed by session id; entries only need to live until the
//! revoked token would have expired on its own.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use ed25519_dalek::SigningKey;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use murmur_shared::session::{create_session_token, verify_session_token_with_key, SessionToken};
use murmur_shared::UserId;

use crate::error::ServerError;

// ---------------------------------------------------------------------------
// Issuer
// ---------------------------------------------------------------------------

/// Mints session tokens.  Only the admin API and tests hold one.
pub struct SessionIssuer {
    key: SigningKey,
    ttl: Duration,
}

impl SessionIssuer {
    pub fn new(key: SigningKey, ttl_hours: i64) -> Self {
        Self {
            key,
            ttl: Duration::hours(ttl_hours),
        }
    }

    pub fn public_key(&self) -> [u8; 32] {
        self.key.verifying_key().to_bytes()
    }

    pub fn issue(&self, user_id: UserId) -> SessionToken {
        let token = create_session_token(user_id, Utc::now() + self.ttl, &self.key);
        info!(
            user = %user_id,
            session = %token.session_id,
            expires = %token.expires_at,
            "Issued session token"
        );
        token
    }
}

// ---------------------------------------------------------------------------
// Verifier
// ---------------------------------------------------------------------------

/// Resolves bearer credentials to user ids.
#[derive(Clone)]
pub struct SessionVerifier {
    issuer_pubkey: [u8; 32],
    /// session_id -> expiry of the revoked token.
    revoked: Arc<RwLock<HashMap<Uuid, DateTime<Utc>>>>,
}

impl SessionVerifier {
    pub fn new(issuer_pubkey: [u8; 32]) -> Self {
        Self {
            issuer_pubkey,
            revoked: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Decode and check a raw token string.
    pub async fn verify(&self, raw: &str) -> Result<SessionToken, ServerError> {
        let token = SessionToken::decode(raw)
            .map_err(|e| ServerError::Unauthorized(e.to_string()))?;
        verify_session_token_with_key(&token, &self.issuer_pubkey)
            .map_err(|e| ServerError::Unauthorized(e.to_string()))?;

        if self.revoked.read().await.contains_key(&token.session_id) {
            debug!(session = %token.session_id, "Rejected revoked session");
            return Err(ServerError::Unauthorized("Session has been revoked".into()));
        }

        Ok(token)
    }

    /// Resolve a credential to the identity it was issued for.
    pub async fn resolve(&self, raw: &str) -> Result<UserId, ServerError> {
        Ok(self.verify(raw).await?.user_id)
    }

    pub async fn revoke(&self, token: &SessionToken) {
        let mut revoked = self.revoked.write().await;
        revoked.insert(token.session_id, token.expires_at);
        info!(
            user = %token.user_id,
            session = %token.session_id,
            "Session revoked"
        );
    }

    /// Drop revocations for tokens that have expired anyway.
    pub async fn purge_expired(&self) {
        let mut revoked = self.revoked.write().await;
        let before = revoked.len();
        let now = Utc::now();
        revoked.retain(|_, expires_at| *expires_at > now);
        let removed = before - revoked.len();
        if removed > 0 {
            debug!(removed, "Purged expired session revocations");
        }
    }

    #[cfg(test)]
    async fn revoked_count(&self) -> usize {
        self.revoked.read().await.len()
    }
}
