//! Bearer credentials.
//!
//! A session token is minted by the issuer (the login service) and signed
//! with its Ed25519 key.  The chat server only holds the issuer public key,
//! so it can check any token offline; revocation is tracked server-side by
//! `session_id`.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, SubsecRound, Utc};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SessionError;
use crate::types::UserId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionToken {
    pub user_id: UserId,
    pub session_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub signature: Vec<u8>,
}

// payload = user_id (be) || session_id || expires_at (rfc3339)
fn signing_payload(user_id: UserId, session_id: &Uuid, expires_at: &DateTime<Utc>) -> Vec<u8> {
    let mut payload = Vec::with_capacity(64);
    payload.extend_from_slice(&user_id.0.to_be_bytes());
    payload.extend_from_slice(session_id.as_bytes());
    payload.extend_from_slice(expires_at.to_rfc3339().as_bytes());
    payload
}

pub fn create_session_token(
    user_id: UserId,
    expires_at: DateTime<Utc>,
    issuer_key: &SigningKey,
) -> SessionToken {
    let session_id = Uuid::new_v4();
    let expires_at = expires_at.trunc_subsecs(0);
    let signature = issuer_key.sign(&signing_payload(user_id, &session_id, &expires_at));

    SessionToken {
        user_id,
        session_id,
        expires_at,
        signature: signature.to_bytes().to_vec(),
    }
}

pub fn verify_session_token_with_key(
    token: &SessionToken,
    issuer_pubkey: &[u8; 32],
) -> Result<(), SessionError> {
    if Utc::now() > token.expires_at {
        return Err(SessionError::Expired);
    }

    let verifying_key =
        VerifyingKey::from_bytes(issuer_pubkey).map_err(|_| SessionError::InvalidKey)?;
    let signature =
        Signature::from_slice(&token.signature).map_err(|_| SessionError::BadSignature)?;

    let payload = signing_payload(token.user_id, &token.session_id, &token.expires_at);
    verifying_key
        .verify(&payload, &signature)
        .map_err(|_| SessionError::BadSignature)
}

impl SessionToken {
    /// URL-safe string form used in headers and query strings.
    pub fn encode(&self) -> String {
        // Serializing plain data into a Vec cannot fail.
        let json = serde_json::to_vec(self).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json)
    }

    pub fn decode(s: &str) -> Result<Self, SessionError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(s.trim())
            .map_err(|_| SessionError::Encoding)?;
        serde_json::from_slice(&bytes).map_err(|_| SessionError::Encoding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rand::rngs::OsRng;

    #[test]
    fn test_valid_token_verifies_after_string_round_trip() {
        let issuer = SigningKey::generate(&mut OsRng);
        let pubkey = issuer.verifying_key().to_bytes();

        let token = create_session_token(UserId(7), Utc::now() + Duration::hours(1), &issuer);
        let decoded = SessionToken::decode(&token.encode()).unwrap();

        assert_eq!(decoded.user_id, UserId(7));
        assert_eq!(decoded.session_id, token.session_id);
        assert!(verify_session_token_with_key(&decoded, &pubkey).is_ok());
    }

    #[test]
    fn test_expired_token_is_refused() {
        let issuer = SigningKey::generate(&mut OsRng);
        let pubkey = issuer.verifying_key().to_bytes();

        let token = create_session_token(UserId(7), Utc::now() - Duration::minutes(1), &issuer);
        assert!(matches!(
            verify_session_token_with_key(&token, &pubkey),
            Err(SessionError::Expired)
        ));
    }

    #[test]
    fn test_wrong_issuer_is_refused() {
        let issuer = SigningKey::generate(&mut OsRng);
        let other = SigningKey::generate(&mut OsRng);

        let token = create_session_token(UserId(7), Utc::now() + Duration::hours(1), &issuer);
        assert!(matches!(
            verify_session_token_with_key(&token, &other.verifying_key().to_bytes()),
            Err(SessionError::BadSignature)
        ));
    }

    #[test]
    fn test_tampered_user_id_is_refused() {
        let issuer = SigningKey::generate(&mut OsRng);
        let pubkey = issuer.verifying_key().to_bytes();

        let mut token = create_session_token(UserId(7), Utc::now() + Duration::hours(1), &issuer);
        token.user_id = UserId(8);
        assert!(verify_session_token_with_key(&token, &pubkey).is_err());
    }

    #[test]
    fn test_garbage_does_not_decode() {
        assert!(matches!(
            SessionToken::decode("!!not base64!!"),
            Err(SessionError::Encoding)
        ));
        assert!(SessionToken::decode(&URL_SAFE_NO_PAD.encode(b"{}")).is_err());
    }
}
