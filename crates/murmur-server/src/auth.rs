use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;

use murmur_shared::session::SessionToken;
use murmur_shared::UserId;

use crate::api::AppState;
use crate::error::ServerError;

/// The authenticated caller of an API request.
pub struct AuthUser {
    pub user_id: UserId,
    pub token: SessionToken,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let raw = token_from_request(&parts.headers, parts.uri.query())
            .ok_or_else(|| ServerError::Unauthorized("Missing session token".into()))?;
        let token = state.verifier.verify(&raw).await?;
        Ok(AuthUser {
            user_id: token.user_id,
            token,
        })
    }
}

/// Find a session token in, by priority: `Authorization: Bearer`, the
/// `token` header, the `token` query parameter.
pub fn token_from_request(headers: &HeaderMap, query: Option<&str>) -> Option<String> {
    if let Some(token) = header(headers, "authorization").and_then(|v| v.strip_prefix("Bearer ")) {
        return Some(token.trim().to_string());
    }
    if let Some(token) = header(headers, "token") {
        return Some(token.to_string());
    }

    // Tokens are URL-safe base64, so no percent-decoding is needed.
    query?
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, value)| *key == "token" && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}
