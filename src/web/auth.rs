use super::error::WebError;
use super::state::AppState;
use crate::identity::token::strip_bearer;
use crate::identity::{IdentityError, TokenError, User};
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use tracing::warn;

/// Header name used by older clients.
const LEGACY_AUTH_HEADER: &str = "authorisation";

/// The user behind the request's bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = WebError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .or_else(|| parts.headers.get(LEGACY_AUTH_HEADER))
            .and_then(|value| value.to_str().ok())
            .map(strip_bearer)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| WebError::Unauthorized(IdentityError::TokenRequired.to_string()))?;

        let claims = state.identity.tokens().decode(header).map_err(|err| match err {
            TokenError::NotConfigured => WebError::Identity(err.into()),
            other => WebError::Unauthorized(other.to_string()),
        })?;

        match state.identity.profile(claims.user_id).await {
            Ok(user) => Ok(AuthUser(user)),
            Err(IdentityError::UserNotFound(id)) => {
                warn!(user_id = id, "token for unknown user");
                Err(WebError::Unauthorized(TokenError::Invalid.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }
}
