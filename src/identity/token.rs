//! HS256 JSON Web Tokens.
//!
//! Tokens are `base64url(header).base64url(claims).base64url(signature)`
//! where the signature is HMAC-SHA256 over the first two segments.

use super::user::UserType;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::Duration;
use thiserror::Error;

/// Header shared by every token this service issues.
const HEADER: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("JWT secret is not configured")]
    NotConfigured,

    #[error("Token has expired")]
    Expired,

    #[error("Invalid token")]
    Invalid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(rename = "userId")]
    pub user_id: i64,
    #[serde(rename = "userType", default, skip_serializing_if = "Option::is_none")]
    pub user_type: Option<UserType>,
    /// Issued at, seconds since the epoch
    pub iat: i64,
    /// Expires at, seconds since the epoch
    pub exp: i64,
}

#[derive(Debug, Clone)]
pub struct TokenService {
    secret: Option<Vec<u8>>,
    expiration: Duration,
}

impl TokenService {
    /// An empty secret counts as no secret.
    pub fn new(secret: Option<String>, expiration: Duration) -> Self {
        Self {
            secret: secret.filter(|s| !s.is_empty()).map(String::into_bytes),
            expiration,
        }
    }

    pub fn expiration(&self) -> Duration {
        self.expiration
    }

    /// Issues a token for `user_id` valid for the configured expiration.
    pub fn encode(&self, user_id: i64, user_type: Option<UserType>) -> Result<String, TokenError> {
        let iat = Utc::now().timestamp();
        let lifetime = i64::try_from(self.expiration.as_secs()).unwrap_or(i64::MAX);
        self.encode_claims(&Claims {
            user_id,
            user_type,
            iat,
            exp: iat.saturating_add(lifetime),
        })
    }

    pub fn encode_claims(&self, claims: &Claims) -> Result<String, TokenError> {
        let payload = serde_json::to_vec(claims).map_err(|_| TokenError::Invalid)?;
        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(HEADER),
            URL_SAFE_NO_PAD.encode(payload)
        );
        let signature = self.mac(&signing_input)?.finalize().into_bytes();
        Ok(format!("{}.{}", signing_input, URL_SAFE_NO_PAD.encode(signature)))
    }

    /// Verifies the signature and expiry of `token` and returns its claims.
    pub fn decode(&self, token: &str) -> Result<Claims, TokenError> {
        let mut mac = self.mac("")?;

        let mut segments = token.split('.');
        let (Some(header), Some(payload), Some(signature), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(TokenError::Invalid);
        };

        let header_json = URL_SAFE_NO_PAD.decode(header).map_err(|_| TokenError::Invalid)?;
        let header_value: serde_json::Value =
            serde_json::from_slice(&header_json).map_err(|_| TokenError::Invalid)?;
        if header_value.get("alg").and_then(|alg| alg.as_str()) != Some("HS256") {
            return Err(TokenError::Invalid);
        }

        let signature = URL_SAFE_NO_PAD.decode(signature).map_err(|_| TokenError::Invalid)?;
        mac.update(header.as_bytes());
        mac.update(b".");
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature).map_err(|_| TokenError::Invalid)?;

        let payload = URL_SAFE_NO_PAD.decode(payload).map_err(|_| TokenError::Invalid)?;
        let claims: Claims = serde_json::from_slice(&payload).map_err(|_| TokenError::Invalid)?;

        if claims.exp <= Utc::now().timestamp() {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }

    fn mac(&self, input: &str) -> Result<Hmac<Sha256>, TokenError> {
        let secret = self.secret.as_deref().ok_or(TokenError::NotConfigured)?;
        let mut mac = <Hmac<Sha256>>::new_from_slice(secret).map_err(|_| TokenError::NotConfigured)?;
        mac.update(input.as_bytes());
        Ok(mac)
    }
}

/// Strips an optional `Bearer ` prefix from an authorization header value.
pub fn strip_bearer(header: &str) -> &str {
    let header = header.trim();
    match header.get(..7) {
        Some(prefix) if prefix.eq_ignore_ascii_case("bearer ") => header[7..].trim_start(),
        _ => header,
    }
}
