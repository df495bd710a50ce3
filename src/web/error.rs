use crate::identity::IdentityError;
use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::error;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

#[derive(Debug)]
pub enum WebError {
    Identity(IdentityError),
    Input(String),
    Unauthorized(String),
}

impl From<IdentityError> for WebError {
    fn from(err: IdentityError) -> Self {
        WebError::Identity(err)
    }
}

impl From<JsonRejection> for WebError {
    fn from(rejection: JsonRejection) -> Self {
        WebError::Input(rejection.body_text())
    }
}

impl WebError {
    pub fn status(&self) -> StatusCode {
        self.parts().0
    }

    fn parts(&self) -> (StatusCode, String, &'static str) {
        match self {
            WebError::Identity(err) => match err {
                IdentityError::Validation(_) => {
                    (StatusCode::BAD_REQUEST, err.to_string(), "validation_error")
                }
                IdentityError::EmailAlreadyExists => (StatusCode::CONFLICT, err.to_string(), "conflict"),
                IdentityError::InvalidCredentials => {
                    (StatusCode::UNAUTHORIZED, err.to_string(), "invalid_credentials")
                }
                IdentityError::InactiveAccount => {
                    (StatusCode::NOT_FOUND, err.to_string(), "inactive_account")
                }
                IdentityError::TokenRequired => {
                    (StatusCode::BAD_REQUEST, err.to_string(), "token_required")
                }
                IdentityError::InvalidActivationToken(_) => {
                    (StatusCode::BAD_REQUEST, err.to_string(), "invalid_token")
                }
                IdentityError::UserNotFoundOrAlreadyActive => (
                    StatusCode::UNAUTHORIZED,
                    err.to_string(),
                    "user_not_found_or_already_active",
                ),
                _ => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    "internal_error",
                ),
            },
            WebError::Input(msg) => (StatusCode::BAD_REQUEST, msg.clone(), "input_error"),
            WebError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone(), "unauthorized"),
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let (status, message, code) = self.parts();
        if status.is_server_error() {
            error!(error = ?self, "request failed");
        }

        let body = Json(ErrorResponse {
            error: message,
            code: code.to_string(),
        });

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, WebError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DbError;
    use crate::identity::TokenError;

    #[test]
    fn test_identity_errors_map_to_statuses() {
        let cases = [
            (IdentityError::validation("Email is required"), StatusCode::BAD_REQUEST),
            (IdentityError::EmailAlreadyExists, StatusCode::CONFLICT),
            (IdentityError::InvalidCredentials, StatusCode::UNAUTHORIZED),
            (IdentityError::InactiveAccount, StatusCode::NOT_FOUND),
            (IdentityError::TokenRequired, StatusCode::BAD_REQUEST),
            (
                IdentityError::InvalidActivationToken(TokenError::Expired),
                StatusCode::BAD_REQUEST,
            ),
            (IdentityError::UserNotFoundOrAlreadyActive, StatusCode::UNAUTHORIZED),
        ];
        for (err, status) in cases {
            assert_eq!(WebError::from(err).status(), status);
        }
    }

    #[test]
    fn test_unexpected_errors_hide_details() {
        let err = WebError::from(IdentityError::from(DbError::LockError("write lock".into())));
        let (status, message, code) = err.parts();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(message, "Internal server error");
        assert_eq!(code, "internal_error");
    }
}
