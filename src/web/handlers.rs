use super::auth::AuthUser;
use super::error::Result;
use super::state::AppState;
use crate::identity::{AuthenticatedUser, Credentials, RegisterUser, User};
use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

pub const USER_ACTIVATED: &str = "User activated successfully";

#[derive(Debug, Serialize)]
pub struct DataResponse<T> {
    pub data: T,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

#[derive(Debug, Default, Deserialize)]
pub struct ActivateQuery {
    pub token: Option<String>,
}

pub async fn healthcheck() -> &'static str {
    "api is ok!"
}

pub async fn register(
    State(state): State<AppState>,
    payload: std::result::Result<Json<RegisterUser>, JsonRejection>,
) -> Result<StatusCode> {
    let Json(input) = payload?;
    state.identity.register(input).await?;
    Ok(StatusCode::CREATED)
}

pub async fn authenticate(
    State(state): State<AppState>,
    payload: std::result::Result<Json<Credentials>, JsonRejection>,
) -> Result<Json<DataResponse<AuthenticatedUser>>> {
    let Json(credentials) = payload?;
    let authenticated = state.identity.authenticate(credentials).await?;
    Ok(Json(DataResponse {
        data: authenticated,
    }))
}

pub async fn activate(
    State(state): State<AppState>,
    Query(query): Query<ActivateQuery>,
) -> Result<(StatusCode, Json<MessageResponse>)> {
    state.identity.activate(query.token.as_deref()).await?;
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: USER_ACTIVATED,
        }),
    ))
}

pub async fn me(AuthUser(user): AuthUser) -> Json<DataResponse<User>> {
    Json(DataResponse { data: user })
}
