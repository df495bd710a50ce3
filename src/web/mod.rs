//! HTTP surface of the identity API.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod state;

pub use auth::AuthUser;
pub use error::{ErrorResponse, Result, WebError};
pub use state::AppState;

use axum::Router;
use axum::http::{HeaderName, Method};
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

pub fn build_router(state: AppState) -> Router {
    let request_id_header = HeaderName::from_static("x-request-id");

    Router::new()
        .route("/api/health", get(handlers::healthcheck))
        .route("/api/authentication/register", post(handlers::register))
        .route("/api/authentication/authenticate", post(handlers::authenticate))
        .route("/api/authentication/activate", get(handlers::activate))
        .route("/api/users/me", get(handlers::me))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(Any)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS]),
        )
        .with_state(state)
}
