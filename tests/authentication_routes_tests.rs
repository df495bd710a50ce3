/// Authentication route tests
///
/// Drives the router in-process with `oneshot`: registration, activation,
/// login and the authenticated profile route.
/// Run with: cargo test --test authentication_routes_tests

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use kompagnon::identity::migrations::migrator;
use kompagnon::identity::{DisabledMailer, IdentityService, MailBody, PasswordService, TokenService};
use kompagnon::{AppState, Database, DatabaseConfig, DomainTransaction, build_router};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

struct TestApp {
    router: Router,
    mailer: Arc<DisabledMailer>,
}

async fn app() -> TestApp {
    let db = Arc::new(Database::new(DatabaseConfig::new("routes")));
    migrator().run(&db).await.unwrap();

    let mailer = Arc::new(DisabledMailer::new("noreply@kompagnon.fr"));
    let identity = IdentityService::new(
        DomainTransaction::new(db),
        TokenService::new(Some("route-secret".into()), Duration::from_secs(3600)),
    )
    .with_passwords(PasswordService::new(4))
    .with_mailer(mailer.clone());

    TestApp {
        router: build_router(AppState::new(Arc::new(identity))),
        mailer,
    }
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.expect("router should serve request");
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should collect");

    if body.is_empty() {
        return (status, Value::Null);
    }
    (status, serde_json::from_slice(&body).expect("body should be valid json"))
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("valid request")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).expect("valid request")
}

fn registration(email: &str) -> Value {
    json!({
        "email": email,
        "firstname": "Jean",
        "lastname": "Dupont",
        "password": "Str0ng!Pass",
        "birthday": "1990-05-17"
    })
}

async fn last_activation_token(mailer: &DisabledMailer) -> String {
    let outbox = mailer.outbox().await;
    let MailBody::Html(html) = &outbox.last().expect("activation mail").body else {
        panic!("activation mail should be html");
    };
    let start = html.find("token=").expect("link in mail") + "token=".len();
    let end = start + html[start..].find('"').expect("closing quote");
    html[start..end].to_string()
}

#[tokio::test]
async fn test_health() {
    let app = app().await;
    let response = app.router.clone().oneshot(get("/api/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/plain")
    );
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"api is ok!");
}

#[tokio::test]
async fn test_register_activate_authenticate_flow() {
    let app = app().await;

    let (status, _) = send(
        &app.router,
        post_json("/api/authentication/register", registration("jean@example.fr")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let credentials = json!({ "email": "jean@example.fr", "password": "Str0ng!Pass" });
    let (status, body) = send(
        &app.router,
        post_json("/api/authentication/authenticate", credentials.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "inactive_account");

    let token = last_activation_token(&app.mailer).await;
    let (status, body) = send(
        &app.router,
        get(&format!("/api/authentication/activate?token={}", token)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "User activated successfully");

    let (status, body) = send(
        &app.router,
        get(&format!("/api/authentication/activate?token={}", token)),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "User not found or already active");

    let (status, body) = send(
        &app.router,
        post_json("/api/authentication/authenticate", credentials),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["userId"].as_i64().is_some());
    let session = body["data"]["token"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app.router,
        Request::builder()
            .uri("/api/users/me")
            .header("Authorization", format!("Bearer {}", session))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], "jean@example.fr");
    assert_eq!(body["data"]["isActive"], true);
    assert!(body["data"]["lastLoggedAt"].is_string());
    assert!(body["data"].get("hashedPassword").is_none());

    let (status, _) = send(
        &app.router,
        Request::builder()
            .uri("/api/users/me")
            .header("authorisation", session)
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_register_validation_and_conflict() {
    let app = app().await;

    let (status, body) = send(
        &app.router,
        post_json(
            "/api/authentication/register",
            json!({ "email": "bad", "password": "weak" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");
    assert!(body["error"].as_str().unwrap().contains("Invalid email format"));

    let (status, _) = send(
        &app.router,
        post_json("/api/authentication/register", registration("twice@example.fr")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        &app.router,
        post_json("/api/authentication/register", registration("twice@example.fr")),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Email already exists");
}

#[tokio::test]
async fn test_concurrent_duplicate_registrations_conflict() {
    let app = app().await;

    let (first, second) = tokio::join!(
        send(&app.router, post_json("/api/authentication/register", registration("race@example.fr"))),
        send(&app.router, post_json("/api/authentication/register", registration("race@example.fr"))),
    );

    let mut statuses = [first.0, second.0];
    statuses.sort();
    assert_eq!(statuses, [StatusCode::CREATED, StatusCode::CONFLICT]);
}

#[tokio::test]
async fn test_malformed_json_is_a_bad_request() {
    let app = app().await;
    let request = Request::builder()
        .method("POST")
        .uri("/api/authentication/authenticate")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let (status, body) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "input_error");
}

#[tokio::test]
async fn test_activation_token_errors() {
    let app = app().await;

    let (status, body) = send(&app.router, get("/api/authentication/activate")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Token is required");

    let (status, body) = send(&app.router, get("/api/authentication/activate?token=abc.def.ghi")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid or expired token");
}

#[tokio::test]
async fn test_unknown_credentials() {
    let app = app().await;
    let (status, body) = send(
        &app.router,
        post_json(
            "/api/authentication/authenticate",
            json!({ "email": "ghost@example.fr", "password": "Whatever1!" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid credentials");
}

#[tokio::test]
async fn test_profile_requires_a_valid_token() {
    let app = app().await;

    let (status, body) = send(&app.router, get("/api/users/me")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Token is required");

    let (status, body) = send(
        &app.router,
        Request::builder()
            .uri("/api/users/me")
            .header("Authorization", "Bearer forged.token.value")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid token");
}

#[tokio::test]
async fn test_request_id_is_propagated() {
    let app = app().await;
    let response = app
        .router
        .clone()
        .oneshot(get("/api/health"))
        .await
        .unwrap();
    assert!(response.headers().contains_key("x-request-id"));
}
