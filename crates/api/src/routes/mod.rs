//! HTTP routes.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health/ready                 - Readiness (database reachable)
//! GET  /api/ping                     - Liveness
//!
//! # Accounts
//! POST /api/register                 - Create account, returns token
//! POST /api/login                    - Exchange credentials for a token
//! POST /api/handshake                - Validate a stored token
//! POST /api/users/edit               - Replace name, email and password
//! POST /api/users/delete             - Delete account and everything it owns
//!
//! # Schedules (token required for everything below)
//! POST /api/schedule/{query,create,edit,delete}
//! POST /api/scheduleDay/{query,create,edit,delete}
//! POST /api/scheduledCustomer/{query,create,edit,delete}
//! ```
//!
//! Query routes read straight from the pool. Everything that writes runs
//! inside a [`RequestScope`](crate::db::RequestScope).

pub mod health;
pub mod schedule_days;
pub mod scheduled_customers;
pub mod schedules;
pub mod users;

use std::any::Any;
use std::time::Duration;

use axum::{
    Router,
    http::HeaderValue,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any as AnyOrigin, CorsLayer},
    trace::{DefaultOnResponse, OnResponse, TraceLayer},
};
use tracing::Span;

use crate::error::AppError;
use crate::middleware::request_id_middleware;
use crate::state::AppState;

/// Account routes.
pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(users::register))
        .route("/login", post(users::login))
        .route("/handshake", post(users::handshake))
        .route("/users/edit", post(users::edit))
        .route("/users/delete", post(users::delete))
}

/// Schedule routes.
pub fn schedule_routes() -> Router<AppState> {
    Router::new()
        .route("/query", post(schedules::query))
        .route("/create", post(schedules::create))
        .route("/edit", post(schedules::edit))
        .route("/delete", post(schedules::delete))
}

/// Schedule day routes.
pub fn schedule_day_routes() -> Router<AppState> {
    Router::new()
        .route("/query", post(schedule_days::query))
        .route("/create", post(schedule_days::create))
        .route("/edit", post(schedule_days::edit))
        .route("/delete", post(schedule_days::delete))
}

/// Scheduled customer routes.
pub fn scheduled_customer_routes() -> Router<AppState> {
    Router::new()
        .route("/query", post(scheduled_customers::query))
        .route("/create", post(scheduled_customers::create))
        .route("/edit", post(scheduled_customers::edit))
        .route("/delete", post(scheduled_customers::delete))
}

/// Everything under `/api`.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/ping", get(health::ping))
        .merge(user_routes())
        .nest("/schedule", schedule_routes())
        .nest("/scheduleDay", schedule_day_routes())
        .nest("/scheduledCustomer", scheduled_customer_routes())
}

/// Build the complete application with its middleware stack.
pub fn router(state: AppState) -> Router {
    let cors = cors_layer(state.config().cors_allowed_origin.as_deref());

    Router::new()
        .route("/health/ready", get(health::readiness))
        .nest("/api", api_routes())
        .with_state(state)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(cors)
        .layer(middleware::from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>, latency: Duration, span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}

fn cors_layer(origin: Option<&str>) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(AnyOrigin).allow_headers(AnyOrigin);
    match origin.map(HeaderValue::from_str) {
        Some(Ok(origin)) => layer.allow_origin(origin),
        Some(Err(err)) => {
            tracing::warn!(error = %err, "invalid CORS_ALLOWED_ORIGIN; allowing any origin");
            layer.allow_origin(AnyOrigin)
        }
        None => layer.allow_origin(AnyOrigin),
    }
}

// Panics inside a unit of work are already handled by `RequestScope::run`;
// this covers extractors and anything else outside it.
#[allow(clippy::needless_pass_by_value)]
fn panic_response(_panic: Box<dyn Any + Send + 'static>) -> Response {
    AppError::Internal("handler panicked".to_owned()).into_response()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use prime_shine_core::UserId;
    use secrecy::SecretString;
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    use crate::config::ApiConfig;
    use crate::middleware::request_id::REQUEST_ID_HEADER;

    fn test_state() -> AppState {
        let config = ApiConfig {
            database_url: SecretString::from("postgres://localhost/prime_shine_test"),
            jwt_secret: SecretString::from("k8#Lq2!vX9@mN4$pR7&tW1*zB6^cF3%h"),
            host: "127.0.0.1".parse().unwrap(),
            port: 0,
            request_timeout: Duration::from_secs(5),
            cors_allowed_origin: None,
            sentry_dsn: None,
            sentry_environment: None,
            sentry_traces_sample_rate: 0.0,
        };
        // Never connects unless a handler actually touches the database
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/prime_shine_test")
            .unwrap();
        AppState::new(config, pool)
    }

    fn post_json(uri: &str, token: Option<&str>, body: &str) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::from(body.to_owned())).unwrap()
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_ping() {
        let app = router(test_state());
        let request = Request::builder()
            .uri("/api/ping")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
        assert_eq!(json_body(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_missing_token_is_unauthorized() {
        let app = router(test_state());

        let response = app
            .oneshot(post_json("/api/schedule/query", None, "{}"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            json_body(response).await["error"],
            "Missing authorization token"
        );
    }

    #[tokio::test]
    async fn test_blank_bearer_is_missing_token() {
        let app = router(test_state());

        let response = app
            .oneshot(post_json("/api/schedule/query", Some("  "), "{}"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            json_body(response).await["error"],
            "Missing authorization token"
        );
    }

    #[tokio::test]
    async fn test_invalid_token_is_unauthorized() {
        let app = router(test_state());

        let response = app
            .oneshot(post_json(
                "/api/scheduleDay/create",
                Some("not.a.token"),
                r#"{"scheduleID": 1, "dayOffset": 2}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let app = router(test_state());

        let response = app
            .oneshot(post_json("/api/login", None, "{not json"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(json_body(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn test_invalid_email_is_bad_request() {
        let app = router(test_state());

        let response = app
            .oneshot(post_json(
                "/api/login",
                None,
                r#"{"email": "no-at-sign", "password": "whatever123"}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_day_offset_out_of_range_is_bad_request() {
        let state = test_state();
        let token = state.tokens().issue(UserId::new(1)).unwrap();
        let app = router(state);

        let response = app
            .oneshot(post_json(
                "/api/scheduleDay/create",
                Some(&token),
                r#"{"scheduleID": 1, "dayOffset": 7}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(json_body(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn test_unknown_route_is_not_found() {
        let app = router(test_state());

        let response = app
            .oneshot(post_json("/api/schedules/query", None, "{}"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
