//! HTTP routes for the API.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                      - Liveness
//! GET  /health/ready                - Readiness (database ping)
//!
//! Under the configured prefix (default /api):
//!
//! # Auth
//! POST /auth/register               - Create account (strict rate limit)
//! POST /auth/login                  - Login (strict rate limit)
//! POST /auth/refresh                - Refresh tokens
//! GET  /auth/profile                - Current user
//! PUT  /auth/profile                - Update profile
//! POST /auth/change-password        - Change password
//! POST /auth/logout                 - Logout
//!
//! # Catalog
//! GET  /products                    - Product search
//! GET  /products/{id}               - Product detail
//! POST /products                    - Create (seller/admin)
//! PUT  /products/{id}               - Update (owner/admin)
//! DELETE /products/{id}             - Delete or deactivate (owner/admin)
//! GET  /categories                  - Category listing
//! GET  /categories/{id}             - Category detail
//! POST /categories                  - Create (admin)
//! PUT  /categories/{id}             - Update (admin)
//! DELETE /categories/{id}           - Delete (admin)
//!
//! # Orders
//! GET  /orders                      - Own orders
//! GET  /orders/{id}                 - Order detail
//! POST /orders                      - Place order
//! PUT  /orders/{id}/status          - Status update (seller/admin)
//! POST /orders/{id}/cancel          - Cancel
//!
//! # Payments
//! POST /payments/create-intent      - Create payment intent
//! POST /payments/confirm            - Confirm payment
//! POST /payments/webhook            - Stripe webhook (not rate limited)
//!
//! GET  /docs                        - Endpoint index
//! ```

pub mod auth;
pub mod categories;
pub mod docs;
pub mod health;
pub mod orders;
pub mod payments;
pub mod products;

use std::time::Duration;

use axum::{
    Router,
    http::{HeaderValue, Method, Request, Response, StatusCode, header},
    middleware::from_fn,
    routing::{get, post, put},
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::{DefaultOnResponse, OnResponse, TraceLayer},
};
use tracing::Span;

use crate::config::ApiConfig;
use crate::middleware::{
    api_rate_limiter, auth_rate_limiter, request_id_middleware, security_headers_middleware,
    security_headers_with_hsts,
};
use crate::response::ApiResponse;
use crate::state::AppState;

/// Login and registration, behind the strict limiter.
fn credential_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .layer(auth_rate_limiter())
}

fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/refresh", post(auth::refresh))
        .route("/profile", get(auth::profile).put(auth::update_profile))
        .route("/change-password", post(auth::change_password))
        .route("/logout", post(auth::logout))
}

fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index).post(products::create))
        .route(
            "/{id}",
            get(products::show)
                .put(products::update)
                .delete(products::destroy),
        )
}

fn category_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(categories::index).post(categories::create))
        .route(
            "/{id}",
            get(categories::show)
                .put(categories::update)
                .delete(categories::destroy),
        )
}

fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index).post(orders::create))
        .route("/{id}", get(orders::show))
        .route("/{id}/status", put(orders::update_status))
        .route("/{id}/cancel", post(orders::cancel))
}

fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/create-intent", post(payments::create_intent))
        .route("/confirm", post(payments::confirm))
}

/// Everything served under the API prefix.
pub fn api_routes() -> Router<AppState> {
    let limited = Router::new()
        .nest("/auth", account_routes())
        .nest("/products", product_routes())
        .nest("/categories", category_routes())
        .nest("/orders", order_routes())
        .nest("/payments", payment_routes())
        .route("/docs", get(docs::index))
        .layer(api_rate_limiter());

    Router::new()
        .merge(credential_routes())
        .merge(limited)
        .route("/payments/webhook", post(payments::webhook))
}

fn cors_layer(config: &ApiConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(Duration::from_secs(600))
}

async fn not_found() -> ApiResponse<()> {
    ApiResponse::failure(StatusCode::NOT_FOUND, "Route not found", None)
}

/// Build the full application router with its middleware stack.
pub fn router(state: AppState) -> Router {
    let config = state.config();
    let prefix = config.api_prefix.as_str();

    let app = Router::new()
        .route("/health", get(health::live))
        .route("/health/ready", get(health::ready));

    // axum refuses to nest at the root
    let app = if prefix.is_empty() {
        app.merge(api_routes())
    } else {
        app.nest(prefix, api_routes())
    };

    let app = app.fallback(not_found);

    let app = if config.environment.is_production() {
        app.layer(from_fn(security_headers_with_hsts))
    } else {
        app.layer(from_fn(security_headers_middleware))
    };

    app.layer(cors_layer(config))
        .layer(from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(|response: &Response<_>, latency: Duration, span: &Span| {
                    span.record("status", response.status().as_u16());
                    span.record(
                        "latency_ms",
                        u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                    );
                    DefaultOnResponse::default().on_response(response, latency, span);
                }),
        )
        .with_state(state)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::{Body, to_bytes};
    use serde_json::{Value, json};
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    use super::*;
    use crate::config::tests::test_config;

    fn app() -> Router {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/tradewind_unused")
            .unwrap();
        router(AppState::new(test_config(), pool))
    }

    async fn send(request: Request<Body>) -> (StatusCode, Value) {
        let response = app().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_health_outside_prefix() {
        let (status, body) = send(get_request("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["status"], "ok");
    }

    #[tokio::test]
    async fn test_unknown_route_is_json_404() {
        let (status, body) = send(get_request("/api/nope")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(
            body,
            json!({ "success": false, "message": "Route not found" })
        );
    }

    #[tokio::test]
    async fn test_profile_requires_token() {
        let (status, body) = send(get_request("/api/auth/profile")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Access token required");
    }

    #[tokio::test]
    async fn test_garbage_token_rejected() {
        let request = Request::builder()
            .uri("/api/orders")
            .header(header::AUTHORIZATION, "Bearer not-a-jwt")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Invalid token");
    }

    #[tokio::test]
    async fn test_non_uuid_id_is_field_error() {
        let (status, body) = send(get_request("/api/products/not-a-uuid")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"][0]["field"], "id");
        assert_eq!(body["errors"][0]["message"], "Invalid ID format");
    }

    #[tokio::test]
    async fn test_webhook_without_signature_rejected() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/payments/webhook")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"id":"evt_1","type":"payment_intent.succeeded"}"#))
            .unwrap();
        let (status, body) = send(request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Invalid webhook signature");
    }

    #[tokio::test]
    async fn test_docs_lists_endpoints() {
        let (status, body) = send(get_request("/api/docs")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["basePath"], "/api");
        let endpoints = body["data"]["endpoints"].as_array().unwrap();
        assert_eq!(endpoints.len(), docs::ENDPOINTS.len());
        assert!(
            endpoints
                .iter()
                .any(|e| e["path"] == "/payments/webhook" && e["access"] == "signed")
        );
    }

    #[tokio::test]
    async fn test_responses_carry_request_id_and_security_headers() {
        let response = app().oneshot(get_request("/health")).await.unwrap();
        assert!(response.headers().contains_key("x-request-id"));
        assert_eq!(response.headers()["x-frame-options"], "DENY");
    }
}
