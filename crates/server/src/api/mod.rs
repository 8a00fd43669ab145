//! REST API layer built on Axum.
//!
//! Provides HTTP handlers for bootcamps, courses and accounts under
//! `/api/v1`. Includes middleware for JWT authentication, role checks, rate
//! limiting, request timeouts, body size limits, metrics collection, and
//! request ID tracing.

/// Structured audit logging (`target: "audit"`).
pub mod audit;
/// Password hashing and JWT session tokens.
pub mod auth;
/// API error types mapped to HTTP status codes.
pub mod errors;
/// HTTP request handlers and application state.
pub mod handlers;
/// Prometheus metrics recording and background collection.
pub mod metrics;
/// Request and response data transfer objects.
pub mod models;
/// Role-based access control with User/Publisher/Admin roles.
pub mod rbac;

use audit::{extract_client_ip, mask_email, AuditContext};
use auth::AuthUser;
use axum::error_handling::HandleErrorLayer;
use axum::extract::{DefaultBodyLimit, MatchedPath, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{middleware, Router};
use devcamper_core::config;
use devcamper_core::document::FieldValue;
use devcamper_core::model::{user, USERS};
use errors::ApiError;
use handlers::AppState;
use rbac::Role;
use std::time::{Duration, Instant};
use tower::buffer::BufferLayer;
use tower::limit::{ConcurrencyLimitLayer, RateLimitLayer};
use tower::timeout::TimeoutLayer;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::Instrument;

const NOT_AUTHORIZED: &str = "Not authorized to access this route";

async fn auth_middleware(
    State(state): State<AppState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> Result<axum::response::Response, ApiError> {
    let method = req.method().as_str().to_string();
    let path = req.uri().path().to_string();
    let Some(required) = rbac::required_role(&method, &path) else {
        return Ok(next.run(req).await);
    };

    let token = auth::token_from_headers(req.headers())
        .ok_or_else(|| ApiError::Unauthorized(NOT_AUTHORIZED.into()))?;
    let user_id = state.auth.verify_token(&token).map_err(|e| {
        tracing::debug!("Rejected token: {}", e);
        ApiError::Unauthorized(NOT_AUTHORIZED.into())
    })?;
    let account = state
        .db
        .collection(USERS)?
        .get(&user_id)
        .ok_or_else(|| ApiError::Unauthorized(NOT_AUTHORIZED.into()))?;

    let role = Role::from_name(user::role_of(&account));
    if role < required {
        return Err(ApiError::Forbidden(format!(
            "User role {} is not authorized to access this route",
            role.as_str()
        )));
    }

    let email = account
        .fields
        .get("email")
        .and_then(FieldValue::as_str)
        .unwrap_or_default()
        .to_string();
    let audit_ctx = AuditContext {
        actor: mask_email(&email),
        role: Some(role),
        client_ip: extract_client_ip(req.headers()),
    };
    req.extensions_mut().insert(AuthUser {
        id: account.id,
        email,
        role,
    });
    req.extensions_mut().insert(audit_ctx);
    Ok(next.run(req).await)
}

async fn request_id_middleware(
    req: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let request_id = uuid::Uuid::new_v4().to_string();
    let span = tracing::info_span!("request", request_id = %request_id);
    async move {
        let mut response = next.run(req).await;
        response.headers_mut().insert(
            axum::http::HeaderName::from_static("x-request-id"),
            axum::http::HeaderValue::from_str(&request_id)
                .expect("UUID v4 is always valid ASCII for header values"),
        );
        response
    }
    .instrument(span)
    .await
}

async fn security_headers_middleware(
    req: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();
    headers.insert(
        axum::http::HeaderName::from_static("x-content-type-options"),
        axum::http::HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        axum::http::HeaderName::from_static("x-frame-options"),
        axum::http::HeaderValue::from_static("DENY"),
    );
    headers.insert(
        axum::http::HeaderName::from_static("referrer-policy"),
        axum::http::HeaderValue::from_static("no-referrer"),
    );
    response
}

async fn metrics_middleware(
    req: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let method = req.method().to_string();
    // Route template, so ids do not explode label cardinality.
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());
    let start = Instant::now();
    let response = next.run(req).await;
    metrics::record_request(&method, &path, response.status().as_u16(), start.elapsed());
    response
}

/// Builds the Axum router with all routes and middleware layers.
///
/// The middleware stack (outermost to innermost):
/// Rate limiting → Concurrency limit → Timeout → Body limit → CORS → Trace →
/// Compression → Security headers → Request ID → Metrics → Auth.
pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        .route(
            "/bootcamps",
            get(handlers::get_bootcamps).post(handlers::create_bootcamp),
        )
        .route(
            "/bootcamps/radius/:zipcode/:distance",
            get(handlers::get_bootcamps_in_radius),
        )
        .route(
            "/bootcamps/:id",
            get(handlers::get_bootcamp)
                .put(handlers::update_bootcamp)
                .delete(handlers::delete_bootcamp),
        )
        .route("/bootcamps/:id/photo", put(handlers::upload_bootcamp_photo))
        .route(
            "/bootcamps/:id/courses",
            get(handlers::get_bootcamp_courses).post(handlers::add_course),
        )
        .route("/courses", get(handlers::get_courses))
        .route(
            "/courses/:id",
            get(handlers::get_course)
                .put(handlers::update_course)
                .delete(handlers::delete_course),
        )
        .route("/auth/register", post(handlers::register))
        .route("/auth/login", post(handlers::login))
        .route("/auth/me", get(handlers::get_me))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics_endpoint))
        .nest("/api/v1", api)
        .nest_service("/uploads", ServeDir::new(&state.uploads.dir))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(DefaultBodyLimit::max(config::MAX_REQUEST_BODY_BYTES))
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(|err: tower::BoxError| async move {
                    if err.is::<tower::timeout::error::Elapsed>() {
                        StatusCode::REQUEST_TIMEOUT
                    } else {
                        StatusCode::TOO_MANY_REQUESTS
                    }
                }))
                .layer(BufferLayer::new(1024))
                .layer(ConcurrencyLimitLayer::new(config::MAX_CONCURRENT_REQUESTS))
                .layer(RateLimitLayer::new(
                    config::RATE_LIMIT_RPS,
                    Duration::from_secs(1),
                ))
                .layer(TimeoutLayer::new(Duration::from_secs(
                    config::REQUEST_TIMEOUT_SECS,
                ))),
        )
        .with_state(state)
}
