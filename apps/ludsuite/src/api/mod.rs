//! # LUD Suite HTTP API Module
//!
//! This module implements the HTTP REST API server using axum.
//!
//! Every endpoint except `/health` acts on behalf of the user named in the
//! `X-Requester-Id` header and is authorized by `ludsuite-core`.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /me/redirect`, `GET /me/dashboard` - Post-login routing and landing data
//! - `POST /users`, `DELETE /users/{id}` - Account management (admin)
//! - `GET|POST /mentees`, `GET|PUT /mentees/{id}`, `GET /mentees/{id}/access`
//! - `GET /mentors/{id}/assignments`, `GET /mentors/{id}/activities`
//! - `POST /assignments`, `POST /assignments/{id}/{deactivate,reactivate,end}`
//! - `GET|PUT /endorsers/{id}/mentors`, `POST|DELETE /endorsers/{id}/mentors/{mentor_id}`
//! - `GET|POST /activities`, `GET /activities/{id}`, `PUT /activities/{id}/feedback`
//! - `GET|POST /mentors/{id}/work-schedule`, `PUT|DELETE /work-schedule/{id}`
//! - `GET|POST /mentees/{id}/{objectives,year-plan,assessments}`
//! - `PUT /{objectives,year-plan,assessments}/{id}` and `.../{id}/feedback`
//! - `GET|POST /notifications`
//!
//! ## Security Configuration
//!
//! See [`crate::config::SecurityConfig`]. Every setting can come from the
//! `[security]` table or from `LUDSUITE_API_KEY`, `LUDSUITE_RATE_LIMIT` and
//! `LUDSUITE_CORS_ORIGINS`.

mod auth;
mod handlers;
mod middleware;
mod types;

// Re-exports for external use
pub use auth::{ApiKey, CurrentUser, REQUESTER_HEADER};
pub use handlers::ApiError;
pub use middleware::{GlobalRateLimiter, create_rate_limiter};
pub use types::{
    AccessResponse, CreateUserRequest, CreatedUserResponse, DeleteResponse, EndAssignmentRequest,
    ErrorResponse, FeedbackRequest, HealthResponse, MentorSetRequest, MentorSetResponse,
    RedirectResponse, UpdateMenteeRequest,
};

use crate::config::{CORS_ORIGINS_ENV, SecurityConfig};
use axum::{
    Router,
    http::{HeaderName, HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{delete, get, post, put},
};
use chrono::{NaiveDate, Utc};
use ludsuite_core::{Directory, LudError};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Maximum request body size (2 MiB).
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state containing the registry.
#[derive(Clone)]
pub struct AppState {
    /// Predicates and listings take the read lock; each mutation takes the
    /// write lock for its whole unit of work.
    pub directory: Arc<RwLock<Directory>>,
    /// Fixed date for access decisions; `None` uses the UTC calendar date.
    pub fixed_today: Option<NaiveDate>,
}

impl AppState {
    /// Create new app state around a directory.
    #[must_use]
    pub fn new(directory: Directory) -> Self {
        Self {
            directory: Arc::new(RwLock::new(directory)),
            fixed_today: None,
        }
    }

    /// Pin "today" to a fixed date. Used by tests and replays.
    #[must_use]
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.fixed_today = Some(today);
        self
    }

    /// The date access decisions are evaluated on.
    #[must_use]
    pub fn today(&self) -> NaiveDate {
        self.fixed_today
            .unwrap_or_else(|| Utc::now().date_naive())
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

fn allowed_headers() -> [HeaderName; 3] {
    [
        header::CONTENT_TYPE,
        header::AUTHORIZATION,
        HeaderName::from_static(REQUESTER_HEADER),
    ]
}

const ALLOWED_METHODS: [Method; 5] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::DELETE,
    Method::OPTIONS,
];

/// Build CORS layer from configuration.
///
/// - `"*"`: allows all origins (development only)
/// - unset: localhost only
/// - otherwise: comma-separated list of allowed origins
fn build_cors_layer(origins: Option<&str>) -> CorsLayer {
    match origins {
        Some("*") => {
            tracing::warn!(
                "CORS: Allowing ALL origins ({}=*). This is insecure for production!",
                CORS_ORIGINS_ENV
            );
            CorsLayer::permissive()
        }
        Some(origins) => {
            let allowed_origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|s| {
                    let trimmed = s.trim();
                    match trimmed.parse::<HeaderValue>() {
                        Ok(hv) => {
                            tracing::info!("CORS: Allowing origin: {}", trimmed);
                            Some(hv)
                        }
                        Err(e) => {
                            tracing::warn!("CORS: Invalid origin '{}': {}", trimmed, e);
                            None
                        }
                    }
                })
                .collect();

            if allowed_origins.is_empty() {
                tracing::warn!("CORS: No valid origins configured, defaulting to localhost only");
                build_localhost_cors()
            } else {
                CorsLayer::new()
                    .allow_origin(allowed_origins)
                    .allow_methods(ALLOWED_METHODS)
                    .allow_headers(allowed_headers())
            }
        }
        None => {
            tracing::info!("CORS: No origins configured, defaulting to localhost only");
            build_localhost_cors()
        }
    }
}

/// Build a restrictive CORS layer that only allows localhost origins.
fn build_localhost_cors() -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        "http://localhost:3000",
        "http://localhost:8080",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:8080",
    ]
    .into_iter()
    .filter_map(|o| o.parse::<HeaderValue>().ok())
    .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(ALLOWED_METHODS)
        .allow_headers(allowed_headers())
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the router with security settings taken from the environment.
pub fn create_router(state: AppState) -> Router {
    create_router_with(state, &SecurityConfig::from_env())
}

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner):
/// 1. Tracing - logs all requests
/// 2. CORS - handles preflight requests
/// 3. Rate Limiting - protects against DoS (if enabled)
/// 4. Authentication - validates API key (if configured)
pub fn create_router_with(state: AppState, security: &SecurityConfig) -> Router {
    let cors = build_cors_layer(security.cors_origins.as_deref());

    let rate_limiter = if security.rate_limit > 0 {
        tracing::info!(
            "Rate limiting enabled: {} requests/second",
            security.rate_limit
        );
        Some(create_rate_limiter(security.rate_limit))
    } else {
        tracing::info!("Rate limiting disabled");
        None
    };

    let api_key = security.api_key.as_deref().filter(|k| !k.is_empty());
    if api_key.is_some() {
        tracing::info!("API key authentication enabled");
    } else {
        tracing::warn!(
            "API key authentication DISABLED - endpoints only check X-Requester-Id. \
             Set LUDSUITE_API_KEY to require a deployment key."
        );
    }

    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        // Identity
        .route("/me/redirect", get(handlers::redirect_handler))
        .route("/me/dashboard", get(handlers::dashboard_handler))
        .route("/users", post(handlers::create_user_handler))
        .route("/users/{id}", delete(handlers::delete_user_handler))
        // Mentees & access
        .route(
            "/mentees",
            get(handlers::list_mentees_handler).post(handlers::create_mentee_handler),
        )
        .route(
            "/mentees/{id}",
            get(handlers::get_mentee_handler).put(handlers::update_mentee_handler),
        )
        .route("/mentees/{id}/access", get(handlers::access_handler))
        // Assignments
        .route(
            "/mentors/{id}/assignments",
            get(handlers::mentor_assignments_handler),
        )
        .route("/assignments", post(handlers::create_assignment_handler))
        .route(
            "/assignments/{id}/deactivate",
            post(handlers::deactivate_assignment_handler),
        )
        .route(
            "/assignments/{id}/reactivate",
            post(handlers::reactivate_assignment_handler),
        )
        .route("/assignments/{id}/end", post(handlers::end_assignment_handler))
        // Endorser linkage
        .route(
            "/endorsers/{id}/mentors",
            get(handlers::linked_mentors_handler).put(handlers::set_mentors_handler),
        )
        .route(
            "/endorsers/{id}/mentors/{mentor_id}",
            post(handlers::add_mentor_handler).delete(handlers::remove_mentor_handler),
        )
        // Activities
        .route(
            "/activities",
            get(handlers::my_activities_handler).post(handlers::log_activity_handler),
        )
        .route(
            "/mentors/{id}/activities",
            get(handlers::mentor_activities_handler),
        )
        .route("/activities/{id}", get(handlers::get_activity_handler))
        .route(
            "/activities/{id}/feedback",
            put(handlers::activity_feedback_handler),
        )
        // Work schedule
        .route(
            "/mentors/{id}/work-schedule",
            get(handlers::work_schedule_handler).post(handlers::add_work_item_handler),
        )
        .route(
            "/work-schedule/{id}",
            put(handlers::update_work_item_handler).delete(handlers::delete_work_item_handler),
        )
        // Mentee-owned records
        .route(
            "/mentees/{id}/objectives",
            get(handlers::list_objectives_handler).post(handlers::add_objective_handler),
        )
        .route("/objectives/{id}", put(handlers::update_objective_handler))
        .route(
            "/objectives/{id}/feedback",
            put(handlers::objective_feedback_handler),
        )
        .route(
            "/mentees/{id}/year-plan",
            get(handlers::list_year_plan_handler).post(handlers::add_year_plan_handler),
        )
        .route("/year-plan/{id}", put(handlers::update_year_plan_handler))
        .route(
            "/year-plan/{id}/feedback",
            put(handlers::year_plan_feedback_handler),
        )
        .route(
            "/mentees/{id}/assessments",
            get(handlers::list_assessments_handler).post(handlers::add_assessment_handler),
        )
        .route("/assessments/{id}", put(handlers::update_assessment_handler))
        .route(
            "/assessments/{id}/feedback",
            put(handlers::assessment_feedback_handler),
        )
        // Notifications
        .route(
            "/notifications",
            get(handlers::inbox_handler).post(handlers::broadcast_handler),
        );

    // Apply authentication middleware (innermost - runs last on request)
    if let Some(key) = api_key {
        router = router.layer(axum_middleware::from_fn_with_state(
            ApiKey(Arc::from(key)),
            auth::api_key_auth_middleware,
        ));
    }

    if let Some(limiter) = rate_limiter {
        router = router.layer(axum_middleware::from_fn_with_state(
            limiter,
            middleware::rate_limit_middleware,
        ));
    }

    // Apply body limit, CORS and tracing (outermost layers)
    router
        .layer(axum::extract::DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Start the HTTP server.
pub async fn run_server(
    addr: &str,
    directory: Directory,
    security: &SecurityConfig,
) -> Result<(), LudError> {
    let state = AppState::new(directory);
    let router = create_router_with(state, security);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| LudError::IoError(format!("Bind failed: {}", e)))?;

    tracing::info!("LUD Suite HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| LudError::IoError(format!("Server error: {}", e)))
}

/// Resolve on Ctrl+C so in-flight requests finish before exit.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn router() -> Router {
        let security = SecurityConfig {
            rate_limit: 0,
            ..SecurityConfig::default()
        };
        create_router_with(AppState::new(Directory::new()), &security)
    }

    #[tokio::test]
    async fn health_needs_no_requester() {
        let response = router()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn localhost_preflight_allows_requester_header() {
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/mentees")
            .header(header::ORIGIN, "http://localhost:3000")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
            .header(header::ACCESS_CONTROL_REQUEST_HEADERS, REQUESTER_HEADER)
            .body(Body::empty())
            .unwrap();

        let response = router().oneshot(request).await.unwrap();

        assert_eq!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .unwrap(),
            "http://localhost:3000"
        );
    }

    #[tokio::test]
    async fn foreign_origin_is_not_echoed() {
        let request = Request::get("/health")
            .header(header::ORIGIN, "https://evil.example")
            .body(Body::empty())
            .unwrap();

        let response = router().oneshot(request).await.unwrap();

        assert!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .is_none()
        );
    }

    #[test]
    fn fixed_today_overrides_clock() {
        let day = NaiveDate::from_ymd_opt(2024, 7, 1).unwrap();
        let state = AppState::new(Directory::new()).with_today(day);
        assert_eq!(state.today(), day);
    }
}
