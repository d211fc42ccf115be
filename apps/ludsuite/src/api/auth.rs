//! # Authentication Module
//!
//! Two independent checks guard the LUD Suite HTTP API:
//!
//! 1. **Deployment API key** (optional). When configured, every request
//!    except `/health` must carry it:
//!    ```text
//!    Authorization: Bearer <your-api-key>
//!    ```
//! 2. **Requester identity**. Endpoints that act on behalf of a user read
//!    the caller's user id from the `X-Requester-Id` header and resolve it
//!    to a [`Requester`] on every request. Nothing about the caller is
//!    cached between requests.

use super::AppState;
use super::handlers::ApiError;
use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{Request, StatusCode, header, request::Parts},
    middleware::Next,
    response::Response,
};
use ludsuite_core::{Requester, User, UserId};
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// Header carrying the caller's user id.
pub const REQUESTER_HEADER: &str = "x-requester-id";

// =============================================================================
// API KEY AUTHENTICATION
// =============================================================================

/// The configured deployment key.
#[derive(Clone)]
pub struct ApiKey(pub Arc<str>);

/// Compare two keys in constant time.
///
/// Both keys are padded to the same length so `ct_eq` always runs over the
/// same number of bytes.
fn keys_match(provided: &str, expected: &str) -> bool {
    let provided_bytes = provided.as_bytes();
    let expected_bytes = expected.as_bytes();

    let max_len = provided_bytes.len().max(expected_bytes.len());
    let mut padded_provided = vec![0u8; max_len];
    let mut padded_expected = vec![0u8; max_len];
    padded_provided[..provided_bytes.len()].copy_from_slice(provided_bytes);
    padded_expected[..expected_bytes.len()].copy_from_slice(expected_bytes);

    let bytes_match: bool = padded_provided.ct_eq(&padded_expected).into();
    bytes_match && provided_bytes.len() == expected_bytes.len()
}

/// API key authentication middleware.
///
/// - `/health` is always allowed (for load balancer health checks)
/// - All other endpoints require `Authorization: Bearer <key>`
pub async fn api_key_auth_middleware(
    State(expected): State<ApiKey>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, (StatusCode, &'static str)> {
    if request.uri().path() == "/health" {
        return Ok(next.run(request).await);
    }

    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    match auth_header {
        Some(header_value) => {
            // Support both "Bearer <key>" and raw "<key>" formats
            let provided_key = header_value.strip_prefix("Bearer ").unwrap_or(header_value);

            if keys_match(provided_key, &expected.0) {
                Ok(next.run(request).await)
            } else {
                tracing::warn!(
                    event = "auth_failure",
                    reason = "invalid_api_key",
                    "Authentication failed: invalid API key"
                );
                Err((StatusCode::UNAUTHORIZED, "Unauthorized"))
            }
        }
        None => {
            tracing::warn!(
                event = "auth_failure",
                reason = "missing_authorization_header",
                "Missing Authorization header"
            );
            Err((StatusCode::UNAUTHORIZED, "Unauthorized"))
        }
    }
}

// =============================================================================
// REQUESTER EXTRACTION
// =============================================================================

/// The resolved caller of a request.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    pub requester: Requester,
}

fn parse_requester_id(parts: &Parts) -> Option<UserId> {
    parts
        .headers
        .get(REQUESTER_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(UserId)
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(id) = parse_requester_id(parts) else {
            tracing::debug!(event = "requester_missing", "No usable X-Requester-Id header");
            return Err(ApiError::NotLoggedIn);
        };

        let directory = state.directory.read().await;
        match directory.user(id)? {
            Some(user) if user.is_active => Ok(Self {
                requester: Requester::from_user(&user),
                user,
            }),
            _ => {
                tracing::warn!(
                    event = "requester_unknown",
                    requester = id.0,
                    "Requester id does not match an active user"
                );
                Err(ApiError::NotLoggedIn)
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
