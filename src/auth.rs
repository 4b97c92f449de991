//! Admin authentication for the back-office endpoints.
//!
//! A single shared key in the `x-admin-key` header guards admin routes.
//! When no key is configured the admin surface is disabled outright
//! rather than left open.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::{errors::ServiceError, AppState};

pub const ADMIN_KEY_HEADER: &str = "x-admin-key";

/// Compares two byte strings without an early exit, so timing does not
/// reveal how much of a guessed key matched.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Layer for admin routes: rejects requests without a valid admin key.
pub async fn require_admin(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ServiceError> {
    let configured = state.config.admin_api_key.as_deref().ok_or_else(|| {
        warn!("Admin endpoint hit but no admin key is configured");
        ServiceError::Forbidden("admin access is not configured".to_string())
    })?;

    let presented = request
        .headers()
        .get(ADMIN_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            ServiceError::Unauthorized(format!("missing {} header", ADMIN_KEY_HEADER))
        })?;

    if !constant_time_eq(presented.as_bytes(), configured.as_bytes()) {
        warn!("Admin key rejected");
        return Err(ServiceError::Unauthorized("invalid admin key".to_string()));
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_keys_match() {
        assert!(constant_time_eq(b"sk_admin_123", b"sk_admin_123"));
    }

    #[test]
    fn different_keys_do_not_match() {
        assert!(!constant_time_eq(b"sk_admin_123", b"sk_admin_124"));
        assert!(!constant_time_eq(b"short", b"longer_key"));
        assert!(!constant_time_eq(b"", b"x"));
    }

    #[test]
    fn empty_keys_match_each_other() {
        // The config layer prevents an empty configured key from being
        // treated as enabled; this just pins the helper's behavior
        assert!(constant_time_eq(b"", b""));
    }
}
