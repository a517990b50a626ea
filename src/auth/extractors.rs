use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use tracing::warn;

use super::errors::AuthError;
use crate::state::AppState;

pub const API_KEY_HEADER: &str = "x-api-key";

/// Compares a presented key with the configured one without short-circuiting
/// on the first differing byte.
pub fn check_api_key(presented: &str, expected: &str) -> Result<(), AuthError> {
    if constant_time_eq(presented.as_bytes(), expected.as_bytes()) {
        Ok(())
    } else {
        Err(AuthError::Forbidden)
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Guard for routes that require the shared `X-API-Key`. A missing header is
/// rejected the same way as a wrong one.
pub struct ApiKey;

#[async_trait]
impl FromRequestParts<AppState> for ApiKey {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let presented = parts
            .headers
            .get(API_KEY_HEADER)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| {
                warn!("missing api key header");
                AuthError::Forbidden
            })?;

        check_api_key(presented, &state.config.api_key).map_err(|e| {
            warn!("api key mismatch");
            e
        })?;

        Ok(ApiKey)
    }
}
