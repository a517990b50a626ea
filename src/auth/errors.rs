//! Failure taxonomy for registration and login.
//!
//! Every variant maps to a fixed status code and a fixed `{"detail": ...}`
//! body. Internal causes are logged here and never sent to the caller.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid api key")]
    Forbidden,
    #[error("email already registered")]
    Conflict,
    #[error("invalid credentials")]
    Unauthorized,
    #[error("user not found")]
    NotFound,
    #[error("invalid email")]
    InvalidEmail,
    #[error("integrity error: {0}")]
    Integrity(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub detail: &'static str,
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::Forbidden => StatusCode::FORBIDDEN,
            AuthError::Conflict => StatusCode::BAD_REQUEST,
            AuthError::Unauthorized => StatusCode::UNAUTHORIZED,
            AuthError::NotFound => StatusCode::NOT_FOUND,
            AuthError::InvalidEmail => StatusCode::UNPROCESSABLE_ENTITY,
            AuthError::Integrity(_) | AuthError::Database(_) | AuthError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn detail(&self) -> &'static str {
        match self {
            AuthError::Forbidden => "Invalid API Key",
            AuthError::Conflict => "Email already registered",
            AuthError::Unauthorized => "Invalid credentials",
            AuthError::NotFound => "User not found",
            AuthError::InvalidEmail => "Invalid email",
            AuthError::Integrity(_) => "Account data integrity error",
            AuthError::Database(_) | AuthError::Internal(_) => "Internal server error",
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        (status, Json(ErrorBody { detail: self.detail() })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_map_to_fixed_statuses() {
        assert_eq!(AuthError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(AuthError::Conflict.status(), StatusCode::BAD_REQUEST);
        assert_eq!(AuthError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(AuthError::InvalidEmail.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn internal_details_are_not_exposed() {
        let err = AuthError::Integrity("2 rows for a@x.com".into());
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.detail().contains("a@x.com"));

        let err = AuthError::from(anyhow::anyhow!("argon2 exploded"));
        assert_eq!(err.detail(), "Internal server error");
    }

    #[tokio::test]
    async fn response_body_carries_detail() {
        let res = AuthError::Conflict.into_response();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["detail"], "Email already registered");
    }
}
