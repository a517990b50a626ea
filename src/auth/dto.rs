use serde::{Deserialize, Serialize};

use super::repo_types::Applications;

/// Request body for user registration.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub applications: Applications,
}

/// Request body for password login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Request body for login with an identity already asserted by Google.
#[derive(Debug, Deserialize)]
pub struct GoogleLoginRequest {
    #[serde(rename = "googleId")]
    pub google_id: String,
    pub email: String,
    pub name: String,
}

/// Token envelope returned by both login paths.
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

/// Public part of the user returned after registration.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: i64,
    pub email: String,
    pub applications: Applications,
}
