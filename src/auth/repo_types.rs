use std::collections::BTreeMap;

use serde::Serialize;
use sqlx::FromRow;

use super::errors::AuthError;

/// Application name to role name, e.g. `{"app1": "admin"}`.
pub type Applications = BTreeMap<String, String>;

/// User record in the database.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub hashed_password: Option<String>, // absent for Google-only accounts
    pub google_id: Option<String>,
    pub is_google_account: bool,
    #[serde(skip_serializing)]
    pub applications: String, // JSON object text
}

impl User {
    /// Decodes the stored role mapping. Anything that is not a JSON object of
    /// strings is reported as corrupt rather than interpreted.
    pub fn applications(&self) -> Result<Applications, AuthError> {
        serde_json::from_str(&self.applications).map_err(|e| {
            AuthError::Integrity(format!("user {} has undecodable applications: {e}", self.id))
        })
    }
}

pub(crate) fn encode_applications(apps: &Applications) -> Result<String, AuthError> {
    serde_json::to_string(apps).map_err(|e| AuthError::Internal(e.into()))
}
