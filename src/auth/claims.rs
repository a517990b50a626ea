use serde::{Deserialize, Serialize};

use super::repo_types::Applications;

/// JWT payload issued on login.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub sub: String,                // user email
    pub applications: Applications, // app -> role
    pub exp: usize,                 // expires at (unix timestamp)
}
