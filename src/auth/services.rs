//! Identity resolution: turns a registration or a login attempt into a stored
//! user whose identity and roles can be put into a token.

use lazy_static::lazy_static;
use regex::Regex;
use sqlx::SqlitePool;
use tracing::{debug, error, info, warn};

use crate::auth::{
    dto::RegisterRequest,
    errors::AuthError,
    password::{hash_password, verify_against_dummy, verify_password},
    repo_types::{Applications, User},
};

/// A resolved account together with its decoded role mapping.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user: User,
    pub applications: Applications,
}

impl Identity {
    fn from_user(user: User) -> Result<Self, AuthError> {
        let applications = user.applications()?;
        Ok(Self { user, applications })
    }
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn ensure_valid_email(email: &str) -> Result<(), AuthError> {
    if is_valid_email(email) {
        Ok(())
    } else {
        warn!(email = %email, "invalid email");
        Err(AuthError::InvalidEmail)
    }
}

/// Creates a local account. Uniqueness of the email is left to the store's
/// constraint so concurrent registrations cannot both succeed.
pub async fn register(db: &SqlitePool, req: &RegisterRequest) -> Result<User, AuthError> {
    ensure_valid_email(&req.email)?;
    let hash = hash_password(&req.password)?;
    let user = User::create(db, &req.email, &hash, &req.applications).await?;
    info!(user_id = user.id, email = %user.email, "user registered");
    Ok(user)
}

/// Password login. Unknown email, missing hash and wrong password all yield
/// the same `Unauthorized`.
pub async fn authenticate(
    db: &SqlitePool,
    email: &str,
    password: &str,
) -> Result<Identity, AuthError> {
    ensure_valid_email(email)?;

    let Some(user) = User::find_by_email(db, email).await? else {
        verify_against_dummy(password);
        warn!(email = %email, "login unknown email");
        return Err(AuthError::Unauthorized);
    };

    let Some(hash) = user.hashed_password.as_deref() else {
        verify_against_dummy(password);
        warn!(user_id = user.id, "login on account without password");
        return Err(AuthError::Unauthorized);
    };

    let ok = match verify_password(password, hash) {
        Ok(v) => v,
        Err(e) => {
            error!(error = %e, user_id = user.id, "stored password hash unreadable");
            false
        }
    };
    if !ok {
        warn!(user_id = user.id, "login invalid password");
        return Err(AuthError::Unauthorized);
    }

    info!(user_id = user.id, "user logged in");
    Identity::from_user(user)
}

/// Login with an identity asserted by Google. Resolves an existing account by
/// email or Google id; unknown identities are rejected, never provisioned.
pub async fn resolve_google_identity(
    db: &SqlitePool,
    google_id: &str,
    email: &str,
    name: &str,
) -> Result<Identity, AuthError> {
    ensure_valid_email(email)?;
    debug!(name = %name, "google login attempt");

    let user = match User::find_by_email_or_google_id(db, email, google_id).await {
        Ok(u) => u,
        Err(AuthError::NotFound) => {
            warn!(email = %email, "google login for unknown account");
            return Err(AuthError::NotFound);
        }
        Err(e) => return Err(e),
    };

    info!(user_id = user.id, "user logged in with google");
    Identity::from_user(user)
}
