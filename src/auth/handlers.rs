use axum::{
    extract::{FromRef, State},
    routing::post,
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{
        dto::{GoogleLoginRequest, LoginRequest, PublicUser, RegisterRequest, TokenResponse},
        errors::AuthError,
        extractors::ApiKey,
        jwt::TokenIssuer,
        services::{self, Identity},
    },
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/login/google", post(login_google))
}

#[instrument(skip_all, fields(email = %payload.email))]
pub async fn register(
    State(state): State<AppState>,
    _key: ApiKey,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<PublicUser>, AuthError> {
    let user = services::register(&state.db, &payload).await?;
    let applications = user.applications()?;
    Ok(Json(PublicUser {
        id: user.id,
        email: user.email,
        applications,
    }))
}

#[instrument(skip_all, fields(email = %payload.email))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, AuthError> {
    let identity = services::authenticate(&state.db, &payload.email, &payload.password).await?;
    issue_for(&state, identity)
}

#[instrument(skip_all, fields(email = %payload.email))]
pub async fn login_google(
    State(state): State<AppState>,
    Json(payload): Json<GoogleLoginRequest>,
) -> Result<Json<TokenResponse>, AuthError> {
    let identity = services::resolve_google_identity(
        &state.db,
        &payload.google_id,
        &payload.email,
        &payload.name,
    )
    .await?;
    issue_for(&state, identity)
}

fn issue_for(state: &AppState, identity: Identity) -> Result<Json<TokenResponse>, AuthError> {
    let issuer = TokenIssuer::from_ref(state);
    let token = issuer.issue(&identity.user.email, &identity.applications, None)?;
    Ok(Json(token))
}
