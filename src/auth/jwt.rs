use std::time::Duration;

use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;

use crate::{
    auth::{claims::Claims, dto::TokenResponse, repo_types::Applications},
    config::JwtConfig,
    state::AppState,
};

pub const TOKEN_TYPE: &str = "bearer";

/// Signing material and token lifetime, derived from config once per request.
#[derive(Clone)]
pub struct TokenIssuer {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub algorithm: Algorithm,
    pub ttl: Duration,
}

impl From<&JwtConfig> for TokenIssuer {
    fn from(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            algorithm: cfg.algorithm,
            ttl: Duration::from_secs((cfg.ttl_minutes.max(0) as u64).saturating_mul(60)),
        }
    }
}

impl FromRef<AppState> for TokenIssuer {
    fn from_ref(state: &AppState) -> Self {
        Self::from(&state.config.jwt)
    }
}

impl TokenIssuer {
    /// Builds `{sub, applications, exp}` and signs it. `ttl` falls back to the
    /// configured lifetime.
    pub fn issue(
        &self,
        sub: &str,
        applications: &Applications,
        ttl: Option<Duration>,
    ) -> anyhow::Result<TokenResponse> {
        let ttl = ttl.unwrap_or(self.ttl);
        let exp = i64::try_from(ttl.as_secs())
            .ok()
            .and_then(|secs| OffsetDateTime::now_utc().checked_add(TimeDuration::seconds(secs)))
            .ok_or_else(|| anyhow::anyhow!("token ttl of {}s is out of range", ttl.as_secs()))?;
        let claims = Claims {
            sub: sub.to_string(),
            applications: applications.clone(),
            exp: exp.unix_timestamp() as usize,
        };
        let access_token = self.sign(&claims)?;
        debug!(sub = %sub, exp = claims.exp, "jwt signed");
        Ok(TokenResponse {
            access_token,
            token_type: TOKEN_TYPE.to_string(),
        })
    }

    pub(crate) fn sign(&self, claims: &Claims) -> anyhow::Result<String> {
        Ok(encode(&Header::new(self.algorithm), claims, &self.encoding)?)
    }

    /// Decodes a token signed by this issuer; expired tokens are rejected.
    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let validation = Validation::new(self.algorithm);
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        debug!(sub = %data.claims.sub, "jwt verified");
        Ok(data.claims)
    }
}
