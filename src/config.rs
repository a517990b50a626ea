use std::str::FromStr;

use anyhow::{bail, Context};
use jsonwebtoken::Algorithm;
use serde::Deserialize;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://./data/auth.db";
pub const DEFAULT_TTL_MINUTES: i64 = 15;
/// One year.
pub const MAX_TTL_MINUTES: i64 = 60 * 24 * 365;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub algorithm: Algorithm,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    /// Shared secret expected in the `X-API-Key` header on registration.
    pub api_key: String,
    pub cors_origins: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> anyhow::Result<String> {
            match lookup(key) {
                Some(v) if !v.trim().is_empty() => Ok(v),
                _ => bail!("{key} must be set"),
            }
        };

        let database_url = lookup("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.into());

        let algorithm = match lookup("ALGORITHM") {
            Some(raw) => parse_algorithm(raw.trim())?,
            None => Algorithm::HS256,
        };

        let ttl_minutes = match lookup("ACCESS_TOKEN_EXPIRE_MINUTES") {
            Some(raw) => {
                let minutes = raw
                    .trim()
                    .parse::<i64>()
                    .with_context(|| format!("ACCESS_TOKEN_EXPIRE_MINUTES is not a number: {raw}"))?;
                if !(1..=MAX_TTL_MINUTES).contains(&minutes) {
                    bail!("ACCESS_TOKEN_EXPIRE_MINUTES must be between 1 and {MAX_TTL_MINUTES}");
                }
                minutes
            }
            None => DEFAULT_TTL_MINUTES,
        };

        let jwt = JwtConfig {
            secret: required("SECRET_KEY")?,
            algorithm,
            ttl_minutes,
        };

        let cors_origins = lookup("CORS_ORIGINS")
            .map(|raw| parse_origins(&raw))
            .unwrap_or_default();

        Ok(Self {
            database_url,
            jwt,
            api_key: required("API_KEY")?,
            cors_origins,
        })
    }
}

/// Tokens are signed with a shared secret, so only the HMAC family is accepted.
fn parse_algorithm(raw: &str) -> anyhow::Result<Algorithm> {
    let algorithm = Algorithm::from_str(raw)
        .map_err(|e| anyhow::anyhow!("unknown ALGORITHM {raw}: {e}"))?;
    match algorithm {
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => Ok(algorithm),
        other => bail!("ALGORITHM {other:?} needs an asymmetric key; use HS256, HS384 or HS512"),
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_optional_keys_missing() {
        let cfg = AppConfig::from_lookup(lookup_from(&[("SECRET_KEY", "s"), ("API_KEY", "k")]))
            .expect("config should load");
        assert_eq!(cfg.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(cfg.jwt.algorithm, Algorithm::HS256);
        assert_eq!(cfg.jwt.ttl_minutes, 15);
        assert!(cfg.cors_origins.is_empty());
    }

    #[test]
    fn reads_all_keys() {
        let cfg = AppConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("SECRET_KEY", "secret"),
            ("ALGORITHM", "HS512"),
            ("ACCESS_TOKEN_EXPIRE_MINUTES", "30"),
            ("API_KEY", "gate"),
            ("CORS_ORIGINS", "http://a.test, ,http://b.test"),
        ]))
        .expect("config should load");
        assert_eq!(cfg.database_url, "sqlite::memory:");
        assert_eq!(cfg.jwt.secret, "secret");
        assert_eq!(cfg.jwt.algorithm, Algorithm::HS512);
        assert_eq!(cfg.jwt.ttl_minutes, 30);
        assert_eq!(cfg.api_key, "gate");
        assert_eq!(cfg.cors_origins, vec!["http://a.test", "http://b.test"]);
    }

    #[test]
    fn missing_secret_is_an_error() {
        let err = AppConfig::from_lookup(lookup_from(&[("API_KEY", "k")])).unwrap_err();
        assert!(err.to_string().contains("SECRET_KEY"));
    }

    #[test]
    fn missing_api_key_is_an_error() {
        let err = AppConfig::from_lookup(lookup_from(&[("SECRET_KEY", "s")])).unwrap_err();
        assert!(err.to_string().contains("API_KEY"));
    }

    #[test]
    fn rejects_asymmetric_algorithm() {
        let err = AppConfig::from_lookup(lookup_from(&[
            ("SECRET_KEY", "s"),
            ("API_KEY", "k"),
            ("ALGORITHM", "RS256"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("HS256"));
    }

    #[test]
    fn accepts_ttl_up_to_one_year() {
        let cfg = AppConfig::from_lookup(lookup_from(&[
            ("SECRET_KEY", "s"),
            ("API_KEY", "k"),
            ("ACCESS_TOKEN_EXPIRE_MINUTES", "525600"),
        ]))
        .expect("one year is allowed");
        assert_eq!(cfg.jwt.ttl_minutes, MAX_TTL_MINUTES);
    }

    #[test]
    fn rejects_bad_ttl() {
        for raw in ["abc", "0", "-5", "525601", "1000000000000"] {
            let res = AppConfig::from_lookup(lookup_from(&[
                ("SECRET_KEY", "s"),
                ("API_KEY", "k"),
                ("ACCESS_TOKEN_EXPIRE_MINUTES", raw),
            ]));
            assert!(res.is_err(), "ttl {raw} should be rejected");
        }
    }
}
