use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;

use crate::auth::jwt::MAX_TTL_SECONDS;

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_seconds: i64,
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    /// HTTP relay endpoint; delivery is disabled when unset.
    pub api_url: Option<String>,
    pub api_token: Option<String>,
    pub from: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt: JwtConfig,
    pub mail: MailConfig,
    pub directory_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "useradmin".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "useradmin-api".into()),
            ttl_seconds: parse_env("JWT_TTL_SECONDS", 3600)?,
        };
        jwt.check()?;

        let mail = MailConfig {
            api_url: std::env::var("MAIL_API_URL").ok().filter(|v| !v.is_empty()),
            api_token: std::env::var("MAIL_API_TOKEN").ok().filter(|v| !v.is_empty()),
            from: std::env::var("MAIL_FROM").unwrap_or_else(|_| "no-reply@useradmin.local".into()),
        };

        let directory_timeout = Duration::from_millis(parse_env("DIRECTORY_TIMEOUT_MS", 5000)?);

        Ok(Self {
            database_url,
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: parse_env("APP_PORT", 8080)?,
            jwt,
            mail,
            directory_timeout,
        })
    }

    pub fn listen_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }
}

impl JwtConfig {
    fn check(&self) -> anyhow::Result<()> {
        anyhow::ensure!(!self.secret.trim().is_empty(), "JWT_SECRET must not be empty");
        anyhow::ensure!(
            (1..=MAX_TTL_SECONDS).contains(&self.ttl_seconds),
            "JWT_TTL_SECONDS must be between 1 and {MAX_TTL_SECONDS}, got {}",
            self.ttl_seconds
        );
        Ok(())
    }
}

/// Default when unset; an unparsable value is an error, not a silent fallback.
fn parse_env<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    parse_value(key, std::env::var(key).ok(), default)
}

fn parse_value<T>(key: &str, raw: Option<String>, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(v) => v
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{key}={v:?} is invalid: {e}")),
    }
}
