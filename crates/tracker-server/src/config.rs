use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};

/// JWT secrets that are fine for local development and never for production.
pub const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

const DEV_SECRET: &str = "dev-secret-change-me";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Production,
    Development,
    Testing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    File(PathBuf),
    InMemory,
}

#[derive(Debug, Clone)]
pub struct AdminSeed {
    pub email: String,
    pub password: String,
    pub security_answer: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,
    pub database: DatabaseLocation,
    pub jwt_secret: String,
    pub host: String,
    pub port: u16,
    pub token_ttl: chrono::Duration,
    pub db_timeout: Duration,
    pub purge_interval: Duration,
    pub admin_seed: Option<AdminSeed>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key lookup, so tests need not touch the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let environment = match get("APP_CONFIG_NAME").as_deref() {
            None | Some("development") => Environment::Development,
            Some("production") => Environment::Production,
            Some("testing") => Environment::Testing,
            Some(other) => bail!("APP_CONFIG_NAME must be production, development or testing, got {:?}", other),
        };

        let database = match environment {
            Environment::Production => DatabaseLocation::File(
                get("TRACKER_DATABASE_URL")
                    .context("TRACKER_DATABASE_URL is required in production")?
                    .into(),
            ),
            Environment::Development => DatabaseLocation::File(
                get("TRACKER_DATABASE_URL")
                    .unwrap_or_else(|| "tracker.db".into())
                    .into(),
            ),
            Environment::Testing => DatabaseLocation::InMemory,
        };

        let jwt_secret = get("TRACKER_JWT_SECRET").unwrap_or_else(|| DEV_SECRET.into());
        if environment == Environment::Production && PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("TRACKER_JWT_SECRET is unset or still a placeholder");
        }

        let admin_seed = match (
            get("TRACKER_ADMIN_EMAIL"),
            get("TRACKER_ADMIN_PASSWORD"),
            get("TRACKER_ADMIN_ANSWER"),
        ) {
            (Some(email), Some(password), Some(security_answer)) => {
                if security_answer.trim().eq_ignore_ascii_case(password.trim()) {
                    bail!("TRACKER_ADMIN_ANSWER must differ from TRACKER_ADMIN_PASSWORD");
                }
                Some(AdminSeed { email, password, security_answer })
            }
            (None, None, None) => None,
            _ => bail!(
                "TRACKER_ADMIN_EMAIL, TRACKER_ADMIN_PASSWORD and TRACKER_ADMIN_ANSWER must be set together"
            ),
        };

        Ok(Self {
            environment,
            database,
            jwt_secret,
            host: get("TRACKER_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_or(&get, "TRACKER_PORT", 5000)?,
            token_ttl: chrono::Duration::minutes(parse_or(&get, "TRACKER_TOKEN_TTL_MINUTES", 60)?),
            db_timeout: Duration::from_millis(parse_or(&get, "TRACKER_DB_TIMEOUT_MS", 5000)?),
            purge_interval: Duration::from_secs(parse_or(&get, "TRACKER_PURGE_INTERVAL_SECS", 3600)?),
            admin_seed,
        })
    }

    pub fn uses_placeholder_secret(&self) -> bool {
        PLACEHOLDER_SECRETS.contains(&self.jwt_secret.as_str())
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value: {:?}", key, raw)),
        None => Ok(default),
    }
}
