use std::env;
use std::str::FromStr;

use anyhow::{Context, bail};
use dotenvy::dotenv;

#[derive(Clone, Debug)]
pub struct Config {
    pub server_addr: String,
    /// `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub access_token_ttl: usize,
    pub refresh_token_ttl: usize,

    // Rate limiting
    pub rate_login_per_min: u32,
    pub rate_register_per_min: u32,
    pub rate_refresh_per_min: u32,
    pub rate_protected_per_min: u32,

    pub api_prefix: String,

    pub log_level: String,
    pub log_dir: String,
}

fn var_or<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{name} has an invalid value: {raw:?}")),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok();

        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
        if jwt_secret.len() < 16 {
            bail!("JWT_SECRET must be at least 16 characters");
        }

        let api_prefix = env::var("API_PREFIX").unwrap_or_default();
        let api_prefix = api_prefix.trim_end_matches('/').to_string();

        Ok(Self {
            server_addr: env::var("SERVER_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string()),
            database_url: env::var("DATABASE_URL").ok().filter(|url| !url.trim().is_empty()),
            jwt_secret,
            access_token_ttl: var_or("ACCESS_TOKEN_TTL", 900)?, // 15 min
            refresh_token_ttl: var_or("REFRESH_TOKEN_TTL", 604_800)?, // 7 days

            rate_login_per_min: var_or("RATE_LOGIN_PER_MIN", 60)?,
            rate_register_per_min: var_or("RATE_REGISTER_PER_MIN", 30)?,
            rate_refresh_per_min: var_or("RATE_REFRESH_PER_MIN", 30)?,
            rate_protected_per_min: var_or("RATE_PROTECTED_PER_MIN", 1000)?,

            api_prefix,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "debug".to_string()),
            log_dir: env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string()),
        })
    }

    /// Settings for tests and local experiments.
    pub fn for_tests(jwt_secret: &str) -> Self {
        Self {
            server_addr: "127.0.0.1:0".to_string(),
            database_url: None,
            jwt_secret: jwt_secret.to_string(),
            access_token_ttl: 900,
            refresh_token_ttl: 604_800,
            rate_login_per_min: 1000,
            rate_register_per_min: 1000,
            rate_refresh_per_min: 1000,
            rate_protected_per_min: 10_000,
            api_prefix: String::new(),
            log_level: "debug".to_string(),
            log_dir: "logs".to_string(),
        }
    }
}
