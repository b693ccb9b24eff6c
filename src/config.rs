use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

/// One year.
pub const MAX_TTL_MINUTES: i64 = 525_600;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub ttl_minutes: i64,
}

/// Argon2id work factor.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct HashConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HashConfig {
    fn default() -> Self {
        // OWASP baseline: m=19456 (19 MiB), t=2, p=1
        Self {
            memory_kib: 19456,
            iterations: 2,
            parallelism: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub run_address: String,
    pub jwt: JwtConfig,
    pub hash: HashConfig,
    pub db_max_connections: u32,
    pub store_timeout_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URI")
            .or_else(|_| std::env::var("DATABASE_URL"))
            .context("DATABASE_URI (or DATABASE_URL) must be set")?;

        let secret = std::env::var("JWT_SECRET_KEY").context("JWT_SECRET_KEY must be set")?;
        anyhow::ensure!(!secret.trim().is_empty(), "JWT_SECRET_KEY must not be empty");

        let jwt = JwtConfig {
            secret,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "loyalty-orders".into()),
            ttl_minutes: check_ttl(env_or("JWT_TTL_MINUTES", 60 * 24))?,
        };

        let defaults = HashConfig::default();
        let hash = HashConfig {
            memory_kib: env_or("ARGON2_MEMORY_KIB", defaults.memory_kib),
            iterations: env_or("ARGON2_ITERATIONS", defaults.iterations),
            parallelism: env_or("ARGON2_PARALLELISM", defaults.parallelism),
        };

        Ok(Self {
            database_url,
            run_address: std::env::var("RUN_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".into()),
            jwt,
            hash,
            db_max_connections: env_or("DB_MAX_CONNECTIONS", 10),
            store_timeout_secs: env_or("STORE_TIMEOUT_SECS", 5),
        })
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_secs)
    }
}

fn check_ttl(minutes: i64) -> anyhow::Result<i64> {
    anyhow::ensure!(
        (1..=MAX_TTL_MINUTES).contains(&minutes),
        "JWT_TTL_MINUTES must be between 1 and {MAX_TTL_MINUTES}, got {minutes}"
    );
    Ok(minutes)
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}
