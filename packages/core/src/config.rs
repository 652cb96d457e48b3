use std::env;

use crate::cli::Cli;
use crate::monitor::config::{DEFAULT_GRACE_HOURS, MAX_GRACE_HOURS};

pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";
pub const DEFAULT_SWEEP_INTERVAL_SECONDS: u64 = 600;
pub const DEFAULT_TOKEN_TTL_HOURS: i64 = 24;
pub const DEFAULT_DASHBOARD_CACHE_SECONDS: u64 = 30;
pub const MAX_TOKEN_TTL_HOURS: i64 = 24 * 30;

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub bind_address: String,
    pub sweep_interval_seconds: u64,
    pub lapse_grace_hours: i64,
    pub token_ttl_hours: i64,
    pub dashboard_cache_seconds: u64,
}

// The JWT secret stays out of logs.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &self.database_url)
            .field("jwt_secret", &"<redacted>")
            .field("bind_address", &self.bind_address)
            .field("sweep_interval_seconds", &self.sweep_interval_seconds)
            .field("lapse_grace_hours", &self.lapse_grace_hours)
            .field("token_ttl_hours", &self.token_ttl_hours)
            .field("dashboard_cache_seconds", &self.dashboard_cache_seconds)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from any key lookup. `from_env` passes the process
    /// environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").ok_or("DATABASE_URL is required")?;
        let jwt_secret = lookup("JWT_SECRET").ok_or("JWT_SECRET is required")?;
        if jwt_secret.len() < 16 {
            return Err("JWT_SECRET must be at least 16 characters".to_string());
        }

        let bind_address =
            lookup("BIND_ADDRESS").unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let sweep_interval_seconds = parse_or(
            &lookup,
            "SWEEP_INTERVAL_SECONDS",
            DEFAULT_SWEEP_INTERVAL_SECONDS,
        )?;
        let lapse_grace_hours = parse_or(&lookup, "LAPSE_GRACE_HOURS", DEFAULT_GRACE_HOURS)?;
        let token_ttl_hours = parse_or(&lookup, "TOKEN_TTL_HOURS", DEFAULT_TOKEN_TTL_HOURS)?;
        let dashboard_cache_seconds = parse_or(
            &lookup,
            "DASHBOARD_CACHE_SECONDS",
            DEFAULT_DASHBOARD_CACHE_SECONDS,
        )?;

        let config = Self {
            database_url,
            jwt_secret,
            bind_address,
            sweep_interval_seconds,
            lapse_grace_hours,
            token_ttl_hours,
            dashboard_cache_seconds,
        };
        config.validate()?;
        Ok(config)
    }

    /// Command-line flags win over environment values. The merged result is
    /// validated the same way as the environment alone.
    pub fn apply_cli(&mut self, cli: &Cli) -> Result<(), String> {
        if let Some(url) = &cli.database_url {
            self.database_url = url.clone();
        }
        if let Some(bind) = &cli.bind {
            self.bind_address = bind.clone();
        }
        if let Some(interval) = cli.sweep_interval {
            self.sweep_interval_seconds = interval;
        }
        if let Some(hours) = cli.grace_hours {
            self.lapse_grace_hours = hours;
        }
        self.validate()
    }

    /// Range checks for the numeric settings. Values that pass are safe to
    /// turn into timer periods and `chrono` durations.
    pub fn validate(&self) -> Result<(), String> {
        if self.sweep_interval_seconds == 0 {
            return Err("sweep interval must be greater than zero seconds".to_string());
        }
        if !(0..=MAX_GRACE_HOURS).contains(&self.lapse_grace_hours) {
            return Err(format!(
                "lapse grace period must be between 0 and {} hours",
                MAX_GRACE_HOURS
            ));
        }
        if !(1..=MAX_TOKEN_TTL_HOURS).contains(&self.token_ttl_hours) {
            return Err(format!(
                "TOKEN_TTL_HOURS must be between 1 and {}",
                MAX_TOKEN_TTL_HOURS
            ));
        }
        Ok(())
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, String>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| format!("{} must be a valid number", key)),
        None => Ok(default),
    }
}
