use std::str::FromStr;
use std::time::Duration;

use coedit_core::lock::{validate_lock_ttl, DEFAULT_LOCK_TTL_SECS, LOCK_SWEEP_INTERVAL_SECS};
use coedit_core::presence::{
    CURSOR_IDLE_TIMEOUT_SECS, CURSOR_MIN_INTERVAL_MS, CURSOR_SWEEP_INTERVAL_SECS,
};
use coedit_locks::{LockManagerConfig, PresenceConfig};

use crate::auth::jwt::JwtConfig;

/// Default history retention in days.
pub const DEFAULT_HISTORY_RETENTION_DAYS: i64 = 90;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long shutdown waits for background tasks, in seconds (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// PostgreSQL URL. When unset, locks and history live in process memory.
    pub database_url: Option<String>,
    /// JWT token configuration (secret, expiry).
    pub jwt: JwtConfig,
    /// Lease, presence, and retention tuning.
    pub locks: LockSettings,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `3000`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                       |
    /// | `SHUTDOWN_TIMEOUT_SECS`| `30`                       |
    /// | `DATABASE_URL`         | unset (in-memory stores)   |
    ///
    /// JWT and lock settings are documented on [`JwtConfig::from_env`] and
    /// [`LockSettings::from_env`].
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = env_or("PORT", 3000);

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = env_or("REQUEST_TIMEOUT_SECS", 30);
        let shutdown_timeout_secs: u64 = env_or("SHUTDOWN_TIMEOUT_SECS", 30);

        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            database_url,
            jwt: JwtConfig::from_env(),
            locks: LockSettings::from_env(),
        }
    }
}

/// Lock, presence, and history tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockSettings {
    pub lock_ttl_secs: i64,
    pub lock_sweep_interval_secs: u64,
    pub cursor_min_interval_ms: u64,
    pub cursor_idle_timeout_secs: u64,
    pub cursor_sweep_interval_secs: u64,
    pub history_retention_days: i64,
}

impl Default for LockSettings {
    fn default() -> Self {
        Self {
            lock_ttl_secs: DEFAULT_LOCK_TTL_SECS,
            lock_sweep_interval_secs: LOCK_SWEEP_INTERVAL_SECS,
            cursor_min_interval_ms: CURSOR_MIN_INTERVAL_MS,
            cursor_idle_timeout_secs: CURSOR_IDLE_TIMEOUT_SECS,
            cursor_sweep_interval_secs: CURSOR_SWEEP_INTERVAL_SECS,
            history_retention_days: DEFAULT_HISTORY_RETENTION_DAYS,
        }
    }
}

impl LockSettings {
    /// Load lock settings from environment variables.
    ///
    /// | Env Var                      | Default |
    /// |------------------------------|---------|
    /// | `LOCK_TTL_SECS`              | `300`   |
    /// | `LOCK_SWEEP_INTERVAL_SECS`   | `30`    |
    /// | `CURSOR_MIN_INTERVAL_MS`     | `50`    |
    /// | `CURSOR_IDLE_TIMEOUT_SECS`   | `10`    |
    /// | `CURSOR_SWEEP_INTERVAL_SECS` | `5`     |
    /// | `HISTORY_RETENTION_DAYS`     | `90`    |
    ///
    /// # Panics
    ///
    /// Panics if a value does not parse or `LOCK_TTL_SECS` is out of range.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let settings = Self {
            lock_ttl_secs: env_or("LOCK_TTL_SECS", defaults.lock_ttl_secs),
            lock_sweep_interval_secs: env_or(
                "LOCK_SWEEP_INTERVAL_SECS",
                defaults.lock_sweep_interval_secs,
            ),
            cursor_min_interval_ms: env_or(
                "CURSOR_MIN_INTERVAL_MS",
                defaults.cursor_min_interval_ms,
            ),
            cursor_idle_timeout_secs: env_or(
                "CURSOR_IDLE_TIMEOUT_SECS",
                defaults.cursor_idle_timeout_secs,
            ),
            cursor_sweep_interval_secs: env_or(
                "CURSOR_SWEEP_INTERVAL_SECS",
                defaults.cursor_sweep_interval_secs,
            ),
            history_retention_days: env_or(
                "HISTORY_RETENTION_DAYS",
                defaults.history_retention_days,
            ),
        };

        if let Err(msg) = validate_lock_ttl(settings.lock_ttl_secs) {
            panic!("LOCK_TTL_SECS is invalid: {msg}");
        }
        assert!(
            settings.history_retention_days > 0,
            "HISTORY_RETENTION_DAYS must be positive"
        );
        settings
    }

    pub fn manager_config(&self) -> LockManagerConfig {
        LockManagerConfig {
            ttl: chrono::Duration::seconds(self.lock_ttl_secs),
        }
    }

    pub fn presence_config(&self) -> PresenceConfig {
        PresenceConfig {
            min_interval: Duration::from_millis(self.cursor_min_interval_ms),
            idle_timeout: Duration::from_secs(self.cursor_idle_timeout_secs),
        }
    }

    pub fn lock_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.lock_sweep_interval_secs.max(1))
    }

    pub fn cursor_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.cursor_sweep_interval_secs.max(1))
    }
}

/// Read `key` from the environment, falling back to `default` when unset.
///
/// Panics with the variable name when the value is set but does not parse.
fn env_or<T>(key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|e| panic!("{key} must be a valid {}: {e}", std::any::type_name::<T>())),
        Err(_) => default,
    }
}
