//! System configuration structures.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::core::error::AppResult;
use crate::core::resource_pool::PoolLimits;

/// Connection pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Connections opened at start.
    pub capacity: usize,
    /// Default acquire wait in milliseconds; absent waits forever.
    pub acquire_timeout_ms: Option<u64>,
    /// How long shutdown waits for borrowed connections, in milliseconds.
    pub drain_timeout_ms: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            capacity: 10,
            acquire_timeout_ms: None,
            drain_timeout_ms: 5_000,
        }
    }
}

impl PoolConfig {
    /// Validate pool configuration values.
    ///
    /// # Errors
    ///
    /// A message naming the offending field.
    pub fn validate(&self) -> Result<(), String> {
        if self.capacity == 0 {
            return Err("capacity must be greater than 0".into());
        }
        if self.acquire_timeout_ms == Some(0) {
            return Err("acquire_timeout_ms must be greater than 0 when set".into());
        }
        Ok(())
    }

    /// Limits handed to [`ResourcePool`](crate::core::ResourcePool).
    #[must_use]
    pub fn limits(&self) -> PoolLimits {
        PoolLimits {
            capacity: self.capacity,
            acquire_timeout: self.acquire_timeout_ms.map(Duration::from_millis),
            drain_timeout: Duration::from_millis(self.drain_timeout_ms),
        }
    }
}

/// Expiration sweeper configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SweeperConfig {
    /// Start the sweeper with the system.
    pub enabled: bool,
    /// Pause between passes, in seconds.
    pub interval_secs: u64,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 24 * 60 * 60,
        }
    }
}

impl SweeperConfig {
    /// Validate sweeper configuration values.
    ///
    /// # Errors
    ///
    /// A message naming the offending field.
    pub fn validate(&self) -> Result<(), String> {
        if self.interval_secs == 0 {
            return Err("interval_secs must be greater than 0".into());
        }
        Ok(())
    }

    /// Pause between passes.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Administrator credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Admin login name.
    pub username: String,
    /// Admin password.
    pub password: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            username: "admin".into(),
            password: "1234".into(),
        }
    }
}

/// Root system configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    /// Connection pool.
    pub pool: PoolConfig,
    /// Expiration sweeper.
    pub sweeper: SweeperConfig,
    /// Admin login.
    pub admin: AdminConfig,
    /// How long shutdown waits for the sweeper to stop, in seconds.
    pub shutdown_timeout_secs: u64,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            pool: PoolConfig::default(),
            sweeper: SweeperConfig::default(),
            admin: AdminConfig::default(),
            shutdown_timeout_secs: 30,
        }
    }
}

impl SystemConfig {
    /// Validate every section.
    ///
    /// # Errors
    ///
    /// A message prefixed with the section name.
    pub fn validate(&self) -> Result<(), String> {
        self.pool.validate().map_err(|e| format!("pool: {e}"))?;
        self.sweeper.validate().map_err(|e| format!("sweeper: {e}"))?;
        if self.admin.username.is_empty() {
            return Err("admin: username must not be empty".into());
        }
        if self.shutdown_timeout_secs == 0 {
            return Err("shutdown_timeout_secs must be greater than 0".into());
        }
        Ok(())
    }

    /// Bounded wait for the sweeper during shutdown.
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    /// Parse system configuration from a JSON string and validate.
    ///
    /// Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Parse or validation failure.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build configuration from `COUPON_*` environment variables.
    ///
    /// A `.env` file is loaded first if present. Recognized variables:
    /// `COUPON_POOL_CAPACITY`, `COUPON_POOL_ACQUIRE_TIMEOUT_MS`,
    /// `COUPON_POOL_DRAIN_TIMEOUT_MS`, `COUPON_SWEEPER_ENABLED`,
    /// `COUPON_SWEEPER_INTERVAL_SECS`, `COUPON_ADMIN_USERNAME`,
    /// `COUPON_ADMIN_PASSWORD`, `COUPON_SHUTDOWN_TIMEOUT_SECS`.
    ///
    /// # Errors
    ///
    /// A variable that does not parse, or a configuration that fails validation.
    pub fn from_env() -> AppResult<Self> {
        let _ = dotenvy::dotenv();
        let mut cfg = Self::default();

        if let Some(v) = env_parse("COUPON_POOL_CAPACITY")? {
            cfg.pool.capacity = v;
        }
        if let Some(v) = env_parse("COUPON_POOL_ACQUIRE_TIMEOUT_MS")? {
            cfg.pool.acquire_timeout_ms = Some(v);
        }
        if let Some(v) = env_parse("COUPON_POOL_DRAIN_TIMEOUT_MS")? {
            cfg.pool.drain_timeout_ms = v;
        }
        if let Some(v) = env_parse("COUPON_SWEEPER_ENABLED")? {
            cfg.sweeper.enabled = v;
        }
        if let Some(v) = env_parse("COUPON_SWEEPER_INTERVAL_SECS")? {
            cfg.sweeper.interval_secs = v;
        }
        if let Ok(v) = env::var("COUPON_ADMIN_USERNAME") {
            cfg.admin.username = v;
        }
        if let Ok(v) = env::var("COUPON_ADMIN_PASSWORD") {
            cfg.admin.password = v;
        }
        if let Some(v) = env_parse("COUPON_SHUTDOWN_TIMEOUT_SECS")? {
            cfg.shutdown_timeout_secs = v;
        }

        cfg.validate()
            .map_err(anyhow::Error::msg)
            .context("invalid configuration from environment")?;
        Ok(cfg)
    }
}

fn env_parse<T>(key: &str) -> AppResult<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .with_context(|| format!("{key} has invalid value `{raw}`")),
        Err(_) => Ok(None),
    }
}
