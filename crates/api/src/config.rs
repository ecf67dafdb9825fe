//! Application configuration loaded from environment variables.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use lifecycle::{LifecycleConfig, RetryPolicy};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format: {other}")),
        }
    }
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `text` or `json` (default: `text`)
/// - `DATABASE_URL`: PostgreSQL URL; unset runs on the in-memory store
/// - `HOLD_TTL_SECS`: seat hold lifetime (default: `300`)
/// - `PAYMENT_GRACE_SECS`: extra wait before an unpaid booking times out (default: `60`)
/// - `SWEEP_INTERVAL_SECS`: background sweep period (default: `15`)
/// - `GATEWAY_MAX_ATTEMPTS`: gateway call attempts (default: `3`)
/// - `GATEWAY_INITIAL_BACKOFF_MS`: first retry delay (default: `200`)
/// - `GATEWAY_MAX_BACKOFF_MS`: retry delay cap (default: `5000`)
/// - `SCHEDULES_FILE`: JSON list of schedules to seed the catalog
///
/// Unparseable values fall back to the default.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub hold_ttl_secs: u64,
    pub payment_grace_secs: u64,
    pub sweep_interval_secs: u64,
    pub gateway_max_attempts: u32,
    pub gateway_initial_backoff_ms: u64,
    pub gateway_max_backoff_ms: u64,
    pub schedules_file: Option<PathBuf>,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parsed(&lookup, "PORT").unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: lookup("LOG_FORMAT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.log_format),
            database_url: lookup("DATABASE_URL").filter(|v| !v.is_empty()),
            hold_ttl_secs: parsed(&lookup, "HOLD_TTL_SECS").unwrap_or(defaults.hold_ttl_secs),
            payment_grace_secs: parsed(&lookup, "PAYMENT_GRACE_SECS")
                .unwrap_or(defaults.payment_grace_secs),
            sweep_interval_secs: parsed::<u64>(&lookup, "SWEEP_INTERVAL_SECS")
                .filter(|secs| *secs > 0)
                .unwrap_or(defaults.sweep_interval_secs),
            gateway_max_attempts: parsed::<u32>(&lookup, "GATEWAY_MAX_ATTEMPTS")
                .filter(|n| *n > 0)
                .unwrap_or(defaults.gateway_max_attempts),
            gateway_initial_backoff_ms: parsed(&lookup, "GATEWAY_INITIAL_BACKOFF_MS")
                .unwrap_or(defaults.gateway_initial_backoff_ms),
            gateway_max_backoff_ms: parsed(&lookup, "GATEWAY_MAX_BACKOFF_MS")
                .unwrap_or(defaults.gateway_max_backoff_ms),
            schedules_file: lookup("SCHEDULES_FILE")
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Returns the sweep period.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Builds the lifecycle timing and retry settings.
    pub fn lifecycle_config(&self) -> LifecycleConfig {
        LifecycleConfig {
            hold_ttl: chrono::Duration::seconds(self.hold_ttl_secs as i64),
            payment_grace: chrono::Duration::seconds(self.payment_grace_secs as i64),
            retry: RetryPolicy {
                max_attempts: self.gateway_max_attempts,
                initial_backoff: Duration::from_millis(self.gateway_initial_backoff_ms),
                max_backoff: Duration::from_millis(self.gateway_max_backoff_ms),
                ..RetryPolicy::default()
            },
        }
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|v| v.trim().parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            database_url: None,
            hold_ttl_secs: 300,
            payment_grace_secs: 60,
            sweep_interval_secs: 15,
            gateway_max_attempts: 3,
            gateway_initial_backoff_ms: 200,
            gateway_max_backoff_ms: 5000,
            schedules_file: None,
        }
    }
}
