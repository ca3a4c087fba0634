//! Pool configuration: limits, intervals, and behavior toggles.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Default call-slot capacity per physical connection (HTTP/2 default
/// max concurrent streams).
const DEFAULT_MAX_STREAMS: u32 = 100;

/// Default minimum number of physical connections kept in the pool.
const DEFAULT_MIN_IDLE: usize = 3;

/// Default interval between maintenance ticks.
const DEFAULT_MAINTENANCE_INTERVAL: Duration = Duration::from_secs(1);

/// Default idle timeout after which an unused connection is reclaimed.
const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Configuration for a connection pool.
///
/// All fields have defaults; construct with [`PoolConfig::new`] and chain the
/// `with_*` setters for anything that should differ.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[must_use = "pool configurations must be passed to Pool::new"]
pub struct PoolConfig {
    /// Ceiling on the number of physical connections
    pub max_size: usize,
    /// Maximum concurrent call slots per physical connection
    pub max_streams: u32,
    /// Minimum number of physical connections the maintenance loop keeps alive
    pub min_idle: usize,
    /// Interval between maintenance ticks
    pub maintenance_interval: Duration,
    /// How long a connection may sit unused before it is reclaimed
    pub idle_timeout: Duration,
    /// When true, `get` fails with `Overloaded` instead of growing the pool
    pub nonblocking: bool,
    /// Emit per-connection debug events for slot reservation and release
    pub debug: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: usize::MAX,
            max_streams: DEFAULT_MAX_STREAMS,
            min_idle: DEFAULT_MIN_IDLE,
            maintenance_interval: DEFAULT_MAINTENANCE_INTERVAL,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            nonblocking: false,
            debug: false,
        }
    }
}

impl PoolConfig {
    /// Create a configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the ceiling on the number of physical connections
    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    /// Set the maximum concurrent call slots per physical connection
    pub fn with_max_streams(mut self, max_streams: u32) -> Self {
        self.max_streams = max_streams;
        self
    }

    /// Set the minimum number of physical connections kept in the pool
    pub fn with_min_idle(mut self, min_idle: usize) -> Self {
        self.min_idle = min_idle;
        self
    }

    /// Set the interval between maintenance ticks
    pub fn with_maintenance_interval(mut self, interval: Duration) -> Self {
        self.maintenance_interval = interval;
        self
    }

    /// Set the idle timeout after which unused connections are reclaimed
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Make `get` fail with `Overloaded` instead of growing the pool
    pub fn with_nonblocking(mut self) -> Self {
        self.nonblocking = true;
        self
    }

    /// Enable per-connection debug events
    pub fn with_debug(mut self) -> Self {
        self.debug = true;
        self
    }

    /// Create configuration from environment variables.
    ///
    /// Recognized variables: `MUXPOOL_MAX_SIZE`, `MUXPOOL_MAX_STREAMS`,
    /// `MUXPOOL_MIN_IDLE`, `MUXPOOL_MAINTENANCE_INTERVAL_MS`,
    /// `MUXPOOL_IDLE_TIMEOUT_MS`, `MUXPOOL_NONBLOCKING`. Unset or unparsable
    /// variables fall back to the defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(value) = std::env::var("MUXPOOL_MAX_SIZE")
            && let Ok(max_size) = value.parse::<usize>()
        {
            config.max_size = max_size;
        }

        if let Ok(value) = std::env::var("MUXPOOL_MAX_STREAMS")
            && let Ok(max_streams) = value.parse::<u32>()
        {
            config.max_streams = max_streams;
        }

        if let Ok(value) = std::env::var("MUXPOOL_MIN_IDLE")
            && let Ok(min_idle) = value.parse::<usize>()
        {
            config.min_idle = min_idle;
        }

        if let Ok(value) = std::env::var("MUXPOOL_MAINTENANCE_INTERVAL_MS")
            && let Ok(millis) = value.parse::<u64>()
        {
            config.maintenance_interval = Duration::from_millis(millis);
        }

        if let Ok(value) = std::env::var("MUXPOOL_IDLE_TIMEOUT_MS")
            && let Ok(millis) = value.parse::<u64>()
        {
            config.idle_timeout = Duration::from_millis(millis);
        }

        if let Ok(value) = std::env::var("MUXPOOL_NONBLOCKING") {
            config.nonblocking = matches!(value.as_str(), "1" | "true" | "yes");
        }

        config
    }

    /// Validate the configuration.
    ///
    /// Called by `Pool::new`; exposed so configurations loaded from the
    /// environment can be checked up front.
    pub fn validate(&self) -> Result<()> {
        if self.max_streams == 0 {
            return Err(Error::invalid_config(
                "max_streams must be at least 1 call slot",
            ));
        }
        if self.max_size == 0 {
            return Err(Error::invalid_config(
                "max_size must allow at least 1 connection",
            ));
        }
        if self.min_idle > self.max_size {
            return Err(Error::invalid_config(format!(
                "min_idle ({}) exceeds max_size ({})",
                self.min_idle, self.max_size
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PoolConfig::new();

        assert_eq!(config.max_size, usize::MAX);
        assert_eq!(config.max_streams, 100);
        assert_eq!(config.min_idle, 3);
        assert_eq!(config.maintenance_interval, Duration::from_secs(1));
        assert_eq!(config.idle_timeout, Duration::from_secs(60));
        assert!(!config.nonblocking);
        assert!(!config.debug);
    }

    #[test]
    fn test_config_builder() {
        let config = PoolConfig::new()
            .with_max_size(16)
            .with_max_streams(32)
            .with_min_idle(2)
            .with_maintenance_interval(Duration::from_millis(250))
            .with_idle_timeout(Duration::from_secs(5))
            .with_nonblocking();

        assert_eq!(config.max_size, 16);
        assert_eq!(config.max_streams, 32);
        assert_eq!(config.min_idle, 2);
        assert_eq!(config.maintenance_interval, Duration::from_millis(250));
        assert_eq!(config.idle_timeout, Duration::from_secs(5));
        assert!(config.nonblocking);
    }

    #[test]
    fn test_validate_rejects_zero_streams() {
        let config = PoolConfig::new().with_max_streams(0);
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_min_idle_above_ceiling() {
        let config = PoolConfig::new().with_max_size(2).with_min_idle(3);
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_validate_accepts_lazy_pool() {
        // min_idle of zero means the pool starts empty and dials on demand
        let config = PoolConfig::new().with_min_idle(0);
        assert!(config.validate().is_ok());
    }
}
