//! Config loading, validation, and conversion into runtime options.

use super::model::Config;
use crate::coordinator::CoordinatorOptions;
use crate::error::{AgentLockError, Result};
use crate::filelock::FileLockOptions;
use crate::store::RetryPolicy;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;
use std::time::Duration;

impl Config {
    /// Load config from a YAML file.
    ///
    /// Unknown fields in the YAML are silently ignored for forward compatibility.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            AgentLockError::ConfigError(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Load config from a YAML file, falling back to defaults when it does not exist.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse config from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        // serde_yaml rejects an empty document for a struct; treat it as all defaults.
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(yaml)
            .map_err(|e| AgentLockError::ConfigError(format!("failed to parse config YAML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize config to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| {
            AgentLockError::ConfigError(format!("failed to serialize config to YAML: {}", e))
        })
    }

    /// Validate config values and return error on invalid values.
    ///
    /// Validation rules:
    /// - all intervals and `store_retry_attempts` must be positive
    /// - `stale_ms` must be at most half of `max_wait_ms`
    /// - `refresh_ms` must be below `stale_ms`
    /// - `poll_interval_ms` must be below `max_wait_ms`
    /// - `exempt_globs` must compile
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("max_wait_ms", self.max_wait_ms),
            ("stale_ms", self.stale_ms),
            ("refresh_ms", self.refresh_ms),
            ("poll_interval_ms", self.poll_interval_ms),
            ("waiting_notify_interval_ms", self.waiting_notify_interval_ms),
            ("store_retry_base_ms", self.store_retry_base_ms),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(AgentLockError::ConfigError(format!(
                    "{} must be greater than 0",
                    name
                )));
            }
        }

        if self.store_retry_attempts == 0 {
            return Err(AgentLockError::ConfigError(
                "store_retry_attempts must be greater than 0".to_string(),
            ));
        }

        // A crashed holder must become reclaimable well before an honest waiter times out.
        if self.stale_ms.saturating_mul(2) > self.max_wait_ms {
            return Err(AgentLockError::ConfigError(format!(
                "stale_ms ({}) must be at most half of max_wait_ms ({})",
                self.stale_ms, self.max_wait_ms
            )));
        }

        if self.refresh_ms >= self.stale_ms {
            return Err(AgentLockError::ConfigError(format!(
                "refresh_ms ({}) must be below stale_ms ({})",
                self.refresh_ms, self.stale_ms
            )));
        }

        if self.poll_interval_ms >= self.max_wait_ms {
            return Err(AgentLockError::ConfigError(format!(
                "poll_interval_ms ({}) must be below max_wait_ms ({})",
                self.poll_interval_ms, self.max_wait_ms
            )));
        }

        self.exempt_matcher()?;

        Ok(())
    }

    /// Compile `exempt_globs` into a matcher.
    pub fn exempt_matcher(&self) -> Result<GlobSet> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.exempt_globs {
            let glob = Glob::new(pattern).map_err(|e| {
                AgentLockError::ConfigError(format!("invalid exempt glob '{}': {}", pattern, e))
            })?;
            builder.add(glob);
        }
        builder
            .build()
            .map_err(|e| AgentLockError::ConfigError(format!("failed to build exempt globs: {}", e)))
    }

    /// Convert the millisecond settings into coordinator options.
    pub fn coordinator_options(&self) -> CoordinatorOptions {
        CoordinatorOptions {
            max_wait: Duration::from_millis(self.max_wait_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            waiting_notify_interval: Duration::from_millis(self.waiting_notify_interval_ms),
            file_lock: FileLockOptions {
                stale_threshold: Duration::from_millis(self.stale_ms),
                refresh_interval: Duration::from_millis(self.refresh_ms),
            },
            retry: RetryPolicy {
                attempts: self.store_retry_attempts,
                base_delay: Duration::from_millis(self.store_retry_base_ms),
            },
        }
    }
}
