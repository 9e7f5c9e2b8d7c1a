use std::{env, fs, path::Path, time::Duration};

use serde::{Deserialize, Serialize};
use serde_with::{DurationMilliSeconds, serde_as};

const DEFAULT_TIMEOUT_ENV: &str = "PROBITAS_DEFAULT_TIMEOUT_MS";
const RETRY_BASE_DELAY_ENV: &str = "PROBITAS_RETRY_BASE_DELAY_MS";
const RETRY_MAX_DELAY_ENV: &str = "PROBITAS_RETRY_MAX_DELAY_MS";
const CLEANUP_TIMEOUT_ENV: &str = "PROBITAS_CLEANUP_TIMEOUT_MS";
const SLOW_ENV: &str = "SLOW_TEST_ENV";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file `{path}`: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse runner config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid value `{value}` for {var}: expected milliseconds")]
    InvalidEnv { var: &'static str, value: String },
}

/// Runner-wide execution settings.
///
/// Per-record options always win; these values apply where a record leaves
/// a setting unset.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub default_timeout: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub retry_base_delay: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub retry_max_delay: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub cleanup_timeout: Duration,
    /// Doubles every step timeout, for slow CI machines.
    pub slow_env: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(30),
            retry_base_delay: Duration::from_secs(1),
            retry_max_delay: Duration::from_secs(30),
            cleanup_timeout: Duration::from_secs(30),
            slow_env: false,
        }
    }
}

impl RunnerConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    /// Defaults overridden by whatever `PROBITAS_*` variables are set.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_overrides()
    }

    pub fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        if let Some(value) = duration_from_env(DEFAULT_TIMEOUT_ENV)? {
            self.default_timeout = value;
        }
        if let Some(value) = duration_from_env(RETRY_BASE_DELAY_ENV)? {
            self.retry_base_delay = value;
        }
        if let Some(value) = duration_from_env(RETRY_MAX_DELAY_ENV)? {
            self.retry_max_delay = value;
        }
        if let Some(value) = duration_from_env(CLEANUP_TIMEOUT_ENV)? {
            self.cleanup_timeout = value;
        }
        if env::var(SLOW_ENV).is_ok_and(|s| s == "true") {
            self.slow_env = true;
        }
        Ok(self)
    }

    /// Timeout for one attempt of a record that asked for `requested`.
    ///
    /// Only `slow_env` doubles it; `SLOW_TEST_ENV` reaches this through
    /// [`Self::with_env_overrides`]. Doubling saturates at [`Duration::MAX`].
    #[must_use]
    pub fn effective_timeout(&self, requested: Option<Duration>) -> Duration {
        let timeout = requested.unwrap_or(self.default_timeout);
        if self.slow_env {
            timeout.saturating_mul(2)
        } else {
            timeout
        }
    }
}

fn duration_from_env(var: &'static str) -> Result<Option<Duration>, ConfigError> {
    let Ok(value) = env::var(var) else {
        return Ok(None);
    };
    value
        .trim()
        .parse::<u64>()
        .map(|millis| Some(Duration::from_millis(millis)))
        .map_err(|_| ConfigError::InvalidEnv { var, value })
}
