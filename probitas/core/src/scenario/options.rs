use std::{num::NonZeroU32, time::Duration};

use serde::{Deserialize, Serialize};
use serde_with::{DurationMilliSeconds, serde_as};

/// How the delay between retry attempts grows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backoff {
    #[default]
    Linear,
    Exponential,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: NonZeroU32,
    #[serde(default)]
    pub backoff: Backoff,
}

impl RetryPolicy {
    /// Attempt counts of zero are clamped to a single attempt.
    #[must_use]
    pub const fn new(max_attempts: u32, backoff: Backoff) -> Self {
        let max_attempts = match NonZeroU32::new(max_attempts) {
            Some(value) => value,
            None => NonZeroU32::MIN,
        };
        Self {
            max_attempts,
            backoff,
        }
    }

    #[must_use]
    pub const fn linear(max_attempts: u32) -> Self {
        Self::new(max_attempts, Backoff::Linear)
    }

    #[must_use]
    pub const fn exponential(max_attempts: u32) -> Self {
        Self::new(max_attempts, Backoff::Exponential)
    }

    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts.get()
    }
}

/// Per-record execution policy. Unset fields fall back to the scenario
/// defaults; when those are unset too the field stays `None` and the runner
/// decides.
#[serde_as]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StepOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    pub timeout: Option<Duration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryPolicy>,
}

impl StepOptions {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            timeout: None,
            retry: None,
        }
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Field-wise precedence: `self` wins where set, `defaults` fill the gaps.
    #[must_use]
    pub fn merged_over(&self, defaults: &Self) -> Self {
        Self {
            timeout: self.timeout.or(defaults.timeout),
            retry: self.retry.or(defaults.retry),
        }
    }
}

/// Scenario-wide settings supplied once to [`crate::scenario`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioOptions {
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub step_options: StepOptions,
}

impl ScenarioOptions {
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    #[must_use]
    pub fn with_tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub const fn with_step_options(mut self, step_options: StepOptions) -> Self {
        self.step_options = step_options;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_options_override_defaults_per_field() {
        let defaults = StepOptions::new()
            .with_timeout(Duration::from_secs(5))
            .with_retry(RetryPolicy::linear(2));
        let call = StepOptions::new().with_timeout(Duration::from_secs(1));

        let merged = call.merged_over(&defaults);

        assert_eq!(merged.timeout, Some(Duration::from_secs(1)));
        assert_eq!(merged.retry, Some(RetryPolicy::linear(2)));
    }

    #[test]
    fn unset_everywhere_stays_unset() {
        let merged = StepOptions::new().merged_over(&StepOptions::default());
        assert_eq!(merged, StepOptions::new());
    }

    #[test]
    fn zero_attempts_clamp_to_one() {
        assert_eq!(RetryPolicy::exponential(0).max_attempts(), 1);
    }

    #[test]
    fn options_deserialize_from_yaml() {
        let options: ScenarioOptions = serde_yaml::from_str(
            "tags: [smoke, api]\nstep_options:\n  timeout: 1500\n  retry:\n    max_attempts: 3\n    backoff: exponential\n",
        )
        .unwrap();

        assert_eq!(options.tags, ["smoke", "api"]);
        assert_eq!(options.step_options.timeout, Some(Duration::from_millis(1500)));
        assert_eq!(options.step_options.retry, Some(RetryPolicy::exponential(3)));
    }
}
