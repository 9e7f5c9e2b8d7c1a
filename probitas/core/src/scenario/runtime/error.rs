use std::time::Duration;

use crate::scenario::DynError;

/// Why a single record did not complete.
#[derive(Debug, thiserror::Error)]
pub enum StepFailure {
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("panicked: {0}")]
    Panic(String),
    #[error("cancelled")]
    Cancelled,
    #[error(transparent)]
    Error(DynError),
}

/// Error returned by [`super::Runner::run`].
#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    #[error("`{name}` (record #{index} at {location}) failed after {attempts} attempt(s): {source}")]
    Step {
        name: String,
        index: usize,
        attempts: u32,
        location: String,
        #[source]
        source: StepFailure,
    },
    #[error("scenario cancelled at `{name}` (record #{index})")]
    Cancelled { name: String, index: usize },
    #[error("cleanup failed:\n{0}")]
    Cleanup(#[source] DynError),
}

impl ScenarioError {
    /// The failed record's failure, if this error came from one.
    #[must_use]
    pub const fn step_failure(&self) -> Option<&StepFailure> {
        match self {
            Self::Step { source, .. } => Some(source),
            Self::Cancelled { .. } | Self::Cleanup(_) => None,
        }
    }
}
