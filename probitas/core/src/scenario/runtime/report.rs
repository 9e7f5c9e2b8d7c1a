use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_with::{DurationMilliSeconds, serde_as};

use crate::scenario::{StepKind, StepRecord};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum StepStatus {
    Passed,
    Failed { message: String },
    Skipped,
}

/// Outcome of one record.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepReport {
    pub index: usize,
    pub name: String,
    pub kind: StepKind,
    pub attempts: u32,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub duration: Duration,
    #[serde(flatten)]
    pub status: StepStatus,
}

impl StepReport {
    pub(super) fn skipped(index: usize, record: &StepRecord) -> Self {
        Self {
            index,
            name: record.name().to_owned(),
            kind: record.kind(),
            attempts: 0,
            duration: Duration::ZERO,
            status: StepStatus::Skipped,
        }
    }

    #[must_use]
    pub const fn is_passed(&self) -> bool {
        matches!(self.status, StepStatus::Passed)
    }
}

/// Outcome of a whole run, one entry per record in definition order.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub name: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub steps: Vec<StepReport>,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub duration: Duration,
}

impl ScenarioReport {
    #[must_use]
    pub fn steps(&self) -> &[StepReport] {
        &self.steps
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.steps.iter().all(StepReport::is_passed)
    }

    pub fn failed(&self) -> impl Iterator<Item = &StepReport> {
        self.steps
            .iter()
            .filter(|step| matches!(step.status, StepStatus::Failed { .. }))
    }
}
