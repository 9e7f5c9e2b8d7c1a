use async_trait::async_trait;
use tracing::{info, warn};

use super::{ScenarioReport, StepReport, StepStatus};
use crate::scenario::ScenarioDefinition;

/// Observer of a run. Every hook defaults to doing nothing.
#[async_trait]
pub trait Reporter: Send + Sync {
    async fn scenario_started(&self, _scenario: &ScenarioDefinition) {}

    async fn step_finished(&self, _scenario: &ScenarioDefinition, _step: &StepReport) {}

    async fn scenario_finished(&self, _report: &ScenarioReport) {}
}

/// Logs run progress through `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingReporter;

#[async_trait]
impl Reporter for TracingReporter {
    async fn scenario_started(&self, scenario: &ScenarioDefinition) {
        info!(
            scenario = scenario.name(),
            records = scenario.steps().len(),
            tags = ?scenario.tags(),
            "scenario started"
        );
    }

    async fn step_finished(&self, scenario: &ScenarioDefinition, step: &StepReport) {
        match &step.status {
            StepStatus::Passed => info!(
                scenario = scenario.name(),
                step = %step.name,
                kind = %step.kind,
                attempts = step.attempts,
                duration_ms = step.duration.as_millis(),
                "step passed"
            ),
            StepStatus::Failed { message } => warn!(
                scenario = scenario.name(),
                step = %step.name,
                kind = %step.kind,
                attempts = step.attempts,
                error = %message,
                "step failed"
            ),
            StepStatus::Skipped => info!(
                scenario = scenario.name(),
                step = %step.name,
                "step skipped"
            ),
        }
    }

    async fn scenario_finished(&self, report: &ScenarioReport) {
        let failed = report.failed().count();
        if failed == 0 {
            info!(
                scenario = %report.name,
                duration_ms = report.duration.as_millis(),
                "scenario passed"
            );
        } else {
            warn!(
                scenario = %report.name,
                failed,
                duration_ms = report.duration.as_millis(),
                "scenario failed"
            );
        }
    }
}
