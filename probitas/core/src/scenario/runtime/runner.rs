use std::{any::Any, panic::AssertUnwindSafe, sync::Arc, time::Duration};

use futures::FutureExt as _;
use tokio::time::{Instant, sleep, timeout};
use tracing::{Instrument as _, debug, info_span, warn};

use super::{
    Reporter, ScenarioError, ScenarioReport, StepFailure, StepReport, StepStatus,
    TracingReporter, retry::delay_after,
};
use crate::{
    RunnerConfig,
    origin::display_origin,
    scenario::{
        CancelHandle, Cleanup, DynError, ExecutionContext, ResourceMap, RetryPolicy,
        ScenarioDefinition, Signal, StepOutput, StepRecord, StepValue, Store, cancellation,
    },
};

type StepOutcome = Result<StepOutput, StepFailure>;

/// Executes [`ScenarioDefinition`]s record by record.
///
/// Every run gets a fresh [`Store`]; the cancellation handle is shared by all
/// runs of the same runner, so once cancelled it stays cancelled.
pub struct Runner {
    config: RunnerConfig,
    reporter: Arc<dyn Reporter>,
    cancel: CancelHandle,
    signal: Signal,
}

impl Default for Runner {
    fn default() -> Self {
        Self::new(RunnerConfig::default())
    }
}

impl Runner {
    #[must_use]
    pub fn new(config: RunnerConfig) -> Self {
        let (cancel, signal) = cancellation();
        Self {
            config,
            reporter: Arc::new(TracingReporter),
            cancel,
            signal,
        }
    }

    #[must_use]
    pub fn with_reporter(mut self, reporter: impl Reporter + 'static) -> Self {
        self.reporter = Arc::new(reporter);
        self
    }

    #[must_use]
    pub const fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Handle that cancels the current run and every later run of this
    /// runner. Cancellation cannot be undone; build a new [`Runner`] to run
    /// again.
    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Runs every record in order, stopping at the first failure, then
    /// unwinds registered cleanups in reverse order. Records after a failure
    /// are reported as skipped.
    pub async fn run(
        &self,
        definition: &ScenarioDefinition,
    ) -> Result<ScenarioReport, ScenarioError> {
        let span = info_span!("scenario", name = definition.name());
        self.run_records(definition).instrument(span).await
    }

    async fn run_records(
        &self,
        definition: &ScenarioDefinition,
    ) -> Result<ScenarioReport, ScenarioError> {
        let started = Instant::now();
        self.reporter.scenario_started(definition).await;

        let store = Store::new();
        let mut progress = Progress::default();
        let mut steps = Vec::with_capacity(definition.steps().len());
        let mut failure = None;

        for (index, record) in definition.steps().iter().enumerate() {
            let report = if failure.is_some() {
                StepReport::skipped(index, record)
            } else if self.signal.is_cancelled() {
                failure = Some(ScenarioError::Cancelled {
                    name: record.name().to_owned(),
                    index,
                });
                StepReport::skipped(index, record)
            } else {
                let ctx = progress.context(index, store.clone(), self.signal.clone());
                let step_started = Instant::now();
                let (attempts, outcome) = self.execute(record, ctx).await;
                let duration = step_started.elapsed();

                let status = match outcome {
                    Ok(output) => {
                        progress.record(record, output);
                        StepStatus::Passed
                    }
                    Err(source) => {
                        let message = source.to_string();
                        failure = Some(step_error(index, record, attempts, source));
                        StepStatus::Failed { message }
                    }
                };
                StepReport {
                    index,
                    name: record.name().to_owned(),
                    kind: record.kind(),
                    attempts,
                    duration,
                    status,
                }
            };

            self.reporter.step_finished(definition, &report).await;
            steps.push(report);
        }

        let cleanup = self.unwind(progress.cleanups).await;

        let report = ScenarioReport {
            name: definition.name().to_owned(),
            tags: definition.tags().to_vec(),
            steps,
            duration: started.elapsed(),
        };
        self.reporter.scenario_finished(&report).await;

        match (failure, cleanup) {
            (Some(error), Err(cleanup_error)) => {
                warn!(error = %cleanup_error, "cleanup failed after an earlier failure");
                Err(error)
            }
            (Some(error), Ok(())) | (None, Err(error)) => Err(error),
            (None, Ok(())) => Ok(report),
        }
    }

    /// Runs `record` until it succeeds, its retry policy is exhausted or the
    /// run is cancelled. Returns the number of attempts made.
    async fn execute(&self, record: &StepRecord, ctx: ExecutionContext) -> (u32, StepOutcome) {
        let policy = record.retry().unwrap_or(RetryPolicy::linear(1));
        let limit = self.config.effective_timeout(record.timeout());

        let mut attempt = 1;
        loop {
            debug!(
                step = record.name(),
                kind = %record.kind(),
                attempt,
                max_attempts = policy.max_attempts(),
                "running record"
            );
            let failure = match self.attempt(record, ctx.clone(), limit).await {
                Ok(output) => return (attempt, Ok(output)),
                Err(failure) => failure,
            };
            if matches!(failure, StepFailure::Cancelled) || attempt >= policy.max_attempts() {
                return (attempt, Err(failure));
            }

            let delay = delay_after(
                policy.backoff,
                attempt,
                self.config.retry_base_delay,
                self.config.retry_max_delay,
            );
            warn!(
                step = record.name(),
                attempt,
                error = %failure,
                delay_ms = delay.as_millis(),
                "attempt failed, retrying"
            );
            tokio::select! {
                () = sleep(delay) => {}
                () = self.signal.cancelled() => return (attempt, Err(StepFailure::Cancelled)),
            }
            attempt += 1;
        }
    }

    async fn attempt(
        &self,
        record: &StepRecord,
        ctx: ExecutionContext,
        limit: Duration,
    ) -> StepOutcome {
        let invocation = AssertUnwindSafe(record.invoke(ctx)).catch_unwind();
        tokio::select! {
            biased;
            () = self.signal.cancelled() => Err(StepFailure::Cancelled),
            outcome = timeout(limit, invocation) => match outcome {
                Err(_elapsed) => Err(StepFailure::Timeout(limit)),
                Ok(Err(panic)) => Err(StepFailure::Panic(panic_message(panic))),
                Ok(Ok(result)) => result.map_err(StepFailure::Error),
            },
        }
    }

    /// Runs cleanups last-in first-out. Every cleanup runs even when an
    /// earlier one failed; failures are joined into one error.
    async fn unwind(&self, mut cleanups: Vec<(String, Cleanup)>) -> Result<(), ScenarioError> {
        let mut failures: Vec<(String, DynError)> = Vec::new();

        while let Some((name, cleanup)) = cleanups.pop() {
            debug!(%name, "running cleanup");
            let outcome = timeout(
                self.config.cleanup_timeout,
                AssertUnwindSafe(cleanup.run()).catch_unwind(),
            )
            .await;
            let result: Result<(), DynError> = match outcome {
                Err(_elapsed) => {
                    Err(format!("timed out after {:?}", self.config.cleanup_timeout).into())
                }
                Ok(Err(panic)) => Err(format!("panicked: {}", panic_message(panic)).into()),
                Ok(Ok(result)) => result,
            };
            if let Err(source) = result {
                warn!(%name, error = %source, "cleanup failed");
                failures.push((name, source));
            }
        }

        if failures.is_empty() {
            return Ok(());
        }

        let summary = failures
            .into_iter()
            .map(|(name, source)| format!("{name}: {source}"))
            .collect::<Vec<_>>()
            .join("\n");

        Err(ScenarioError::Cleanup(summary.into()))
    }
}

/// Values produced so far in one run.
struct Progress {
    previous: StepValue,
    results: Vec<StepValue>,
    resources: ResourceMap,
    cleanups: Vec<(String, Cleanup)>,
}

impl Default for Progress {
    fn default() -> Self {
        Self {
            previous: Arc::new(()),
            results: Vec::new(),
            resources: ResourceMap::new(),
            cleanups: Vec::new(),
        }
    }
}

impl Progress {
    fn context(&self, index: usize, store: Store, signal: Signal) -> ExecutionContext {
        ExecutionContext::new(store, signal).with_history(
            index,
            Arc::clone(&self.previous),
            Arc::<[StepValue]>::from(self.results.as_slice()),
            self.resources.clone(),
        )
    }

    fn record(&mut self, record: &StepRecord, output: StepOutput) {
        match output {
            StepOutput::Value(value) => {
                self.previous = Arc::clone(&value);
                self.results.push(value);
            }
            StepOutput::Resource { value, dispose } => {
                self.resources.insert(record.name(), value);
                self.cleanups.push((record.name().to_owned(), dispose));
            }
            StepOutput::Setup(cleanup) => {
                if !cleanup.is_noop() {
                    self.cleanups.push((record.name().to_owned(), cleanup));
                }
            }
        }
    }
}

fn step_error(
    index: usize,
    record: &StepRecord,
    attempts: u32,
    source: StepFailure,
) -> ScenarioError {
    let name = record.name().to_owned();
    match source {
        StepFailure::Cancelled => ScenarioError::Cancelled { name, index },
        source => ScenarioError::Step {
            name,
            index,
            attempts,
            location: display_origin(record.origin()),
            source,
        },
    }
}

/// Attempts to turn a panic payload into a readable string for diagnostics.
fn panic_message(panic: Box<dyn Any + Send>) -> String {
    panic.downcast::<String>().map_or_else(
        |panic| {
            panic.downcast::<&'static str>().map_or_else(
                |_| "unknown panic".to_owned(),
                |message| (*message).to_owned(),
            )
        },
        |message| *message,
    )
}
