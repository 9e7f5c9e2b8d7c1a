//! Scenario building and execution for integration tests.
//!
//! A scenario is an ordered list of setup, resource and step records built
//! through [`scenario`]. The builder is immutable: every chained call returns
//! a new builder, so a shared prefix can be branched into independent
//! scenarios. [`ScenarioBuilder::build`] freezes the chain into a
//! [`ScenarioDefinition`] that a [`Runner`] executes.
//!
//! ```
//! use probitas_core::{DynError, Runner, RunnerConfig, resource_key, scenario};
//!
//! resource_key!(Greeting: String = "greeting");
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), DynError> {
//! let definition = scenario("greets")
//!     .resource(Greeting, |_| async { Ok(String::from("hello")) })
//!     .step("length", |ctx| async move { Ok(ctx.resource(Greeting).len()) })
//!     .step("doubled", |ctx| async move { Ok(*ctx.previous() * 2) })
//!     .build();
//!
//! let report = Runner::new(RunnerConfig::default()).run(&definition).await?;
//! assert_eq!(report.steps().len(), 3);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod logging;
pub mod origin;
pub mod scenario;

use std::{env, sync::LazyLock, time::Duration};

pub use config::{ConfigError, RunnerConfig};
pub use origin::Origin;
pub use scenario::{
    Backoff, CancelHandle, Cleanup, ContextError, DynError, ExecutionContext, Reporter,
    ResourceKey, ResourceMap, RetryPolicy, Runner, ScenarioBuilder, ScenarioDefinition,
    ScenarioDescriptor, ScenarioError, ScenarioOptions, ScenarioReport, Signal, StepContext,
    StepDescriptor, StepFailure, StepKind, StepOptions, StepOutput, StepRecord, StepReport,
    StepStatus, StepValue, Store, TracingReporter, scenario, scenario_with_options,
};

pub(crate) static IS_SLOW_TEST_ENV: LazyLock<bool> =
    LazyLock::new(|| env::var("SLOW_TEST_ENV").is_ok_and(|s| s == "true"));

/// In slow test environments like Codecov, use 2x timeout.
#[must_use]
pub fn adjust_timeout(d: Duration) -> Duration {
    if *IS_SLOW_TEST_ENV { d.saturating_mul(2) } else { d }
}
