pub(crate) mod builder;
mod cleanup;
mod context;
mod definition;
mod options;
mod record;
mod runtime;
pub(crate) mod state;

use std::{any::Any, sync::Arc};

pub use builder::{ScenarioBuilder, scenario, scenario_with_options};
pub use cleanup::Cleanup;
pub use context::{
    CancelHandle, Contains, ContextError, ExecutionContext, Here, ResourceKey, ResourceMap,
    ResourceSet, ResultChain, Signal, StepContext, Store, There, cancellation,
};
pub use definition::{ScenarioDefinition, ScenarioDescriptor};
pub use options::{Backoff, RetryPolicy, ScenarioOptions, StepOptions};
pub use record::{StepDescriptor, StepKind, StepOutput, StepRecord};
pub use runtime::{
    Reporter, Runner, ScenarioError, ScenarioReport, StepFailure, StepReport, StepStatus,
    TracingReporter,
};

pub type DynError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type BoxFuture<'a, T> = futures::future::BoxFuture<'a, T>;

/// A step result or resource value with its type erased.
pub type StepValue = Arc<dyn Any + Send + Sync>;
