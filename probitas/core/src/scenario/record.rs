use std::{fmt, future::Future, sync::Arc, time::Duration};

use futures::FutureExt as _;
use serde::{Deserialize, Serialize};
use serde_with::{DurationMilliSeconds, serde_as};

use super::{
    BoxFuture, Cleanup, DynError, RetryPolicy, StepValue,
    context::{ExecutionContext, ResourceKey, ResourceSet, ResultChain, StepContext},
};
use crate::origin::Origin;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    Step,
    Resource,
    Setup,
}

impl StepKind {
    /// Prefix used when a record of this kind is added without a name.
    #[must_use]
    pub const fn auto_name_prefix(self) -> &'static str {
        match self {
            Self::Step => "Execution step",
            Self::Resource => "Resource step",
            Self::Setup => "Setup step",
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Step => "step",
            Self::Resource => "resource",
            Self::Setup => "setup",
        })
    }
}

/// Name given to a builder call: explicit, or generated from the number of
/// records of the same kind already in the chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum StepName {
    Explicit(String),
    Auto,
}

impl StepName {
    pub(crate) fn explicit(name: impl Into<String>) -> Self {
        Self::Explicit(name.into())
    }
}

/// What a record produced, tagged by kind.
pub enum StepOutput {
    Value(StepValue),
    Resource { value: StepValue, dispose: Cleanup },
    Setup(Cleanup),
}

impl fmt::Debug for StepOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(_) => f.write_str("Value(..)"),
            Self::Resource { dispose, .. } => f
                .debug_struct("Resource")
                .field("dispose", dispose)
                .finish_non_exhaustive(),
            Self::Setup(cleanup) => f.debug_tuple("Setup").field(cleanup).finish(),
        }
    }
}

pub(crate) type StepFn =
    Arc<dyn Fn(ExecutionContext) -> BoxFuture<'static, Result<StepOutput, DynError>> + Send + Sync>;

/// One unit of scenario work. Immutable once created.
pub struct StepRecord {
    kind: StepKind,
    name: String,
    func: StepFn,
    timeout: Option<Duration>,
    retry: Option<RetryPolicy>,
    origin: Option<Origin>,
}

impl StepRecord {
    pub(crate) fn new(
        kind: StepKind,
        name: String,
        func: StepFn,
        timeout: Option<Duration>,
        retry: Option<RetryPolicy>,
        origin: Option<Origin>,
    ) -> Self {
        Self {
            kind,
            name,
            func,
            timeout,
            retry,
            origin,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> StepKind {
        self.kind
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    #[must_use]
    pub const fn retry(&self) -> Option<RetryPolicy> {
        self.retry
    }

    #[must_use]
    pub const fn origin(&self) -> Option<&Origin> {
        self.origin.as_ref()
    }

    /// Runs the record's function once. The returned future owns everything
    /// it needs, so a runner can time it out, retry it or abandon it.
    #[must_use]
    pub fn invoke(&self, ctx: ExecutionContext) -> BoxFuture<'static, Result<StepOutput, DynError>> {
        (self.func)(ctx)
    }

    #[must_use]
    pub fn descriptor(&self) -> StepDescriptor {
        StepDescriptor {
            kind: self.kind,
            name: self.name.clone(),
            timeout: self.timeout,
            retry: self.retry,
            origin: self.origin.clone(),
        }
    }
}

impl fmt::Debug for StepRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepRecord")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}

/// Everything about a record except its function.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepDescriptor {
    pub kind: StepKind,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    pub timeout: Option<Duration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<Origin>,
}

pub(crate) fn erase_step<P, A, R, T, F, Fut>(step: F) -> StepFn
where
    P: Send + Sync + 'static,
    A: ResultChain,
    R: ResourceSet,
    T: Send + Sync + 'static,
    F: Fn(StepContext<P, A, R>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, DynError>> + Send + 'static,
{
    let step = Arc::new(step);
    Arc::new(move |ctx: ExecutionContext| {
        let step = Arc::clone(&step);
        async move {
            let ctx = StepContext::<P, A, R>::from_execution(ctx)?;
            let value = step(ctx).await?;
            Ok::<_, DynError>(StepOutput::Value(Arc::new(value)))
        }
        .boxed()
    })
}

pub(crate) fn erase_setup<P, A, R, C, F, Fut>(setup: F) -> StepFn
where
    P: Send + Sync + 'static,
    A: ResultChain,
    R: ResourceSet,
    C: Into<Cleanup>,
    F: Fn(StepContext<P, A, R>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<C, DynError>> + Send + 'static,
{
    let setup = Arc::new(setup);
    Arc::new(move |ctx: ExecutionContext| {
        let setup = Arc::clone(&setup);
        async move {
            let ctx = StepContext::<P, A, R>::from_execution(ctx)?;
            let cleanup = setup(ctx).await?;
            Ok::<_, DynError>(StepOutput::Setup(cleanup.into()))
        }
        .boxed()
    })
}

pub(crate) fn erase_resource<P, A, R, K, F, Fut>(factory: F) -> StepFn
where
    P: Send + Sync + 'static,
    A: ResultChain,
    R: ResourceSet,
    K: ResourceKey,
    F: Fn(StepContext<P, A, R>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<K::Value, DynError>> + Send + 'static,
{
    let factory = Arc::new(factory);
    Arc::new(move |ctx: ExecutionContext| {
        let factory = Arc::clone(&factory);
        async move {
            let ctx = StepContext::<P, A, R>::from_execution(ctx)?;
            let value = Arc::new(factory(ctx).await?);
            let handle = Arc::clone(&value);
            let dispose = Cleanup::from_future(move || K::dispose(handle));
            Ok::<_, DynError>(StepOutput::Resource { value, dispose })
        }
        .boxed()
    })
}
