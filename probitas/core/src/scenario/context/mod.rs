//! What a setup, resource or step function sees when it runs.
//!
//! Runners build an [`ExecutionContext`], which is untyped. Before calling a
//! user function the record narrows it into a [`StepContext`] carrying the
//! builder's type parameters, so functions read results and resources with
//! their registered types.

mod resources;
mod results;
mod signal;
mod store;

use std::{any::type_name, marker::PhantomData, sync::Arc};

pub use resources::{Contains, Here, ResourceKey, ResourceMap, ResourceSet, There};
pub use results::ResultChain;
pub use signal::{CancelHandle, Signal, cancellation};
pub use store::Store;

use super::StepValue;

#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("result #{index} is not available yet")]
    MissingResult { index: usize },
    #[error("result #{index} is not a `{expected}`")]
    ResultType { index: usize, expected: &'static str },
    #[error("previous result is not a `{expected}`")]
    PreviousType { expected: &'static str },
    #[error("resource `{name}` is not registered")]
    MissingResource { name: String },
    #[error("resource `{name}` is not a `{expected}`")]
    ResourceType { name: String, expected: &'static str },
}

/// Untyped execution context assembled by a runner for one record.
#[derive(Clone, Debug)]
pub struct ExecutionContext {
    index: usize,
    previous: StepValue,
    results: Arc<[StepValue]>,
    resources: ResourceMap,
    store: Store,
    signal: Signal,
}

impl ExecutionContext {
    /// Context for the first record of a run: no results, no resources.
    #[must_use]
    pub fn new(store: Store, signal: Signal) -> Self {
        Self {
            index: 0,
            previous: Arc::new(()),
            results: Arc::from(Vec::new()),
            resources: ResourceMap::new(),
            store,
            signal,
        }
    }

    /// `previous` must be the value of the last step, or `()` if no step has
    /// run yet.
    #[must_use]
    pub fn with_history(
        mut self,
        index: usize,
        previous: StepValue,
        results: Arc<[StepValue]>,
        resources: ResourceMap,
    ) -> Self {
        self.index = index;
        self.previous = previous;
        self.results = results;
        self.resources = resources;
        self
    }

    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn previous(&self) -> &StepValue {
        &self.previous
    }

    #[must_use]
    pub fn results(&self) -> &[StepValue] {
        &self.results
    }

    #[must_use]
    pub const fn resources(&self) -> &ResourceMap {
        &self.resources
    }

    #[must_use]
    pub const fn store(&self) -> &Store {
        &self.store
    }

    #[must_use]
    pub const fn signal(&self) -> &Signal {
        &self.signal
    }
}

/// Typed view of an [`ExecutionContext`].
///
/// `P` is the previous step's result, `A` the chain of all step results so
/// far and `R` the resources registered before this record.
pub struct StepContext<P, A: ResultChain, R: ResourceSet> {
    index: usize,
    previous: Arc<P>,
    results: A::Values,
    handles: R::Handles,
    raw_results: Arc<[StepValue]>,
    resources: ResourceMap,
    store: Store,
    signal: Signal,
    _types: PhantomData<fn() -> (A, R)>,
}

impl<P, A, R> StepContext<P, A, R>
where
    P: Send + Sync + 'static,
    A: ResultChain,
    R: ResourceSet,
{
    pub fn from_execution(ctx: ExecutionContext) -> Result<Self, ContextError> {
        let ExecutionContext {
            index,
            previous,
            results,
            resources,
            store,
            signal,
        } = ctx;

        let previous = previous
            .downcast::<P>()
            .map_err(|_| ContextError::PreviousType {
                expected: type_name::<P>(),
            })?;
        let typed_results = A::collect(&results)?;
        let handles = R::collect(&resources)?;

        Ok(Self {
            index,
            previous,
            results: typed_results,
            handles,
            raw_results: results,
            resources,
            store,
            signal,
            _types: PhantomData,
        })
    }

    /// Position of the running record within the scenario.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn previous(&self) -> &P {
        &self.previous
    }

    #[must_use]
    pub const fn results(&self) -> &A::Values {
        &self.results
    }

    /// Runtime-checked access to the result of the `index`-th step.
    pub fn result<T>(&self, index: usize) -> Result<Arc<T>, ContextError>
    where
        T: Send + Sync + 'static,
    {
        let value = self
            .raw_results
            .get(index)
            .ok_or(ContextError::MissingResult { index })?;
        Arc::clone(value)
            .downcast::<T>()
            .map_err(|_| ContextError::ResultType {
                index,
                expected: type_name::<T>(),
            })
    }

    /// Resource registered under `K`; only compiles when `K` was registered
    /// earlier in the chain.
    #[must_use]
    pub fn resource<K, I>(&self, _key: K) -> &K::Value
    where
        K: ResourceKey,
        R: Contains<K, I>,
    {
        R::handle(&self.handles)
    }

    /// Shared handle to the resource registered under `K`.
    #[must_use]
    pub fn resource_handle<K, I>(&self, _key: K) -> Arc<K::Value>
    where
        K: ResourceKey,
        R: Contains<K, I>,
    {
        Arc::clone(R::handle(&self.handles))
    }

    /// Every live resource by name, for lookups the type system cannot see.
    #[must_use]
    pub const fn resources(&self) -> &ResourceMap {
        &self.resources
    }

    #[must_use]
    pub const fn store(&self) -> &Store {
        &self.store
    }

    #[must_use]
    pub const fn signal(&self) -> &Signal {
        &self.signal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    crate::resource_key!(Token: String = "token");

    #[test]
    fn narrows_an_untyped_context() {
        let mut resources = ResourceMap::new();
        resources.insert(Token::NAME, Arc::new(String::from("secret")));
        let results: Arc<[StepValue]> = Arc::from(vec![Arc::new(3_i32) as StepValue]);
        let ctx = ExecutionContext::new(Store::new(), Signal::never()).with_history(
            2,
            Arc::new(3_i32),
            results,
            resources,
        );

        let typed = StepContext::<i32, ((), i32), ((), Token)>::from_execution(ctx).unwrap();

        assert_eq!(typed.index(), 2);
        assert_eq!(*typed.previous(), 3);
        assert_eq!(*typed.results().1, 3);
        assert_eq!(typed.resource(Token), "secret");
        assert_eq!(*typed.result::<i32>(0).unwrap(), 3);
        assert!(typed.result::<i32>(1).is_err());
    }

    #[test]
    fn rejects_a_mismatched_previous_result() {
        let ctx = ExecutionContext::new(Store::new(), Signal::never());

        let error = StepContext::<u8, (), ()>::from_execution(ctx)
            .err()
            .expect("unit previous is not a u8");

        assert!(matches!(error, ContextError::PreviousType { .. }));
    }
}
