use std::{fmt, future::Future, marker::PhantomData};

use super::{
    Cleanup, DynError, ScenarioDefinition, ScenarioOptions, StepOptions,
    context::{ResourceKey, ResourceSet, ResultChain, StepContext},
    record::{StepName, erase_resource, erase_setup, erase_step},
    state::BuilderState,
};

pub(crate) const SOURCE_FILE: &str = file!();

/// Starts a scenario with default options.
#[must_use]
pub fn scenario(name: impl Into<String>) -> ScenarioBuilder {
    ScenarioBuilder::new(name, ScenarioOptions::default())
}

/// Starts a scenario whose tags and step defaults come from `options`.
#[must_use]
pub fn scenario_with_options(name: impl Into<String>, options: ScenarioOptions) -> ScenarioBuilder {
    ScenarioBuilder::new(name, options)
}

/// Immutable, typed scenario builder.
///
/// `P` is the result type of the most recent step, `A` the chain of every
/// step result so far and `R` the resources registered so far. Each method
/// leaves `self` untouched and returns a new builder, so a prefix can be
/// reused:
///
/// ```
/// # use probitas_core::scenario;
/// let login = scenario("login").step("token", |_| async { Ok(String::from("t0k3n")) });
///
/// let admin = login.step("admin", |ctx| async move { Ok(ctx.previous().len()) });
/// let guest = login.anonymous_step(|_| async { Ok(false) });
///
/// assert_eq!(login.len(), 1);
/// assert_eq!(admin.build().steps()[1].name(), "admin");
/// assert_eq!(guest.build().steps()[1].name(), "Execution step 2");
/// ```
pub struct ScenarioBuilder<P = (), A = (), R = ()> {
    state: BuilderState,
    _types: PhantomData<fn() -> (P, A, R)>,
}

impl<P, A, R> Clone for ScenarioBuilder<P, A, R> {
    fn clone(&self) -> Self {
        Self::from_state(self.state.clone())
    }
}

impl<P, A, R> fmt::Debug for ScenarioBuilder<P, A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScenarioBuilder")
            .field("name", &self.state.name())
            .field("records", &self.state.records())
            .finish()
    }
}

impl ScenarioBuilder {
    #[must_use]
    pub fn new(name: impl Into<String>, options: ScenarioOptions) -> Self {
        Self::from_state(BuilderState::new(name.into(), options))
    }
}

impl<P, A, R> ScenarioBuilder<P, A, R> {
    const fn from_state(state: BuilderState) -> Self {
        Self {
            state,
            _types: PhantomData,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.state.name()
    }

    /// Number of records in this chain.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.records().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.records().is_empty()
    }

    /// Freezes the chain. The builder stays usable; later calls on it do
    /// not affect definitions already built.
    #[must_use]
    #[track_caller]
    pub fn build(&self) -> ScenarioDefinition {
        self.state.build()
    }
}

impl<P, A, R> ScenarioBuilder<P, A, R>
where
    P: Send + Sync + 'static,
    A: ResultChain,
    R: ResourceSet,
{
    /// Registers a resource under `K::NAME`. Later records read it with
    /// [`StepContext::resource`]; it is disposed through
    /// [`ResourceKey::dispose`] when the scenario ends.
    #[must_use]
    #[track_caller]
    pub fn resource<K, F, Fut>(&self, _key: K, factory: F) -> ScenarioBuilder<P, A, (R, K)>
    where
        K: ResourceKey,
        F: Fn(StepContext<P, A, R>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<K::Value, DynError>> + Send + 'static,
    {
        let mut state = self.state.clone();
        state.add_resource_step(K::NAME, erase_resource::<P, A, R, K, F, Fut>(factory), None);
        ScenarioBuilder::from_state(state)
    }

    #[must_use]
    #[track_caller]
    pub fn resource_with<K, F, Fut>(
        &self,
        _key: K,
        options: StepOptions,
        factory: F,
    ) -> ScenarioBuilder<P, A, (R, K)>
    where
        K: ResourceKey,
        F: Fn(StepContext<P, A, R>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<K::Value, DynError>> + Send + 'static,
    {
        let mut state = self.state.clone();
        state.add_resource_step(
            K::NAME,
            erase_resource::<P, A, R, K, F, Fut>(factory),
            Some(options),
        );
        ScenarioBuilder::from_state(state)
    }

    /// Adds a setup record. Its function returns what to undo at the end of
    /// the scenario: `()`, or any [`Cleanup`].
    #[must_use]
    #[track_caller]
    pub fn setup<C, F, Fut>(&self, name: impl Into<String>, setup: F) -> Self
    where
        C: Into<Cleanup>,
        F: Fn(StepContext<P, A, R>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<C, DynError>> + Send + 'static,
    {
        let mut state = self.state.clone();
        state.add_setup_step(
            StepName::explicit(name),
            erase_setup::<P, A, R, C, F, Fut>(setup),
            None,
        );
        Self::from_state(state)
    }

    /// Like [`Self::setup`], named `Setup step N`.
    #[must_use]
    #[track_caller]
    pub fn anonymous_setup<C, F, Fut>(&self, setup: F) -> Self
    where
        C: Into<Cleanup>,
        F: Fn(StepContext<P, A, R>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<C, DynError>> + Send + 'static,
    {
        let mut state = self.state.clone();
        state.add_setup_step(StepName::Auto, erase_setup::<P, A, R, C, F, Fut>(setup), None);
        Self::from_state(state)
    }

    #[must_use]
    #[track_caller]
    pub fn setup_with<C, F, Fut>(
        &self,
        name: impl Into<String>,
        options: StepOptions,
        setup: F,
    ) -> Self
    where
        C: Into<Cleanup>,
        F: Fn(StepContext<P, A, R>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<C, DynError>> + Send + 'static,
    {
        let mut state = self.state.clone();
        state.add_setup_step(
            StepName::explicit(name),
            erase_setup::<P, A, R, C, F, Fut>(setup),
            Some(options),
        );
        Self::from_state(state)
    }

    #[must_use]
    #[track_caller]
    pub fn anonymous_setup_with<C, F, Fut>(&self, options: StepOptions, setup: F) -> Self
    where
        C: Into<Cleanup>,
        F: Fn(StepContext<P, A, R>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<C, DynError>> + Send + 'static,
    {
        let mut state = self.state.clone();
        state.add_setup_step(
            StepName::Auto,
            erase_setup::<P, A, R, C, F, Fut>(setup),
            Some(options),
        );
        Self::from_state(state)
    }

    /// Adds a step. Its result becomes the next record's
    /// [`StepContext::previous`] and is appended to
    /// [`StepContext::results`].
    #[must_use]
    #[track_caller]
    pub fn step<T, F, Fut>(&self, name: impl Into<String>, step: F) -> ScenarioBuilder<T, (A, T), R>
    where
        T: Send + Sync + 'static,
        F: Fn(StepContext<P, A, R>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, DynError>> + Send + 'static,
    {
        let mut state = self.state.clone();
        state.add_execution_step(
            StepName::explicit(name),
            erase_step::<P, A, R, T, F, Fut>(step),
            None,
        );
        ScenarioBuilder::from_state(state)
    }

    /// Like [`Self::step`], named `Execution step N`.
    #[must_use]
    #[track_caller]
    pub fn anonymous_step<T, F, Fut>(&self, step: F) -> ScenarioBuilder<T, (A, T), R>
    where
        T: Send + Sync + 'static,
        F: Fn(StepContext<P, A, R>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, DynError>> + Send + 'static,
    {
        let mut state = self.state.clone();
        state.add_execution_step(StepName::Auto, erase_step::<P, A, R, T, F, Fut>(step), None);
        ScenarioBuilder::from_state(state)
    }

    #[must_use]
    #[track_caller]
    pub fn step_with<T, F, Fut>(
        &self,
        name: impl Into<String>,
        options: StepOptions,
        step: F,
    ) -> ScenarioBuilder<T, (A, T), R>
    where
        T: Send + Sync + 'static,
        F: Fn(StepContext<P, A, R>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, DynError>> + Send + 'static,
    {
        let mut state = self.state.clone();
        state.add_execution_step(
            StepName::explicit(name),
            erase_step::<P, A, R, T, F, Fut>(step),
            Some(options),
        );
        ScenarioBuilder::from_state(state)
    }

    #[must_use]
    #[track_caller]
    pub fn anonymous_step_with<T, F, Fut>(
        &self,
        options: StepOptions,
        step: F,
    ) -> ScenarioBuilder<T, (A, T), R>
    where
        T: Send + Sync + 'static,
        F: Fn(StepContext<P, A, R>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, DynError>> + Send + 'static,
    {
        let mut state = self.state.clone();
        state.add_execution_step(
            StepName::Auto,
            erase_step::<P, A, R, T, F, Fut>(step),
            Some(options),
        );
        ScenarioBuilder::from_state(state)
    }
}
