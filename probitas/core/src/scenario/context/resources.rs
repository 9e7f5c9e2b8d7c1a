use std::{any::type_name, collections::HashMap, marker::PhantomData, sync::Arc};

use futures::future;

use super::ContextError;
use crate::scenario::{BoxFuture, DynError, StepValue};

/// Names a resource and fixes the type a scenario registers under that name.
///
/// Keys are usually declared with [`crate::resource_key!`]. Implement the
/// trait by hand to give a resource an asynchronous teardown through
/// [`ResourceKey::dispose`]; otherwise the value is released by dropping it.
pub trait ResourceKey: Send + Sync + 'static {
    type Value: Send + Sync + 'static;

    const NAME: &'static str;

    fn dispose(value: Arc<Self::Value>) -> BoxFuture<'static, Result<(), DynError>> {
        drop(value);
        Box::pin(future::ready(Ok(())))
    }
}

/// Declares a zero-sized [`ResourceKey`].
///
/// ```
/// probitas_core::resource_key!(
///     /// Connection string of the database under test.
///     pub Dsn: String = "dsn"
/// );
/// # use probitas_core::ResourceKey as _;
/// assert_eq!(Dsn::NAME, "dsn");
/// ```
#[macro_export]
macro_rules! resource_key {
    ($(#[$meta:meta])* $vis:vis $key:ident: $value:ty = $name:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Default)]
        $vis struct $key;

        impl $crate::scenario::ResourceKey for $key {
            type Value = $value;

            const NAME: &'static str = $name;
        }
    };
}

/// Type-level list of the resources registered so far: `()` when empty,
/// `(Rest, K)` after registering `K`.
pub trait ResourceSet: Send + Sync + 'static {
    type Handles: Clone + Send + Sync;

    fn collect(resources: &ResourceMap) -> Result<Self::Handles, ContextError>;
}

impl ResourceSet for () {
    type Handles = ();

    fn collect(_resources: &ResourceMap) -> Result<Self::Handles, ContextError> {
        Ok(())
    }
}

impl<Rest, K> ResourceSet for (Rest, K)
where
    Rest: ResourceSet,
    K: ResourceKey,
{
    type Handles = (Rest::Handles, Arc<K::Value>);

    fn collect(resources: &ResourceMap) -> Result<Self::Handles, ContextError> {
        Ok((Rest::collect(resources)?, resources.get::<K::Value>(K::NAME)?))
    }
}

/// Position marker: the key is the most recently registered resource.
pub struct Here;

/// Position marker: the key sits somewhere before the most recent resource.
pub struct There<I>(PhantomData<I>);

/// Proof that resource `K` was registered before the current point of the
/// chain. `I` is inferred, callers never name it.
///
/// A step can only reach resources registered earlier in its own chain:
///
/// ```compile_fail
/// # use probitas_core::{resource_key, scenario};
/// resource_key!(Api: String = "api");
///
/// let _ = scenario("too early")
///     .step("uses api", |ctx| async move { Ok(ctx.resource(Api).len()) })
///     .resource(Api, |_| async { Ok(String::from("http://localhost")) });
/// ```
pub trait Contains<K: ResourceKey, I>: ResourceSet {
    fn handle(handles: &Self::Handles) -> &Arc<K::Value>;
}

impl<Rest, K> Contains<K, Here> for (Rest, K)
where
    Rest: ResourceSet,
    K: ResourceKey,
{
    fn handle(handles: &Self::Handles) -> &Arc<K::Value> {
        &handles.1
    }
}

impl<Rest, Head, K, I> Contains<K, There<I>> for (Rest, Head)
where
    Rest: Contains<K, I>,
    Head: ResourceKey,
    K: ResourceKey,
{
    fn handle(handles: &Self::Handles) -> &Arc<K::Value> {
        Rest::handle(&handles.0)
    }
}

/// Live resources by name, as seen by one record.
///
/// Cloning is cheap; [`ResourceMap::insert`] copies the underlying map only
/// when another clone still shares it, so snapshots handed to earlier
/// records never change.
#[derive(Clone, Default)]
pub struct ResourceMap {
    entries: Arc<HashMap<String, StepValue>>,
}

impl ResourceMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: StepValue) -> Option<StepValue> {
        Arc::make_mut(&mut self.entries).insert(name.into(), value)
    }

    pub fn get<T>(&self, name: &str) -> Result<Arc<T>, ContextError>
    where
        T: Send + Sync + 'static,
    {
        let value = self
            .entries
            .get(name)
            .ok_or_else(|| ContextError::MissingResource {
                name: name.to_owned(),
            })?;
        Arc::clone(value)
            .downcast::<T>()
            .map_err(|_| ContextError::ResourceType {
                name: name.to_owned(),
                expected: type_name::<T>(),
            })
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for ResourceMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.entries.keys()).finish()
    }
}
