use std::{any::Any, fmt, future::Future};

use futures::FutureExt as _;

use super::{BoxFuture, DynError};

type SyncCleanup = Box<dyn FnOnce() -> Result<(), DynError> + Send>;
type AsyncCleanup = Box<dyn FnOnce() -> BoxFuture<'static, Result<(), DynError>> + Send>;

enum Action {
    Noop,
    Guard(Box<dyn Any + Send>),
    Sync(SyncCleanup),
    Async(AsyncCleanup),
}

/// Deferred teardown produced by a setup record or a resource.
///
/// A setup function can hand back nothing, a value whose `Drop` releases
/// something (a guard), or a function to call; the runner treats all of them
/// the same way and runs them in reverse registration order.
pub struct Cleanup {
    action: Action,
}

impl Cleanup {
    #[must_use]
    pub const fn none() -> Self {
        Self {
            action: Action::Noop,
        }
    }

    /// Keeps `value` alive until cleanup, then drops it.
    #[must_use]
    pub fn guard<T>(value: T) -> Self
    where
        T: Send + 'static,
    {
        Self {
            action: Action::Guard(Box::new(value)),
        }
    }

    #[must_use]
    pub fn from_fn<F>(cleanup: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self::try_from_fn(move || {
            cleanup();
            Ok(())
        })
    }

    #[must_use]
    pub fn try_from_fn<F>(cleanup: F) -> Self
    where
        F: FnOnce() -> Result<(), DynError> + Send + 'static,
    {
        Self {
            action: Action::Sync(Box::new(cleanup)),
        }
    }

    #[must_use]
    pub fn from_future<F, Fut>(cleanup: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), DynError>> + Send + 'static,
    {
        Self {
            action: Action::Async(Box::new(move || cleanup().boxed())),
        }
    }

    #[must_use]
    pub const fn is_noop(&self) -> bool {
        matches!(self.action, Action::Noop)
    }

    pub async fn run(self) -> Result<(), DynError> {
        match self.action {
            Action::Noop => Ok(()),
            Action::Guard(guard) => {
                drop(guard);
                Ok(())
            }
            Action::Sync(cleanup) => cleanup(),
            Action::Async(cleanup) => cleanup().await,
        }
    }
}

impl Default for Cleanup {
    fn default() -> Self {
        Self::none()
    }
}

impl From<()> for Cleanup {
    fn from((): ()) -> Self {
        Self::none()
    }
}

impl fmt::Debug for Cleanup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.action {
            Action::Noop => "noop",
            Action::Guard(_) => "guard",
            Action::Sync(_) => "fn",
            Action::Async(_) => "future",
        };
        f.debug_tuple("Cleanup").field(&kind).finish()
    }
}
