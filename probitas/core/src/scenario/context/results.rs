use std::{any::type_name, sync::Arc};

use super::ContextError;
use crate::scenario::StepValue;

/// Type-level list of the results produced by earlier steps.
///
/// The builder grows it one step at a time: `()` before any step, then
/// `((), T1)`, `(((), T1), T2)` and so on. [`ResultChain::Values`] mirrors the
/// same shape with each result behind an `Arc`, which is what
/// [`super::StepContext::results`] hands out:
///
/// ```
/// # use probitas_core::scenario;
/// let _ = scenario("chain")
///     .step("id", |_| async { Ok(7_u64) })
///     .step("label", |_| async { Ok(String::from("seven")) })
///     .step("check", |ctx| async move {
///         let (((), id), label) = ctx.results();
///         Ok(format!("{id}:{label}"))
///     });
/// ```
pub trait ResultChain: Send + Sync + 'static {
    type Values: Clone + Send + Sync;

    const LEN: usize;

    fn collect(values: &[StepValue]) -> Result<Self::Values, ContextError>;
}

impl ResultChain for () {
    type Values = ();

    const LEN: usize = 0;

    fn collect(_values: &[StepValue]) -> Result<Self::Values, ContextError> {
        Ok(())
    }
}

impl<Prev, T> ResultChain for (Prev, T)
where
    Prev: ResultChain,
    T: Send + Sync + 'static,
{
    type Values = (Prev::Values, Arc<T>);

    const LEN: usize = Prev::LEN + 1;

    fn collect(values: &[StepValue]) -> Result<Self::Values, ContextError> {
        let index = Prev::LEN;
        let value = values
            .get(index)
            .ok_or(ContextError::MissingResult { index })?;
        let typed = Arc::clone(value)
            .downcast::<T>()
            .map_err(|_| ContextError::ResultType {
                index,
                expected: type_name::<T>(),
            })?;
        Ok((Prev::collect(values)?, typed))
    }
}
