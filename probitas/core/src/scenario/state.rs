use std::sync::Arc;

use tracing::trace;

use super::{
    ScenarioDefinition, ScenarioOptions, StepOptions,
    record::{StepFn, StepKind, StepName, StepRecord},
};
use crate::origin::Origin;

pub(crate) const SOURCE_FILE: &str = file!();

/// Mutable accumulator behind [`super::ScenarioBuilder`].
///
/// Cloning copies the record list (records themselves are shared, they never
/// change), so two clones can grow independently.
#[derive(Clone, Debug)]
pub(crate) struct BuilderState {
    name: String,
    options: ScenarioOptions,
    records: Vec<Arc<StepRecord>>,
}

impl BuilderState {
    pub(crate) const fn new(name: String, options: ScenarioOptions) -> Self {
        Self {
            name,
            options,
            records: Vec::new(),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn records(&self) -> &[Arc<StepRecord>] {
        &self.records
    }

    #[track_caller]
    pub(crate) fn add_resource_step(
        &mut self,
        name: &str,
        func: StepFn,
        options: Option<StepOptions>,
    ) {
        self.push(
            StepKind::Resource,
            StepName::explicit(name),
            func,
            options,
            Origin::capture(),
        );
    }

    #[track_caller]
    pub(crate) fn add_setup_step(
        &mut self,
        name: StepName,
        func: StepFn,
        options: Option<StepOptions>,
    ) {
        self.push(StepKind::Setup, name, func, options, Origin::capture());
    }

    #[track_caller]
    pub(crate) fn add_execution_step(
        &mut self,
        name: StepName,
        func: StepFn,
        options: Option<StepOptions>,
    ) {
        self.push(StepKind::Step, name, func, options, Origin::capture());
    }

    fn push(
        &mut self,
        kind: StepKind,
        name: StepName,
        func: StepFn,
        options: Option<StepOptions>,
        origin: Option<Origin>,
    ) {
        let name = match name {
            StepName::Explicit(name) => name,
            StepName::Auto => self.auto_name(kind),
        };
        let effective = options
            .unwrap_or_default()
            .merged_over(&self.options.step_options);

        trace!(
            scenario = %self.name,
            %kind,
            step = %name,
            position = self.records.len(),
            "appending scenario record"
        );

        self.records.push(Arc::new(StepRecord::new(
            kind,
            name,
            func,
            effective.timeout,
            effective.retry,
            origin,
        )));
    }

    /// Counts records of `kind` in this chain only, so sibling branches
    /// number their records independently.
    fn auto_name(&self, kind: StepKind) -> String {
        let existing = self
            .records
            .iter()
            .filter(|record| record.kind() == kind)
            .count();
        format!("{} {}", kind.auto_name_prefix(), existing + 1)
    }

    #[track_caller]
    pub(crate) fn build(&self) -> ScenarioDefinition {
        ScenarioDefinition::new(
            self.name.clone(),
            self.options.tags.iter().cloned().collect(),
            self.records.iter().cloned().collect(),
            Origin::capture(),
        )
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures::FutureExt as _;

    use super::*;
    use crate::scenario::{DynError, ExecutionContext, RetryPolicy, StepOutput};

    fn noop() -> StepFn {
        Arc::new(|_: ExecutionContext| {
            async { Ok::<_, DynError>(StepOutput::Value(Arc::new(()))) }.boxed()
        })
    }

    fn names(state: &BuilderState) -> Vec<&str> {
        state.records().iter().map(|record| record.name()).collect()
    }

    #[test]
    fn auto_names_count_per_kind() {
        let mut state = BuilderState::new("naming".to_owned(), ScenarioOptions::default());
        state.add_setup_step(StepName::Auto, noop(), None);
        state.add_execution_step(StepName::Auto, noop(), None);
        state.add_execution_step(StepName::explicit("named"), noop(), None);
        state.add_setup_step(StepName::Auto, noop(), None);
        state.add_execution_step(StepName::Auto, noop(), None);

        assert_eq!(
            names(&state),
            [
                "Setup step 1",
                "Execution step 1",
                "named",
                "Setup step 2",
                "Execution step 3",
            ]
        );
    }

    #[test]
    fn clones_grow_independently() {
        let mut base = BuilderState::new("branching".to_owned(), ScenarioOptions::default());
        base.add_execution_step(StepName::Auto, noop(), None);

        let mut left = base.clone();
        let mut right = base.clone();
        left.add_execution_step(StepName::Auto, noop(), None);
        right.add_execution_step(StepName::Auto, noop(), None);
        right.add_setup_step(StepName::Auto, noop(), None);

        assert_eq!(base.records().len(), 1);
        assert_eq!(names(&left), ["Execution step 1", "Execution step 2"]);
        assert_eq!(
            names(&right),
            ["Execution step 1", "Execution step 2", "Setup step 1"]
        );
        assert!(Arc::ptr_eq(&left.records()[0], &right.records()[0]));
    }

    #[test]
    fn scenario_defaults_fill_unset_options() {
        let defaults = StepOptions::new()
            .with_timeout(Duration::from_secs(30))
            .with_retry(RetryPolicy::linear(2));
        let mut state = BuilderState::new(
            "options".to_owned(),
            ScenarioOptions::default().with_step_options(defaults),
        );
        state.add_execution_step(StepName::Auto, noop(), None);
        state.add_execution_step(
            StepName::Auto,
            noop(),
            Some(StepOptions::new().with_timeout(Duration::from_secs(1))),
        );

        let records = state.records();
        assert_eq!(records[0].timeout(), Some(Duration::from_secs(30)));
        assert_eq!(records[1].timeout(), Some(Duration::from_secs(1)));
        assert_eq!(records[1].retry(), Some(RetryPolicy::linear(2)));
    }

    #[test]
    fn builds_carry_tags_and_records() {
        let mut state = BuilderState::new(
            "tagged".to_owned(),
            ScenarioOptions::default().with_tags(["smoke", "db"]),
        );
        state.add_resource_step("pool", noop(), None);

        let definition = state.build();

        assert_eq!(definition.name(), "tagged");
        assert_eq!(&*definition.tags(), ["smoke", "db"]);
        assert_eq!(definition.steps()[0].kind(), StepKind::Resource);
        assert!(definition.steps()[0].origin().is_none());
    }
}
