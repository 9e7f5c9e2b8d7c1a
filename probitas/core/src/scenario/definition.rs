use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::record::{StepDescriptor, StepKind, StepRecord};
use crate::origin::Origin;

/// A built scenario: name, tags and the frozen record list.
///
/// Cloning is cheap and clones share records with each other and with the
/// builder they came from.
#[derive(Clone, Debug)]
pub struct ScenarioDefinition {
    name: String,
    tags: Arc<[String]>,
    steps: Arc<[Arc<StepRecord>]>,
    origin: Option<Origin>,
}

impl ScenarioDefinition {
    pub(crate) const fn new(
        name: String,
        tags: Arc<[String]>,
        steps: Arc<[Arc<StepRecord>]>,
        origin: Option<Origin>,
    ) -> Self {
        Self {
            name,
            tags,
            steps,
            origin,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn tags(&self) -> Arc<[String]> {
        Arc::clone(&self.tags)
    }

    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|candidate| candidate == tag)
    }

    #[must_use]
    pub fn steps(&self) -> &[Arc<StepRecord>] {
        &self.steps
    }

    /// Where `build` was called.
    #[must_use]
    pub const fn origin(&self) -> Option<&Origin> {
        self.origin.as_ref()
    }

    /// Names of the resources, in registration order.
    pub fn resources(&self) -> impl Iterator<Item = &str> {
        self.steps
            .iter()
            .filter(|record| record.kind() == StepKind::Resource)
            .map(|record| record.name())
    }

    #[must_use]
    pub fn descriptor(&self) -> ScenarioDescriptor {
        ScenarioDescriptor {
            name: self.name.clone(),
            tags: self.tags.to_vec(),
            steps: self.steps.iter().map(|record| record.descriptor()).collect(),
            origin: self.origin.clone(),
        }
    }
}

/// Serializable view of a [`ScenarioDefinition`], without step functions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioDescriptor {
    pub name: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub steps: Vec<StepDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<Origin>,
}
