mod error;
mod report;
mod reporter;
mod retry;
mod runner;

pub use error::{ScenarioError, StepFailure};
pub use report::{ScenarioReport, StepReport, StepStatus};
pub use reporter::{Reporter, TracingReporter};
pub use runner::Runner;
