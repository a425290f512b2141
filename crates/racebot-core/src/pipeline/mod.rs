pub mod builder;
pub mod common;
pub mod context;
pub mod step;

pub use builder::{BuiltVariant, Pipeline, PipelineBuilder, RaceVerifier};
pub use context::{RunContext, UNKNOWN_REVISION};
pub use step::{CommandKind, Completion, Destination, Step, StepAction};
