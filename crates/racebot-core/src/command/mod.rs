pub mod build;
pub mod invoke;
pub mod model;

pub use build::{BuildCommand, BuildRequest, synthesize_build};
pub use invoke::{Frontend, Mode, RunConfig, TestCommand, synthesize_test};
pub use model::{Env, StepCommand};
