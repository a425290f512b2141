pub mod benchmark;
pub mod log;
pub mod revision;
pub mod run;
pub mod severity;

pub use benchmark::{BenchmarkLogProcessor, BenchmarkSpec, Expectation};
pub use log::{LogProcessor, StepOutcome, StepVerdict, evaluate_outcome, evaluate_step, evaluate_with};
pub use run::{PipelineRun, RunSummary};
pub use severity::{Severity, combine_all};
