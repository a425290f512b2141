//! Post-execution classification of a single step.
//!
//! The executing framework reports a shell result (derived from the exit
//! status) and the captured output. A step may carry a completion
//! capability; for log processing the processor's verdict is merged with
//! the shell result on the severity lattice, so a clean exit with anomalous
//! output still surfaces as Warnings or Failure.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::classify::benchmark::BenchmarkSpec;
use crate::classify::revision;
use crate::classify::severity::Severity;
use crate::error::RevisionError;
use crate::pipeline::context::RunContext;
use crate::pipeline::step::{Completion, Step};

/// Strategy that parses a step's output.
///
/// Any type implementing it can stand in for the built-in benchmark
/// processor via [`evaluate_with`].
pub trait LogProcessor {
    /// Consumes the step output and returns summary lines for the step.
    fn process(&mut self, revision: &str, log: &str) -> Vec<String>;

    /// Severity derived from the processed output, if the processor has one.
    fn evaluate(&self) -> Option<Severity> {
        None
    }

    /// Link to an external report, attached to the step as an annotation.
    fn report_link(&self) -> Option<String> {
        None
    }
}

/// What the executor observed for one step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StepOutcome {
    pub shell: Severity,
    pub log: String,
}

impl StepOutcome {
    pub fn exited(code: i32, log: impl Into<String>) -> Self {
        Self {
            shell: Severity::from_exit_code(code),
            log: log.into(),
        }
    }

    /// Outcome with a shell result already classified by the executor
    /// (e.g. a compile step that finished with warnings).
    pub fn classified(shell: Severity, log: impl Into<String>) -> Self {
        Self {
            shell,
            log: log.into(),
        }
    }
}

/// Final verdict for one executed step.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StepVerdict {
    pub shell: Severity,
    pub log: Option<Severity>,
    pub severity: Severity,
    pub result_text: Vec<String>,
    pub report_link: Option<String>,
}

impl StepVerdict {
    /// Verdict of a step without log processing.
    pub fn shell_only(shell: Severity) -> Self {
        Self {
            shell,
            log: None,
            severity: shell,
            result_text: Vec::new(),
            report_link: None,
        }
    }
}

/// Runs `processor` over the outcome and merges both results.
pub fn evaluate_with(
    outcome: &StepOutcome,
    processor: &mut dyn LogProcessor,
    revision: &str,
) -> StepVerdict {
    let result_text = processor.process(revision, &outcome.log);
    let log = processor.evaluate();
    let severity = log.map_or(outcome.shell, |l| outcome.shell.combine(l));

    if severity > outcome.shell {
        warn!(shell = %outcome.shell, %severity, "log processing raised step severity");
    }

    StepVerdict {
        shell: outcome.shell,
        log,
        severity,
        result_text,
        report_link: processor.report_link(),
    }
}

/// Classifies an outcome outside a pipeline run, optionally through the
/// benchmark processor described by `benchmark`.
pub fn evaluate_outcome(
    outcome: &StepOutcome,
    benchmark: Option<&BenchmarkSpec>,
    revision: &str,
) -> StepVerdict {
    match benchmark {
        Some(spec) => evaluate_with(outcome, &mut spec.processor(), revision),
        None => StepVerdict::shell_only(outcome.shell),
    }
}

/// Applies the step's completion capability and returns its verdict.
///
/// A revision capture only publishes when the step did not fail, so a
/// broken `cat` never turns its error text into a revision.
pub fn evaluate_step(
    step: &Step,
    outcome: &StepOutcome,
    ctx: &mut RunContext,
) -> Result<StepVerdict, RevisionError> {
    match &step.completion {
        None => Ok(StepVerdict::shell_only(outcome.shell)),
        Some(Completion::CaptureRevision) => {
            if outcome.shell != Severity::Failure {
                if let Some(rev) = revision::parse_revision(&outcome.log) {
                    debug!(revision = %rev, "publishing revision");
                    ctx.publish_revision(rev)?;
                }
            }
            Ok(StepVerdict::shell_only(outcome.shell))
        }
        Some(Completion::ProcessLog(spec)) => {
            let mut processor = spec.processor();
            Ok(evaluate_with(
                outcome,
                &mut processor,
                ctx.revision_or_unknown(),
            ))
        }
    }
}
