//! Ordered evaluation of one pipeline execution.
//!
//! The executing framework runs the steps; [`PipelineRun`] tells it which
//! step is next, folds each reported outcome into a verdict, and stops
//! handing out steps after a fatal step fails.

use serde::Serialize;
use tracing::{info, warn};

use crate::classify::log::{StepOutcome, StepVerdict, evaluate_step};
use crate::classify::severity::{Severity, combine_all};
use crate::error::RunError;
use crate::pipeline::builder::Pipeline;
use crate::pipeline::context::RunContext;
use crate::pipeline::step::Step;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StepRecord {
    pub index: usize,
    pub description: String,
    pub verdict: StepVerdict,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RunSummary {
    pub severity: Severity,
    pub executed: usize,
    /// Steps never run, either pending or cut off by a fatal failure.
    pub not_run: usize,
    pub halted_at: Option<usize>,
    pub revision: String,
}

#[derive(Debug)]
pub struct PipelineRun<'a> {
    pipeline: &'a Pipeline,
    ctx: RunContext,
    records: Vec<StepRecord>,
    halted_at: Option<usize>,
}

impl<'a> PipelineRun<'a> {
    pub fn new(pipeline: &'a Pipeline) -> Self {
        Self {
            pipeline,
            ctx: RunContext::new(),
            records: Vec::new(),
            halted_at: None,
        }
    }

    /// Next step to execute, or `None` once finished or halted.
    pub fn next_step(&self) -> Option<&'a Step> {
        if self.halted_at.is_some() {
            return None;
        }
        self.pipeline.steps.get(self.records.len())
    }

    /// Records the outcome of the step returned by [`Self::next_step`].
    ///
    /// A second revision publish records the step as a Failure, halts the
    /// run and returns the error.
    pub fn record(&mut self, outcome: &StepOutcome) -> Result<&StepVerdict, RunError> {
        let step = self.next_step().ok_or(RunError::NoPendingStep)?;
        let index = self.records.len();
        let verdict = match evaluate_step(step, outcome, &mut self.ctx) {
            Ok(verdict) => verdict,
            Err(err) => {
                warn!(
                    index,
                    step = %step.description,
                    error = %err,
                    "revision conflict, halting pipeline"
                );
                let mut verdict = StepVerdict::shell_only(Severity::Failure);
                verdict.result_text.push(err.to_string());
                self.records.push(StepRecord {
                    index,
                    description: step.description_done.clone(),
                    verdict,
                });
                self.halted_at = Some(index);
                return Err(err.into());
            }
        };

        if verdict.severity == Severity::Failure {
            if step.fatal {
                warn!(index, step = %step.description, "fatal step failed, halting pipeline");
                self.halted_at = Some(index);
            } else {
                info!(index, step = %step.description, "non-fatal step failed, continuing");
            }
        }

        self.records.push(StepRecord {
            index,
            description: step.description_done.clone(),
            verdict,
        });
        Ok(&self.records[index].verdict)
    }

    pub fn is_finished(&self) -> bool {
        self.next_step().is_none()
    }

    pub fn context(&self) -> &RunContext {
        &self.ctx
    }

    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            severity: combine_all(self.records.iter().map(|r| r.verdict.severity)),
            executed: self.records.len(),
            not_run: self.pipeline.steps.len() - self.records.len(),
            halted_at: self.halted_at,
            revision: self.ctx.revision_or_unknown().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::model::StepCommand;
    use crate::pipeline::step::Completion;

    fn shell(name: &str) -> Step {
        Step::shell(StepCommand::shell(name), name, name)
    }

    fn pipeline() -> Pipeline {
        Pipeline {
            steps: vec![
                shell("cat REVISION").with_completion(Completion::CaptureRevision),
                shell("flaky").non_fatal(),
                shell("build"),
                shell("test"),
            ],
        }
    }

    #[test]
    fn runs_all_steps_in_order() {
        let p = pipeline();
        let mut run = PipelineRun::new(&p);

        assert_eq!(run.next_step().unwrap().description, "cat REVISION");
        run.record(&StepOutcome::exited(0, "99\n")).unwrap();
        assert_eq!(run.next_step().unwrap().description, "flaky");
        run.record(&StepOutcome::exited(0, "")).unwrap();
        run.record(&StepOutcome::exited(0, "")).unwrap();
        run.record(&StepOutcome::exited(0, "")).unwrap();

        assert!(run.is_finished());
        let summary = run.summary();
        assert_eq!(summary.severity, Severity::Success);
        assert_eq!(summary.executed, 4);
        assert_eq!(summary.not_run, 0);
        assert_eq!(summary.revision, "99");
        assert_eq!(
            run.record(&StepOutcome::exited(0, "")).unwrap_err(),
            RunError::NoPendingStep
        );
    }

    #[test]
    fn non_fatal_failure_continues() {
        let p = pipeline();
        let mut run = PipelineRun::new(&p);
        run.record(&StepOutcome::exited(0, "99\n")).unwrap();
        run.record(&StepOutcome::exited(1, "")).unwrap();

        assert_eq!(run.next_step().unwrap().description, "build");
        assert_eq!(run.summary().severity, Severity::Failure);
        assert_eq!(run.summary().halted_at, None);
    }

    #[test]
    fn fatal_failure_halts() {
        let p = pipeline();
        let mut run = PipelineRun::new(&p);
        run.record(&StepOutcome::exited(0, "99\n")).unwrap();
        run.record(&StepOutcome::exited(0, "")).unwrap();
        let verdict = run.record(&StepOutcome::exited(2, "error")).unwrap();
        assert_eq!(verdict.severity, Severity::Failure);

        assert!(run.is_finished());
        let summary = run.summary();
        assert_eq!(summary.halted_at, Some(2));
        assert_eq!(summary.executed, 3);
        assert_eq!(summary.not_run, 1);
    }

    #[test]
    fn second_revision_capture_fails_step_and_halts() {
        let p = Pipeline {
            steps: vec![
                shell("cat REVISION").with_completion(Completion::CaptureRevision),
                shell("svnversion").with_completion(Completion::CaptureRevision),
                shell("build"),
            ],
        };
        let mut run = PipelineRun::new(&p);
        run.record(&StepOutcome::exited(0, "99\n")).unwrap();
        let err = run.record(&StepOutcome::exited(0, "100\n")).unwrap_err();
        assert!(matches!(err, RunError::Revision(_)));

        assert!(run.is_finished());
        assert_eq!(run.records().len(), 2);
        assert_eq!(run.records()[1].verdict.severity, Severity::Failure);
        let summary = run.summary();
        assert_eq!(summary.halted_at, Some(1));
        assert_eq!(summary.not_run, 1);
        assert_eq!(summary.revision, "99");
    }

    #[test]
    fn revision_unknown_until_published() {
        let p = pipeline();
        let mut run = PipelineRun::new(&p);
        assert_eq!(run.context().revision_or_unknown(), "-1");
        run.record(&StepOutcome::exited(0, "\n")).unwrap();
        assert_eq!(run.summary().revision, "-1");
    }
}
