//! Ordered assembly of a pipeline.
//!
//! [`PipelineBuilder`] is the assembly context for one platform pipeline.
//! Besides the step list it tracks which variants are available to test:
//! variants built by this pipeline (de-duplicated by their full tuple) and
//! variants declared as prebuilt, e.g. shipped in a downloaded build tree.
//! Once assembly is done, [`PipelineBuilder::finish`] freezes the steps into
//! an immutable [`Pipeline`].

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::{debug, info};

use crate::command::build::{BuildRequest, synthesize_build};
use crate::command::invoke::{RunConfig, synthesize_test};
use crate::error::ConfigError;
use crate::pipeline::step::{CommandKind, Step};
use crate::variant::Variant;
use crate::variant::naming::{self, DEFAULT_TEST_BASE_NAME};

/// Ordered, immutable step list consumed by the executing framework.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct Pipeline {
    pub steps: Vec<Step>,
}

impl Pipeline {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// A variant whose binary is available to test steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltVariant {
    pub variant: Variant,
    /// `(os,bits,O<opt>...)`, as used in step descriptions.
    pub description: String,
}

/// Two-pass race verifier protocol parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaceVerifier {
    /// Log written by pass one and read back by pass two.
    pub log_file: String,
    /// Test selection forwarded to the unit test binary on both passes.
    pub test_filter: String,
}

impl Default for RaceVerifier {
    fn default() -> Self {
        Self {
            log_file: "raceverifier.log".to_string(),
            test_filter: "--gtest_filter=\"RaceVerifierTests.*\"".to_string(),
        }
    }
}

impl RaceVerifier {
    /// Pass one records the races the tests expect into the log file.
    pub fn first_pass(&self, base: &RunConfig) -> RunConfig {
        base.clone()
            .with_extra_args(["--show-expected-races", "--error_exitcode=1"])
            .with_extra_test_args([self.test_filter.clone()])
            .with_append_command(format!("2>&1 | tee {}", self.log_file))
    }

    /// Pass two replays the tests with the recorded log as the oracle.
    pub fn second_pass(&self, base: &RunConfig) -> RunConfig {
        base.clone()
            .with_extra_args([
                "--error_exitcode=1".to_string(),
                format!("--race-verifier={}", self.log_file),
            ])
            .with_extra_test_args([self.test_filter.clone()])
            .with_append_command("2>&1")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct BuildRecord {
    pic: bool,
    extra_args: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    test_base_name: String,
    steps: Vec<Step>,
    built: BTreeMap<Variant, BuildRecord>,
    prebuilt: BTreeSet<Variant>,
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::with_test_base_name(DEFAULT_TEST_BASE_NAME)
    }

    pub fn with_test_base_name(name: &str) -> Self {
        Self {
            test_base_name: name.to_string(),
            steps: Vec::new(),
            built: BTreeMap::new(),
            prebuilt: BTreeSet::new(),
        }
    }

    pub fn test_base_name(&self) -> &str {
        &self.test_base_name
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn add_step(&mut self, step: Step) -> &mut Self {
        self.steps.push(step);
        self
    }

    /// Marks variants whose binaries come from elsewhere (a downloaded build
    /// tree) as available to test steps.
    pub fn declare_prebuilt<I>(&mut self, variants: I) -> &mut Self
    where
        I: IntoIterator<Item = Variant>,
    {
        self.prebuilt.extend(variants);
        self
    }

    /// Appends a unit test build step unless the same variant tuple is
    /// already built in this pipeline.
    ///
    /// Repeating a request with identical build parameters returns the
    /// cached variant without adding a step. The same tuple requested with
    /// different parameters would silently reuse the wrong binary, so it
    /// is rejected.
    pub fn add_build_test_step(
        &mut self,
        request: &BuildRequest,
    ) -> Result<BuiltVariant, ConfigError> {
        let build = synthesize_build(request)?;
        let record = BuildRecord {
            pic: request.pic,
            extra_args: request.extra_args.clone(),
        };
        let description = naming::describe(&build.variant);

        if let Some(existing) = self.built.get(&build.variant) {
            if *existing != record {
                return Err(ConfigError::ConflictingBuild(description));
            }
            debug!(variant = %description, "build already scheduled, reusing");
            return Ok(BuiltVariant {
                variant: build.variant,
                description,
            });
        }

        self.steps.push(Step::compile(
            build.command,
            &format!("building unittests {description}"),
            &format!("build unittests {description}"),
        ));
        self.built.insert(build.variant.clone(), record);

        Ok(BuiltVariant {
            variant: build.variant,
            description,
        })
    }

    /// Appends one checker run against the binary of `variant`.
    pub fn add_test_step(&mut self, variant: &Variant, run: &RunConfig) -> Result<(), ConfigError> {
        self.push_test(variant, run, "")
    }

    /// Appends both race verifier passes back to back, sharing one log file.
    pub fn add_race_verifier_steps(
        &mut self,
        variant: &Variant,
        run: &RunConfig,
        verifier: &RaceVerifier,
    ) -> Result<(), ConfigError> {
        // Validate before pushing so a rejected variant never leaves pass
        // one behind without pass two.
        self.check_testable(variant, run)?;
        self.push_test(variant, &verifier.first_pass(run), " RV 1st pass")?;
        self.push_test(variant, &verifier.second_pass(run), " RV 2nd pass")
    }

    pub fn finish(self) -> Pipeline {
        info!(
            steps = self.steps.len(),
            builds = self.built.len(),
            "pipeline assembled"
        );
        Pipeline { steps: self.steps }
    }

    fn check_testable(&self, variant: &Variant, run: &RunConfig) -> Result<(), ConfigError> {
        if !run.frontend.supports(variant.os()) {
            return Err(ConfigError::FrontendOsMismatch {
                frontend: run.frontend.to_string(),
                os: variant.os().to_string(),
            });
        }
        if !self.built.contains_key(variant) && !self.prebuilt.contains(variant) {
            return Err(ConfigError::MissingBuild(naming::describe(variant)));
        }
        Ok(())
    }

    fn push_test(
        &mut self,
        variant: &Variant,
        run: &RunConfig,
        desc_suffix: &str,
    ) -> Result<(), ConfigError> {
        self.check_testable(variant, run)?;

        let binary = naming::binary_path(variant, &self.test_base_name);
        let test = synthesize_test(run, &binary)?;
        let target = format!(
            "{} {}{}",
            self.test_base_name,
            naming::describe(variant),
            desc_suffix
        );

        let step = Step::command(
            CommandKind::Test,
            test.command,
            test.env,
            &format!("testing {} on {}", test.label, target),
            &format!("test {} on {}", test.label, target),
        )
        .with_timeout(run.timeout);

        self.steps.push(step);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::invoke::{Frontend, Mode};
    use crate::command::model::StepCommand;
    use crate::variant::Os;
    use crate::variant::naming::PIC_SUFFIX;

    fn linux(bits: u32, opt: u32, static_link: bool) -> Variant {
        Variant::try_new(Os::Linux, bits, opt, static_link).unwrap()
    }

    fn windows(bits: u32, opt: u32) -> Variant {
        Variant::try_new(Os::Windows, bits, opt, false).unwrap()
    }

    #[test]
    fn build_step_description_and_dedup() {
        let mut b = PipelineBuilder::new();
        let first = b
            .add_build_test_step(&BuildRequest::new(linux(64, 0, false)))
            .unwrap();
        let again = b
            .add_build_test_step(&BuildRequest::new(linux(64, 0, false)))
            .unwrap();

        assert_eq!(first, again);
        assert_eq!(b.steps().len(), 1);
        assert_eq!(b.steps()[0].description, "building unittests (linux,64,O0)");
        assert_eq!(b.steps()[0].description_done, "build unittests (linux,64,O0)");
    }

    #[test]
    fn conflicting_build_parameters_are_rejected() {
        let mut b = PipelineBuilder::new();
        b.add_build_test_step(&BuildRequest::new(linux(64, 0, false)))
            .unwrap();
        let err = b
            .add_build_test_step(&BuildRequest::new(linux(64, 0, false)).with_extra_args(["-j8"]))
            .unwrap_err();
        assert_eq!(err, ConfigError::ConflictingBuild("(linux,64,O0)".into()));
        assert_eq!(b.steps().len(), 1);
    }

    #[test]
    fn pic_and_plain_builds_are_distinct() {
        let mut b = PipelineBuilder::new();
        b.add_build_test_step(&BuildRequest::new(linux(32, 1, false)))
            .unwrap();
        let pic = b
            .add_build_test_step(&BuildRequest::new(linux(32, 1, false)).pic())
            .unwrap();
        assert_eq!(b.steps().len(), 2);
        assert_eq!(pic.variant.extra_suffix(), Some(PIC_SUFFIX));
    }

    #[test]
    fn test_step_text_and_timeout() {
        let mut b = PipelineBuilder::new();
        let built = b
            .add_build_test_step(&BuildRequest::new(linux(64, 0, false)))
            .unwrap();
        let run = RunConfig::new(Frontend::Valgrind, Mode::Hybrid)
            .with_extra_args(["--error_exitcode=1"]);
        b.add_test_step(&built.variant, &run).unwrap();

        let step = &b.steps()[1];
        assert_eq!(
            step.description,
            "testing tsan-valgrind (hybrid) on racecheck_unittest (linux,64,O0)"
        );
        assert_eq!(
            step.description_done,
            "test tsan-valgrind (hybrid) on racecheck_unittest (linux,64,O0)"
        );
        assert_eq!(step.timeout_secs, Some(1800));
        assert_eq!(
            step.command_line().unwrap().args().last().map(String::as_str),
            Some("unittest/bin/racecheck_unittest-linux-amd64-O0")
        );
    }

    #[test]
    fn testing_an_unbuilt_variant_fails() {
        let mut b = PipelineBuilder::new();
        let run = RunConfig::new(Frontend::Valgrind, Mode::Phb);
        let err = b.add_test_step(&linux(64, 1, true), &run).unwrap_err();
        assert_eq!(err, ConfigError::MissingBuild("(linux,64,O1,static)".into()));
        assert!(b.steps().is_empty());
    }

    #[test]
    fn pic_build_cannot_be_tested_without_suffix() {
        let mut b = PipelineBuilder::new();
        b.add_build_test_step(&BuildRequest::new(linux(32, 1, false)).pic())
            .unwrap();
        let run = RunConfig::new(Frontend::Valgrind, Mode::Hybrid);
        assert!(b.add_test_step(&linux(32, 1, false), &run).is_err());
    }

    #[test]
    fn prebuilt_variants_are_testable() {
        let mut b = PipelineBuilder::new();
        let pic = linux(32, 1, false).with_suffix(PIC_SUFFIX).unwrap();
        b.declare_prebuilt([pic.clone()]);
        let run = RunConfig::new(Frontend::Valgrind, Mode::Hybrid);
        b.add_test_step(&pic, &run).unwrap();
        assert_eq!(b.steps().len(), 1);
    }

    #[test]
    fn frontend_must_match_variant_os() {
        let mut b = PipelineBuilder::new();
        b.declare_prebuilt([linux(64, 0, false)]);
        let run = RunConfig::new(Frontend::PinWin, Mode::Phb);
        let err = b.add_test_step(&linux(64, 0, false), &run).unwrap_err();
        assert!(matches!(err, ConfigError::FrontendOsMismatch { .. }));
    }

    #[test]
    fn foreign_flags_never_reach_a_step() {
        let mut b = PipelineBuilder::new();
        let built = b
            .add_build_test_step(&BuildRequest::new(linux(64, 0, false)))
            .unwrap();
        let run = RunConfig::new(Frontend::Valgrind, Mode::Hybrid)
            .with_extra_args(["--mt", "--pure-happens-before=yes"]);
        let err = b.add_test_step(&built.variant, &run).unwrap_err();
        assert_eq!(
            err,
            ConfigError::ForeignFlag {
                frontend: "valgrind".into(),
                flag: "--mt".into(),
            }
        );
        assert_eq!(b.steps().len(), 1);
    }

    #[test]
    fn race_verifier_passes_are_adjacent_and_share_log() {
        let mut b = PipelineBuilder::new();
        let built = b
            .add_build_test_step(&BuildRequest::new(windows(32, 1)))
            .unwrap();
        let run = RunConfig::new(Frontend::PinWin, Mode::Hybrid)
            .debug(true)
            .with_timeout(None);
        let verifier = RaceVerifier::default();
        b.add_race_verifier_steps(&built.variant, &run, &verifier)
            .unwrap();

        let steps = b.finish().steps;
        assert_eq!(steps.len(), 3);

        let first = match steps[1].command_line().unwrap() {
            StepCommand::Shell(line) => line.clone(),
            other => panic!("expected shell line, got {other:?}"),
        };
        let second = match steps[2].command_line().unwrap() {
            StepCommand::Shell(line) => line.clone(),
            other => panic!("expected shell line, got {other:?}"),
        };

        assert!(first.contains("--show-expected-races"));
        assert!(first.ends_with("2>&1 | tee raceverifier.log"));
        assert!(second.contains("--race-verifier=raceverifier.log"));
        assert!(second.ends_with("2>&1"));
        assert!(steps[1].description.ends_with("(windows,32,O1) RV 1st pass"));
        assert!(steps[2].description.ends_with("(windows,32,O1) RV 2nd pass"));
        assert_eq!(steps[1].timeout_secs, None);
    }

    #[test]
    fn rejected_race_verifier_adds_nothing() {
        let mut b = PipelineBuilder::new();
        let run = RunConfig::new(Frontend::PinWin, Mode::Hybrid);
        assert!(
            b.add_race_verifier_steps(&windows(32, 0), &run, &RaceVerifier::default())
                .is_err()
        );
        assert!(b.steps().is_empty());
    }
}
