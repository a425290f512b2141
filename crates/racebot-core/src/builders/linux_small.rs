//! Linux test pipeline running against the tree packed by the build
//! pipeline: gtest tool tests, output tests and a small set of unit test
//! variants under valgrind.

use crate::builders::{Builder, PipelineId, linux_build};
use crate::command::invoke::{Frontend, Mode, RunConfig};
use crate::command::model::StepCommand;
use crate::config::Settings;
use crate::error::ConfigError;
use crate::pipeline::builder::PipelineBuilder;
use crate::pipeline::common;
use crate::pipeline::step::Step;
use crate::variant::naming::PIC_SUFFIX;
use crate::variant::{Bits, OptLevel, Os, Variant};

fn variants() -> Result<Vec<(Variant, RunConfig)>, ConfigError> {
    let hybrid =
        RunConfig::new(Frontend::Valgrind, Mode::Hybrid).with_extra_args(["--error_exitcode=1"]);
    Ok(vec![
        (Variant::new(Os::Linux, Bits::X64, OptLevel::O0, false), hybrid.clone()),
        (
            Variant::new(Os::Linux, Bits::X32, OptLevel::O1, false).with_suffix(PIC_SUFFIX)?,
            hybrid,
        ),
    ])
}

pub(crate) fn assemble(
    pb: &mut PipelineBuilder,
    _settings: &Settings,
) -> Result<Vec<Builder>, ConfigError> {
    pb.declare_prebuilt(linux_build::shipped_variants()?);

    common::add_setup_tree_for_tests(pb);
    common::add_tool_tests(pb, &["amd64-linux-debug", "x86-linux-debug"])?;

    for (bits, arch) in [("64", "amd64"), ("32", "x86")] {
        pb.add_step(Step::shell(
            StepCommand::shell(format!(
                "make -C unittest OS=linux ARCH={arch} TSAN=\"../tsan.sh\" run_output_tests"
            )),
            &format!("running output tests {bits}"),
            &format!("output tests {bits}"),
        ));
    }

    for (variant, run) in variants()? {
        pb.add_test_step(&variant, &run)?;
    }

    Ok(vec![Builder::new(
        "buildbot-linux-small",
        "bot6name",
        "full_linux_small",
        PipelineId::LinuxSmall,
    )])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::step::{Completion, StepAction};

    fn pipeline() -> Vec<Step> {
        let mut pb = PipelineBuilder::new();
        assemble(&mut pb, &Settings::default()).unwrap();
        pb.finish().steps
    }

    #[test]
    fn builds_nothing_itself() {
        let steps = pipeline();
        assert!(steps.iter().all(|s| !s.description.starts_with("building")));
        assert!(!steps.iter().any(|s| matches!(s.action, StepAction::Checkout { .. })));
    }

    #[test]
    fn revision_comes_from_downloaded_tree() {
        let steps = pipeline();
        let capture = steps
            .iter()
            .position(|s| s.completion == Some(Completion::CaptureRevision))
            .unwrap();
        assert_eq!(capture, 5);
        assert_eq!(steps[capture].description, "getting revision");
    }

    #[test]
    fn unit_tests_run_under_valgrind_hybrid() {
        let steps = pipeline();
        let tests: Vec<&Step> = steps
            .iter()
            .filter(|s| s.description.starts_with("testing tsan-valgrind"))
            .collect();
        assert_eq!(tests.len(), 2);
        assert_eq!(
            tests[0].description,
            "testing tsan-valgrind (hybrid) on racecheck_unittest (linux,64,O0)"
        );
        assert_eq!(
            tests[1].description,
            "testing tsan-valgrind (hybrid) on racecheck_unittest (linux,32,O1,-PIC)"
        );

        let line = tests[1].command_line().unwrap().to_shell_line();
        assert!(line.starts_with("./tsan.sh --error_exitcode=1 --pure-happens-before=no"));
        assert!(line.ends_with("unittest/bin/racecheck_unittest-linux-x86-O1-PIC"));
        assert_eq!(tests[1].env().unwrap()["VALGRIND_EXTRACT_DIR"], ".");
        assert_eq!(tests[1].timeout_secs, Some(1800));
    }

    #[test]
    fn output_tests_follow_tool_tests() {
        let steps = pipeline();
        let output = steps
            .iter()
            .find(|s| s.description == "running output tests 32")
            .unwrap();
        assert_eq!(
            output.command_line().unwrap().to_shell_line(),
            "make -C unittest OS=linux ARCH=x86 TSAN=\"../tsan.sh\" run_output_tests"
        );
    }
}
