//! Windows pipeline: pin-based checker build, gtest tool tests and unit
//! test variants run under pin, each followed by the race verifier passes.
//! One pipeline serves the XP, Vista and 7 agents.

use crate::builders::{Builder, PipelineId};
use crate::command::build::BuildRequest;
use crate::command::invoke::{Frontend, Mode, RunConfig};
use crate::command::model::StepCommand;
use crate::config::Settings;
use crate::error::ConfigError;
use crate::pipeline::builder::{PipelineBuilder, RaceVerifier};
use crate::pipeline::common;
use crate::pipeline::step::Step;
use crate::variant::{Bits, OptLevel, Os, Variant};

const SFX_BINARY: (&str, &str) = (
    r"tsan\tsan-x86-windows-sfx.exe",
    "tsan-r%s-x86-windows-sfx.exe",
);

fn make_tsan(pin_root: &str, jobs: Option<&str>, target: &str) -> StepCommand {
    let pin_flag = format!("PIN_ROOT={pin_root}");
    let mut args = vec!["make", "-C", "tsan"];
    args.extend(jobs);
    args.extend(["VALGRIND_ROOT=", pin_flag.as_str(), target]);
    StepCommand::argv(args)
}

/// `(variant, debug, mode)` in run order; variants repeat to share builds.
fn test_matrix() -> [(Variant, bool, Mode); 3] {
    let o1 = Variant::new(Os::Windows, Bits::X32, OptLevel::O1, false);
    let o0 = Variant::new(Os::Windows, Bits::X32, OptLevel::O0, false);
    [
        (o1.clone(), true, Mode::Hybrid),
        (o1, true, Mode::Phb),
        (o0, false, Mode::Phb),
    ]
}

pub(crate) fn assemble(
    pb: &mut PipelineBuilder,
    settings: &Settings,
) -> Result<Vec<Builder>, ConfigError> {
    let pin_root = settings.windows_pin_root.as_str();

    pb.add_step(Step::checkout(&settings.svnurl))
        .add_step(common::revision_marker_step())
        .add_step(common::get_revision_step())
        .add_step(Step::compile(
            make_tsan(pin_root, Some("-j4"), "w32o"),
            "building tsan with pin",
            "build tsan with pin",
        ))
        .add_step(Step::compile(
            make_tsan(pin_root, Some("-j4"), "w32d"),
            "building tsan-debug with pin",
            "build tsan-debug with pin",
        ))
        .add_step(Step::compile(
            make_tsan(pin_root, None, "w32-sfx"),
            "packing sfx binary",
            "pack sfx binary",
        ))
        .add_step(Step::shell(
            StepCommand::shell("bash -c 'mkdir -p out; cd out; ../tsan/tsan-x86-windows-sfx.exe'"),
            "extracting sfx",
            "extract sfx",
        ));

    common::add_tool_tests(pb, &["x86-windows-debug"])?;

    let verifier = RaceVerifier::default();
    for (variant, debug, mode) in test_matrix() {
        let built = pb.add_build_test_step(&BuildRequest::new(variant))?;
        let run = RunConfig::new(Frontend::PinWin, mode)
            .debug(debug)
            .with_pin_root(pin_root)
            .with_timeout(None)
            .with_extra_args(["--error_exitcode=1"]);
        pb.add_test_step(&built.variant, &run)?;
        pb.add_race_verifier_steps(&built.variant, &run, &verifier)?;
    }

    common::add_upload_binaries(pb, &[SFX_BINARY]);

    Ok(vec![
        Builder::new("buildbot-winxp", "vm10-m3", "full_winxp", PipelineId::Windows),
        Builder::new("buildbot-vista", "vm50-m3", "full_vista", PipelineId::Windows),
        Builder::new("buildbot-win7", "vm51-m3", "full_win7", PipelineId::Windows),
    ])
}
