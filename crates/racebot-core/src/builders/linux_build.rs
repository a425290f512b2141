//! Full linux build: checker front-ends, self-contained packages and every
//! unit test variant, packed into a build tree for the test pipelines.

use crate::builders::{Builder, PipelineId};
use crate::command::build::{BuildRequest, synthesize_build};
use crate::command::model::StepCommand;
use crate::config::Settings;
use crate::error::ConfigError;
use crate::pipeline::builder::PipelineBuilder;
use crate::pipeline::common;
use crate::pipeline::step::Step;
use crate::variant::{Bits, OptLevel, Os, Variant};

const ARCHIVE: &str = "../full_build.tar.gz";

/// Paths packed into the build tree.
const ARCHIVE_MASKS: [&str; 9] = [
    "tsan*.sh",
    "tsan/bin*/tsan*.sh",
    "tsan/bin*/*_test",
    "tsan/bin*/*ts_pin.so",
    "tsan/bin*/*ts_pinmt.so",
    "tsan/tsan_pin.sh",
    "unittest",
    "common.mk",
    "REVISION",
];

const PATH_FLAGS: [&str; 4] = [
    "OFFLINE=",
    "VALGRIND_INST_ROOT=../out",
    "VALGRIND_ROOT=../third_party/valgrind",
    "PIN_ROOT=../../../../third_party/pin",
];

const PATH_FLAGS_32: [&str; 5] = [
    "OFFLINE=",
    "OUTDIR=bin32",
    "VALGRIND_INST_ROOT=../out32",
    "VALGRIND_ROOT=../third_party/valgrind32",
    "PIN_ROOT=",
];

const PATH_FLAGS_64: [&str; 5] = [
    "OFFLINE=",
    "OUTDIR=bin64",
    "VALGRIND_INST_ROOT=../out64",
    "VALGRIND_ROOT=../third_party/valgrind64",
    "PIN_ROOT=",
];

const BINARIES: [(&str, &str); 4] = [
    (
        "tsan/bin/tsan-amd64-linux-debug-self-contained.sh",
        "tsan-r%s-amd64-linux-debug-self-contained.sh",
    ),
    (
        "tsan/bin/tsan-amd64-linux-self-contained.sh",
        "tsan-r%s-amd64-linux-self-contained.sh",
    ),
    (
        "tsan/bin32/tsan-x86-linux-self-contained.sh",
        "tsan-r%s-x86-linux-self-contained.sh",
    ),
    (
        "tsan/bin64/tsan-amd64-linux-self-contained.sh",
        "tsan-r%s-amd64only-linux-self-contained.sh",
    ),
];

/// Unit test builds of the full linux matrix plus one PIC build.
pub fn test_build_requests() -> Vec<BuildRequest> {
    let mut requests = Vec::new();
    for bits in [Bits::X32, Bits::X64] {
        for opt in [OptLevel::O0, OptLevel::O1] {
            for static_link in [false, true] {
                requests.push(BuildRequest::new(Variant::new(Os::Linux, bits, opt, static_link)));
            }
        }
    }
    requests.push(BuildRequest::new(Variant::new(Os::Linux, Bits::X32, OptLevel::O1, false)).pic());
    requests
}

/// Variants whose binaries ship in the packed build tree.
pub fn shipped_variants() -> Result<Vec<Variant>, ConfigError> {
    test_build_requests()
        .iter()
        .map(|r| synthesize_build(r).map(|b| b.variant))
        .collect()
}

fn make_tsan(flags: &[&str], targets: &[&str]) -> StepCommand {
    StepCommand::argv(
        ["make", "-C", "tsan"]
            .into_iter()
            .chain(flags.iter().copied())
            .chain(targets.iter().copied()),
    )
}

pub(crate) fn assemble(
    pb: &mut PipelineBuilder,
    settings: &Settings,
) -> Result<Vec<Builder>, ConfigError> {
    pb.add_step(Step::checkout(&settings.svnurl))
        .add_step(common::revision_marker_step())
        .add_step(common::get_revision_step())
        .add_step(Step::shell(
            StepCommand::argv(["wget", settings.valgrind_build_url.as_str()]),
            "getting valgrind build",
            "get valgrind build",
        ))
        .add_step(common::extract_step("valgrind_build.tar.gz"));

    // 64-bit checker with both front-ends, installed to out/.
    let mut jobs = vec!["-j2"];
    jobs.extend(PATH_FLAGS);
    pb.add_step(Step::compile(
        make_tsan(&jobs, &["lo", "ld"]),
        "building tsan",
        "build tsan",
    ))
    .add_step(Step::shell(
        make_tsan(&PATH_FLAGS, &["OS=linux", "ARCH=amd64", "DEBUG=1", "self-contained"]),
        "packing self-contained tsan (debug)",
        "pack self-contained tsan (debug)",
    ))
    .add_step(Step::shell(
        make_tsan(
            &PATH_FLAGS,
            &["OS=linux", "ARCH=amd64", "DEBUG=0", "self-contained-stripped"],
        ),
        "packing self-contained tsan",
        "pack self-contained tsan",
    ));

    for (bits, flags, target, arch) in [
        ("32", &PATH_FLAGS_32, "l32o", "x86"),
        ("64", &PATH_FLAGS_64, "l64o", "amd64"),
    ] {
        let mut build_flags = vec!["-j2", "OFFLINE="];
        build_flags.extend(flags.iter().copied());
        let arch_flag = format!("ARCH={arch}");
        pb.add_step(Step::compile(
            make_tsan(&build_flags, &[target]),
            &format!("building {bits}-bit tsan"),
            &format!("build {bits}-bit tsan"),
        ))
        .add_step(Step::shell(
            make_tsan(
                flags,
                &["OS=linux", arch_flag.as_str(), "DEBUG=0", "self-contained-stripped"],
            ),
            &format!("packing self-contained tsan ({bits}-bit)"),
            &format!("pack self-contained tsan ({bits}-bit)"),
        ));
    }

    pb.add_step(Step::shell(
        StepCommand::shell(
            "ln -s tsan/bin/tsan-amd64-linux-self-contained.sh tsan.sh && \
             ln -s tsan/bin/tsan-amd64-linux-debug-self-contained.sh tsan-debug.sh && \
             ln -s tsan/bin32/tsan-x86-linux-self-contained.sh tsan32.sh && \
             ln -s tsan/bin64/tsan-amd64-linux-self-contained.sh tsan64.sh",
        ),
        "symlinking tsan",
        "symlink tsan",
    ));

    common::add_upload_binaries(pb, &BINARIES);

    for request in test_build_requests() {
        pb.add_build_test_step(&request)?;
    }

    pb.add_step(common::archive_step(ARCHIVE, &ARCHIVE_MASKS))
        .add_step(common::upload_build_tree_step(ARCHIVE));

    Ok(vec![Builder::new(
        "buildbot-linux-build",
        "vm42-m3",
        "full_linux_build",
        PipelineId::LinuxBuild,
    )])
}
