//! Step helpers shared by the platform pipelines.

use crate::classify::benchmark::BenchmarkSpec;
use crate::classify::revision::REVISION_FILE;
use crate::command::model::StepCommand;
use crate::error::ConfigError;
use crate::pipeline::builder::PipelineBuilder;
use crate::pipeline::step::{Completion, Destination, Step};

/// Master-side location of the packed linux build tree.
pub const BUILD_TREE_DEST: &str = "build/linux_build.tgz";

/// Master-side directory receiving published binaries.
pub const BINARIES_DIR: &str = "public_html/binaries";

pub fn clobber_step() -> Step {
    Step::shell(
        StepCommand::shell("rm -rf -- *"),
        "clobbering build dir",
        "clobber build dir",
    )
}

/// Packs `paths` into `archive_path` through a temporary file so a partial
/// archive is never visible under the final name.
pub fn archive_step(archive_path: &str, paths: &[&str]) -> Step {
    let line = format!(
        "tar czvf {archive}.tmp {paths} && mv {archive}.tmp {archive} && chmod 644 {archive}",
        archive = archive_path,
        paths = paths.join(" "),
    );
    Step::shell(
        StepCommand::shell(line),
        "packing build tree",
        "pack build tree",
    )
}

pub fn extract_step(archive_path: &str) -> Step {
    Step::shell(
        StepCommand::argv(["tar", "xzvf", archive_path]),
        "extract build tree",
        "extract build tree",
    )
}

pub fn upload_build_tree_step(archive_path: &str) -> Step {
    Step::upload(
        archive_path,
        Destination::Fixed(BUILD_TREE_DEST.to_string()),
        0o644,
    )
}

/// Records the working copy revision in the marker file.
pub fn revision_marker_step() -> Step {
    Step::shell(
        StepCommand::shell(format!("svnversion . >{REVISION_FILE}")),
        "writing revision marker",
        "write revision marker",
    )
}

/// Prints the revision marker; its output becomes the run's revision.
pub fn get_revision_step() -> Step {
    Step::shell(
        StepCommand::shell(format!("cat {REVISION_FILE}")),
        "getting revision",
        "get revision",
    )
    .with_completion(Completion::CaptureRevision)
}

/// Fetches the packed build tree from the build pipeline, unpacks it and
/// recovers its revision.
pub fn add_setup_tree_for_tests(builder: &mut PipelineBuilder) {
    builder
        .add_step(clobber_step())
        .add_step(Step::download(BUILD_TREE_DEST, "full_build.tar.gz", 0o644))
        .add_step(Step::download(
            "public_html/binaries/memcheck-latest-amd64-linux-self-contained.sh",
            "memcheck64.sh",
            0o755,
        ))
        .add_step(Step::download(
            "public_html/binaries/memcheck-latest-x86-linux-self-contained.sh",
            "memcheck32.sh",
            0o755,
        ))
        .add_step(extract_step("full_build.tar.gz"))
        .add_step(get_revision_step());
}

/// Uploads each `(local, remote)` pair; `%s` in the remote name receives
/// the run's revision.
pub fn add_upload_binaries(builder: &mut PipelineBuilder, binaries: &[(&str, &str)]) {
    for (local, remote) in binaries {
        builder.add_step(Step::upload(
            local,
            Destination::WithRevision(format!("{BINARIES_DIR}/{remote}")),
            0o755,
        ));
    }
}

/// Runs the gtest-based tool tests for every `<arch>-<os>-<flavor>` target:
/// first all suppression tests, then all sanitizer tests.
pub fn add_tool_tests(
    builder: &mut PipelineBuilder,
    archosd_list: &[&str],
) -> Result<(), ConfigError> {
    let first = archosd_list.first().ok_or(ConfigError::EmptyToolTests)?;
    let sep = if first.contains("windows") { "\\" } else { "/" };

    for (binary, label) in [
        ("suppressions_test", "suppressions"),
        ("thread_sanitizer_test", "thread_sanitizer"),
    ] {
        for archosd in archosd_list {
            let path = format!("tsan{sep}bin{sep}{archosd}-{binary}");
            builder.add_step(Step::test(
                StepCommand::shell(path),
                &format!("testing {label} ({archosd})"),
                &format!("test {label} ({archosd})"),
            ));
        }
    }
    Ok(())
}

/// Shell step whose output is classified by a benchmark log processor.
pub fn benchmark_step(spec: BenchmarkSpec, command: StepCommand) -> Step {
    let description = format!("running {} benchmark", spec.benchmark);
    let done = format!("{} benchmark", spec.benchmark);
    Step::shell(command, &description, &done).with_completion(Completion::ProcessLog(spec))
}
