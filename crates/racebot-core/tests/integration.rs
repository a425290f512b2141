use std::collections::BTreeSet;

use racebot_core::builders::{PipelineId, generate, linux_build};
use racebot_core::classify::benchmark::Expectation;
use racebot_core::classify::log::StepOutcome;
use racebot_core::classify::run::PipelineRun;
use racebot_core::classify::severity::Severity;
use racebot_core::config::{BenchmarkSettings, Settings};
use racebot_core::generate_report;
use racebot_core::pipeline::step::{CommandKind, Completion, Step, StepAction};
use racebot_core::report::model::ToolInfo;
use racebot_core::variant::naming::{BINARY_DIR, DEFAULT_TEST_BASE_NAME, artifact_name};

fn tool() -> ToolInfo {
    ToolInfo {
        name: "racebot".into(),
        version: "0.1.0-test".into(),
        commit: None,
    }
}

/// Unit test binaries named by a step's command, if any.
fn binaries_in(step: &Step) -> Vec<String> {
    let prefix = format!("{BINARY_DIR}/");
    let line = match step.command_line() {
        Some(cmd) => cmd.to_shell_line(),
        None => return Vec::new(),
    };
    line.split_whitespace()
        .filter(|t| t.starts_with(&prefix))
        .map(str::to_string)
        .collect()
}

const CHECKOUT_LOG: &str = "A    trunk/tsan/Makefile\n\
                            A    trunk/unittest/racecheck_unittest.cc\n\
                            Checked out revision 5150.\n";

fn outcome_for(step: &Step) -> StepOutcome {
    match (&step.action, &step.completion) {
        (StepAction::Checkout { .. }, _) => StepOutcome::exited(0, CHECKOUT_LOG),
        (_, Some(Completion::CaptureRevision)) => StepOutcome::exited(0, "5150\n"),
        _ => StepOutcome::exited(0, ""),
    }
}

#[test]
fn shipped_artifacts_have_distinct_names() {
    let names: BTreeSet<String> = linux_build::shipped_variants()
        .unwrap()
        .iter()
        .map(|v| artifact_name(v, DEFAULT_TEST_BASE_NAME))
        .collect();
    assert_eq!(names.len(), 9);
    assert!(names.contains("racecheck_unittest-linux-x86-O1-PIC"));
    assert!(names.contains("racecheck_unittest-linux-amd64-O1-static"));
}

#[test]
fn linux_tests_only_reference_shipped_binaries() {
    let catalogue = generate(&Settings::default()).unwrap();
    let shipped: BTreeSet<String> = linux_build::shipped_variants()
        .unwrap()
        .iter()
        .map(|v| format!("{BINARY_DIR}/{}", artifact_name(v, DEFAULT_TEST_BASE_NAME)))
        .collect();

    let small = catalogue.pipeline(PipelineId::LinuxSmall).unwrap();
    let referenced: Vec<String> = small.steps.iter().flat_map(binaries_in).collect();
    assert_eq!(referenced.len(), 2);
    for binary in referenced {
        assert!(shipped.contains(&binary), "{binary} is not in the build tree");
    }
}

#[test]
fn windows_tests_follow_their_build() {
    let catalogue = generate(&Settings::default()).unwrap();
    let steps = &catalogue.pipeline(PipelineId::Windows).unwrap().steps;

    let mut built = BTreeSet::new();
    for step in steps {
        match step.kind() {
            Some(CommandKind::Compile) if step.description.starts_with("building unittests") => {
                let args = step.command_line().unwrap().args();
                let opt = args.iter().find(|a| a.starts_with("OPT=")).unwrap();
                built.insert(format!(
                    "{BINARY_DIR}/racecheck_unittest-windows-x86-O{}.exe",
                    &opt[4..]
                ));
            }
            Some(CommandKind::Test) => {
                for binary in binaries_in(step) {
                    assert!(built.contains(&binary), "{binary} tested before it was built");
                }
            }
            _ => {}
        }
    }
    assert_eq!(built.len(), 2);
}

#[test]
fn successful_run_resolves_uploads_with_revision() {
    let catalogue = generate(&Settings::default()).unwrap();
    let pipeline = catalogue.pipeline(PipelineId::LinuxBuild).unwrap();

    let mut run = PipelineRun::new(pipeline);
    while let Some(step) = run.next_step() {
        let outcome = outcome_for(step);
        run.record(&outcome).unwrap();
    }

    let summary = run.summary();
    assert_eq!(summary.severity, Severity::Success);
    assert_eq!(summary.executed, pipeline.len());
    assert_eq!(summary.revision, "5150");

    let uploads: Vec<String> = pipeline
        .steps
        .iter()
        .filter_map(|s| match &s.action {
            StepAction::Upload { destination, .. } => Some(destination.resolve(run.context())),
            _ => None,
        })
        .collect();
    assert!(uploads.contains(&"public_html/binaries/tsan-r5150-amd64only-linux-self-contained.sh".to_string()));
    assert!(uploads.contains(&"build/linux_build.tgz".to_string()));
}

#[test]
fn windows_sfx_upload_is_named_after_marker_revision() {
    let catalogue = generate(&Settings::default()).unwrap();
    let pipeline = catalogue.pipeline(PipelineId::Windows).unwrap();

    let mut run = PipelineRun::new(pipeline);
    while let Some(step) = run.next_step() {
        let outcome = outcome_for(step);
        run.record(&outcome).unwrap();
    }
    assert_eq!(run.summary().revision, "5150");

    let last = pipeline.steps.last().unwrap();
    match &last.action {
        StepAction::Upload { destination, .. } => assert_eq!(
            destination.resolve(run.context()),
            "public_html/binaries/tsan-r5150-x86-windows-sfx.exe"
        ),
        other => panic!("expected upload, got {other:?}"),
    }
}

#[test]
fn failed_build_halts_before_packing() {
    let catalogue = generate(&Settings::default()).unwrap();
    let pipeline = catalogue.pipeline(PipelineId::LinuxBuild).unwrap();

    let mut run = PipelineRun::new(pipeline);
    while let Some(step) = run.next_step() {
        let outcome = if step.description == "building tsan" {
            StepOutcome::exited(2, "make: *** [lo] Error 1")
        } else {
            outcome_for(step)
        };
        run.record(&outcome).unwrap();
    }

    let summary = run.summary();
    assert_eq!(summary.severity, Severity::Failure);
    assert!(summary.not_run > 0);
    assert!(
        !run.records()
            .iter()
            .any(|r| r.description == "pack build tree")
    );
}

#[test]
fn benchmark_regression_surfaces_as_warnings_in_run() {
    let settings = Settings {
        benchmarks: vec![BenchmarkSettings {
            pipeline: PipelineId::LinuxSmall,
            platform: "linux".into(),
            name: "bigtest".into(),
            command: "./tsan.sh unittest/bin/bigtest".into(),
            expectations: [(
                "time/total".to_string(),
                Expectation {
                    improve: 90.0,
                    regress: 110.0,
                },
            )]
            .into_iter()
            .collect(),
        }],
        ..Settings::default()
    };
    let catalogue = generate(&settings).unwrap();
    let pipeline = catalogue.pipeline(PipelineId::LinuxSmall).unwrap();

    let mut run = PipelineRun::new(pipeline);
    while let Some(step) = run.next_step() {
        let outcome = match step.completion {
            Some(Completion::ProcessLog(_)) => StepOutcome::exited(0, "RESULT time: total= 180 ms\n"),
            _ => outcome_for(step),
        };
        run.record(&outcome).unwrap();
    }

    let last = run.records().last().unwrap();
    assert_eq!(last.verdict.shell, Severity::Success);
    assert_eq!(last.verdict.severity, Severity::Warnings);
    assert_eq!(last.verdict.result_text[0], "r5150");
    assert_eq!(run.summary().severity, Severity::Warnings);
}

#[test]
fn report_digest_is_stable_across_selection_order() {
    let a = generate_report(&Settings::default(), &["buildbot-win7"], tool()).unwrap();
    let b = generate_report(&Settings::default(), &["buildbot-win7"], tool()).unwrap();
    assert_eq!(a.digest, b.digest);

    let all = generate_report::<&str>(&Settings::default(), &[], tool()).unwrap();
    assert_ne!(a.digest, all.digest);
    assert_eq!(all.catalogue.builders.len(), 5);
}

#[test]
fn unknown_builder_is_an_error() {
    let err = generate_report(&Settings::default(), &["nope"], tool()).unwrap_err();
    assert!(err.to_string().contains("unknown builder"));
}
