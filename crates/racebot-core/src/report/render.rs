use crate::TOOL_NAME;
use crate::pipeline::step::{Step, StepAction};
use crate::report::model::{GenerationReport, VerdictReport};

pub fn render_text(report: &GenerationReport) -> String {
    let mut out = String::new();
    out.push_str(&format!("{} {}\n", TOOL_NAME, report.tool.version));
    out.push_str(&format!("Digest: {}:{}\n", report.digest.algorithm, report.digest.value));

    for builder in &report.catalogue.builders {
        out.push_str(&format!(
            "Builder {} (agent {}, dir {}, pipeline {})\n",
            builder.name, builder.agent, builder.build_dir, builder.pipeline
        ));
    }

    for (id, pipeline) in &report.catalogue.pipelines {
        out.push_str(&format!("Pipeline {} ({} steps):\n", id, pipeline.len()));
        for (i, step) in pipeline.steps.iter().enumerate() {
            out.push_str(&format!("  {:>3}. {}\n", i + 1, step_line(step)));
        }
    }
    out
}

fn step_line(step: &Step) -> String {
    let body = match &step.action {
        StepAction::Checkout { svnurl, mode } => format!("checkout {svnurl} ({mode})"),
        StepAction::Command { command, .. } => command.to_shell_line(),
        StepAction::Upload {
            source,
            destination,
            mode,
        } => format!("upload {source} -> {destination} ({mode:o})"),
        StepAction::Download {
            source,
            destination,
            mode,
        } => format!("download {source} -> {destination} ({mode:o})"),
    };
    let policy = if step.fatal { "" } else { " [non-fatal]" };
    format!("[{}] {}{}", step.description_done, body, policy)
}

pub fn render_verdict_text(report: &VerdictReport) -> String {
    let verdict = &report.verdict;
    let mut out = String::new();
    out.push_str(&format!("{} {}\n", TOOL_NAME, report.tool.version));
    out.push_str(&format!("Revision: {}\n", report.revision));
    if let Some(bench) = &report.benchmark {
        out.push_str(&format!("Benchmark: {bench}\n"));
    }
    out.push_str(&format!("Shell result: {}\n", verdict.shell));
    if let Some(log) = verdict.log {
        out.push_str(&format!("Log result: {log}\n"));
    }
    out.push_str(&format!("Severity: {}\n", verdict.severity));
    for line in &verdict.result_text {
        out.push_str(&format!("  {line}\n"));
    }
    if let Some(link) = &verdict.report_link {
        out.push_str(&format!("Report: {link}\n"));
    }
    out
}
