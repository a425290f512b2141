use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::debug;

use racebot_core::classify::benchmark::{BenchmarkSpec, Expectation};
use racebot_core::classify::log::{StepOutcome, evaluate_outcome};
use racebot_core::classify::revision::read_revision_file;
use racebot_core::config::{Settings, load_settings};
use racebot_core::generate_report;
use racebot_core::pipeline::UNKNOWN_REVISION;
use racebot_core::report::model::{ToolInfo, VerdictReport};
use racebot_core::report::render;

use crate::args::{Commands, EvaluateArgs, GenerateArgs, OutputFormat, RevisionArgs};

mod args;
mod telemetry;

fn main() -> Result<()> {
    let args = args::Args::parse();
    telemetry::init_tracing(&args.log_level);

    match args.command {
        Commands::Generate(a) => generate(a),
        Commands::Evaluate(a) => {
            let code = evaluate(a)?;
            std::process::exit(code);
        }
        Commands::Revision(a) => revision(a),
    }
}

fn tool_info(commit: Option<String>) -> ToolInfo {
    ToolInfo {
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        commit,
    }
}

fn emit(output: &str, out: Option<&PathBuf>) -> Result<()> {
    match out {
        Some(path) => fs::write(path, output)
            .with_context(|| format!("failed to write output: {}", path.display()))?,
        None => print!("{output}"),
    }
    Ok(())
}

fn generate(args: GenerateArgs) -> Result<()> {
    let settings = match &args.settings {
        Some(path) => load_settings(path)?,
        None => Settings::default(),
    };
    debug!(builders = ?args.builders, "generating");

    let report = generate_report(&settings, &args.builders, tool_info(args.commit.clone()))?;

    let output = match args.format {
        OutputFormat::Json => serde_json::to_string_pretty(&report)?,
        OutputFormat::Text => render::render_text(&report),
    };
    emit(&output, args.out.as_ref())
}

fn parse_benchmark(arg: &str) -> Result<BenchmarkSpec> {
    match arg.split_once('/') {
        Some((platform, name)) if !platform.is_empty() && !name.is_empty() && !name.contains('/') => {
            Ok(BenchmarkSpec::new(platform, name))
        }
        _ => bail!("benchmark must be given as PLATFORM/NAME, got `{arg}`"),
    }
}

fn load_expectations(path: &Path) -> Result<BTreeMap<String, Expectation>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read expectations: {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("invalid expectations in {}", path.display()))
}

/// Returns the process exit code for the verdict.
fn evaluate(args: EvaluateArgs) -> Result<i32> {
    let log = match &args.log {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read step log: {}", path.display()))?,
        None => String::new(),
    };

    let spec = match &args.benchmark {
        Some(arg) => {
            let mut spec = parse_benchmark(arg)?;
            if let Some(path) = &args.expectations {
                spec.expectations = load_expectations(path)?;
            }
            Some(spec)
        }
        None => None,
    };

    let revision = args.revision.as_deref().unwrap_or(UNKNOWN_REVISION);
    let outcome = StepOutcome::exited(args.exit_code, log);
    let verdict = evaluate_outcome(&outcome, spec.as_ref(), revision);

    let report = VerdictReport::new(
        tool_info(args.commit.clone()),
        revision,
        spec.as_ref().map(|s| format!("{}/{}", s.platform, s.benchmark)),
        verdict,
    );

    let output = match args.format {
        OutputFormat::Json => serde_json::to_string_pretty(&report)?,
        OutputFormat::Text => render::render_verdict_text(&report),
    };
    emit(&output, None)?;
    Ok(report.exit_code)
}

fn revision(args: RevisionArgs) -> Result<()> {
    let revision = read_revision_file(&args.file)?;
    println!("{}", revision.as_deref().unwrap_or(UNKNOWN_REVISION));
    Ok(())
}
