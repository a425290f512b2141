use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(
    name = "racebot",
    version,
    about = "CI pipeline generator and step classifier for the race checker"
)]
pub struct Args {
    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Generate builder pipelines
    Generate(GenerateArgs),

    /// Classify the outcome of one finished step
    Evaluate(EvaluateArgs),

    /// Print the revision recorded in a REVISION marker file
    Revision(RevisionArgs),
}

#[derive(Debug, clap::Args)]
pub struct GenerateArgs {
    /// JSON settings file; stock settings when omitted
    #[arg(long)]
    pub settings: Option<PathBuf>,

    /// Only emit these builders (repeatable)
    #[arg(long = "builder")]
    pub builders: Vec<String>,

    /// Output format
    #[arg(long, default_value = "json")]
    pub format: OutputFormat,

    /// Write output to a file instead of stdout
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Optional git commit hash for tool metadata
    #[arg(long)]
    pub commit: Option<String>,
}

#[derive(Debug, clap::Args)]
pub struct EvaluateArgs {
    /// Exit status of the finished step
    #[arg(long, allow_negative_numbers = true)]
    pub exit_code: i32,

    /// Captured step output; empty when omitted
    #[arg(long)]
    pub log: Option<PathBuf>,

    /// Process the log as benchmark output, given as PLATFORM/NAME
    #[arg(long)]
    pub benchmark: Option<String>,

    /// JSON map of `graph/trace` to `{"improve": .., "regress": ..}`
    #[arg(long, requires = "benchmark")]
    pub expectations: Option<PathBuf>,

    /// Revision the step ran at
    #[arg(long)]
    pub revision: Option<String>,

    /// Output format
    #[arg(long, default_value = "json")]
    pub format: OutputFormat,

    /// Optional git commit hash for tool metadata
    #[arg(long)]
    pub commit: Option<String>,
}

#[derive(Debug, clap::Args)]
pub struct RevisionArgs {
    /// Marker file to read
    #[arg(long, default_value = "REVISION")]
    pub file: PathBuf,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Text,
}
