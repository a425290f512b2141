use anyhow::{Context, Result};

use crate::config::Settings;
use crate::report::model::{GenerationReport, ToolInfo};

pub mod builders;
pub mod classify;
pub mod command;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod report;
pub mod util;
pub mod variant;

pub const TOOL_NAME: &str = "racebot";

/// JSON schema version of generation and verdict reports.
/// Bump when a field changes meaning or disappears.
pub const SCHEMA_VERSION: &str = "0.1.0";

/// Generates the builders named in `names` (all of them when empty)
/// and wraps them in a fingerprinted report.
pub fn generate_report<S: AsRef<str>>(
    settings: &Settings,
    names: &[S],
    tool: ToolInfo,
) -> Result<GenerationReport> {
    let catalogue = builders::generate(settings)
        .context("failed to assemble builders")?
        .select(names)?;
    let digest =
        util::deterministic::digest_of(&catalogue).context("failed to fingerprint builders")?;
    Ok(GenerationReport::new(tool, digest, catalogue))
}
