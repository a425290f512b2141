use serde::Serialize;

use crate::SCHEMA_VERSION;
use crate::builders::Catalogue;
use crate::classify::log::StepVerdict;
use crate::classify::severity::Severity;

/// Output of `generate`: every requested builder with its pipeline.
///
/// Deterministic for identical settings, apart from `tool`.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationReport {
    pub schema_version: String,
    pub tool: ToolInfo,
    pub digest: CatalogueDigest,
    #[serde(flatten)]
    pub catalogue: Catalogue,
}

impl GenerationReport {
    pub fn new(tool: ToolInfo, digest: CatalogueDigest, catalogue: Catalogue) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            tool,
            digest,
            catalogue,
        }
    }
}

/// Tool metadata.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ToolInfo {
    pub name: String,
    pub version: String,
    pub commit: Option<String>,
}

/// Fingerprint of the generated builders.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CatalogueDigest {
    pub algorithm: String,
    pub value: String,
}

/// Output of `evaluate`: the verdict for one finished step.
#[derive(Debug, Clone, Serialize)]
pub struct VerdictReport {
    pub schema_version: String,
    pub tool: ToolInfo,
    pub revision: String,
    /// `<platform>/<benchmark>` when the log went through a benchmark processor.
    pub benchmark: Option<String>,
    pub verdict: StepVerdict,
    pub exit_code: i32,
}

impl VerdictReport {
    pub fn new(
        tool: ToolInfo,
        revision: &str,
        benchmark: Option<String>,
        verdict: StepVerdict,
    ) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            tool,
            revision: revision.to_string(),
            benchmark,
            exit_code: verdict.severity.exit_code(),
            verdict,
        }
    }

    pub fn severity(&self) -> Severity {
        self.verdict.severity
    }
}
