//! Deployment settings consumed by the builder catalogue.
//!
//! Every field has a default, so an empty JSON object (or no settings file
//! at all) yields the stock deployment.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::builders::PipelineId;
use crate::classify::benchmark::{BenchmarkSpec, Expectation};
use crate::variant::naming::DEFAULT_TEST_BASE_NAME;

pub const DEFAULT_SVN_URL: &str = "http://data-race-test.googlecode.com/svn/trunk";
pub const DEFAULT_VALGRIND_BUILD_URL: &str =
    "http://vm42-m3/b/build/slave/full_valgrind/valgrind_build.tar.gz";
pub const DEFAULT_WINDOWS_PIN_ROOT: &str = "c:/pin";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub svnurl: String,
    /// Prebuilt valgrind tree fetched by the linux build pipeline.
    pub valgrind_build_url: String,
    pub windows_pin_root: String,
    pub test_base_name: String,
    pub benchmarks: Vec<BenchmarkSettings>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            svnurl: DEFAULT_SVN_URL.to_string(),
            valgrind_build_url: DEFAULT_VALGRIND_BUILD_URL.to_string(),
            windows_pin_root: DEFAULT_WINDOWS_PIN_ROOT.to_string(),
            test_base_name: DEFAULT_TEST_BASE_NAME.to_string(),
            benchmarks: Vec::new(),
        }
    }
}

impl Settings {
    pub fn benchmarks_for(&self, pipeline: PipelineId) -> impl Iterator<Item = &BenchmarkSettings> {
        self.benchmarks.iter().filter(move |b| b.pipeline == pipeline)
    }
}

/// A benchmark appended to the end of one pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct BenchmarkSettings {
    pub pipeline: PipelineId,
    pub platform: String,
    pub name: String,
    /// Shell line running the benchmark.
    pub command: String,
    #[serde(default)]
    pub expectations: BTreeMap<String, Expectation>,
}

impl BenchmarkSettings {
    pub fn spec(&self) -> BenchmarkSpec {
        BenchmarkSpec {
            platform: self.platform.clone(),
            benchmark: self.name.clone(),
            expectations: self.expectations.clone(),
        }
    }
}

pub fn load_settings(path: &Path) -> Result<Settings> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read settings file: {}", path.display()))?;
    let settings = serde_json::from_str(&raw)
        .with_context(|| format!("invalid settings in {}", path.display()))?;
    Ok(settings)
}
