//! Benchmark log processing.
//!
//! Benchmarks print one line per measurement:
//!
//! ```text
//! RESULT <graph>: <trace>= <value> <units>
//! *RESULT <graph>: <trace>= [<v1>,<v2>,...] <units>
//! ```
//!
//! A leading `*` marks a result shown in the step summary. Lists are
//! reduced to their mean. Each `<graph>/<trace>` may carry an
//! [`Expectation`]; values outside it are reported as regressions or
//! unexpected improvements.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::classify::log::LogProcessor;
use crate::classify::severity::Severity;

/// Accepted range for one trace.
///
/// When `regress > improve` lower values are better (timings): a value
/// above `regress` is a regression and below `improve` an improvement.
/// Otherwise higher values are better (throughput) and the comparisons
/// flip.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Expectation {
    pub improve: f64,
    pub regress: f64,
}

impl Expectation {
    fn check(&self, value: f64) -> Option<Deviation> {
        let lower_is_better = self.regress >= self.improve;
        let (regressed, improved) = if lower_is_better {
            (value > self.regress, value < self.improve)
        } else {
            (value < self.regress, value > self.improve)
        };
        if regressed {
            Some(Deviation::Regress)
        } else if improved {
            Some(Deviation::Improve)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Deviation {
    Regress,
    Improve,
}

/// Declares a benchmark step's reporting location and expectations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BenchmarkSpec {
    pub platform: String,
    pub benchmark: String,
    /// Keyed by `<graph>/<trace>`.
    #[serde(default)]
    pub expectations: BTreeMap<String, Expectation>,
}

impl BenchmarkSpec {
    pub fn new(platform: &str, benchmark: &str) -> Self {
        Self {
            platform: platform.to_string(),
            benchmark: benchmark.to_string(),
            expectations: BTreeMap::new(),
        }
    }

    pub fn with_expectation(mut self, key: &str, expectation: Expectation) -> Self {
        self.expectations.insert(key.to_string(), expectation);
        self
    }

    pub fn base_dir(&self) -> String {
        format!("perf/{}/{}", self.platform, self.benchmark)
    }

    /// Master-side directory receiving the graph data.
    pub fn output_dir(&self) -> String {
        format!("public_html/{}", self.base_dir())
    }

    pub fn report_link(&self) -> String {
        format!("{}/report.html?history=1000", self.base_dir())
    }

    pub fn processor(&self) -> BenchmarkLogProcessor {
        BenchmarkLogProcessor::new(self.clone())
    }
}

/// One parsed `RESULT` line.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PerfResult {
    pub graph: String,
    pub trace: String,
    pub value: f64,
    pub units: String,
    pub important: bool,
}

impl PerfResult {
    pub fn key(&self) -> String {
        format!("{}/{}", self.graph, self.trace)
    }
}

/// Parses a single output line.
///
/// Returns `None` for lines that are not results at all and `Some(Err)`
/// for result lines that cannot be understood.
pub fn parse_result_line(line: &str) -> Option<Result<PerfResult, String>> {
    let line = line.trim();
    let (important, rest) = match line.strip_prefix('*') {
        Some(rest) => (true, rest),
        None => (false, line),
    };
    let rest = rest.strip_prefix("RESULT ")?;
    Some(parse_result_body(rest, important).ok_or_else(|| line.to_string()))
}

fn parse_result_body(body: &str, important: bool) -> Option<PerfResult> {
    let (graph, rest) = body.split_once(':')?;
    let (trace, rest) = rest.split_once('=')?;
    let (graph, trace, rest) = (graph.trim(), trace.trim(), rest.trim());
    if graph.is_empty() || trace.is_empty() {
        return None;
    }

    let (value, units) = match rest.chars().next()? {
        '[' => {
            let (list, units) = rest[1..].split_once(']')?;
            (mean(list)?, units)
        }
        '{' => {
            let (pair, units) = rest[1..].split_once('}')?;
            let (avg, _stddev) = pair.split_once(',')?;
            (finite(avg)?, units)
        }
        _ => {
            let (value, units) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
            (finite(value)?, units)
        }
    };

    Some(PerfResult {
        graph: graph.to_string(),
        trace: trace.to_string(),
        value,
        units: units.trim().to_string(),
        important,
    })
}

/// `NaN` and infinities never compare against expectations.
fn finite(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn mean(list: &str) -> Option<f64> {
    let values = list.split(',').map(finite).collect::<Option<Vec<_>>>()?;
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Log processor classifying benchmark output against expectations.
///
/// Classification:
/// - no result lines at all      → FAILURE
/// - regression, unexpected improvement or malformed line → WARNINGS
/// - otherwise                   → SUCCESS
#[derive(Debug, Clone)]
pub struct BenchmarkLogProcessor {
    spec: BenchmarkSpec,
    processed: bool,
    results: Vec<PerfResult>,
    regressions: Vec<String>,
    improvements: Vec<String>,
    malformed: Vec<String>,
}

impl BenchmarkLogProcessor {
    pub fn new(spec: BenchmarkSpec) -> Self {
        Self {
            spec,
            processed: false,
            results: Vec::new(),
            regressions: Vec::new(),
            improvements: Vec::new(),
            malformed: Vec::new(),
        }
    }

    pub fn results(&self) -> &[PerfResult] {
        &self.results
    }

    pub fn regressions(&self) -> &[String] {
        &self.regressions
    }
}

impl LogProcessor for BenchmarkLogProcessor {
    fn process(&mut self, revision: &str, log: &str) -> Vec<String> {
        self.processed = true;

        for line in log.lines() {
            match parse_result_line(line) {
                None => {}
                Some(Ok(result)) => {
                    let key = result.key();
                    match self.spec.expectations.get(&key).and_then(|e| e.check(result.value)) {
                        Some(Deviation::Regress) => self.regressions.push(key),
                        Some(Deviation::Improve) => self.improvements.push(key),
                        None => {}
                    }
                    self.results.push(result);
                }
                Some(Err(line)) => self.malformed.push(line),
            }
        }

        let mut text = vec![format!("r{revision}")];
        text.extend(
            self.results
                .iter()
                .filter(|r| r.important)
                .map(|r| format!("{}: {} {}", r.key(), r.value, r.units).trim_end().to_string()),
        );
        text.extend(self.regressions.iter().map(|k| format!("PERF_REGRESS: {k}")));
        text.extend(self.improvements.iter().map(|k| format!("PERF_IMPROVE: {k}")));
        text.extend(self.malformed.iter().map(|l| format!("malformed result: {l}")));

        if !self.regressions.is_empty() {
            warn!(
                benchmark = %self.spec.benchmark,
                regressions = ?self.regressions,
                "benchmark regressions detected"
            );
        }
        text
    }

    fn evaluate(&self) -> Option<Severity> {
        if !self.processed {
            return None;
        }
        if self.results.is_empty() {
            return Some(Severity::Failure);
        }
        if !self.regressions.is_empty() || !self.improvements.is_empty() || !self.malformed.is_empty() {
            return Some(Severity::Warnings);
        }
        Some(Severity::Success)
    }

    fn report_link(&self) -> Option<String> {
        Some(self.spec.report_link())
    }
}
