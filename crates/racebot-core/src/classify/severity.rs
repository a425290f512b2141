//! Severity lattice for step results.
//!
//! Responsibilities:
//! - Order step results as `Success < Warnings < Failure`
//! - Merge the raw process result with log-derived results
//! - Compute CI-compatible exit codes
//!
//! The merge policy is the lattice join:
//!
//!   - Any Failure  → Failure
//!   - Else any Warnings → Warnings
//!   - Else         → Success
//!
//! The join is associative, commutative and idempotent, so the order in
//! which results are merged never matters.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    #[default]
    Success,
    Warnings,
    Failure,
}

impl Severity {
    /// Shell result derived from a process exit status.
    pub fn from_exit_code(code: i32) -> Self {
        if code == 0 {
            Severity::Success
        } else {
            Severity::Failure
        }
    }

    /// Highest of the two severities.
    pub fn combine(self, other: Severity) -> Severity {
        self.max(other)
    }

    /// Exit code mapping:
    /// - SUCCESS  → 0
    /// - WARNINGS → 1
    /// - FAILURE  → 2
    pub fn exit_code(&self) -> i32 {
        match self {
            Severity::Success => 0,
            Severity::Warnings => 1,
            Severity::Failure => 2,
        }
    }
}

/// Joins any number of severities; an empty input is `Success`.
pub fn combine_all<I>(severities: I) -> Severity
where
    I: IntoIterator<Item = Severity>,
{
    severities
        .into_iter()
        .fold(Severity::Success, Severity::combine)
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Success => "SUCCESS",
            Severity::Warnings => "WARNINGS",
            Severity::Failure => "FAILURE",
        };
        f.write_str(s)
    }
}
