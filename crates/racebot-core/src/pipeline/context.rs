//! Pipeline-scoped run state.
//!
//! One [`RunContext`] exists per execution of a pipeline. It is handed to
//! every operation that needs run-time values (currently the source
//! revision) instead of keeping them in process-wide state.

use serde::Serialize;

use crate::error::RevisionError;

/// Revision reported when none has been published yet.
pub const UNKNOWN_REVISION: &str = "-1";

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct RunContext {
    revision: Option<String>,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes the revision for this run. Allowed exactly once.
    pub fn publish_revision(&mut self, revision: impl Into<String>) -> Result<(), RevisionError> {
        let attempted = revision.into();
        if let Some(existing) = &self.revision {
            return Err(RevisionError::AlreadyPublished {
                existing: existing.clone(),
                attempted,
            });
        }
        self.revision = Some(attempted);
        Ok(())
    }

    pub fn revision(&self) -> Option<&str> {
        self.revision.as_deref()
    }

    pub fn revision_or_unknown(&self) -> &str {
        self.revision().unwrap_or(UNKNOWN_REVISION)
    }
}
