//! Source revision correlation.
//!
//! The checkout step records the revision into [`REVISION_FILE`]; a later
//! step prints it back and its output becomes the run's revision.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// Marker file written next to the checked-out sources.
pub const REVISION_FILE: &str = "REVISION";

/// Extracts the revision from captured output; blank output yields `None`.
pub fn parse_revision(output: &str) -> Option<String> {
    let revision = output.trim_end();
    if revision.trim_start().is_empty() {
        return None;
    }
    Some(revision.to_string())
}

/// Reads a revision marker file from disk.
pub fn read_revision_file(path: &Path) -> Result<Option<String>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read revision marker: {}", path.display()))?;
    Ok(parse_revision(&text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn strips_trailing_whitespace_only() {
        assert_eq!(parse_revision("1234\n"), Some("1234".into()));
        assert_eq!(parse_revision("1200:1234M \r\n"), Some("1200:1234M".into()));
        assert_eq!(parse_revision(" 77"), Some(" 77".into()));
    }

    #[test]
    fn blank_output_has_no_revision() {
        assert_eq!(parse_revision(""), None);
        assert_eq!(parse_revision("  \n"), None);
    }

    #[test]
    fn reads_marker_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"5150\n").unwrap();
        file.flush().unwrap();

        assert_eq!(read_revision_file(file.path()).unwrap(), Some("5150".into()));
    }

    #[test]
    fn missing_marker_is_an_error() {
        assert!(read_revision_file(Path::new("no/such/REVISION")).is_err());
    }
}
