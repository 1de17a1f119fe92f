use std::io;

use log::debug;

use crate::error::{FuzzError, Result};
use crate::utils::read_lines;

/// Raw target rows and payloads, both in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Corpus {
    pub targets: Vec<String>,
    pub payloads: Vec<String>,
}

impl Corpus {
    pub fn new(targets: Vec<String>, payloads: Vec<String>) -> Self {
        Self { targets, payloads }
    }

    /// Loads the target file, then the payload file. Either one missing
    /// aborts with `CorpusMissing`.
    pub fn load(target_file: &str, payload_file: &str) -> Result<Self> {
        let targets = load_list_from_file(target_file)?;
        let payloads = load_list_from_file(payload_file)?;
        debug!(
            "loaded {} target rows from {} and {} payloads from {}",
            targets.len(),
            target_file,
            payloads.len(),
            payload_file
        );
        Ok(Self { targets, payloads })
    }

    /// Upper bound on requests; malformed target rows reduce the real count.
    pub fn combinations(&self) -> usize {
        self.targets.len() * self.payloads.len()
    }
}

/// Loads trimmed, non-empty lines. Lines are kept verbatim otherwise, so a
/// payload starting with `#` is still a payload.
pub fn load_list_from_file(path: &str) -> Result<Vec<String>> {
    read_lines(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => FuzzError::corpus_missing(path),
        _ => FuzzError::Io(e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn file_with(lines: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", lines).unwrap();
        file
    }

    #[test]
    fn test_blank_lines_skipped_and_lines_trimmed() {
        let file = file_with("  a.com/x,id  \n\n   \nb.com/y,q\n");
        let lines = load_list_from_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(lines, vec!["a.com/x,id", "b.com/y,q"]);
    }

    #[test]
    fn test_comment_like_payloads_are_kept() {
        let file = file_with("#fragment\n' OR 1=1--\n");
        let lines = load_list_from_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(lines, vec!["#fragment", "' OR 1=1--"]);
    }

    #[test]
    fn test_missing_file_is_corpus_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("target.txt");
        let err = load_list_from_file(path.to_str().unwrap()).unwrap_err();
        assert!(matches!(err, FuzzError::CorpusMissing { .. }));
    }

    #[test]
    fn test_load_reports_missing_payload_file() {
        let targets = file_with("a.com/x,id\n");
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("payload.txt");
        let missing = missing.to_str().unwrap();

        let err = Corpus::load(targets.path().to_str().unwrap(), missing).unwrap_err();
        match err {
            FuzzError::CorpusMissing { path } => assert_eq!(path, missing),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_combinations() {
        let corpus = Corpus::new(
            vec!["a,b".to_string(), "c,d".to_string()],
            vec!["1".to_string(), "2".to_string(), "3".to_string()],
        );
        assert_eq!(corpus.combinations(), 6);
    }
}
