use crate::error::{FuzzError, Result};

/// Splits a raw target row into its host/path and parameter name.
pub const TARGET_DELIMITER: char = ',';

/// One fuzzable endpoint: `https://{host_path}?{parameter}=...`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetDescriptor {
    host_path: String,
    parameter: String,
}

impl TargetDescriptor {
    /// Parses a `host_path,parameter` row on the first delimiter.
    ///
    /// Everything after the first comma is the parameter, verbatim. Rows
    /// without a comma, or with an empty side, are rejected.
    pub fn parse(row: &str) -> Result<Self> {
        let (host_path, parameter) = row
            .split_once(TARGET_DELIMITER)
            .ok_or_else(|| FuzzError::malformed_row(row))?;

        if host_path.is_empty() || parameter.is_empty() {
            return Err(FuzzError::malformed_row(row));
        }

        Ok(Self {
            host_path: host_path.to_string(),
            parameter: parameter.to_string(),
        })
    }

    pub fn host_path(&self) -> &str {
        &self.host_path
    }

    pub fn parameter(&self) -> &str {
        &self.parameter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_row() {
        let target = TargetDescriptor::parse("example.com/search,q").unwrap();
        assert_eq!(target.host_path(), "example.com/search");
        assert_eq!(target.parameter(), "q");
    }

    #[test]
    fn test_parameter_keeps_later_commas() {
        let target = TargetDescriptor::parse("a.com/x,id,extra").unwrap();
        assert_eq!(target.host_path(), "a.com/x");
        assert_eq!(target.parameter(), "id,extra");
    }

    #[test]
    fn test_row_without_delimiter_is_malformed() {
        let err = TargetDescriptor::parse("a.com/x").unwrap_err();
        assert!(matches!(err, FuzzError::MalformedTargetRow { ref row } if row == "a.com/x"));
    }

    #[test]
    fn test_empty_sides_are_malformed() {
        assert!(TargetDescriptor::parse(",id").is_err());
        assert!(TargetDescriptor::parse("a.com/x,").is_err());
        assert!(TargetDescriptor::parse(",").is_err());
    }

    #[test]
    fn test_parts_are_not_trimmed() {
        let target = TargetDescriptor::parse("a.com/x, id").unwrap();
        assert_eq!(target.parameter(), " id");
    }
}
