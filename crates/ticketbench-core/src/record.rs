//! Remote ticket records as seen by the rest of the crate.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A remote ticket reference.
///
/// Records are immutable once fetched and are shared as `Arc<Record>` between
/// the fetch cache, the workbench and the executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Server-assigned unique identifier (stable across renames).
    pub id: String,
    /// Human key, e.g. `FOO-100`.
    pub key: String,
    pub summary: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub reporter: Option<String>,
}

impl Record {
    /// Minimal constructor used by fixtures and the demo source.
    #[must_use]
    pub fn new(id: impl Into<String>, key: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            key: key.into(),
            summary: summary.into(),
            description: String::new(),
            status: None,
            labels: Vec::new(),
            reporter: None,
        }
    }

    #[must_use]
    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    #[must_use]
    pub fn with_reporter(mut self, reporter: impl Into<String>) -> Self {
        self.reporter = Some(reporter.into());
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.key, self.summary)
    }
}

#[cfg(test)]
mod tests {
    use super::Record;

    #[test]
    fn display_uses_key_and_summary() {
        let record = Record::new("10001", "FOO-100", "fix stuff");
        assert_eq!(record.to_string(), "FOO-100: fix stuff");
    }

    #[test]
    fn optional_fields_default_when_missing() {
        let record: Record =
            serde_json::from_str(r#"{"id":"1","key":"FOO-1","summary":"s"}"#).expect("parse");
        assert!(record.labels.is_empty());
        assert!(record.status.is_none());
        assert!(record.reporter.is_none());
        assert_eq!(record.description, "");
    }
}
