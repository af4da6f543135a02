//! Remote record sources.
//!
//! The fetcher only needs a paged "for each record" enumeration; the HTTP
//! implementation lives in the CLI crate and [`StaticSource`] serves tests and
//! the offline demo.

use std::ops::ControlFlow;

use crate::error::ErrorCode;
use crate::record::Record;

/// Pagination parameters handed to a [`RecordSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageOptions {
    /// Offset of the first record to request.
    pub start_at: usize,
    /// Number of records requested per remote call.
    pub page_size: usize,
}

impl PageOptions {
    #[must_use]
    pub const fn first(page_size: usize) -> Self {
        Self {
            start_at: 0,
            page_size,
        }
    }
}

/// Errors raised while enumerating a remote query.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    /// The remote call failed (transport error or non-2xx status).
    #[error("request failed: {0}")]
    Request(String),

    /// The remote answered with a payload we could not decode.
    #[error("could not decode response: {0}")]
    Decode(String),
}

impl SourceError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Request(_) => ErrorCode::RemoteRequestFailed,
            Self::Decode(_) => ErrorCode::RemoteDecodeFailed,
        }
    }
}

/// A remote search endpoint that can be enumerated page by page.
///
/// `each` is called once per record in server order. Returning
/// [`ControlFlow::Break`] stops the enumeration before the next record and no
/// further pages are requested; that is not an error.
///
/// Backpressure is applied per record, after the record was produced. A
/// paging implementation may therefore hold one page beyond what the consumer
/// asked for, so at most about two pages are in memory ahead of demand.
pub trait RecordSource: Send + Sync {
    fn for_each_record(
        &self,
        query: &str,
        page: PageOptions,
        each: &mut dyn FnMut(Record) -> ControlFlow<()>,
    ) -> Result<(), SourceError>;

    /// Look up one record by key.
    ///
    /// The default searches with the key as query and keeps the exact match.
    fn get_record(&self, key: &str) -> Result<Option<Record>, SourceError> {
        let mut found = None;
        self.for_each_record(key, PageOptions::first(50), &mut |record| {
            if record.key == key {
                found = Some(record);
                return ControlFlow::Break(());
            }
            ControlFlow::Continue(())
        })?;
        Ok(found)
    }
}

/// In-memory source with the same paging shape as a remote one.
///
/// Query semantics: an empty query or `ALL` matches everything, a
/// `project = "FOO"` clause matches keys `FOO-*`, anything else matches
/// records whose key starts with the query.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    records: Vec<Record>,
    fail_after: Option<usize>,
}

impl StaticSource {
    #[must_use]
    pub const fn new(records: Vec<Record>) -> Self {
        Self {
            records,
            fail_after: None,
        }
    }

    /// Fail with a request error once `count` records have been delivered.
    #[must_use]
    pub const fn failing_after(mut self, count: usize) -> Self {
        self.fail_after = Some(count);
        self
    }

    fn matches(query: &str, record: &Record) -> bool {
        let query = query.trim();
        if query.is_empty() || query.eq_ignore_ascii_case("ALL") {
            return true;
        }
        match project_clause(query) {
            Some(project) => record
                .key
                .strip_prefix(project)
                .is_some_and(|rest| rest.starts_with('-')),
            None => record.key.starts_with(query),
        }
    }
}

/// The project of a `project = "FOO"` query, quotes optional.
fn project_clause(query: &str) -> Option<&str> {
    let (field, value) = query.split_once('=')?;
    if !field.trim().eq_ignore_ascii_case("project") {
        return None;
    }
    let project = value.trim().trim_matches(['"', '\'']);
    (!project.is_empty()).then_some(project)
}

impl RecordSource for StaticSource {
    fn for_each_record(
        &self,
        query: &str,
        page: PageOptions,
        each: &mut dyn FnMut(Record) -> ControlFlow<()>,
    ) -> Result<(), SourceError> {
        let matching: Vec<&Record> = self
            .records
            .iter()
            .filter(|record| Self::matches(query, record))
            .skip(page.start_at)
            .collect();

        let mut delivered = 0_usize;
        for (page_no, chunk) in matching.chunks(page.page_size.max(1)).enumerate() {
            tracing::debug!(page = page_no, len = chunk.len(), "static source page");
            for record in chunk {
                if self.fail_after.is_some_and(|limit| delivered >= limit) {
                    return Err(SourceError::Request(format!(
                        "simulated failure after {delivered} records"
                    )));
                }
                if each(Record::clone(record)).is_break() {
                    return Ok(());
                }
                delivered += 1;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> StaticSource {
        StaticSource::new(vec![
            Record::new("1", "FOO-100", "fix stuff"),
            Record::new("2", "BAR-100", "fix stuff"),
            Record::new("3", "FOO-200", "stop breaking stuff"),
        ])
    }

    fn collect(source: &StaticSource, query: &str) -> Result<Vec<String>, SourceError> {
        let mut keys = Vec::new();
        source.for_each_record(query, PageOptions::first(2), &mut |record| {
            keys.push(record.key);
            ControlFlow::Continue(())
        })?;
        Ok(keys)
    }

    #[test]
    fn all_query_returns_everything_in_order() {
        let keys = collect(&fixture(), "ALL").expect("enumerate");
        assert_eq!(keys, vec!["FOO-100", "BAR-100", "FOO-200"]);
    }

    #[test]
    fn prefix_query_filters_by_key() {
        let keys = collect(&fixture(), "FOO").expect("enumerate");
        assert_eq!(keys, vec!["FOO-100", "FOO-200"]);
    }

    #[test]
    fn project_clause_matches_whole_project() {
        let mut source = fixture();
        source.records.push(Record::new("4", "FOOBAR-1", "other project"));
        let keys = collect(&source, r#"project = "FOO""#).expect("enumerate");
        assert_eq!(keys, vec!["FOO-100", "FOO-200"]);
        let keys = collect(&source, "PROJECT=BAR").expect("enumerate");
        assert_eq!(keys, vec!["BAR-100"]);
        assert_eq!(project_clause("status = Open"), None);
    }

    #[test]
    fn break_stops_enumeration() {
        let mut seen = 0;
        fixture()
            .for_each_record("", PageOptions::first(1), &mut |_| {
                seen += 1;
                ControlFlow::Break(())
            })
            .expect("break is not an error");
        assert_eq!(seen, 1);
    }

    #[test]
    fn get_record_wants_exact_key() {
        let mut source = fixture();
        source.records.push(Record::new("4", "FOO-1000", "prefix twin"));
        let found = source.get_record("FOO-100").expect("lookup");
        assert_eq!(found.map(|r| r.id), Some("1".to_string()));
        assert!(source.get_record("FOO-9").expect("lookup").is_none());
    }

    #[test]
    fn failing_source_reports_request_error() {
        let err = collect(&fixture().failing_after(1), "ALL").unwrap_err();
        assert_eq!(err.code(), ErrorCode::RemoteRequestFailed);
    }
}
