//! Offline mode: sample issues and a backend that only logs.

use tracing::info;
use ticketbench_core::action::{ActionBackend, ActionError, LinkType};
use ticketbench_core::record::Record;
use ticketbench_core::source::StaticSource;

pub fn sample_records() -> Vec<Record> {
    vec![
        Record::new("10001", "FOO-100", "fix stuff")
            .with_status("Open")
            .with_labels(["backend"])
            .with_reporter("Dana Lee")
            .with_description("The thing is broken."),
        Record::new("10002", "BAR-100", "fix stuff")
            .with_status("In Progress")
            .with_reporter("Sam Ortiz"),
        Record::new("10003", "FOO-200", "stop breaking stuff")
            .with_status("Open")
            .with_labels(["backend", "ops"]),
        Record::new("10004", "FOO-300", "write the runbook")
            .with_status("Done")
            .with_reporter("Dana Lee"),
        Record::new("10005", "BAR-200", "rotate the certificates")
            .with_status("Open")
            .with_labels(["ops"]),
    ]
}

pub fn sample_source() -> StaticSource {
    StaticSource::new(sample_records())
}

#[derive(Debug, Default)]
pub struct DemoBackend;

impl ActionBackend for DemoBackend {
    fn add_comment(&self, record: &Record, comment: &str) -> Result<(), ActionError> {
        info!(key = %record.key, %comment, "demo: add comment");
        Ok(())
    }

    fn add_label(&self, record: &Record, label: &str) -> Result<(), ActionError> {
        info!(key = %record.key, %label, "demo: add label");
        Ok(())
    }

    fn assign_user(&self, record: &Record, user: &str) -> Result<(), ActionError> {
        info!(key = %record.key, %user, "demo: assign user");
        Ok(())
    }

    fn link_records(
        &self,
        link_type: &LinkType,
        inward_id: &str,
        outward_id: &str,
        comment: Option<&str>,
    ) -> Result<(), ActionError> {
        info!(link = %link_type.name, %inward_id, %outward_id, ?comment, "demo: link");
        Ok(())
    }

    fn open_in_browser(&self, record: &Record) -> Result<(), ActionError> {
        info!(key = %record.key, "demo: open in browser");
        Ok(())
    }

    fn link_types(&self) -> Result<Vec<LinkType>, ActionError> {
        Ok(vec![
            LinkType {
                name: "Blocks".into(),
                inward: "is blocked by".into(),
                outward: "blocks".into(),
            },
            LinkType {
                name: "Relates".into(),
                inward: "relates to".into(),
                outward: "relates to".into(),
            },
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ops::ControlFlow;
    use ticketbench_core::config::{Config, DEFAULT_CONFIG};
    use ticketbench_core::source::{PageOptions, RecordSource};

    #[test]
    fn sample_ids_are_unique() {
        let records = sample_records();
        let mut ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), records.len());
    }

    #[test]
    fn sample_source_finds_foo_100() {
        let record = sample_source().get_record("FOO-100").expect("lookup");
        assert_eq!(record.map(|r| r.to_string()).as_deref(), Some("FOO-100: fix stuff"));
    }

    #[test]
    fn every_default_query_finds_sample_issues() {
        let config = Config::parse(DEFAULT_CONFIG).expect("default config");
        let source = sample_source();
        assert!(!config.queries.is_empty());
        for named in &config.queries {
            let mut keys = Vec::new();
            source
                .for_each_record(&named.query, PageOptions::first(2), &mut |record| {
                    keys.push(record.key);
                    ControlFlow::Continue(())
                })
                .expect("enumerate");
            assert!(!keys.is_empty(), "query {:?} found nothing", named.name);
        }
    }

    #[test]
    fn project_queries_split_the_samples() {
        let config = Config::parse(DEFAULT_CONFIG).expect("default config");
        let foo = config.query("project foo").expect("project foo");
        let mut keys = Vec::new();
        sample_source()
            .for_each_record(foo, PageOptions::first(50), &mut |record| {
                keys.push(record.key);
                ControlFlow::Continue(())
            })
            .expect("enumerate");
        assert_eq!(keys, vec!["FOO-100", "FOO-200", "FOO-300"]);
    }
}
