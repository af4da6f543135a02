//! Rendering records as selector rows and preview text.

use std::fmt::Write as _;

use crate::record::Record;

/// Optional columns of a candidate row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowField {
    Summary,
    Labels,
    Reporter,
}

impl RowField {
    pub const ALL: [Self; 3] = [Self::Summary, Self::Labels, Self::Reporter];

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Summary => "summary",
            Self::Labels => "labels",
            Self::Reporter => "reporter",
        }
    }
}

/// Which columns appear after the key in a candidate row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowFormat {
    pub summary: bool,
    pub labels: bool,
    pub reporter: bool,
}

impl Default for RowFormat {
    fn default() -> Self {
        Self {
            summary: true,
            labels: false,
            reporter: false,
        }
    }
}

impl RowFormat {
    #[must_use]
    pub const fn is_enabled(&self, field: RowField) -> bool {
        match field {
            RowField::Summary => self.summary,
            RowField::Labels => self.labels,
            RowField::Reporter => self.reporter,
        }
    }

    pub const fn toggle(&mut self, field: RowField) {
        match field {
            RowField::Summary => self.summary = !self.summary,
            RowField::Labels => self.labels = !self.labels,
            RowField::Reporter => self.reporter = !self.reporter,
        }
    }

    /// Render the text part of a row: `id key[ - summary][ [labels]][ reporter]`.
    ///
    /// The id comes first so the callback client can find it as the second
    /// whitespace field once the row index is prepended.
    #[must_use]
    pub fn render_row(&self, record: &Record) -> String {
        let mut row = format!("{} {}", one_line(&record.id), one_line(&record.key));
        if self.summary {
            let _ = write!(row, " - {}", one_line(&record.summary));
        }
        if self.labels && !record.labels.is_empty() {
            let _ = write!(row, " [{}]", one_line(&record.labels.join(", ")));
        }
        if let Some(reporter) = record.reporter.as_deref().filter(|_| self.reporter) {
            let _ = write!(row, " {}", one_line(reporter));
        }
        row
    }
}

/// Multi-line detail used by the selector preview pane.
#[must_use]
pub fn render_detail(record: &Record) -> String {
    let mut out = format!("{}: {}\n", record.key, record.summary);
    if !record.description.is_empty() {
        let _ = writeln!(out, "Description: {}", record.description);
    }
    if let Some(status) = &record.status {
        let _ = writeln!(out, "Status: {status}");
    }
    if !record.labels.is_empty() {
        let _ = writeln!(out, "Labels: {}", record.labels.join(", "));
    }
    if let Some(reporter) = &record.reporter {
        let _ = writeln!(out, "Reporter: {reporter}");
    }
    out
}

fn one_line(text: &str) -> String {
    text.replace(['\r', '\n'], " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> Record {
        Record::new("10001", "FOO-100", "fix stuff")
            .with_labels(["ops", "infra"])
            .with_reporter("dana")
            .with_status("Open")
    }

    #[test]
    fn default_row_shows_summary_only() {
        assert_eq!(
            RowFormat::default().render_row(&record()),
            "10001 FOO-100 - fix stuff"
        );
    }

    #[test]
    fn toggled_fields_are_appended() {
        let mut format = RowFormat::default();
        format.toggle(RowField::Labels);
        format.toggle(RowField::Reporter);
        format.toggle(RowField::Summary);
        assert!(!format.is_enabled(RowField::Summary));
        assert_eq!(format.render_row(&record()), "10001 FOO-100 [ops, infra] dana");
    }

    #[test]
    fn rows_never_contain_newlines() {
        let record = Record::new("1", "FOO-1", "first\nsecond\r\nthird");
        let row = RowFormat::default().render_row(&record);
        assert!(!row.contains('\n'));
        assert!(!row.contains('\r'));
    }

    #[test]
    fn detail_lists_known_fields() {
        let detail = render_detail(&record().with_description("broken since Monday"));
        assert!(detail.starts_with("FOO-100: fix stuff\n"));
        assert!(detail.contains("Description: broken since Monday\n"));
        assert!(detail.contains("Status: Open\n"));
        assert!(detail.contains("Reporter: dana\n"));
    }
}
