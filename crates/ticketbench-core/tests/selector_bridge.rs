//! Drives the selector bridge with small shell scripts standing in for fzf.
#![cfg(unix)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use ticketbench_core::fetch::PagedFetcher;
use ticketbench_core::format::RowFormat;
use ticketbench_core::record::Record;
use ticketbench_core::selection::{SelectOptions, SelectOutcome, Selector, stream_of};
use ticketbench_core::source::StaticSource;

/// `sh -c <script>`; the flags the bridge appends land in `$0..`.
fn scripted(script: &str) -> Selector {
    Selector::new("sh", vec!["-c".into(), script.into()])
}

fn greek() -> Vec<Arc<Record>> {
    ["Alpha", "Beta", "Gamma"]
        .iter()
        .enumerate()
        .map(|(i, summary)| Arc::new(Record::new(format!("{}", 100 + i), format!("FOO-{i}"), *summary)))
        .collect()
}

#[test]
fn picks_the_matching_row() {
    let outcome = scripted("grep Beta")
        .select(stream_of(greek()), RowFormat::default(), &SelectOptions::new("pick> "), None)
        .expect("select");
    assert_eq!(outcome, SelectOutcome::Selected(vec![1]));
}

#[test]
fn multiple_rows_come_back_in_printed_order() {
    let outcome = scripted("grep -v Beta | sort -r")
        .select(stream_of(greek()), RowFormat::default(), &SelectOptions::new("pick> "), None)
        .expect("select");
    assert_eq!(outcome, SelectOutcome::Selected(vec![2, 0]));
}

#[test]
fn non_zero_exit_without_output_is_cancelled() {
    let outcome = scripted("cat > /dev/null; exit 130")
        .select(stream_of(greek()), RowFormat::default(), &SelectOptions::new("pick> "), None)
        .expect("select");
    assert_eq!(outcome, SelectOutcome::Cancelled);
}

#[test]
fn empty_output_is_cancelled() {
    let outcome = scripted("cat > /dev/null")
        .select_strings(&["Quit", "Print"], &SelectOptions::new("menu> ").single())
        .expect("select");
    assert_eq!(outcome, SelectOutcome::Cancelled);
}

#[test]
fn garbage_output_is_a_protocol_error() {
    let err = scripted("cat > /dev/null; echo not-an-index")
        .select(stream_of(greek()), RowFormat::default(), &SelectOptions::new("pick> "), None)
        .unwrap_err();
    assert_eq!(err.code(), ticketbench_core::ErrorCode::SelectorProtocol);
}

#[test]
fn static_strings_are_indexed() {
    let outcome = scripted("grep Print")
        .select_strings(&["Quit", "Reset all", "Print"], &SelectOptions::new("menu> ").single())
        .expect("select");
    assert_eq!(outcome.into_selected(), Some(vec![2]));
}

#[test]
fn selector_exiting_early_does_not_hang_on_open_stream() {
    let many: Vec<Record> = (0..100)
        .map(|i| Record::new(i.to_string(), format!("FOO-{i}"), "s"))
        .collect();
    let mut fetcher = PagedFetcher::new(Arc::new(StaticSource::new(many)), 2);
    let (stream, controller) = fetcher.search_async();

    let started = Instant::now();
    let outcome = scripted("head -n 1")
        .select(stream, RowFormat::default(), &SelectOptions::new("pick> "), None)
        .expect("select");
    assert_eq!(outcome, SelectOutcome::Selected(vec![0]));
    assert!(started.elapsed() < Duration::from_secs(10));

    // The worker is parked on demand; closing releases it.
    controller.close();
    assert_eq!(controller.loaded()[0].key, "FOO-0");
}
