//! Runs queued actions against the tracker, one rate-limited call per item.

use std::sync::Arc;

use tracing::{info, warn};

use crate::action::{ActionBackend, ActionError};
use crate::rate_limit::RateLimiter;
use crate::workbench::QueueItem;

pub struct Executor {
    limiter: RateLimiter,
    backend: Arc<dyn ActionBackend>,
}

impl Executor {
    #[must_use]
    pub fn new(limiter: RateLimiter, backend: Arc<dyn ActionBackend>) -> Self {
        Self { limiter, backend }
    }

    /// Execute `items` in order and return one result per item.
    ///
    /// A failure is recorded and the batch continues. With `dry_run` nothing
    /// reaches the backend and every item succeeds.
    #[must_use]
    pub fn execute(&self, items: &[QueueItem], dry_run: bool) -> Vec<Result<(), ActionError>> {
        let total = items.len();
        let mut failed = 0_usize;
        let results = items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                self.limiter.acquire();
                let description = item.describe();
                if dry_run {
                    info!(index, total, "would execute {description}");
                    return Ok(());
                }
                info!(index, total, "executing {description}");
                let result = item.action.execute(&item.record, self.backend.as_ref());
                if let Err(err) = &result {
                    failed += 1;
                    warn!(key = %item.record.key, code = %err.code(), "{description} failed: {err}");
                }
                result
            })
            .collect();
        info!(total, failed, dry_run, "batch finished");
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{ActionBase, LinkType};
    use crate::record::Record;
    use crate::workbench::Workbench;
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    /// Fails every comment on record `2`, counts calls.
    #[derive(Default)]
    struct Flaky {
        calls: Mutex<usize>,
    }

    impl ActionBackend for Flaky {
        fn add_comment(&self, record: &Record, _comment: &str) -> Result<(), ActionError> {
            *self.calls.lock().expect("lock") += 1;
            if record.id == "2" {
                return Err(ActionError::Request("HTTP 500".into()));
            }
            Ok(())
        }
        fn add_label(&self, _: &Record, _: &str) -> Result<(), ActionError> {
            Ok(())
        }
        fn assign_user(&self, _: &Record, _: &str) -> Result<(), ActionError> {
            Ok(())
        }
        fn link_records(
            &self,
            _: &LinkType,
            _: &str,
            _: &str,
            _: Option<&str>,
        ) -> Result<(), ActionError> {
            Ok(())
        }
        fn open_in_browser(&self, _: &Record) -> Result<(), ActionError> {
            Ok(())
        }
        fn link_types(&self) -> Result<Vec<LinkType>, ActionError> {
            Ok(Vec::new())
        }
    }

    fn queued() -> Workbench {
        let mut wb = Workbench::new();
        wb.add_records(["1", "2"].map(|id| Arc::new(Record::new(id, format!("FOO-{id}"), "s"))));
        wb.add_action_base(ActionBase::AddComment {
            comment: "done".into(),
        })
        .expect("add");
        wb.select(&[0, 1]).expect("select");
        wb.assign_selected().expect("assign");
        wb
    }

    #[test]
    fn failures_stay_queued() {
        let backend = Arc::new(Flaky::default());
        let executor = Executor::new(
            RateLimiter::new(Duration::from_millis(1), 5),
            Arc::clone(&backend) as Arc<dyn ActionBackend>,
        );
        let mut wb = queued();

        let results = executor.execute(&wb.queue(), false);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
        assert_eq!(*backend.calls.lock().expect("lock"), 2);

        assert_eq!(wb.clear_queue(&results), Ok(1));
        let queue = wb.queue();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].record.id, "2");
        assert_eq!(wb.completed(), 1);
    }

    #[test]
    fn every_item_waits_for_a_token() {
        let mut wb = Workbench::new();
        let records = ["1", "3", "4"].map(|id| Arc::new(Record::new(id, format!("FOO-{id}"), "s")));
        wb.add_records(records);
        wb.add_action_base(ActionBase::AddLabel {
            label: "ops".into(),
        })
        .expect("add");
        wb.select(&[0, 1, 2]).expect("select");
        wb.assign_selected().expect("assign");

        let executor = Executor::new(
            RateLimiter::new(Duration::from_millis(50), 1),
            Arc::new(Flaky::default()),
        );
        let started = Instant::now();
        let results = executor.execute(&wb.queue(), false);
        // One token up front, then one tick per remaining item.
        assert!(started.elapsed() >= Duration::from_millis(90));
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(Result::is_ok));
    }

    #[test]
    fn dry_run_never_calls_backend() {
        let backend = Arc::new(Flaky::default());
        let executor = Executor::new(
            RateLimiter::new(Duration::from_millis(1), 5),
            Arc::clone(&backend) as Arc<dyn ActionBackend>,
        );
        let results = executor.execute(&queued().queue(), true);
        assert!(results.iter().all(Result::is_ok));
        assert_eq!(*backend.calls.lock().expect("lock"), 0);
    }
}
