//! Demand-driven paged fetching.
//!
//! [`PagedFetcher::search_async`] returns immediately with a record stream and
//! a [`FetchController`]. A background worker enumerates the remote query and
//! only forwards a record after taking one permit from the [`Demand`]
//! semaphore, so the worker never runs more than one page ahead of what the
//! consumer asked for.
//!
//! The record queue (a bounded channel) and the demand semaphore are separate
//! types on purpose: the channel orders records, the semaphore bounds them.

use std::ops::ControlFlow;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;

use crossbeam_channel::{Receiver, Sender, bounded, select};
use tracing::{debug, info, warn};

use crate::record::Record;
use crate::source::{PageOptions, RecordSource};

/// Records in fetch order; disconnects when the search ends for any reason.
pub type RecordStream = Receiver<Arc<Record>>;

/// Default number of records requested per page.
pub const DEFAULT_PAGE_SIZE: usize = 50;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// Demand semaphore
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct DemandState {
    permits: usize,
    closed: bool,
}

/// Bounded counting semaphore for fetch permits.
///
/// `refill` never blocks: permits above `capacity` are dropped.
#[derive(Debug)]
pub struct Demand {
    capacity: usize,
    state: Mutex<DemandState>,
    wakeup: Condvar,
}

impl Demand {
    /// A semaphore that starts full.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(DemandState {
                permits: capacity,
                closed: false,
            }),
            wakeup: Condvar::new(),
        }
    }

    /// Add up to `count` permits; returns how many were actually added.
    #[must_use]
    pub fn refill(&self, count: usize) -> usize {
        let mut state = lock(&self.state);
        if state.closed {
            return 0;
        }
        let room = self.capacity.saturating_sub(state.permits);
        let added = count.min(room);
        state.permits += added;
        drop(state);
        if added > 0 {
            self.wakeup.notify_all();
        }
        added
    }

    /// Block until a permit is available. Returns `false` once closed.
    #[must_use]
    pub fn acquire(&self) -> bool {
        let mut state = lock(&self.state);
        loop {
            if state.closed {
                return false;
            }
            if state.permits > 0 {
                state.permits -= 1;
                return true;
            }
            state = self
                .wakeup
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Close the semaphore and wake every waiter. Idempotent.
    pub fn close(&self) {
        lock(&self.state).closed = true;
        self.wakeup.notify_all();
    }

    #[must_use]
    pub fn available(&self) -> usize {
        lock(&self.state).permits
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        lock(&self.state).closed
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Terminal status of a search, so callers can tell exhaustion from failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchStatus {
    Running,
    /// The remote ran out of results.
    Exhausted,
    /// The remote failed; records loaded before the error are kept.
    Failed(String),
    /// The consumer closed the search.
    Cancelled,
}

impl FetchStatus {
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

#[derive(Debug)]
struct FetchShared {
    page_size: usize,
    demand: Demand,
    loaded: Mutex<Vec<Arc<Record>>>,
    status: Mutex<FetchStatus>,
    cancel: Mutex<Option<Sender<()>>>,
}

/// Handle on one in-flight search. Cheap to clone.
#[derive(Debug, Clone)]
pub struct FetchController {
    shared: Arc<FetchShared>,
}

impl FetchController {
    /// Ask the worker for one more page of records.
    pub fn load_more(&self) {
        let added = self.shared.demand.refill(self.shared.page_size);
        debug!(added, "load more");
    }

    /// Snapshot of every record fetched so far, in fetch order.
    #[must_use]
    pub fn loaded(&self) -> Vec<Arc<Record>> {
        lock(&self.shared.loaded).clone()
    }

    #[must_use]
    pub fn status(&self) -> FetchStatus {
        lock(&self.shared.status).clone()
    }

    /// Stop the worker after its in-flight remote call. Safe to call twice.
    pub fn close(&self) {
        let Some(cancel) = lock(&self.shared.cancel).take() else {
            return;
        };
        drop(cancel);
        self.shared.demand.close();
        let mut status = lock(&self.shared.status);
        if !status.is_terminal() {
            *status = FetchStatus::Cancelled;
        }
    }

    fn append(&self, record: Arc<Record>) {
        lock(&self.shared.loaded).push(record);
    }

    fn finish(&self, outcome: FetchStatus) {
        self.shared.demand.close();
        lock(&self.shared.cancel).take();
        let mut status = lock(&self.shared.status);
        if !status.is_terminal() {
            *status = outcome;
        }
    }
}

// ---------------------------------------------------------------------------
// Interactor
// ---------------------------------------------------------------------------

/// What the selector callback service needs from the current candidate set.
pub trait Interactor: Send + Sync {
    /// Request another page of candidates (no-op for fixed sets).
    fn load_more(&self);

    /// Candidates loaded so far, indexed by row number.
    fn loaded(&self) -> Vec<Arc<Record>>;
}

impl Interactor for FetchController {
    fn load_more(&self) {
        Self::load_more(self);
    }

    fn loaded(&self) -> Vec<Arc<Record>> {
        Self::loaded(self)
    }
}

/// A candidate set that is fully known up front (e.g. the working set).
#[derive(Debug, Clone, Default)]
pub struct FixedRecords(pub Vec<Arc<Record>>);

impl Interactor for FixedRecords {
    fn load_more(&self) {}

    fn loaded(&self) -> Vec<Arc<Record>> {
        self.0.clone()
    }
}

// ---------------------------------------------------------------------------
// Fetcher
// ---------------------------------------------------------------------------

/// Runs remote searches without blocking the caller on the full result set.
pub struct PagedFetcher {
    source: Arc<dyn RecordSource>,
    page_size: usize,
    query: String,
    active: Option<FetchController>,
}

impl PagedFetcher {
    #[must_use]
    pub fn new(source: Arc<dyn RecordSource>, page_size: usize) -> Self {
        Self {
            source,
            page_size: page_size.max(1),
            query: String::new(),
            active: None,
        }
    }

    #[must_use]
    pub const fn page_size(&self) -> usize {
        self.page_size
    }

    #[must_use]
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Replace the query and discard the previous search.
    ///
    /// Takes effect on the next [`Self::search_async`].
    pub fn set_query(&mut self, query: &str) {
        self.query = query.replace(['\r', '\n'], " ").trim().to_string();
        if let Some(previous) = self.active.take() {
            previous.close();
        }
    }

    /// Start a background search and return its stream and controller.
    ///
    /// The first page flows without any [`FetchController::load_more`] call.
    #[must_use]
    pub fn search_async(&mut self) -> (RecordStream, FetchController) {
        if let Some(previous) = self.active.take() {
            previous.close();
        }

        let (record_tx, record_rx) = bounded::<Arc<Record>>(self.page_size);
        let (cancel_tx, cancel_rx) = bounded::<()>(0);
        let controller = FetchController {
            shared: Arc::new(FetchShared {
                page_size: self.page_size,
                demand: Demand::new(self.page_size),
                loaded: Mutex::new(Vec::with_capacity(self.page_size * 2)),
                status: Mutex::new(FetchStatus::Running),
                cancel: Mutex::new(Some(cancel_tx)),
            }),
        };

        let worker = controller.clone();
        let source = Arc::clone(&self.source);
        let query = self.query.clone();
        let page = PageOptions::first(self.page_size);

        info!(query = %query, page_size = page.page_size, "starting search");
        let spawned = thread::Builder::new()
            .name("fetch-worker".to_string())
            .spawn(move || run_worker(&*source, &query, page, &worker, &record_tx, &cancel_rx));
        if let Err(err) = spawned {
            warn!("failed to spawn fetch worker: {err}");
            controller.finish(FetchStatus::Failed(err.to_string()));
        }

        self.active = Some(controller.clone());
        (record_rx, controller)
    }
}

impl Drop for PagedFetcher {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            active.close();
        }
    }
}

fn run_worker(
    source: &dyn RecordSource,
    query: &str,
    page: PageOptions,
    controller: &FetchController,
    records: &Sender<Arc<Record>>,
    cancel: &Receiver<()>,
) {
    let mut stopped = false;
    let result = source.for_each_record(query, page, &mut |record| {
        if !controller.shared.demand.acquire() {
            stopped = true;
            return ControlFlow::Break(());
        }
        let record = Arc::new(record);
        controller.append(Arc::clone(&record));
        select! {
            send(records, record) -> sent => {
                if sent.is_err() {
                    stopped = true;
                    return ControlFlow::Break(());
                }
            }
            recv(cancel) -> _ => {
                stopped = true;
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    });

    let loaded = lock(&controller.shared.loaded).len();
    let outcome = match result {
        Err(err) => {
            warn!(code = %err.code(), loaded, "error while searching: {err}");
            FetchStatus::Failed(err.to_string())
        }
        Ok(()) if stopped => FetchStatus::Cancelled,
        Ok(()) => FetchStatus::Exhausted,
    };
    debug!(?outcome, loaded, "fetch worker finished");
    controller.finish(outcome);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::StaticSource;
    use std::time::Duration;

    #[test]
    fn demand_starts_full_and_drops_excess() {
        let demand = Demand::new(3);
        assert_eq!(demand.available(), 3);
        assert_eq!(demand.refill(3), 0);
        assert!(demand.acquire());
        assert_eq!(demand.refill(5), 1);
        assert_eq!(demand.available(), 3);
    }

    #[test]
    fn closed_demand_releases_waiters() {
        let demand = Arc::new(Demand::new(1));
        assert!(demand.acquire());

        let waiter = {
            let demand = Arc::clone(&demand);
            thread::spawn(move || demand.acquire())
        };
        thread::sleep(Duration::from_millis(20));
        demand.close();
        assert!(!waiter.join().expect("join waiter"));
        assert_eq!(demand.refill(1), 0);
        assert!(demand.is_closed());
    }

    #[test]
    fn set_query_flattens_newlines() {
        let mut fetcher = PagedFetcher::new(Arc::new(StaticSource::default()), 10);
        fetcher.set_query("project = FOO\nAND status = Open\n");
        assert_eq!(fetcher.query(), "project = FOO AND status = Open");
    }

    #[test]
    fn close_is_idempotent_and_marks_cancelled() {
        let source = StaticSource::new(
            (0..10)
                .map(|i| Record::new(i.to_string(), format!("FOO-{i}"), "s"))
                .collect(),
        );
        let mut fetcher = PagedFetcher::new(Arc::new(source), 2);
        let (stream, controller) = fetcher.search_async();

        controller.close();
        controller.close();

        // Drain until the worker drops its sender.
        while stream.recv_timeout(Duration::from_secs(2)).is_ok() {}
        assert_eq!(controller.status(), FetchStatus::Cancelled);
    }

    #[test]
    fn empty_result_set_is_exhausted() {
        let mut fetcher = PagedFetcher::new(Arc::new(StaticSource::default()), 5);
        let (stream, controller) = fetcher.search_async();
        assert!(stream.recv_timeout(Duration::from_secs(2)).is_err());
        assert_eq!(controller.status(), FetchStatus::Exhausted);
        assert!(controller.loaded().is_empty());
    }

    #[test]
    fn fixed_records_ignore_load_more() {
        let fixed = FixedRecords(vec![Arc::new(Record::new("1", "FOO-1", "a"))]);
        fixed.load_more();
        assert_eq!(Interactor::loaded(&fixed).len(), 1);
    }
}
