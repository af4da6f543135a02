//! Interactive picking on top of the selector bridge.
//!
//! Every method turns a selector cancellation into a [`Cancelled`] error so
//! callers can just use `?` and let the main loop redraw.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, error};
use ticketbench_core::Cancelled;
use ticketbench_core::config::Config;
use ticketbench_core::fetch::{FetchStatus, FixedRecords, PagedFetcher};
use ticketbench_core::format::RowFormat;
use ticketbench_core::record::Record;
use ticketbench_core::rpc::RpcHost;
use ticketbench_core::selection::{SelectError, SelectOptions, SelectOutcome, Selector, stream_of};
use ticketbench_core::workbench::WorkbenchError;

#[derive(Clone, Copy)]
pub struct Picker<'a> {
    pub selector: &'a Selector,
    pub rpc: &'a RpcHost,
    pub format: RowFormat,
}

fn indices(outcome: Result<SelectOutcome, SelectError>) -> Result<Vec<usize>> {
    outcome?
        .into_selected()
        .ok_or_else(|| Cancelled.into())
}

/// Resolve picked row indices against `rows`.
fn resolve<T: Clone>(rows: &[T], picked: &[usize]) -> Result<Vec<T>, WorkbenchError> {
    picked
        .iter()
        .map(|&index| {
            rows.get(index)
                .cloned()
                .ok_or(WorkbenchError::IndexOutOfRange {
                    index,
                    len: rows.len(),
                })
        })
        .collect()
}

impl Picker<'_> {
    /// Pick one entry of a static list; returns its index.
    pub fn pick_one<S: AsRef<str>>(&self, items: &[S], prompt: &str) -> Result<usize> {
        let picked = indices(
            self.selector
                .select_strings(items, &SelectOptions::new(prompt).single()),
        )?;
        let first = picked.first().copied().ok_or(Cancelled)?;
        if first >= items.len() {
            return Err(WorkbenchError::IndexOutOfRange {
                index: first,
                len: items.len(),
            }
            .into());
        }
        Ok(first)
    }

    /// Pick one of the configured named queries; returns the query text.
    pub fn pick_query(&self, config: &Config) -> Result<String> {
        if config.queries.is_empty() {
            anyhow::bail!("no [[queries]] in the config file");
        }
        let names: Vec<&str> = config.queries.iter().map(|q| q.name.as_str()).collect();
        let index = self.pick_one(&names, "Query> ")?;
        config
            .query(names[index])
            .map(str::to_string)
            .with_context(|| format!("query {:?} vanished from the config", names[index]))
    }

    /// Pick rows out of a known record list; returns their indices.
    pub fn pick_records(
        &self,
        records: &[Arc<Record>],
        prompt: &str,
        single: bool,
    ) -> Result<Vec<usize>> {
        let session = self
            .rpc
            .listen(Arc::new(FixedRecords(records.to_vec())))
            .context("starting selector callbacks")?;
        let mut options = SelectOptions::new(prompt);
        options.single = single;
        let outcome = self.selector.select(
            stream_of(records.iter().cloned()),
            self.format,
            &options,
            Some(session.addr()),
        );
        session.stop();
        let picked = indices(outcome)?;
        resolve(records, &picked)?;
        Ok(picked)
    }

    /// Run `query` remotely and pick from the streamed results.
    pub fn search(
        &self,
        fetcher: &mut PagedFetcher,
        query: &str,
        prompt: &str,
        single: bool,
    ) -> Result<Vec<Arc<Record>>> {
        fetcher.set_query(query);
        let (stream, controller) = fetcher.search_async();
        let session = self
            .rpc
            .listen(Arc::new(controller.clone()))
            .context("starting selector callbacks")?;

        let mut options = SelectOptions::new(prompt);
        options.single = single;
        let outcome = self
            .selector
            .select(stream, self.format, &options, Some(session.addr()));
        session.stop();

        let loaded = controller.loaded();
        let status = controller.status();
        controller.close();
        if let FetchStatus::Failed(reason) = &status {
            // Whatever loaded before the failure is still selectable.
            error!(loaded = loaded.len(), "search failed: {reason}");
        }
        debug!(?status, loaded = loaded.len(), "search finished");

        let picked = indices(outcome)?;
        Ok(resolve(&loaded, &picked)?)
    }
}
