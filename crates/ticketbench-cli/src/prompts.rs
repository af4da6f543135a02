//! Terminal implementation of the action wizard's questions.

use anyhow::{Context, Result, bail};
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use ticketbench_core::Cancelled;
use ticketbench_core::action::{ActionBackend, ActionPrompts, LinkType};
use ticketbench_core::config::Config;
use ticketbench_core::fetch::PagedFetcher;
use ticketbench_core::record::Record;

use crate::picker::Picker;

pub struct InteractivePrompts<'a> {
    pub picker: Picker<'a>,
    pub config: &'a Config,
    pub backend: &'a dyn ActionBackend,
    /// Working set offered as link subjects before a global search.
    pub working: &'a [Arc<Record>],
    pub fetcher: &'a mut PagedFetcher,
}

/// Read one line from `input`; end of input cancels.
fn read_line(prompt: &str, input: &mut dyn BufRead, out: &mut dyn Write) -> Result<String> {
    write!(out, "{prompt}: ")?;
    out.flush()?;
    let mut line = String::new();
    if input.read_line(&mut line).context("reading stdin")? == 0 {
        return Err(Cancelled.into());
    }
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Selector rows for every direction of every link type, two per type:
/// even rows put the subject on the inward side.
fn link_type_rows(subject: &Record, types: &[LinkType]) -> Vec<String> {
    types
        .iter()
        .flat_map(|link_type| {
            [
                format!("{} - {}...", subject.key, link_type.inward),
                format!("{} - {}...", subject.key, link_type.outward),
            ]
        })
        .collect()
}

impl ActionPrompts for InteractivePrompts<'_> {
    fn text(&mut self, prompt: &str) -> Result<String> {
        let stdin = io::stdin();
        let stdout = io::stdout();
        read_line(prompt, &mut stdin.lock(), &mut stdout.lock())
    }

    fn pick_label(&mut self) -> Result<String> {
        if self.config.labels.is_empty() {
            bail!("no labels configured; add some to `labels` in the config file");
        }
        let index = self.picker.pick_one(&self.config.labels, "Label> ")?;
        Ok(self.config.labels[index].clone())
    }

    fn pick_user(&mut self) -> Result<String> {
        let users = &self.config.favorites.users;
        if users.is_empty() {
            bail!("no favorite users configured; add some to [favorites] users");
        }
        let index = self.picker.pick_one(users, "User> ")?;
        Ok(users[index].clone())
    }

    fn pick_link_subject(&mut self) -> Result<Arc<Record>> {
        let from_workbench = !self.working.is_empty()
            && self
                .picker
                .pick_one(&["Pick from workbench", "Search"], "Link to> ")?
                == 0;
        if from_workbench {
            let picked = self.picker.pick_records(self.working, "Link to> ", true)?;
            let index = picked.first().copied().ok_or(Cancelled)?;
            return Ok(Arc::clone(&self.working[index]));
        }
        let query = self.picker.pick_query(self.config)?;
        let found = self.picker.search(self.fetcher, &query, "Link to> ", true)?;
        found.into_iter().next().ok_or_else(|| Cancelled.into())
    }

    fn pick_link_type(&mut self, subject: &Record) -> Result<(LinkType, bool)> {
        let types = self.backend.link_types().context("fetching link types")?;
        if types.is_empty() {
            bail!("the tracker offers no link types");
        }
        let rows = link_type_rows(subject, &types);
        let index = self.picker.pick_one(&rows, "Link type> ")?;
        Ok((types[index / 2].clone(), index % 2 == 0))
    }
}
