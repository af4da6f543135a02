//! The in-memory batch state: working set, selection, action bases and the
//! execution queue.
//!
//! Every fallible operation validates before it mutates, so an `Err` always
//! leaves the workbench exactly as it was.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::action::ActionBase;
use crate::error::ErrorCode;
use crate::record::Record;

/// Identifier of an action base, unique for the lifetime of a workbench.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActionId(u64);

impl ActionId {
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkbenchError {
    #[error("action already exists as {0}")]
    DuplicateAction(ActionId),

    #[error("no current action")]
    NoCurrentAction,

    #[error("unknown action {0}")]
    UnknownAction(ActionId),

    #[error("index {index} out of range for {len} records")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("queue changed: expected {expected} results, got {actual}")]
    QueueChanged { expected: usize, actual: usize },
}

impl WorkbenchError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::DuplicateAction(_) => ErrorCode::DuplicateAction,
            Self::NoCurrentAction => ErrorCode::NoCurrentAction,
            Self::UnknownAction(_) => ErrorCode::UnknownAction,
            Self::IndexOutOfRange { .. } => ErrorCode::IndexOutOfRange,
            Self::QueueChanged { .. } => ErrorCode::QueueChanged,
        }
    }
}

/// A record paired with the action to run on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub record: Arc<Record>,
    pub action_id: ActionId,
}

/// One resolved queue entry, ready for the executor.
#[derive(Debug, Clone)]
pub struct QueueItem {
    pub record: Arc<Record>,
    pub action_id: ActionId,
    pub action: Arc<ActionBase>,
}

impl QueueItem {
    #[must_use]
    pub fn describe(&self) -> String {
        self.action.describe(Some(&self.record))
    }
}

#[derive(Debug, Default)]
pub struct Workbench {
    working: Vec<Arc<Record>>,
    selection: HashSet<String>,
    actions: BTreeMap<ActionId, Arc<ActionBase>>,
    assignments: Vec<Assignment>,
    current: Option<ActionId>,
    last_id: u64,
    completed: usize,
}

impl Workbench {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // -- working set ---------------------------------------------------------

    /// Merge `records` into the working set.
    ///
    /// A record already present (by id) keeps its position and takes the new
    /// content; new records are appended in order.
    pub fn add_records<I>(&mut self, records: I)
    where
        I: IntoIterator<Item = Arc<Record>>,
    {
        for record in records {
            if let Some(slot) = self.working.iter_mut().find(|r| r.id == record.id) {
                *slot = Arc::clone(&record);
            } else {
                self.working.push(Arc::clone(&record));
            }
            for assignment in &mut self.assignments {
                if assignment.record.id == record.id {
                    assignment.record = Arc::clone(&record);
                }
            }
        }
        debug!(working = self.working.len(), "records merged");
    }

    #[must_use]
    pub fn working(&self) -> &[Arc<Record>] {
        &self.working
    }

    /// Replace the selection with the records at `indices` of the working set.
    ///
    /// # Errors
    ///
    /// [`WorkbenchError::IndexOutOfRange`] if any index is out of range.
    pub fn select(&mut self, indices: &[usize]) -> Result<(), WorkbenchError> {
        let len = self.working.len();
        if let Some(&index) = indices.iter().find(|&&index| index >= len) {
            return Err(WorkbenchError::IndexOutOfRange { index, len });
        }
        self.selection = indices
            .iter()
            .map(|&index| self.working[index].id.clone())
            .collect();
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// Selected records in working-set order.
    #[must_use]
    pub fn selected(&self) -> Vec<Arc<Record>> {
        self.working
            .iter()
            .filter(|record| self.selection.contains(&record.id))
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn has_selection(&self) -> bool {
        !self.selection.is_empty()
    }

    /// Drop the selected records from the working set and clear the selection.
    ///
    /// Returns how many records were removed. Queued assignments stay.
    pub fn remove_selected(&mut self) -> usize {
        let before = self.working.len();
        let selection = std::mem::take(&mut self.selection);
        self.working.retain(|record| !selection.contains(&record.id));
        before - self.working.len()
    }

    // -- action bases --------------------------------------------------------

    fn find_duplicate(&self, base: &ActionBase, ignore: Option<ActionId>) -> Option<ActionId> {
        let canonical = base.canonical();
        self.actions
            .iter()
            .find(|(id, existing)| Some(**id) != ignore && existing.canonical() == canonical)
            .map(|(id, _)| *id)
    }

    /// Register an action base and make it current.
    ///
    /// # Errors
    ///
    /// [`WorkbenchError::DuplicateAction`] if an equal base exists.
    pub fn add_action_base(&mut self, base: ActionBase) -> Result<ActionId, WorkbenchError> {
        if let Some(existing) = self.find_duplicate(&base, None) {
            return Err(WorkbenchError::DuplicateAction(existing));
        }
        self.last_id += 1;
        let id = ActionId(self.last_id);
        debug!(%id, action = %base, "action base added");
        self.actions.insert(id, Arc::new(base));
        self.current = Some(id);
        Ok(id)
    }

    /// Swap the parameters of `id`, keeping its assignments.
    ///
    /// # Errors
    ///
    /// [`WorkbenchError::UnknownAction`] for a missing id,
    /// [`WorkbenchError::DuplicateAction`] if another base already equals
    /// `base`.
    pub fn replace_action_base(
        &mut self,
        id: ActionId,
        base: ActionBase,
    ) -> Result<(), WorkbenchError> {
        if !self.actions.contains_key(&id) {
            return Err(WorkbenchError::UnknownAction(id));
        }
        if let Some(existing) = self.find_duplicate(&base, Some(id)) {
            return Err(WorkbenchError::DuplicateAction(existing));
        }
        self.actions.insert(id, Arc::new(base));
        Ok(())
    }

    /// Remove `id` and every assignment that refers to it.
    ///
    /// Returns the number of assignments dropped.
    ///
    /// # Errors
    ///
    /// [`WorkbenchError::UnknownAction`] for a missing id.
    pub fn remove_action_base(&mut self, id: ActionId) -> Result<usize, WorkbenchError> {
        if self.actions.remove(&id).is_none() {
            return Err(WorkbenchError::UnknownAction(id));
        }
        let before = self.assignments.len();
        self.assignments.retain(|assignment| assignment.action_id != id);
        if self.current == Some(id) {
            self.current = None;
        }
        let dropped = before - self.assignments.len();
        debug!(%id, dropped, "action base removed");
        Ok(dropped)
    }

    /// # Errors
    ///
    /// [`WorkbenchError::UnknownAction`] for a missing id.
    pub fn set_current_action(&mut self, id: ActionId) -> Result<(), WorkbenchError> {
        if !self.actions.contains_key(&id) {
            return Err(WorkbenchError::UnknownAction(id));
        }
        self.current = Some(id);
        Ok(())
    }

    pub const fn clear_current_action(&mut self) {
        self.current = None;
    }

    #[must_use]
    pub fn current_action(&self) -> Option<(ActionId, Arc<ActionBase>)> {
        let id = self.current?;
        self.actions.get(&id).map(|base| (id, Arc::clone(base)))
    }

    #[must_use]
    pub fn action(&self, id: ActionId) -> Option<Arc<ActionBase>> {
        self.actions.get(&id).cloned()
    }

    /// Action bases in id order.
    #[must_use]
    pub fn actions(&self) -> impl Iterator<Item = (ActionId, &ActionBase)> + '_ {
        self.actions.iter().map(|(id, base)| (*id, base.as_ref()))
    }

    // -- queue ---------------------------------------------------------------

    /// Queue `record` under the current action. Returns `false` if it was
    /// already queued for that action.
    ///
    /// # Errors
    ///
    /// [`WorkbenchError::NoCurrentAction`] when no action is current.
    pub fn assign(&mut self, record: Arc<Record>) -> Result<bool, WorkbenchError> {
        let action_id = self.current.ok_or(WorkbenchError::NoCurrentAction)?;
        let queued = self
            .assignments
            .iter()
            .any(|a| a.action_id == action_id && a.record.id == record.id);
        if queued {
            return Ok(false);
        }
        self.assignments.push(Assignment { record, action_id });
        Ok(true)
    }

    /// Queue every selected record under the current action.
    ///
    /// Returns how many new assignments were made.
    ///
    /// # Errors
    ///
    /// [`WorkbenchError::NoCurrentAction`] when no action is current; nothing
    /// is queued in that case.
    pub fn assign_selected(&mut self) -> Result<usize, WorkbenchError> {
        if self.current.is_none() {
            return Err(WorkbenchError::NoCurrentAction);
        }
        let mut added = 0;
        for record in self.selected() {
            if self.assign(record)? {
                added += 1;
            }
        }
        Ok(added)
    }

    #[must_use]
    pub fn assignments(&self) -> &[Assignment] {
        &self.assignments
    }

    /// Resolved queue in assignment order.
    #[must_use]
    pub fn queue(&self) -> Vec<QueueItem> {
        self.assignments
            .iter()
            .filter_map(|assignment| {
                self.actions.get(&assignment.action_id).map(|action| QueueItem {
                    record: Arc::clone(&assignment.record),
                    action_id: assignment.action_id,
                    action: Arc::clone(action),
                })
            })
            .collect()
    }

    /// Drop the queue entries whose result is `Ok`; failures stay queued in
    /// their original order. Returns how many entries were cleared.
    ///
    /// # Errors
    ///
    /// [`WorkbenchError::QueueChanged`] when `results` does not line up with
    /// the queue.
    pub fn clear_queue<E>(&mut self, results: &[Result<(), E>]) -> Result<usize, WorkbenchError> {
        if results.len() != self.assignments.len() {
            return Err(WorkbenchError::QueueChanged {
                expected: self.assignments.len(),
                actual: results.len(),
            });
        }
        let mut outcomes = results.iter();
        let before = self.assignments.len();
        self.assignments
            .retain(|_| outcomes.next().is_some_and(Result::is_err));
        let cleared = before - self.assignments.len();
        self.completed += cleared;
        Ok(cleared)
    }

    #[must_use]
    pub const fn completed(&self) -> usize {
        self.completed
    }

    /// Back to an empty workbench. Action ids are not reused.
    pub fn reset(&mut self) {
        let last_id = self.last_id;
        *self = Self {
            last_id,
            ..Self::default()
        };
    }
}

impl fmt::Display for Workbench {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let current = self
            .current_action()
            .map_or_else(|| "No action".to_string(), |(id, base)| format!("{id} {base}"));
        let queue = self.queue();
        writeln!(f, "Current action: {current}")?;
        writeln!(f, "Issues: {}", self.working.len())?;
        writeln!(f, "Selected: {}", self.selection.len())?;
        writeln!(f, "Actions: {}", self.actions.len())?;
        writeln!(f, "Completed: {}", self.completed)?;
        writeln!(f, "Queued: {}", queue.len())?;
        for item in &queue {
            writeln!(f, "  {}", item.describe())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(id: &str, summary: &str) -> Arc<Record> {
        Arc::new(Record::new(id, format!("FOO-{id}"), summary))
    }

    fn label(name: &str) -> ActionBase {
        ActionBase::AddLabel { label: name.into() }
    }

    #[test]
    fn re_added_record_keeps_position_with_new_content() {
        let mut wb = Workbench::new();
        wb.add_records([rec("1", "old"), rec("2", "b")]);
        wb.add_records([rec("1", "new"), rec("3", "c")]);
        let summaries: Vec<&str> = wb.working().iter().map(|r| r.summary.as_str()).collect();
        assert_eq!(summaries, vec!["new", "b", "c"]);
    }

    #[test]
    fn select_is_all_or_nothing() {
        let mut wb = Workbench::new();
        wb.add_records([rec("1", "a"), rec("2", "b")]);
        wb.select(&[1]).expect("select");
        let err = wb.select(&[0, 5]).unwrap_err();
        assert_eq!(err, WorkbenchError::IndexOutOfRange { index: 5, len: 2 });
        assert_eq!(wb.selected()[0].id, "2");
    }

    #[test]
    fn duplicate_action_is_rejected_with_existing_id() {
        let mut wb = Workbench::new();
        let id = wb.add_action_base(label("ops")).expect("add");
        assert_eq!(
            wb.add_action_base(label("ops")),
            Err(WorkbenchError::DuplicateAction(id))
        );
        assert_eq!(wb.actions().count(), 1);
    }

    #[test]
    fn assign_requires_current_action() {
        let mut wb = Workbench::new();
        wb.add_records([rec("1", "a")]);
        wb.select(&[0]).expect("select");
        assert_eq!(wb.assign_selected(), Err(WorkbenchError::NoCurrentAction));
        assert!(wb.queue().is_empty());
    }

    #[test]
    fn removing_current_action_clears_cursor_and_queue() {
        let mut wb = Workbench::new();
        wb.add_records([rec("1", "a"), rec("2", "b")]);
        let id = wb.add_action_base(label("ops")).expect("add");
        wb.select(&[0, 1]).expect("select");
        assert_eq!(wb.assign_selected(), Ok(2));
        assert_eq!(wb.assign_selected(), Ok(0));

        assert_eq!(wb.remove_action_base(id), Ok(2));
        assert!(wb.current_action().is_none());
        assert!(wb.queue().is_empty());
        assert_eq!(wb.remove_action_base(id), Err(WorkbenchError::UnknownAction(id)));
    }

    #[test]
    fn replace_keeps_assignments_and_rejects_duplicates() {
        let mut wb = Workbench::new();
        wb.add_records([rec("1", "a")]);
        let ops = wb.add_action_base(label("ops")).expect("add");
        wb.assign(rec("1", "a")).expect("assign");
        let infra = wb.add_action_base(label("infra")).expect("add");

        assert_eq!(
            wb.replace_action_base(ops, label("infra")),
            Err(WorkbenchError::DuplicateAction(infra))
        );
        wb.replace_action_base(ops, label("dev")).expect("replace");
        let queue = wb.queue();
        assert_eq!(queue.len(), 1);
        assert_eq!(*queue[0].action, label("dev"));
    }

    #[test]
    fn clear_queue_rejects_mismatched_results() {
        let mut wb = Workbench::new();
        wb.add_action_base(ActionBase::Navigate).expect("add");
        wb.assign(rec("1", "a")).expect("assign");
        let results: Vec<Result<(), ()>> = vec![Ok(()), Ok(())];
        assert_eq!(
            wb.clear_queue(&results),
            Err(WorkbenchError::QueueChanged { expected: 1, actual: 2 })
        );
        assert_eq!(wb.queue().len(), 1);
    }

    #[test]
    fn remove_selected_drops_records_and_selection() {
        let mut wb = Workbench::new();
        wb.add_records([rec("1", "a"), rec("2", "b"), rec("3", "c")]);
        wb.select(&[0, 2]).expect("select");
        assert_eq!(wb.remove_selected(), 2);
        assert!(!wb.has_selection());
        assert_eq!(wb.working().len(), 1);
        assert_eq!(wb.working()[0].id, "2");
    }

    #[test]
    fn reset_does_not_reuse_ids() {
        let mut wb = Workbench::new();
        let first = wb.add_action_base(ActionBase::Navigate).expect("add");
        wb.reset();
        let second = wb.add_action_base(ActionBase::Navigate).expect("add");
        assert!(second > first);
        assert_eq!(wb.actions().count(), 1);
    }

    #[test]
    fn status_block_lists_queue() {
        let mut wb = Workbench::new();
        wb.add_records([rec("1", "a")]);
        wb.add_action_base(label("ops")).expect("add");
        wb.select(&[0]).expect("select");
        wb.assign_selected().expect("assign");
        let status = wb.to_string();
        assert!(status.contains("Current action: #1 Add label 'ops' to issue"));
        assert!(status.contains("Queued: 1"));
        assert!(status.contains("  Add label 'ops' to FOO-1"));
    }
}
