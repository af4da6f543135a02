//! One function per main-menu entry.
//!
//! Each takes the whole [`App`] and returns `Err(Cancelled)` when the user
//! backs out of a selector; the menu loop swallows that.

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::io::Write;
use tracing::info;
use ticketbench_core::action::{ActionBase, ActionKind};
use ticketbench_core::format::RowField;
use ticketbench_core::workbench::{ActionId, WorkbenchError};
use ticketbench_core::ErrorCode;

use crate::app::App;
use crate::output::section;
use crate::picker::Picker;
use crate::prompts::InteractivePrompts;

fn picker(app: &App) -> Picker<'_> {
    Picker {
        selector: &app.selector,
        rpc: &app.rpc,
        format: app.format,
    }
}

/// Ask the action wizard for a new base of `kind`.
fn build_action(app: &mut App, kind: ActionKind) -> Result<ActionBase> {
    let mut prompts = InteractivePrompts {
        picker: Picker {
            selector: &app.selector,
            rpc: &app.rpc,
            format: app.format,
        },
        config: &app.config,
        backend: app.backend.as_ref(),
        working: app.workbench.working(),
        fetcher: &mut app.fetcher,
    };
    ActionBase::build(kind, &mut prompts).with_context(|| format!("building '{kind}'"))
}

fn pick_kind(app: &App) -> Result<ActionKind> {
    let names: Vec<&str> = ActionKind::ALL.iter().map(|kind| kind.description()).collect();
    let index = picker(app).pick_one(&names, "Action> ")?;
    Ok(ActionKind::ALL[index])
}

fn pick_action(app: &App, prompt: &str) -> Result<ActionId> {
    let actions: Vec<(ActionId, String)> = app
        .workbench
        .actions()
        .map(|(id, base)| (id, format!("{id} {base}")))
        .collect();
    if actions.is_empty() {
        anyhow::bail!("no actions yet; add one first");
    }
    let rows: Vec<&str> = actions.iter().map(|(_, row)| row.as_str()).collect();
    let index = picker(app).pick_one(&rows, prompt)?;
    Ok(actions[index].0)
}

/// Let the user pick from the working set and make that the selection.
fn pick_selection(app: &mut App, prompt: &str) -> Result<()> {
    if app.workbench.working().is_empty() {
        anyhow::bail!("no issues on the workbench; search first");
    }
    let picked = picker(app).pick_records(app.workbench.working(), prompt, false)?;
    app.workbench.select(&picked)?;
    Ok(())
}

pub fn reset(app: &mut App) {
    app.workbench.reset();
    info!("workbench reset");
}

/// Print the working set (selected rows starred) and the action bases.
///
/// # Errors
///
/// Fails when `out` cannot be written.
pub fn print(app: &App, out: &mut dyn Write) -> Result<()> {
    let selected: HashSet<String> = app
        .workbench
        .selected()
        .iter()
        .map(|record| record.id.clone())
        .collect();
    section(out, "Issues")?;
    for record in app.workbench.working() {
        let mark = if selected.contains(&record.id) { '*' } else { ' ' };
        writeln!(out, "{mark} {record}")?;
    }
    let current = app.workbench.current_action().map(|(id, _)| id);
    section(out, "Actions")?;
    for (id, base) in app.workbench.actions() {
        let mark = if current == Some(id) { '>' } else { ' ' };
        writeln!(out, "{mark} {id} {base}")?;
    }
    Ok(())
}

/// Run a named query and add the picked results to the working set.
///
/// # Errors
///
/// Cancellation or a selector failure.
pub fn search(app: &mut App) -> Result<()> {
    let query = picker(app).pick_query(&app.config)?;
    let picker = Picker {
        selector: &app.selector,
        rpc: &app.rpc,
        format: app.format,
    };
    let records = picker.search(&mut app.fetcher, &query, "Issues> ", false)?;
    info!(added = records.len(), %query, "issues picked");
    app.workbench.add_records(records);
    Ok(())
}

pub fn select_issues(app: &mut App) -> Result<()> {
    pick_selection(app, "Select> ")
}

/// Remove the selection, or a freshly picked set when nothing is selected.
pub fn remove_issues(app: &mut App) -> Result<()> {
    if !app.workbench.has_selection() {
        pick_selection(app, "Remove> ")?;
    }
    let removed = app.workbench.remove_selected();
    println!("Removed {removed} issue(s)");
    Ok(())
}

/// Queue the selection under the current action.
///
/// Missing pieces are asked for and only live for this call: an action
/// picked here is not left current and a selection made here is cleared.
pub fn queue_issues(app: &mut App) -> Result<()> {
    let temporary_action = app.workbench.current_action().is_none();
    let temporary_selection = !app.workbench.has_selection();
    let result = queue_with_temporaries(app, temporary_action, temporary_selection);
    if temporary_selection {
        app.workbench.clear_selection();
    }
    if temporary_action {
        app.workbench.clear_current_action();
    }
    let added = result?;
    println!("Queued {added} issue(s)");
    Ok(())
}

fn queue_with_temporaries(
    app: &mut App,
    need_action: bool,
    need_selection: bool,
) -> Result<usize> {
    if need_action {
        if app.workbench.actions().next().is_none() {
            add_action(app)?;
        } else {
            let id = pick_action(app, "Queue for> ")?;
            app.workbench.set_current_action(id)?;
        }
    }
    if need_selection {
        pick_selection(app, "Queue> ")?;
    }
    Ok(app.workbench.assign_selected()?)
}

pub fn choose_action(app: &mut App) -> Result<()> {
    let id = pick_action(app, "Current action> ")?;
    app.workbench.set_current_action(id)?;
    Ok(())
}

/// Build a new action base and make it current.
///
/// Adding one that already exists makes the existing one current instead.
pub fn add_action(app: &mut App) -> Result<()> {
    let kind = pick_kind(app)?;
    let base = build_action(app, kind)?;
    match app.workbench.add_action_base(base) {
        Ok(id) => println!("Added action {id}"),
        Err(WorkbenchError::DuplicateAction(id)) => {
            app.workbench.set_current_action(id)?;
            println!("{}: using {id}", ErrorCode::DuplicateAction.message());
        }
        Err(err) => return Err(err.into()),
    }
    Ok(())
}

pub fn remove_action(app: &mut App) -> Result<()> {
    let id = pick_action(app, "Remove action> ")?;
    let dropped = app.workbench.remove_action_base(id)?;
    println!("Removed action {id} and {dropped} queued issue(s)");
    Ok(())
}

/// Re-ask the parameters of an action; its queued issues stay queued.
pub fn edit_action(app: &mut App) -> Result<()> {
    let id = pick_action(app, "Edit action> ")?;
    let kind = app
        .workbench
        .action(id)
        .map(|base| base.kind())
        .ok_or(WorkbenchError::UnknownAction(id))?;
    let base = build_action(app, kind)?;
    app.workbench.replace_action_base(id, base)?;
    println!("Updated action {id}");
    Ok(())
}

pub fn change_format(app: &mut App) -> Result<()> {
    let rows: Vec<String> = RowField::ALL
        .iter()
        .map(|&field| {
            let mark = if app.format.is_enabled(field) { 'x' } else { ' ' };
            format!("[{mark}] {}", field.label())
        })
        .collect();
    let index = picker(app).pick_one(&rows, "Toggle> ")?;
    app.format.toggle(RowField::ALL[index]);
    Ok(())
}

/// Run the queue. Failures are listed one per line; outside a dry run the
/// successful entries leave the queue.
///
/// # Errors
///
/// Fails when `out` cannot be written or the queue changed underneath.
pub fn execute(app: &mut App, dry_run: bool, out: &mut dyn Write) -> Result<()> {
    let queue = app.workbench.queue();
    if queue.is_empty() {
        writeln!(out, "Nothing queued")?;
        return Ok(());
    }
    let results = app.executor.execute(&queue, dry_run);
    let mut failed = 0;
    for (item, result) in queue.iter().zip(&results) {
        if let Err(err) = result {
            failed += 1;
            writeln!(out, "{}: {}: {err}", item.record.key, item.describe())?;
        }
    }
    if dry_run {
        writeln!(out, "Dry run: {} action(s) would run", queue.len())?;
        return Ok(());
    }
    let cleared = app.workbench.clear_queue(&results)?;
    writeln!(out, "Done: {cleared} succeeded, {failed} failed")?;
    Ok(())
}
