//! The main interaction loop.

use anyhow::Result;
use std::io::{self, Write};
use tracing::debug;
use ticketbench_core::is_cancelled;

use crate::app::App;
use crate::output::{render_error, rule};
use crate::picker::Picker;
use crate::workflow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuEntry {
    Quit,
    Reset,
    Print,
    Search,
    Queue,
    Select,
    Remove,
    ChooseAction,
    AddAction,
    RemoveAction,
    EditAction,
    ChangeFormat,
    Execute,
    Preview,
}

impl MenuEntry {
    pub const ALL: [Self; 14] = [
        Self::Quit,
        Self::Reset,
        Self::Print,
        Self::Search,
        Self::Queue,
        Self::Select,
        Self::Remove,
        Self::ChooseAction,
        Self::AddAction,
        Self::RemoveAction,
        Self::EditAction,
        Self::ChangeFormat,
        Self::Execute,
        Self::Preview,
    ];

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Quit => "Quit",
            Self::Reset => "Reset all",
            Self::Print => "Print",
            Self::Search => "Search / add issues",
            Self::Queue => "Queue issues",
            Self::Select => "Select issues",
            Self::Remove => "Remove issues",
            Self::ChooseAction => "Choose action to be assigned",
            Self::AddAction => "Add action",
            Self::RemoveAction => "Remove action",
            Self::EditAction => "Edit action",
            Self::ChangeFormat => "Change issue format",
            Self::Execute => "Execute",
            Self::Preview => "Preview",
        }
    }
}

/// Run one entry against the app.
fn dispatch(app: &mut App, entry: MenuEntry) -> Result<()> {
    let stdout = io::stdout();
    match entry {
        MenuEntry::Quit => Ok(()),
        MenuEntry::Reset => {
            workflow::reset(app);
            Ok(())
        }
        MenuEntry::Print => workflow::print(app, &mut stdout.lock()),
        MenuEntry::Search => workflow::search(app),
        MenuEntry::Queue => workflow::queue_issues(app),
        MenuEntry::Select => workflow::select_issues(app),
        MenuEntry::Remove => workflow::remove_issues(app),
        MenuEntry::ChooseAction => workflow::choose_action(app),
        MenuEntry::AddAction => workflow::add_action(app),
        MenuEntry::RemoveAction => workflow::remove_action(app),
        MenuEntry::EditAction => workflow::edit_action(app),
        MenuEntry::ChangeFormat => workflow::change_format(app),
        MenuEntry::Execute => workflow::execute(app, false, &mut stdout.lock()),
        MenuEntry::Preview => workflow::execute(app, true, &mut stdout.lock()),
    }
}

/// Show the status block and the menu until the user quits.
///
/// Backing out of the menu itself quits too. Errors from an entry are
/// printed and the loop goes on.
///
/// # Errors
///
/// Fails only when stdout cannot be written.
pub fn run(app: &mut App) -> Result<()> {
    let labels: Vec<&str> = MenuEntry::ALL.iter().map(|entry| entry.label()).collect();
    loop {
        {
            let mut out = io::stdout().lock();
            rule(&mut out)?;
            write!(out, "{}", app.workbench)?;
            out.flush()?;
        }

        let picker = Picker {
            selector: &app.selector,
            rpc: &app.rpc,
            format: app.format,
        };
        let entry = match picker.pick_one(&labels, "Menu> ") {
            Ok(index) => MenuEntry::ALL[index],
            Err(err) if is_cancelled(&err) => MenuEntry::Quit,
            Err(err) => return Err(err),
        };
        debug!(?entry, "menu");
        if entry == MenuEntry::Quit {
            return Ok(());
        }
        match dispatch(app, entry) {
            Ok(()) => {}
            Err(err) if is_cancelled(&err) => debug!(?entry, "cancelled"),
            Err(err) => render_error(&err),
        }
    }
}
