//! Terminal output helpers shared by the commands and the workbench menus.
//!
//! stdout carries results (and preview text for the selector); errors and
//! logs go to stderr.

use serde::Serialize;
use std::io::{self, Write};
use ticketbench_core::ErrorCode;

/// Shared width for separators.
pub const RULE_WIDTH: usize = 72;

/// Write a horizontal separator.
pub fn rule(w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "{:-<width$}", "", width = RULE_WIDTH)
}

/// Write a section heading followed by a separator.
pub fn section(w: &mut dyn Write, heading: &str) -> io::Result<()> {
    writeln!(w, "{heading}")?;
    rule(w)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Pretty,
    Json,
}

/// Render `value` to stdout: JSON in JSON mode, otherwise via `human_fn`.
///
/// # Errors
///
/// Fails when stdout cannot be written.
pub fn render<T: Serialize>(
    mode: OutputMode,
    value: &T,
    human_fn: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
) -> anyhow::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match mode {
        OutputMode::Json => {
            serde_json::to_writer_pretty(&mut out, value)?;
            writeln!(out)?;
        }
        OutputMode::Pretty => human_fn(value, &mut out)?,
    }
    Ok(())
}

/// Find the first error code mentioned anywhere in the chain.
fn error_code(err: &anyhow::Error) -> Option<ErrorCode> {
    use ticketbench_core::action::ActionError;
    use ticketbench_core::rpc::RpcError;
    use ticketbench_core::selection::SelectError;
    use ticketbench_core::source::SourceError;
    use ticketbench_core::workbench::WorkbenchError;

    err.chain().find_map(|cause| {
        cause
            .downcast_ref::<WorkbenchError>()
            .map(WorkbenchError::code)
            .or_else(|| cause.downcast_ref::<SelectError>().map(SelectError::code))
            .or_else(|| cause.downcast_ref::<RpcError>().map(RpcError::code))
            .or_else(|| cause.downcast_ref::<SourceError>().map(SourceError::code))
            .or_else(|| cause.downcast_ref::<ActionError>().map(ActionError::code))
    })
}

/// Format an error as `error[E####]: ...` with an optional hint line.
#[must_use]
pub fn format_error(err: &anyhow::Error) -> String {
    let mut text = match error_code(err) {
        Some(code) => format!("error[{code}]: {err:#}"),
        None => format!("error: {err:#}"),
    };
    if let Some(hint) = error_code(err).and_then(ErrorCode::hint) {
        text.push_str("\n  hint: ");
        text.push_str(hint);
    }
    text
}

/// Print an error to stderr.
pub fn render_error(err: &anyhow::Error) {
    let stderr = io::stderr();
    let mut out = stderr.lock();
    let _ = writeln!(out, "{}", format_error(err));
}
