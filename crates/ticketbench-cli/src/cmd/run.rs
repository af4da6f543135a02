use anyhow::{Result, bail};
use tracing::info;
use ticketbench_core::ErrorCode;

use crate::app::{App, AppOptions, load_config};
use crate::menu;

/// Open the interactive workbench.
///
/// # Errors
///
/// Fails when the config is unusable, the selector is not installed, or the
/// terminal goes away.
pub fn run_workbench(options: &AppOptions) -> Result<()> {
    let config = load_config(options)?;
    let command = config.selector.command.clone();
    if let Err(err) = which::which(&command) {
        let code = ErrorCode::SelectorSpawnFailed;
        let hint = code.hint().unwrap_or_default();
        bail!("{code}: {}: `{command}`: {err}\n  hint: {hint}", code.message());
    }

    let mut app = App::build(config, options.demo)?;
    info!(selector = %command, demo = options.demo, "workbench ready");
    let result = menu::run(&mut app);
    info!(completed = app.workbench.completed(), "workbench closed");
    result
}
