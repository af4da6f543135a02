use anyhow::{Result, bail};
use clap::Args;
use ticketbench_core::ErrorCode;

use crate::app::{AppOptions, load_config, record_source};
use crate::output::{OutputMode, render};

/// Arguments for `tb get`.
#[derive(Args, Debug)]
pub struct GetArgs {
    /// Issue key, e.g. `FOO-100`.
    pub key: String,

    /// Emit JSON instead of `KEY: summary`.
    #[arg(long)]
    pub json: bool,
}

/// Fetch one record and print it.
///
/// # Errors
///
/// Fails when the source cannot be reached or the key does not exist.
pub fn run_get(args: &GetArgs, options: &AppOptions) -> Result<()> {
    let config = load_config(options)?;
    let source = record_source(&config, options.demo)?;
    let Some(record) = source.get_record(args.key.trim())? else {
        let code = ErrorCode::RecordNotFound;
        bail!("{code}: {} ({})", code.message(), args.key);
    };
    let mode = if args.json {
        OutputMode::Json
    } else {
        OutputMode::Pretty
    };
    render(mode, &record, |record, w| writeln!(w, "{record}"))
}
