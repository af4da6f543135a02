//! `tb _rpc`: the selector's way back into the running workbench.

use anyhow::{Context, Result};
use clap::Subcommand;
use std::io::Write;
use ticketbench_core::rpc::RpcClient;

#[derive(Subcommand, Debug)]
pub enum RpcCommand {
    /// Ask the active search for another page.
    Load,
    /// Print the record behind a selector row.
    Print {
        /// The row as the selector shows it (`<index> <id> ...`).
        #[arg(required = true, num_args = 1.., trailing_var_arg = true, allow_hyphen_values = true)]
        row: Vec<String>,
    },
}

/// # Errors
///
/// Fails when no session is listening or it rejects the request.
pub fn run_rpc(command: &RpcCommand) -> Result<()> {
    let client = RpcClient::from_env()?;
    match command {
        RpcCommand::Load => client
            .load_more()
            .with_context(|| format!("load_more via {}", client.addr())),
        RpcCommand::Print { row } => {
            let row = row.join(" ");
            let detail = client
                .print_record(&row)
                .with_context(|| format!("print_record via {}", client.addr()))?;
            let mut out = std::io::stdout().lock();
            out.write_all(detail.as_bytes())?;
            out.flush()?;
            Ok(())
        }
    }
}
