#![forbid(unsafe_code)]

mod app;
mod cmd;
mod demo;
mod menu;
mod output;
mod picker;
mod prompts;
mod remote;
mod workflow;

use clap::{CommandFactory, Parser, Subcommand};
use std::env;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "tb: interactive batch actions for issue trackers",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Config file to use instead of the per-user default.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Run against built-in sample issues instead of a server.
    #[arg(long, global = true)]
    demo: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        about = "Open the interactive workbench (default)",
        after_help = "EXAMPLES:\n    # Try it without a server\n    tb --demo run"
    )]
    Run,

    #[command(
        about = "Fetch one issue and print it",
        after_help = "EXAMPLES:\n    tb get FOO-100\n    tb get FOO-100 --json"
    )]
    Get(cmd::get::GetArgs),

    /// Selector callbacks; invoked by the selector, not by people.
    #[command(name = "_rpc", hide = true)]
    Rpc {
        #[command(subcommand)]
        command: cmd::rpc::RpcCommand,
    },

    #[command(about = "Generate shell completion scripts")]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("TICKETBENCH_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "ticketbench=debug,tb=debug,info"
        } else {
            "ticketbench=info,tb=info,warn"
        })
    });

    let format = env::var("TICKETBENCH_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    // stdout belongs to the selector preview and `get`.
    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if cli.verbose {
        info!("Verbose mode enabled");
    }

    let options = app::AppOptions {
        config_path: cli.config.clone(),
        demo: cli.demo,
    };

    let result = match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => cmd::run::run_workbench(&options),
        Commands::Get(args) => cmd::get::run_get(&args, &options),
        Commands::Rpc { command } => cmd::rpc::run_rpc(&command),
        Commands::Completions(args) => {
            let mut command = Cli::command();
            cmd::completions::run_completions(args.shell, &mut command)
        }
    };

    if let Err(err) = &result {
        output::render_error(err);
        std::process::exit(1);
    }
    Ok(())
}
