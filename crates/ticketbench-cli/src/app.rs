//! Everything the interactive loop needs, built once in `main`.

use anyhow::{Context, Result, bail};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use ticketbench_core::action::ActionBackend;
use ticketbench_core::config::Config;
use ticketbench_core::executor::Executor;
use ticketbench_core::fetch::PagedFetcher;
use ticketbench_core::format::RowFormat;
use ticketbench_core::rate_limit::RateLimiter;
use ticketbench_core::rpc::RpcHost;
use ticketbench_core::selection::Selector;
use ticketbench_core::source::RecordSource;
use ticketbench_core::workbench::Workbench;

use crate::demo::{DemoBackend, sample_source};
use crate::remote::TrackerClient;

/// Global command-line options that shape the app.
#[derive(Debug, Clone, Default)]
pub struct AppOptions {
    pub config_path: Option<PathBuf>,
    pub demo: bool,
}

pub struct App {
    pub config: Config,
    pub backend: Arc<dyn ActionBackend>,
    pub selector: Selector,
    pub rpc: RpcHost,
    pub fetcher: PagedFetcher,
    pub executor: Executor,
    pub workbench: Workbench,
    pub format: RowFormat,
}

/// Load the config named on the command line, or the per-user default.
///
/// # Errors
///
/// Fails when no config location is known or the file is unusable.
pub fn load_config(options: &AppOptions) -> Result<Config> {
    let path = match &options.config_path {
        Some(path) => path.clone(),
        None => Config::default_path()
            .context("No config directory on this platform; pass --config")?,
    };
    Config::load_or_init(&path)
}

fn tracker(config: &Config) -> Result<Arc<TrackerClient>> {
    if !config.client.is_configured() {
        bail!("[client] url is not set in the config file; set it or run with --demo");
    }
    let token = config.client.read_token()?;
    if token.is_none() {
        warn!("no [client] token_file configured; requests are anonymous");
    }
    Ok(Arc::new(TrackerClient::new(&config.client.url, token)))
}

/// The record source for this run.
///
/// # Errors
///
/// Fails when not in demo mode and the client is not configured.
pub fn record_source(config: &Config, demo: bool) -> Result<Arc<dyn RecordSource>> {
    if demo {
        return Ok(Arc::new(sample_source()));
    }
    let client: Arc<dyn RecordSource> = tracker(config)?;
    Ok(client)
}

impl App {
    /// # Errors
    ///
    /// Fails when the remote client cannot be set up.
    pub fn build(config: Config, demo: bool) -> Result<Self> {
        let source: Arc<dyn RecordSource>;
        let backend: Arc<dyn ActionBackend>;
        if demo {
            info!("demo mode: using sample issues");
            source = Arc::new(sample_source());
            backend = Arc::new(DemoBackend);
        } else {
            let client = tracker(&config)?;
            source = client.clone();
            backend = client;
        }

        let mut selector =
            Selector::new(config.selector.command.clone(), config.selector.args.clone());
        match std::env::current_exe() {
            Ok(exe) => selector = selector.with_callback_exe(exe),
            Err(err) => warn!("selector callbacks disabled: {err}"),
        }

        let limiter = RateLimiter::new(config.executor.interval(), config.executor.burst);
        Ok(Self {
            fetcher: PagedFetcher::new(source, config.fetch.page_size),
            executor: Executor::new(limiter, Arc::clone(&backend)),
            rpc: RpcHost::new(config.selector.rpc_port),
            selector,
            backend,
            config,
            workbench: Workbench::new(),
            format: RowFormat::default(),
        })
    }
}
