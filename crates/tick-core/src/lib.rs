pub mod address;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod filter;
pub mod remote;
pub mod render;
pub mod shell;
pub mod stats;
pub mod store;
pub mod task;

use std::ffi::OsString;
use std::rc::Rc;

use anyhow::Context;
use clap::Parser;
use tokio::io::BufReader;
use tokio::task::LocalSet;
use tracing::{debug, info};

#[tracing::instrument(skip_all)]
pub fn run(raw_args: Vec<OsString>) -> anyhow::Result<()> {
    let cli = cli::GlobalCli::parse_from(raw_args);

    cli::init_tracing(cli.verbose, cli.quiet)?;

    info!(
        verbose = cli.verbose,
        quiet = cli.quiet,
        "starting tick CLI"
    );

    let mut cfg = config::Config::load(cli.tickrc.as_deref())?;
    cfg.apply_overrides(
        cli.rc_overrides
            .into_iter()
            .map(|kv| (kv.key, kv.value))
            .chain(
                cli.api_url
                    .map(|url| ("api.url".to_string(), url)),
            ),
    );
    debug!(files = ?cfg.loaded_files, "configuration resolved");

    let ctx = commands::ViewContext::from_config(&cfg)?;
    let api_url = cfg.api_url();
    let remote = remote::HttpRemote::new(&api_url)
        .with_context(|| format!("failed to set up task service client for {api_url}"))?;
    let store = Rc::new(store::TaskStore::new(remote));

    let command = cli.command.unwrap_or(cli::Command::List { filter: None });

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    let local = LocalSet::new();

    local.block_on(&runtime, async {
        let mut input = BufReader::new(tokio::io::stdin());
        let mut out = std::io::stdout();
        commands::dispatch(store, &ctx, command, &mut input, &mut out).await
    })?;

    info!("done");
    Ok(())
}
