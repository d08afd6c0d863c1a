pub mod app;
pub mod cli;
pub mod commands;
pub mod config;
pub mod datetime;
pub mod edit;
pub mod filter;
pub mod render;
pub mod stats;
pub mod storage;
pub mod store;
pub mod task;

use std::ffi::OsString;
use std::io::{
  self,
  Write
};

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use tracing::{
  debug,
  info
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let stdout = io::stdout();
  run_with_output(
    raw_args,
    stdout.lock()
  )
}

#[tracing::instrument(skip_all)]
pub fn run_with_output<W: Write>(
  raw_args: Vec<OsString>,
  out: W
) -> anyhow::Result<()> {
  let (args, positional) =
    cli::split_settings(raw_args);
  let cli =
    cli::GlobalCli::parse_from(args);

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting todo CLI"
  );

  let mut cfg = config::Config::load(
    cli.todorc.as_deref()
  )?;
  cfg.apply_overrides(
    positional
      .into_iter()
      .chain(cli.settings)
  );
  debug!(
    todorc = ?cfg.source(),
    "settings resolved"
  );

  let data_dir = cfg
    .data_dir(cli.data.as_deref())
    .context(
      "failed to resolve data \
       directory"
    )?;

  let storage =
    storage::FileStorage::open(
      &data_dir
    )
    .with_context(|| {
      format!(
        "failed to open storage at {}",
        data_dir.display()
      )
    })?;

  let key = cfg
    .get("storage.key")
    .unwrap_or_else(|| {
      "tasks".to_string()
    });
  let store =
    store::TaskStore::open(storage, &key)?;

  let tz = datetime::resolve_timezone(
    cfg.get("timezone").as_deref()
  )?;
  let filter = cfg
    .get("default.filter")
    .map(|raw| raw.parse::<filter::FilterMode>())
    .transpose()
    .context("invalid default.filter")?
    .unwrap_or_default();

  let renderer =
    render::Renderer::new(&cfg)?;
  let inv = cli::Invocation::parse(
    &cfg, cli.rest
  )?;

  let mut app = app::App::new(
    store, filter, tz, renderer, out
  );
  commands::dispatch(
    &mut app,
    &cfg,
    inv,
    Utc::now()
  )?;
  app.out().flush()?;

  info!("done");
  Ok(())
}
