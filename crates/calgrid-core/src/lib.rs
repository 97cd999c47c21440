pub mod cli;
pub mod commands;
pub mod config;
pub mod detail;
pub mod event;
pub mod geometry;
pub mod layout;
pub mod normalize;
pub mod partition;
pub mod render;
pub mod source;
pub mod timezone;
pub mod view;

use std::ffi::OsString;

use clap::Parser;
use tracing::{
  debug,
  info
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let cli =
    cli::GlobalCli::parse_from(raw_args);

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting calgrid CLI"
  );
  debug!(?cli.overrides, "command line overrides");

  let mut cfg = config::Config::load(
    cli.config.as_deref()
  )?;
  cfg.apply_overrides(
    cli
      .overrides
      .into_iter()
      .map(|kv| (kv.key, kv.value))
  )?;

  let timezone =
    timezone::resolve_timezone(&cfg);
  let ctx =
    layout::LayoutContext::from_config(
      &cfg, timezone
    );
  let renderer = render::Renderer::new(
    &cfg,
    ctx.week_start
  );

  commands::dispatch(
    &cfg,
    &ctx,
    &renderer,
    cli.command
  )?;

  info!("done");
  Ok(())
}
