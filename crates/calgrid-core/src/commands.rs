use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;

use anyhow::{Context, anyhow};
use chrono_tz::Tz;
use tracing::{debug, info, instrument};

use crate::cli::{Command, ViewArgs};
use crate::config::Config;
use crate::event::RawEvent;
use crate::layout::{Layout, LayoutContext, compute_layout};
use crate::render::Renderer;
use crate::source::{FetchQuery, HttpEventSource, parse_events_document};
use crate::timezone::{parse_anchor_date, today_in};
use crate::view::ViewState;

#[instrument(skip(cfg, ctx, renderer, command))]
pub fn dispatch(
    cfg: &Config,
    ctx: &LayoutContext,
    renderer: &Renderer,
    command: Command,
) -> anyhow::Result<()> {
    debug!(?command, "dispatching command");

    match command {
        Command::Layout { events, view, json } => cmd_layout(cfg, ctx, renderer, &events, &view, json),
        Command::Fetch {
            endpoint,
            cid,
            view,
            json,
        } => cmd_fetch(
            cfg,
            ctx,
            renderer,
            endpoint.as_deref(),
            cid.as_deref(),
            &view,
            json,
        ),
        Command::Range { view } => cmd_range(cfg, ctx, renderer, &view),
    }
}

pub fn view_state(cfg: &Config, timezone: Tz, args: &ViewArgs) -> anyhow::Result<ViewState> {
    let today = today_in(timezone);
    let anchor = match args.date.as_deref() {
        Some(raw) => parse_anchor_date(raw, today)?,
        None => today,
    };
    Ok(ViewState::new(args.mode.unwrap_or(cfg.default_mode), anchor))
}

pub fn read_events(path: &Path) -> anyhow::Result<Vec<RawEvent>> {
    if path.as_os_str() == "-" {
        return read_events_from(io::stdin().lock()).context("failed reading events from stdin");
    }

    let file = fs::File::open(path).with_context(|| format!("failed to read {}", path.display()))?;
    read_events_from(file).with_context(|| format!("failed to load events from {}", path.display()))
}

pub fn read_events_from<R: Read>(mut reader: R) -> anyhow::Result<Vec<RawEvent>> {
    let mut text = String::new();
    reader.read_to_string(&mut text)?;

    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("events input is empty"));
    }
    parse_events_document(trimmed)
}

fn cmd_layout(
    cfg: &Config,
    ctx: &LayoutContext,
    renderer: &Renderer,
    events: &Path,
    view: &ViewArgs,
    json: bool,
) -> anyhow::Result<()> {
    info!(events = %events.display(), "command layout");
    let state = view_state(cfg, ctx.timezone, view)?;
    let raws = read_events(events)?;
    let layout = compute_layout(&raws, &state, ctx);
    emit(renderer, &layout, json)
}

fn cmd_fetch(
    cfg: &Config,
    ctx: &LayoutContext,
    renderer: &Renderer,
    endpoint: Option<&str>,
    cid: Option<&str>,
    view: &ViewArgs,
    json: bool,
) -> anyhow::Result<()> {
    let endpoint = endpoint.unwrap_or(cfg.source.endpoint.as_str());
    info!(endpoint, "command fetch");

    let state = view_state(cfg, ctx.timezone, view)?;
    let query = FetchQuery::for_view(
        Some(cid.unwrap_or(cfg.calendar_id.as_str())),
        ctx.timezone,
        &state,
        ctx.week_start,
    );
    let source = HttpEventSource::new(endpoint, cfg.source.timeout())?;
    let raws = source.fetch_blocking(&query)?;
    let layout = compute_layout(&raws, &state, ctx);
    emit(renderer, &layout, json)
}

fn cmd_range(cfg: &Config, ctx: &LayoutContext, renderer: &Renderer, view: &ViewArgs) -> anyhow::Result<()> {
    info!("command range");
    let state = view_state(cfg, ctx.timezone, view)?;
    let query = FetchQuery::for_view(Some(cfg.calendar_id.as_str()), ctx.timezone, &state, ctx.week_start);
    let url = query.to_url(&cfg.source.endpoint)?;
    renderer.print_range(&state, &state.visible_range(ctx.week_start), url.as_str())
}

fn emit(renderer: &Renderer, layout: &Layout, json: bool) -> anyhow::Result<()> {
    if !json {
        return renderer.print_layout(layout);
    }

    let mut out = io::stdout().lock();
    serde_json::to_writer_pretty(&mut out, layout).context("failed writing layout JSON")?;
    writeln!(out)?;
    Ok(())
}
