use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::view::ViewMode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "calgrid",
    version,
    about = "Calgrid: month/week/day calendar layout engine",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[arg(long = "config", global = true)]
    pub config: Option<PathBuf>,

    #[arg(
        long = "set",
        value_name = "KEY=VALUE",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append,
        global = true
    )]
    pub overrides: Vec<KeyVal>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct ViewArgs {
    /// month, week or day (defaults to the configured mode)
    #[arg(
        long = "mode",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<ViewMode>())
    )]
    pub mode: Option<ViewMode>,

    /// Anchor date: YYYY-MM-DD, today, tomorrow or yesterday
    #[arg(long = "date")]
    pub date: Option<String>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Lay out events read from a JSON file, or stdin with `-`
    Layout {
        #[arg(long = "events", default_value = "-")]
        events: PathBuf,

        #[command(flatten)]
        view: ViewArgs,

        #[arg(long = "json")]
        json: bool,
    },
    /// Fetch events from the HTTP event source and lay them out
    Fetch {
        #[arg(long = "endpoint")]
        endpoint: Option<String>,

        #[arg(long = "cid")]
        cid: Option<String>,

        #[command(flatten)]
        view: ViewArgs,

        #[arg(long = "json")]
        json: bool,
    },
    /// Print the visible range, period label and event source query
    Range {
        #[command(flatten)]
        view: ViewArgs,
    },
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}
