use std::ffi::{OsStr, OsString};
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Parser};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::commands::{expand_command_abbrev, known_command_names};
use crate::config::Config;
use crate::filter::FilterMode;

/// Parses `key=value` for `--rc`.
fn parse_setting(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got: {raw}"))
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "todo",
    version,
    about = "A to-do list with due dates, filters and stats",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    /// More log output on stderr (repeatable).
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    /// Less log output on stderr (repeatable).
    #[arg(short = 'q', long = "quiet", action = ArgAction::Count)]
    pub quiet: u8,

    /// Override a setting for this run.
    #[arg(long = "rc", value_name = "KEY=VALUE", value_parser = parse_setting)]
    pub settings: Vec<(String, String)>,

    #[arg(long = "todorc")]
    pub todorc: Option<PathBuf>,

    #[arg(long = "data")]
    pub data: Option<PathBuf>,

    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub rest: Vec<OsString>,
}

fn default_log_level(verbose: u8, quiet: u8) -> &'static str {
    match (quiet, verbose) {
        (2.., _) => "error",
        (1, _) | (0, 0) => "warn",
        (0, 1) => "info",
        (0, 2) => "debug",
        _ => "trace",
    }
}

/// Logs go to stderr so list output stays clean. `RUST_LOG` wins over -v/-q.
pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_log_level(verbose, quiet)))
        .map_err(|e| anyhow!("invalid log filter: {e}"))?;

    let installed = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = installed {
        debug!(error = %err, "tracing subscriber already installed");
    }
    Ok(())
}

fn positional_setting(arg: &OsStr) -> Option<(String, String)> {
    let rest = arg.to_str()?.strip_prefix("rc.")?;
    let split = rest.find(['=', ':'])?;
    Some((rest[..split].to_string(), rest[split + 1..].to_string()))
}

/// Separates `rc.key=value` / `rc.key:value` words from the rest of argv.
/// The program name is never treated as a setting.
#[tracing::instrument(skip_all)]
pub fn split_settings(raw: Vec<OsString>) -> (Vec<OsString>, Vec<(String, String)>) {
    let mut args = Vec::with_capacity(raw.len());
    let mut settings = Vec::new();

    for (idx, arg) in raw.into_iter().enumerate() {
        match positional_setting(&arg).filter(|_| idx > 0) {
            Some(setting) => {
                debug!(key = %setting.0, value = %setting.1, "positional setting");
                settings.push(setting);
            }
            None => args.push(arg),
        }
    }

    (args, settings)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub command: String,
    pub command_args: Vec<String>,
}

impl Invocation {
    #[tracing::instrument(skip(cfg, rest))]
    pub fn parse(cfg: &Config, rest: Vec<OsString>) -> anyhow::Result<Self> {
        let mut tokens: Vec<String> = rest
            .into_iter()
            .map(|arg| arg.to_string_lossy().to_string())
            .collect();

        if tokens.is_empty() {
            let cmd = cfg
                .get("default.command")
                .unwrap_or_else(|| "list".to_string());
            debug!(command = %cmd, "no explicit command, using default");
            return Ok(Self {
                command: cmd,
                command_args: vec![],
            });
        }

        let head = tokens.remove(0);
        if let Some(full) = expand_command_abbrev(&head, &known_command_names()) {
            debug!(token = %head, expanded = %full, "resolved command token");
            return Ok(Self {
                command: full.to_string(),
                command_args: tokens,
            });
        }

        if head.parse::<FilterMode>().is_ok() {
            debug!(token = %head, "bare filter name treated as list");
            tokens.insert(0, head);
            return Ok(Self {
                command: "list".to_string(),
                command_args: tokens,
            });
        }

        Err(anyhow!("unknown command: {head} (try `todo help`)"))
    }
}
