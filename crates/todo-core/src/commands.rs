use std::io::Write;

use anyhow::{Context, anyhow};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::{debug, info, instrument};

use crate::app::App;
use crate::cli::Invocation;
use crate::config::Config;
use crate::datetime::{default_due, hours_from_now, parse_due_expr};
use crate::edit::{EditAction, EditKey, EditSession};
use crate::filter::FilterMode;
use crate::storage::Storage;
use crate::task::TaskId;

const MAX_QUICK_HOURS: i64 = 24 * 366 * 10;

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "add", "list", "edit", "done", "toggle", "delete", "stats", "show", "help", "version",
    ]
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

#[instrument(skip(app, cfg, inv, now))]
pub fn dispatch<S: Storage, W: Write>(
    app: &mut App<S, W>,
    cfg: &Config,
    inv: Invocation,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    let command = inv.command.as_str();
    debug!(command, args = ?inv.command_args, "dispatching command");

    match command {
        "add" => cmd_add(app, &inv.command_args, now),
        "list" => cmd_list(app, &inv.command_args, now),
        "edit" => cmd_edit(app, &inv.command_args, now),
        "done" | "toggle" => cmd_toggle(app, &inv.command_args, now),
        "delete" => cmd_delete(app, &inv.command_args, now),
        "stats" => app.write_stats(now),
        "show" => cmd_show(app, cfg),
        "help" => cmd_help(app),
        "version" => {
            writeln!(app.out(), "{}", env!("CARGO_PKG_VERSION"))?;
            Ok(())
        }
        other => Err(anyhow!("unknown command: {other}")),
    }
}

/// A due-date change requested on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DueMod {
    Set(DateTime<Utc>),
    Clear,
}

#[instrument(skip(app, args, now))]
fn cmd_add<S: Storage, W: Write>(
    app: &mut App<S, W>,
    args: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command add");

    let (text, due) = parse_text_and_due(args, now, app.tz())?;
    let due_date = match due {
        Some(DueMod::Set(due)) => Some(due),
        Some(DueMod::Clear) | None => None,
    };

    match app.add(&text, due_date, now)? {
        Some(id) => debug!(id, "created task"),
        None => debug!("nothing added"),
    }
    Ok(())
}

#[instrument(skip(app, args, now))]
fn cmd_list<S: Storage, W: Write>(
    app: &mut App<S, W>,
    args: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    match args {
        [] => {}
        [mode] => app.set_filter(mode.parse::<FilterMode>()?),
        _ => return Err(anyhow!("list takes at most one filter")),
    }
    app.refresh(now)
}

#[instrument(skip(app, args, now))]
fn cmd_edit<S: Storage, W: Write>(
    app: &mut App<S, W>,
    args: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command edit");

    let (id_token, rest) = args
        .split_first()
        .ok_or_else(|| anyhow!("edit needs a task id"))?;
    let id = parse_id(id_token)?;
    let (text, due) = parse_text_and_due(rest, now, app.tz())?;

    let Some(mut session) = app.begin_edit(id) else {
        tracing::warn!(id, "no task with that id");
        return Ok(());
    };

    if rest.iter().all(|arg| is_due_modifier(arg)) {
        debug!(id, "no new text given, keeping current");
    } else {
        session.text = text;
    }

    let tz = *app.tz();
    match due {
        Some(DueMod::Set(due)) => session.set_due(Some(due), &tz),
        Some(DueMod::Clear) => session.set_due(None, &tz),
        None => {}
    }

    commit_or_cancel(app, session, EditKey::Enter, now)
}

fn commit_or_cancel<S: Storage, W: Write>(
    app: &mut App<S, W>,
    session: EditSession,
    key: EditKey,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    match EditSession::handle_key(key) {
        Some(EditAction::Commit) => {
            let outcome = app.commit_edit(session, now)?;
            debug!(?outcome, "edit finished");
            Ok(())
        }
        Some(EditAction::Cancel) => app.cancel_edit(session, now),
        None => Ok(()),
    }
}

#[instrument(skip(app, args, now))]
fn cmd_toggle<S: Storage, W: Write>(
    app: &mut App<S, W>,
    args: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command toggle");
    for id in parse_ids(args)? {
        app.toggle_complete(id, now)?;
    }
    Ok(())
}

#[instrument(skip(app, args, now))]
fn cmd_delete<S: Storage, W: Write>(
    app: &mut App<S, W>,
    args: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command delete");
    for id in parse_ids(args)? {
        app.remove(id, now)?;
    }
    Ok(())
}

fn cmd_show<S: Storage, W: Write>(app: &mut App<S, W>, cfg: &Config) -> anyhow::Result<()> {
    let out = app.out();
    for (key, value) in cfg.iter() {
        writeln!(out, "{key} = {value}")?;
    }
    Ok(())
}

fn cmd_help<S: Storage, W: Write>(app: &mut App<S, W>) -> anyhow::Result<()> {
    let out = app.out();
    writeln!(out, "usage: todo [options] <command> [args]")?;
    writeln!(out)?;
    writeln!(out, "  add <text> [due:<when>|due:default] [in:<hours>]")?;
    writeln!(out, "  list [all|today|upcoming|overdue]")?;
    writeln!(out, "  edit <id> [<text>] [due:<when>|due:]")?;
    writeln!(out, "  done <id>...      toggle completion (alias: toggle)")?;
    writeln!(out, "  delete <id>...")?;
    writeln!(out, "  stats | show | help | version")?;
    writeln!(out)?;
    writeln!(
        out,
        "<when>: now, today, tomorrow, YYYY-MM-DD, YYYY-MM-DDTHH:MM, HH:MM, +Nm, +Nh, +Nd"
    )?;
    Ok(())
}

fn is_due_modifier(token: &str) -> bool {
    token.starts_with("due:") || token.starts_with("in:")
}

/// Splits args into free text and at most one due-date modifier. The last
/// modifier wins.
fn parse_text_and_due(
    args: &[String],
    now: DateTime<Utc>,
    tz: &Tz,
) -> anyhow::Result<(String, Option<DueMod>)> {
    let mut words = Vec::with_capacity(args.len());
    let mut due = None;

    for arg in args {
        if let Some(expr) = arg.strip_prefix("due:") {
            let expr = expr.trim();
            due = Some(if expr.is_empty() {
                DueMod::Clear
            } else if expr.eq_ignore_ascii_case("default") {
                DueMod::Set(default_due(now))
            } else {
                DueMod::Set(parse_due_expr(expr, now, tz)?)
            });
        } else if let Some(hours) = arg.strip_prefix("in:") {
            let hours: i64 = hours
                .trim()
                .trim_end_matches('h')
                .parse()
                .with_context(|| format!("invalid hour count: {arg}"))?;
            if !(0..=MAX_QUICK_HOURS).contains(&hours) {
                return Err(anyhow!("hour count out of range: {arg}"));
            }
            due = Some(DueMod::Set(hours_from_now(now, hours)));
        } else {
            words.push(arg.as_str());
        }
    }

    Ok((words.join(" "), due))
}

fn parse_id(token: &str) -> anyhow::Result<TaskId> {
    token
        .trim()
        .parse::<TaskId>()
        .with_context(|| format!("invalid task id: {token}"))
}

fn parse_ids(args: &[String]) -> anyhow::Result<Vec<TaskId>> {
    if args.is_empty() {
        return Err(anyhow!("expected at least one task id"));
    }
    args.iter().map(|arg| parse_id(arg)).collect()
}
