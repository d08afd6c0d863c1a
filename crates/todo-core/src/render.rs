use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::datetime::{format_clock, to_local_date};
use crate::filter::{FilterMode, filter_tasks, is_overdue};
use crate::stats::Stats;
use crate::task::{Task, TaskId};

/// What the user can do with a displayed task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Affordance {
    ToggleComplete,
    Edit,
    Delete,
}

impl Affordance {
    pub const ALL: [Affordance; 3] = [
        Affordance::ToggleComplete,
        Affordance::Edit,
        Affordance::Delete,
    ];

    pub fn verb(self) -> &'static str {
        match self {
            Affordance::ToggleComplete => "done",
            Affordance::Edit => "edit",
            Affordance::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRow {
    pub id: TaskId,
    pub text: String,
    pub completed: bool,
    pub due_label: Option<String>,
    pub overdue: bool,
}

impl TaskRow {
    pub fn affordances(&self) -> [(Affordance, TaskId); 3] {
        Affordance::ALL.map(|action| (action, self.id))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListView {
    Empty { message: String },
    Items(Vec<TaskRow>),
}

/// Rebuilds the whole view for `mode` from the collection.
#[tracing::instrument(skip(tasks, now, tz))]
pub fn project(tasks: &[Task], mode: FilterMode, now: DateTime<Utc>, tz: &Tz) -> ListView {
    let visible = filter_tasks(tasks, mode, now, tz);
    if visible.is_empty() {
        return ListView::Empty {
            message: empty_message(mode),
        };
    }

    let rows = visible
        .into_iter()
        .map(|task| TaskRow {
            id: task.id,
            text: task.text.clone(),
            completed: task.completed,
            due_label: task.due_date.map(|due| format_due(due, now, tz)),
            overdue: is_overdue(task, now),
        })
        .collect();

    ListView::Items(rows)
}

pub fn empty_message(mode: FilterMode) -> String {
    match mode {
        FilterMode::All => "No tasks yet. Add a task to get started!".to_string(),
        other => format!("No {other} tasks."),
    }
}

/// Relative label based on calendar days in `tz`.
pub fn format_due(due: DateTime<Utc>, now: DateTime<Utc>, tz: &Tz) -> String {
    let clock = format_clock(due, tz);
    let due_date = to_local_date(due, tz);
    let days = (due_date - to_local_date(now, tz)).num_days();

    match days {
        0 => format!("Today at {clock}"),
        1 => format!("Tomorrow at {clock}"),
        -1 => format!("Yesterday at {clock}"),
        d if d < 0 => format!("{} days ago at {clock}", d.abs()),
        _ => format!("{} at {clock}", due_date.format("%Y-%m-%d")),
    }
}

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self {
            color: color && io::stdout().is_terminal(),
        })
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    #[tracing::instrument(skip(self, out, view))]
    pub fn write_list<W: Write>(&self, mut out: W, view: &ListView) -> anyhow::Result<()> {
        let rows = match view {
            ListView::Empty { message } => {
                writeln!(out, "{message}")?;
                return Ok(());
            }
            ListView::Items(rows) => rows,
        };

        let headers = vec![
            "ID".to_string(),
            "Done".to_string(),
            "Task".to_string(),
            "Due".to_string(),
        ];

        let mut table = Vec::with_capacity(rows.len());
        for row in rows {
            let id = self.paint(&row.id.to_string(), "33");
            let done = if row.completed { "[x]" } else { "[ ]" };
            let text = if row.completed {
                self.paint(&row.text, "2;9")
            } else {
                row.text.clone()
            };
            let due = row.due_label.clone().unwrap_or_default();
            let due = if row.overdue {
                self.paint(&due, "31")
            } else {
                due
            };

            table.push(vec![id, done.to_string(), text, due]);
        }

        write_table(&mut out, headers, table)?;

        let hint = Affordance::ALL
            .iter()
            .map(|action| format!("{} <id>", action.verb()))
            .collect::<Vec<_>>()
            .join(" | ");
        writeln!(out, "{}", self.paint(&hint, "2"))?;
        Ok(())
    }

    pub fn write_stats<W: Write>(&self, mut out: W, stats: &Stats) -> anyhow::Result<()> {
        writeln!(out, "{stats}")?;
        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    let mut header_line = String::new();
    for (header, &width) in headers.iter().zip(&widths) {
        header_line.push_str(&format!("{header:width$} "));
    }
    writeln!(writer, "{}", header_line.trim_end())?;

    let mut rule = String::new();
    for &width in &widths {
        rule.push_str(&format!("{:-<width$} ", ""));
    }
    writeln!(writer, "{}", rule.trim_end())?;

    for row in rows {
        let mut line = String::new();
        for (cell, &width) in row.iter().zip(&widths) {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = width.saturating_sub(visible_width);
            line.push_str(cell);
            line.push_str(&" ".repeat(padding));
            line.push(' ');
        }
        writeln!(writer, "{}", line.trim_end())?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
