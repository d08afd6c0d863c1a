use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{
  DateTime,
  Utc
};
use chrono_tz::Tz;
use tracing::trace;

use crate::datetime::to_local_date;
use crate::task::Task;

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
)]
pub enum FilterMode {
  #[default]
  All,
  Today,
  Upcoming,
  Overdue
}

impl FilterMode {
  pub const ALL: [FilterMode; 4] = [
    FilterMode::All,
    FilterMode::Today,
    FilterMode::Upcoming,
    FilterMode::Overdue
  ];

  pub fn name(self) -> &'static str {
    match self {
      | FilterMode::All => "all",
      | FilterMode::Today => "today",
      | FilterMode::Upcoming => {
        "upcoming"
      }
      | FilterMode::Overdue => {
        "overdue"
      }
    }
  }

  /// Unscheduled tasks only ever
  /// match `All`.
  pub fn matches(
    self,
    task: &Task,
    now: DateTime<Utc>,
    tz: &Tz
  ) -> bool {
    match self {
      | FilterMode::All => true,
      | FilterMode::Today => {
        task.due_date.is_some_and(
          |due| {
            to_local_date(due, tz)
              == to_local_date(now, tz)
          }
        )
      }
      | FilterMode::Upcoming => {
        task
          .due_date
          .is_some_and(|due| due >= now)
      }
      | FilterMode::Overdue => {
        is_overdue(task, now)
      }
    }
  }
}

impl fmt::Display for FilterMode {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(self.name())
  }
}

impl FromStr for FilterMode {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    let lower =
      s.trim().to_ascii_lowercase();
    FilterMode::ALL
      .into_iter()
      .find(|mode| mode.name() == lower)
      .ok_or_else(|| {
        anyhow!(
          "unknown filter: {s} \
           (expected all, today, \
           upcoming or overdue)"
        )
      })
  }
}

pub fn is_overdue(
  task: &Task,
  now: DateTime<Utc>
) -> bool {
  if task.completed {
    return false;
  }
  task.due_date.is_some_and(|due| due < now)
}

#[tracing::instrument(skip(
  tasks, now, tz
))]
pub fn filter_tasks<'a>(
  tasks: &'a [Task],
  mode: FilterMode,
  now: DateTime<Utc>,
  tz: &Tz
) -> Vec<&'a Task> {
  let view: Vec<&Task> = tasks
    .iter()
    .filter(|task| {
      mode.matches(task, now, tz)
    })
    .collect();
  trace!(
    total = tasks.len(),
    shown = view.len(),
    "filtered tasks"
  );
  view
}
