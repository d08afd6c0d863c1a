//! Inline editing of a single task.
//!
//! A session copies the task's fields into editable buffers. Date and time
//! buffers exist only when the task already had a due date. Nothing touches
//! the store until the session is committed.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::debug;

use crate::datetime::combine_date_time;
use crate::storage::Storage;
use crate::store::{TaskStore, UpdateOutcome};
use crate::task::{Task, TaskId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditKey {
    Enter,
    Escape,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditAction {
    Commit,
    Cancel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DueFields {
    pub date: String,
    pub time: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditSession {
    id: TaskId,
    pub text: String,
    pub due: Option<DueFields>,
}

impl DueFields {
    pub fn from_instant(due: DateTime<Utc>, tz: &Tz) -> Self {
        let local = due.with_timezone(tz);
        Self {
            date: local.format("%Y-%m-%d").to_string(),
            time: local.format("%H:%M").to_string(),
        }
    }
}

impl EditSession {
    pub fn begin(task: &Task, tz: &Tz) -> Self {
        Self {
            id: task.id,
            text: task.text.clone(),
            due: task.due_date.map(|due| DueFields::from_instant(due, tz)),
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Replaces the date/time buffers, adding them if the task had none.
    pub fn set_due(&mut self, due: Option<DateTime<Utc>>, tz: &Tz) {
        self.due = due.map(|due| DueFields::from_instant(due, tz));
    }

    pub fn handle_key(key: EditKey) -> Option<EditAction> {
        match key {
            EditKey::Enter => Some(EditAction::Commit),
            EditKey::Escape => Some(EditAction::Cancel),
            EditKey::Other => None,
        }
    }

    /// Applies the buffers through [`TaskStore::update`]. Empty text comes back
    /// as `Discarded`; a cleared date or time field clears the due date.
    #[tracing::instrument(skip(self, store, tz), fields(id = self.id))]
    pub fn commit<S: Storage>(
        self,
        store: &mut TaskStore<S>,
        tz: &Tz,
    ) -> anyhow::Result<UpdateOutcome> {
        if self.text.trim().is_empty() {
            return Ok(self.cancel());
        }

        let due_date = match &self.due {
            Some(fields) => combine_date_time(&fields.date, &fields.time, tz)?,
            None => None,
        };
        store.update(self.id, &self.text, due_date)
    }

    pub fn cancel(self) -> UpdateOutcome {
        debug!(id = self.id, "edit cancelled");
        UpdateOutcome::Discarded
    }
}
