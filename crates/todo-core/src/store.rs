use anyhow::{Context, anyhow};
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::storage::Storage;
use crate::task::{Task, TaskId};

/// Result of [`TaskStore::update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Applied,
    /// Empty text; the edit is dropped as if cancelled.
    Discarded,
    NotFound,
}

/// Owns the ordered task collection and its mirror under a single storage key.
#[derive(Debug)]
pub struct TaskStore<S: Storage> {
    storage: S,
    key: String,
    tasks: Vec<Task>,
}

impl<S: Storage> TaskStore<S> {
    #[tracing::instrument(skip(storage))]
    pub fn open(storage: S, key: &str) -> anyhow::Result<Self> {
        let tasks = load_tasks(&storage, key)?;
        info!(key, count = tasks.len(), "opened task store");

        Ok(Self {
            storage,
            key: key.to_string(),
            tasks,
        })
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    #[tracing::instrument(skip(self), fields(key = %self.key, count = self.tasks.len()))]
    pub fn persist(&mut self) -> anyhow::Result<()> {
        save_tasks(&mut self.storage, &self.key, &self.tasks)
    }

    /// Writes `tasks` and only then makes them current, so a failed write
    /// leaves the in-memory collection untouched.
    fn commit(&mut self, tasks: Vec<Task>) -> anyhow::Result<()> {
        save_tasks(&mut self.storage, &self.key, &tasks)?;
        self.tasks = tasks;
        Ok(())
    }

    /// Millisecond timestamp of `now`, bumped past the largest existing id.
    pub fn next_id(&self, now: DateTime<Utc>) -> anyhow::Result<TaskId> {
        let stamp = u64::try_from(now.timestamp_millis()).unwrap_or(0);
        match self.tasks.iter().map(|task| task.id).max() {
            Some(max) if max >= stamp => max
                .checked_add(1)
                .ok_or_else(|| anyhow!("task id space exhausted (largest id is {max})")),
            _ => Ok(stamp),
        }
    }

    #[tracing::instrument(skip(self, text, now))]
    pub fn add(
        &mut self,
        text: &str,
        due_date: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Option<TaskId>> {
        let text = text.trim();
        if text.is_empty() {
            debug!("rejected empty task text");
            return Ok(None);
        }

        let id = self.next_id(now)?;
        let mut tasks = self.tasks.clone();
        tasks.push(Task::new(id, text.to_string(), due_date, now));
        self.commit(tasks)?;

        info!(id, "task added");
        Ok(Some(id))
    }

    #[tracing::instrument(skip(self))]
    pub fn remove(&mut self, id: TaskId) -> anyhow::Result<bool> {
        let Some(idx) = self.position(id) else {
            debug!(id, "remove: no such task");
            return Ok(false);
        };

        let mut tasks = self.tasks.clone();
        tasks.remove(idx);
        self.commit(tasks)?;

        info!(id, "task removed");
        Ok(true)
    }

    /// Flips `completed` and returns the new value.
    #[tracing::instrument(skip(self))]
    pub fn toggle_complete(&mut self, id: TaskId) -> anyhow::Result<Option<bool>> {
        let Some(idx) = self.position(id) else {
            debug!(id, "toggle: no such task");
            return Ok(None);
        };

        let mut tasks = self.tasks.clone();
        let completed = !tasks[idx].completed;
        tasks[idx].completed = completed;
        self.commit(tasks)?;

        info!(id, completed, "task toggled");
        Ok(Some(completed))
    }

    #[tracing::instrument(skip(self, text))]
    pub fn update(
        &mut self,
        id: TaskId,
        text: &str,
        due_date: Option<DateTime<Utc>>,
    ) -> anyhow::Result<UpdateOutcome> {
        let text = text.trim();
        if text.is_empty() {
            debug!(id, "discarded edit with empty text");
            return Ok(UpdateOutcome::Discarded);
        }

        let Some(idx) = self.position(id) else {
            debug!(id, "update: no such task");
            return Ok(UpdateOutcome::NotFound);
        };

        let mut tasks = self.tasks.clone();
        tasks[idx].text = text.to_string();
        tasks[idx].due_date = due_date;
        self.commit(tasks)?;

        info!(id, "task updated");
        Ok(UpdateOutcome::Applied)
    }

    fn position(&self, id: TaskId) -> Option<usize> {
        self.tasks.iter().position(|task| task.id == id)
    }
}

fn save_tasks<S: Storage>(storage: &mut S, key: &str, tasks: &[Task]) -> anyhow::Result<()> {
    let payload = serde_json::to_string(tasks).context("failed to serialize tasks")?;
    storage
        .set_item(key, &payload)
        .with_context(|| format!("failed to save tasks under key {key}"))
}

#[tracing::instrument(skip(storage))]
fn load_tasks<S: Storage>(storage: &S, key: &str) -> anyhow::Result<Vec<Task>> {
    let Some(raw) = storage
        .get_item(key)
        .with_context(|| format!("failed to read tasks under key {key}"))?
    else {
        debug!(key, "no stored tasks, starting empty");
        return Ok(vec![]);
    };

    if raw.trim().is_empty() {
        return Ok(vec![]);
    }

    match serde_json::from_str::<Vec<Task>>(&raw) {
        Ok(tasks) => {
            debug!(count = tasks.len(), "loaded stored tasks");
            Ok(tasks)
        }
        Err(err) => {
            warn!(key, error = %err, "stored tasks are malformed; starting empty");
            Ok(vec![])
        }
    }
}
