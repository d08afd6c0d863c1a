use std::io::Write;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::{debug, warn};

use crate::edit::EditSession;
use crate::filter::FilterMode;
use crate::render::{ListView, Renderer, project};
use crate::stats::Stats;
use crate::storage::Storage;
use crate::store::{TaskStore, UpdateOutcome};
use crate::task::TaskId;

/// Application root. Owns the store and the active filter, and re-renders
/// the list plus statistics after every change to the collection.
#[derive(Debug)]
pub struct App<S: Storage, W: Write> {
    store: TaskStore<S>,
    filter: FilterMode,
    tz: Tz,
    renderer: Renderer,
    out: W,
}

impl<S: Storage, W: Write> App<S, W> {
    pub fn new(store: TaskStore<S>, filter: FilterMode, tz: Tz, renderer: Renderer, out: W) -> Self {
        Self {
            store,
            filter,
            tz,
            renderer,
            out,
        }
    }

    pub fn store(&self) -> &TaskStore<S> {
        &self.store
    }

    pub fn filter(&self) -> FilterMode {
        self.filter
    }

    pub fn set_filter(&mut self, filter: FilterMode) {
        debug!(%filter, "filter changed");
        self.filter = filter;
    }

    pub fn tz(&self) -> &Tz {
        &self.tz
    }

    pub fn out(&mut self) -> &mut W {
        &mut self.out
    }

    pub fn view(&self, now: DateTime<Utc>) -> ListView {
        project(self.store.tasks(), self.filter, now, &self.tz)
    }

    pub fn stats(&self, now: DateTime<Utc>) -> Stats {
        Stats::compute(self.store.tasks(), now)
    }

    #[tracing::instrument(skip(self, now), fields(filter = %self.filter))]
    pub fn refresh(&mut self, now: DateTime<Utc>) -> anyhow::Result<()> {
        let view = self.view(now);
        let stats = self.stats(now);
        self.renderer.write_list(&mut self.out, &view)?;
        self.renderer.write_stats(&mut self.out, &stats)?;
        Ok(())
    }

    pub fn write_stats(&mut self, now: DateTime<Utc>) -> anyhow::Result<()> {
        let stats = self.stats(now);
        self.renderer.write_stats(&mut self.out, &stats)
    }

    pub fn add(
        &mut self,
        text: &str,
        due_date: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Option<TaskId>> {
        let added = self.store.add(text, due_date, now)?;
        if added.is_some() {
            self.refresh(now)?;
        }
        Ok(added)
    }

    pub fn toggle_complete(&mut self, id: TaskId, now: DateTime<Utc>) -> anyhow::Result<Option<bool>> {
        let toggled = self.store.toggle_complete(id)?;
        match toggled {
            Some(_) => self.refresh(now)?,
            None => warn!(id, "no task with that id"),
        }
        Ok(toggled)
    }

    pub fn remove(&mut self, id: TaskId, now: DateTime<Utc>) -> anyhow::Result<bool> {
        let removed = self.store.remove(id)?;
        if removed {
            self.refresh(now)?;
        } else {
            warn!(id, "no task with that id");
        }
        Ok(removed)
    }

    pub fn begin_edit(&self, id: TaskId) -> Option<EditSession> {
        self.store
            .get(id)
            .map(|task| EditSession::begin(task, &self.tz))
    }

    /// Commits an edit. A discarded edit re-renders like a cancel does.
    pub fn commit_edit(&mut self, session: EditSession, now: DateTime<Utc>) -> anyhow::Result<UpdateOutcome> {
        let id = session.id();
        let outcome = session.commit(&mut self.store, &self.tz)?;
        match outcome {
            UpdateOutcome::Applied | UpdateOutcome::Discarded => self.refresh(now)?,
            UpdateOutcome::NotFound => warn!(id, "no task with that id"),
        }
        Ok(outcome)
    }

    pub fn cancel_edit(&mut self, session: EditSession, now: DateTime<Utc>) -> anyhow::Result<()> {
        session.cancel();
        self.refresh(now)
    }
}
