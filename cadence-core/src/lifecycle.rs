//! Task lifecycle: create / update / complete / reopen / delete.
//!
//! `TaskManager` is the single writer. Reads may go straight to the store;
//! every mutation funnels through here so the dependency graph stays
//! resolvable and acyclic.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::curve;
use crate::error::{EngineError, Result};
use crate::graph;
use crate::recurrence;
use crate::store::{TaskFilter, TaskStore};
use crate::task::{CompletionRecord, Task, TaskId, TaskInput, TaskPatch, TaskStatus};
use crate::time::parse_hhmm;

#[derive(Debug)]
pub struct TaskManager<S: TaskStore> {
    store: S,
}

impl<S: TaskStore> TaskManager<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Read access for queries and planning.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Validate dependencies, resolve the default curve, persist as Open.
    pub async fn create(&self, mut input: TaskInput) -> Result<Task> {
        validate_window(input.window_start.as_deref(), input.window_end.as_deref())?;
        graph::ensure_deps_exist(&self.store, &input.dependencies).await?;

        if input.curve.is_none() {
            input.curve = Some(curve::default_curve_config(&input));
        }

        let id = self.store.insert(input).await?;
        debug!(task_id = id, "task created");
        self.store.get(id).await?.ok_or(EngineError::NotFound(id))
    }

    /// Apply a patch. A dependency change re-runs existence and cycle
    /// checks with this task excluded from the walkable graph.
    pub async fn update(&self, id: TaskId, patch: TaskPatch) -> Result<Task> {
        if self.store.get(id).await?.is_none() {
            return Err(EngineError::NotFound(id));
        }
        validate_window(patch.window_start.as_deref(), patch.window_end.as_deref())?;

        if let Some(deps) = &patch.dependencies {
            graph::ensure_deps_exist(&self.store, deps).await?;
            graph::ensure_acyclic(&self.store, id, deps).await?;
        }

        let task = self.store.update(id, patch).await?;
        debug!(task_id = id, "task updated");
        Ok(task)
    }

    /// Erase a task nothing else depends on.
    pub async fn delete(&self, id: TaskId) -> Result<()> {
        if self.store.get(id).await?.is_none() {
            return Err(EngineError::NotFound(id));
        }

        let all = self.store.list(&TaskFilter::default()).await?;
        for other in &all {
            if other.id != id && other.dependencies.contains(&id) {
                return Err(EngineError::HasDependents(id, other.id));
            }
        }

        self.store.delete(id).await?;
        debug!(task_id = id, "task deleted");
        Ok(())
    }

    /// Record a completion. Recurring tasks roll forward to their next due
    /// instant and stay Open; one-shot tasks transition to Completed.
    pub async fn complete(
        &self,
        id: TaskId,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<Task> {
        let task = self
            .store
            .get(id)
            .await?
            .ok_or(EngineError::NotFound(id))?;
        let completed_at = completed_at.unwrap_or_else(Utc::now);

        self.store
            .insert_completion(CompletionRecord {
                task_id: id,
                completed_at,
            })
            .await?;
        self.store.set_last_completed(id, completed_at).await?;

        let status = if let Some(pattern) = &task.recurrence {
            let due = recurrence::next_due(pattern, completed_at, &task);
            self.store.set_next_due(id, due).await?;
            debug!(task_id = id, next_due = %due, "recurring task completed, rolled forward");
            TaskStatus::Open
        } else {
            debug!(task_id = id, "task completed");
            TaskStatus::Completed
        };

        self.store.update(id, TaskPatch::status(status)).await
    }

    pub async fn reopen(&self, id: TaskId) -> Result<Task> {
        if self.store.get(id).await?.is_none() {
            return Err(EngineError::NotFound(id));
        }
        debug!(task_id = id, "task reopened");
        self.store
            .update(id, TaskPatch::status(TaskStatus::Open))
            .await
    }
}

fn validate_window(start: Option<&str>, end: Option<&str>) -> Result<()> {
    if let Some(s) = start {
        parse_hhmm(s)?;
    }
    if let Some(e) = end {
        parse_hhmm(e)?;
    }
    Ok(())
}
