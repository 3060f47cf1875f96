//! The persistence collaborator: `TaskStore` trait plus an in-memory
//! reference implementation.
//!
//! The engine only ever talks to this surface. SQL schemas, full-text
//! indexes, and import/export live behind it in the integration layer;
//! `MemoryStore` is what tests (and small deployments) run against.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{EngineError, Result};
use crate::task::{CompletionRecord, Task, TaskId, TaskInput, TaskPatch, TaskStatus};

/// Conjunctive task query. Absent fields match everything.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    /// One or more statuses; a task matches if its status is any of them.
    pub status: Option<Vec<TaskStatus>>,
    pub project: Option<String>,
    pub bucket_id: Option<i64>,
    /// Every listed tag must be present on the task.
    pub tags: Option<Vec<String>>,
    pub has_deadline: Option<bool>,
    pub has_recurrence: Option<bool>,
    pub overdue: Option<bool>,
}

impl TaskFilter {
    pub fn by_status(statuses: &[TaskStatus]) -> Self {
        Self {
            status: Some(statuses.to_vec()),
            ..Self::default()
        }
    }

    pub fn matches(&self, task: &Task, now: DateTime<Utc>) -> bool {
        if let Some(statuses) = &self.status {
            if !statuses.contains(&task.status) {
                return false;
            }
        }
        if let Some(project) = &self.project {
            if task.project.as_deref() != Some(project.as_str()) {
                return false;
            }
        }
        if let Some(bucket_id) = self.bucket_id {
            if task.bucket_id != Some(bucket_id) {
                return false;
            }
        }
        if let Some(tags) = &self.tags {
            if !tags.iter().all(|t| task.tags.contains(t)) {
                return false;
            }
        }
        if let Some(want) = self.has_deadline {
            if task.deadline.is_some() != want {
                return false;
            }
        }
        if let Some(want) = self.has_recurrence {
            if task.recurrence.is_some() != want {
                return false;
            }
        }
        if let Some(want) = self.overdue {
            let overdue = task.deadline.map(|d| d < now).unwrap_or(false);
            if overdue != want {
                return false;
            }
        }
        true
    }
}

/// Asynchronous task persistence.
///
/// `list` returns tasks in the store's natural order: creation order
/// descending. Priority sorts downstream rely on that for tie-breaking.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn get(&self, id: TaskId) -> Result<Option<Task>>;
    async fn list(&self, filter: &TaskFilter) -> Result<Vec<Task>>;
    async fn insert(&self, input: TaskInput) -> Result<TaskId>;
    async fn update(&self, id: TaskId, patch: TaskPatch) -> Result<Task>;
    async fn delete(&self, id: TaskId) -> Result<()>;
    async fn set_last_completed(&self, id: TaskId, ts: DateTime<Utc>) -> Result<()>;
    async fn set_next_due(&self, id: TaskId, ts: DateTime<Utc>) -> Result<()>;
    async fn insert_completion(&self, record: CompletionRecord) -> Result<()>;
    async fn search(&self, query: &str) -> Result<Vec<Task>>;
}

#[derive(Debug, Default)]
struct Inner {
    next_id: TaskId,
    tasks: BTreeMap<TaskId, Task>,
    completions: Vec<CompletionRecord>,
}

/// In-memory `TaskStore` over a mutex-guarded map.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Completion rows recorded so far, oldest first.
    pub fn completions(&self) -> Vec<CompletionRecord> {
        self.locked().completions.clone()
    }

    fn locked(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().expect("task store mutex poisoned")
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn get(&self, id: TaskId) -> Result<Option<Task>> {
        Ok(self.locked().tasks.get(&id).cloned())
    }

    async fn list(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        let now = Utc::now();
        let inner = self.locked();
        // rev(): ids ascend with creation, so this is creation order descending
        Ok(inner
            .tasks
            .values()
            .rev()
            .filter(|t| filter.matches(t, now))
            .cloned()
            .collect())
    }

    async fn insert(&self, input: TaskInput) -> Result<TaskId> {
        let now = Utc::now();
        let mut inner = self.locked();
        inner.next_id += 1;
        let id = inner.next_id;

        let task = Task {
            id,
            title: input.title,
            project: input.project,
            bucket_id: input.bucket_id,
            tags: input.tags,
            deadline: input.deadline,
            estimated_minutes: input.estimated_minutes,
            window_start: input.window_start,
            window_end: input.window_end,
            recurrence: input.recurrence,
            last_completed_at: None,
            next_due_at: None,
            dependencies: input.dependencies,
            curve: input.curve.unwrap_or_default(),
            status: TaskStatus::Open,
            created_at: now,
            updated_at: now,
        };
        inner.tasks.insert(id, task);
        Ok(id)
    }

    async fn update(&self, id: TaskId, patch: TaskPatch) -> Result<Task> {
        let mut inner = self.locked();
        let task = inner
            .tasks
            .get_mut(&id)
            .ok_or(EngineError::NotFound(id))?;

        if let Some(title) = patch.title {
            task.title = title;
        }
        if let Some(project) = patch.project {
            task.project = Some(project);
        }
        if let Some(bucket_id) = patch.bucket_id {
            task.bucket_id = Some(bucket_id);
        }
        if let Some(tags) = patch.tags {
            task.tags = tags;
        }
        if let Some(deadline) = patch.deadline {
            task.deadline = Some(deadline);
        }
        if let Some(minutes) = patch.estimated_minutes {
            task.estimated_minutes = Some(minutes);
        }
        if let Some(window_start) = patch.window_start {
            task.window_start = Some(window_start);
        }
        if let Some(window_end) = patch.window_end {
            task.window_end = Some(window_end);
        }
        if let Some(recurrence) = patch.recurrence {
            task.recurrence = Some(recurrence);
        }
        if let Some(dependencies) = patch.dependencies {
            task.dependencies = dependencies;
        }
        if let Some(curve) = patch.curve {
            task.curve = curve;
        }
        if let Some(status) = patch.status {
            task.status = status;
        }
        task.updated_at = Utc::now();

        Ok(task.clone())
    }

    async fn delete(&self, id: TaskId) -> Result<()> {
        self.locked()
            .tasks
            .remove(&id)
            .map(|_| ())
            .ok_or(EngineError::NotFound(id))
    }

    async fn set_last_completed(&self, id: TaskId, ts: DateTime<Utc>) -> Result<()> {
        let mut inner = self.locked();
        let task = inner
            .tasks
            .get_mut(&id)
            .ok_or(EngineError::NotFound(id))?;
        task.last_completed_at = Some(ts);
        task.updated_at = Utc::now();
        Ok(())
    }

    async fn set_next_due(&self, id: TaskId, ts: DateTime<Utc>) -> Result<()> {
        let mut inner = self.locked();
        let task = inner
            .tasks
            .get_mut(&id)
            .ok_or(EngineError::NotFound(id))?;
        task.next_due_at = Some(ts);
        task.updated_at = Utc::now();
        Ok(())
    }

    async fn insert_completion(&self, record: CompletionRecord) -> Result<()> {
        self.locked().completions.push(record);
        Ok(())
    }

    async fn search(&self, query: &str) -> Result<Vec<Task>> {
        let needle = query.to_lowercase();
        let inner = self.locked();
        Ok(inner
            .tasks
            .values()
            .rev()
            .filter(|t| {
                t.title.to_lowercase().contains(&needle)
                    || t.project
                        .as_deref()
                        .map(|p| p.to_lowercase().contains(&needle))
                        .unwrap_or(false)
                    || t.tags.iter().any(|tag| tag.to_lowercase().contains(&needle))
            })
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::RecurrenceMode;
    use crate::task::RecurrencePattern;
    use chrono::{Duration, TimeZone};

    #[tokio::test]
    async fn insert_assigns_ids_and_list_is_newest_first() {
        let store = MemoryStore::new();
        let a = store.insert(TaskInput::new("first")).await.unwrap();
        let b = store.insert(TaskInput::new("second")).await.unwrap();
        assert!(b > a);

        let all = store.list(&TaskFilter::default()).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].title, "second");
        assert_eq!(all[1].title, "first");
    }

    #[tokio::test]
    async fn filter_by_status_and_tags() {
        let store = MemoryStore::new();
        let id = store
            .insert(TaskInput::new("tagged").with_tags(&["home", "deep"]))
            .await
            .unwrap();
        store.insert(TaskInput::new("other")).await.unwrap();

        let filter = TaskFilter {
            tags: Some(vec!["home".to_string()]),
            ..TaskFilter::default()
        };
        let hits = store.list(&filter).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, id);

        store
            .update(id, TaskPatch::status(TaskStatus::Completed))
            .await
            .unwrap();
        let open = store
            .list(&TaskFilter::by_status(&[TaskStatus::Open]))
            .await
            .unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].title, "other");
    }

    #[tokio::test]
    async fn filter_overdue_and_recurrence() {
        let store = MemoryStore::new();
        let past = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        store
            .insert(TaskInput::new("late").with_deadline(past))
            .await
            .unwrap();
        store
            .insert(
                TaskInput::new("habit")
                    .with_recurrence(RecurrencePattern::daily(RecurrenceMode::Completion)),
            )
            .await
            .unwrap();

        let overdue = store
            .list(&TaskFilter {
                overdue: Some(true),
                ..TaskFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].title, "late");

        let recurring = store
            .list(&TaskFilter {
                has_recurrence: Some(true),
                ..TaskFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(recurring.len(), 1);
        assert_eq!(recurring[0].title, "habit");
    }

    #[tokio::test]
    async fn update_missing_task_is_not_found() {
        let store = MemoryStore::new();
        let err = store.update(42, TaskPatch::default()).await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound(42)));
    }

    #[tokio::test]
    async fn search_matches_title_project_and_tags() {
        let store = MemoryStore::new();
        store
            .insert(TaskInput::new("Water the plants").with_project("Garden"))
            .await
            .unwrap();
        store
            .insert(TaskInput::new("File taxes").with_tags(&["paperwork"]))
            .await
            .unwrap();

        assert_eq!(store.search("garden").await.unwrap().len(), 1);
        assert_eq!(store.search("paper").await.unwrap().len(), 1);
        assert_eq!(store.search("water").await.unwrap().len(), 1);
        assert!(store.search("nothing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn completion_rows_accumulate() {
        let store = MemoryStore::new();
        let id = store.insert(TaskInput::new("habit")).await.unwrap();
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        for i in 0..3 {
            store
                .insert_completion(CompletionRecord {
                    task_id: id,
                    completed_at: ts + Duration::days(i),
                })
                .await
                .unwrap();
        }
        assert_eq!(store.completions().len(), 3);
    }
}
