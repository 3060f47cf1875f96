//! Dependency-graph checks guarding every write: existence, acyclicity,
//! and the all-complete gate used by priority evaluation.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::error::{EngineError, Result};
use crate::store::{TaskFilter, TaskStore};
use crate::task::{TaskId, TaskStatus};

/// Every id must resolve to a persisted task.
pub async fn ensure_deps_exist(store: &dyn TaskStore, deps: &[TaskId]) -> Result<()> {
    for &id in deps {
        if store.get(id).await?.is_none() {
            return Err(EngineError::DepMissing(id));
        }
    }
    Ok(())
}

/// BFS the transitive closure of the proposed deps; reject when
/// `exclude_task_id` shows up, since persisting would close a cycle.
///
/// The adjacency snapshot is read once up front so the walk costs a single
/// store round-trip regardless of graph shape.
pub async fn ensure_acyclic(
    store: &dyn TaskStore,
    exclude_task_id: TaskId,
    deps: &[TaskId],
) -> Result<()> {
    let snapshot = store.list(&TaskFilter::default()).await?;
    let adjacency: HashMap<TaskId, Vec<TaskId>> = snapshot
        .into_iter()
        .map(|t| (t.id, t.dependencies))
        .collect();

    let mut visited: HashSet<TaskId> = HashSet::new();
    let mut queue: VecDeque<TaskId> = deps.iter().copied().collect();

    while let Some(id) = queue.pop_front() {
        if id == exclude_task_id {
            return Err(EngineError::Circular(exclude_task_id));
        }
        if !visited.insert(id) {
            continue;
        }
        if let Some(next) = adjacency.get(&id) {
            queue.extend(next.iter().copied());
        }
    }
    Ok(())
}

/// True when every dependency resolves and is Completed.
pub async fn all_complete(store: &dyn TaskStore, deps: &[TaskId]) -> Result<bool> {
    for &id in deps {
        match store.get(id).await? {
            Some(dep) if dep.status == TaskStatus::Completed => {}
            _ => return Ok(false),
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::task::{TaskInput, TaskPatch};

    #[tokio::test]
    async fn existence_check_flags_unknown_ids() {
        let store = MemoryStore::new();
        let id = store.insert(TaskInput::new("real")).await.unwrap();

        assert!(ensure_deps_exist(&store, &[id]).await.is_ok());
        let err = ensure_deps_exist(&store, &[id, 404]).await.unwrap_err();
        assert!(matches!(err, EngineError::DepMissing(404)));
    }

    #[tokio::test]
    async fn cycle_through_excluded_task_is_rejected() {
        let store = MemoryStore::new();
        let a = store.insert(TaskInput::new("a")).await.unwrap();
        let b = store
            .insert(TaskInput::new("b").with_dependencies(&[a]))
            .await
            .unwrap();
        let c = store
            .insert(TaskInput::new("c").with_dependencies(&[b]))
            .await
            .unwrap();

        // a -> c would close a -> c -> b -> a
        let err = ensure_acyclic(&store, a, &[c]).await.unwrap_err();
        assert!(matches!(err, EngineError::Circular(id) if id == a));

        // a -> a directly
        let err = ensure_acyclic(&store, a, &[a]).await.unwrap_err();
        assert!(matches!(err, EngineError::Circular(id) if id == a));

        // a task outside the chain may point at it freely
        assert!(ensure_acyclic(&store, 99, &[c]).await.is_ok());
    }

    #[tokio::test]
    async fn all_complete_requires_every_dep_done() {
        let store = MemoryStore::new();
        let a = store.insert(TaskInput::new("a")).await.unwrap();
        let b = store.insert(TaskInput::new("b")).await.unwrap();

        assert!(!all_complete(&store, &[a, b]).await.unwrap());

        store
            .update(a, TaskPatch::status(TaskStatus::Completed))
            .await
            .unwrap();
        assert!(!all_complete(&store, &[a, b]).await.unwrap());

        store
            .update(b, TaskPatch::status(TaskStatus::Completed))
            .await
            .unwrap();
        assert!(all_complete(&store, &[a, b]).await.unwrap());

        // a missing id is never complete
        assert!(!all_complete(&store, &[a, 404]).await.unwrap());
    }
}
