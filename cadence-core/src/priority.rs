//! Task priority evaluation: composes the blocked gate, the daily window,
//! and the configured curve into one scalar.

use chrono::{DateTime, Duration, Timelike, Utc};
use tracing::debug;

use crate::curve::{build_curve, Curve, LinearCurve};
use crate::error::Result;
use crate::graph;
use crate::store::{TaskFilter, TaskStore};
use crate::task::{Task, TaskStatus};
use crate::time::{in_window, parse_hhmm};

/// Priority of one task at instant `at`.
///
/// Zero when any dependency is unresolved or incomplete, or when the task
/// has a daily window that excludes `at`. Otherwise the configured curve
/// decides; a config that fails to build degrades to a plain week-long ramp
/// from `created_at` rather than failing the read.
pub async fn evaluate_priority(
    store: &dyn TaskStore,
    task: &Task,
    at: DateTime<Utc>,
) -> Result<f64> {
    if !task.dependencies.is_empty() && !graph::all_complete(store, &task.dependencies).await? {
        return Ok(0.0);
    }

    if let Some((start, end)) = task.window() {
        let now_minutes = at.hour() * 60 + at.minute();
        if !in_window(now_minutes, parse_hhmm(start)?, parse_hhmm(end)?) {
            return Ok(0.0);
        }
    }

    let curve = match build_curve(&task.curve, Some(store), Some(task), at) {
        Ok(curve) => curve,
        Err(err) => {
            debug!(task_id = task.id, error = %err, "curve build failed, using linear fallback");
            fallback_curve(task)?
        }
    };
    curve.evaluate(store, at).await
}

fn fallback_curve(task: &Task) -> Result<Curve> {
    let deadline = match task.deadline {
        Some(d) if d > task.created_at => d,
        _ => task.created_at + Duration::days(7),
    };
    Ok(Curve::Linear(LinearCurve::new(task.created_at, deadline)?))
}

/// Open and in-progress tasks ranked by priority at `at`, highest first.
///
/// The sort is stable, so ties keep the store's natural order (creation
/// order descending). `limit` truncates after ranking.
pub async fn get_by_priority(
    store: &dyn TaskStore,
    limit: Option<usize>,
    at: DateTime<Utc>,
) -> Result<Vec<(Task, f64)>> {
    let filter = TaskFilter::by_status(&[TaskStatus::Open, TaskStatus::InProgress]);
    let tasks = store.list(&filter).await?;

    let mut ranked = Vec::with_capacity(tasks.len());
    for task in tasks {
        let priority = evaluate_priority(store, &task, at).await?;
        ranked.push((task, priority));
    }

    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    if let Some(limit) = limit {
        ranked.truncate(limit);
    }
    Ok(ranked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::task::{CurveConfig, CurveType, TaskInput, TaskPatch};
    use chrono::TimeZone;

    fn at(y: i32, mo: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, 0, 0).unwrap()
    }

    fn ramp_config() -> CurveConfig {
        CurveConfig::linear().with_dates(at(2024, 1, 10, 0), at(2024, 1, 20, 0))
    }

    #[tokio::test]
    async fn incomplete_dependency_pins_priority_to_zero() {
        let store = MemoryStore::new();
        let dep = store.insert(TaskInput::new("dep")).await.unwrap();
        let id = store
            .insert(
                TaskInput::new("gated")
                    .with_dependencies(&[dep])
                    .with_curve(ramp_config()),
            )
            .await
            .unwrap();

        let task = store.get(id).await.unwrap().unwrap();
        assert_eq!(
            evaluate_priority(&store, &task, at(2024, 1, 15, 0)).await.unwrap(),
            0.0
        );

        store
            .update(dep, TaskPatch::status(TaskStatus::Completed))
            .await
            .unwrap();
        let p = evaluate_priority(&store, &task, at(2024, 1, 15, 0)).await.unwrap();
        assert!((p - 0.5).abs() < 1e-3);
    }

    #[tokio::test]
    async fn window_outside_now_pins_priority_to_zero() {
        let store = MemoryStore::new();
        let id = store
            .insert(
                TaskInput::new("evening only")
                    .with_window("19:00", "21:00")
                    .with_curve(ramp_config()),
            )
            .await
            .unwrap();
        let task = store.get(id).await.unwrap().unwrap();

        assert_eq!(
            evaluate_priority(&store, &task, at(2024, 1, 15, 9)).await.unwrap(),
            0.0
        );
        let p = evaluate_priority(&store, &task, at(2024, 1, 15, 20)).await.unwrap();
        assert!(p > 0.0);
    }

    #[tokio::test]
    async fn unbuildable_curve_falls_back_to_linear() {
        let store = MemoryStore::new();
        // accumulator without recurrence anywhere cannot build
        let id = store
            .insert(TaskInput::new("broken").with_curve(CurveConfig {
                kind: CurveType::Accumulator,
                ..CurveConfig::default()
            }))
            .await
            .unwrap();
        let task = store.get(id).await.unwrap().unwrap();

        // halfway through the implicit created_at + 7d ramp
        let p = evaluate_priority(&store, &task, task.created_at + Duration::days(7) / 2)
            .await
            .unwrap();
        assert!((p - 0.5).abs() < 1e-3);
    }

    #[tokio::test]
    async fn ranking_sorts_descending_and_truncates() {
        let store = MemoryStore::new();
        // overdue -> > 1.0
        store
            .insert(
                TaskInput::new("overdue").with_curve(
                    CurveConfig::linear().with_dates(at(2024, 1, 1, 0), at(2024, 1, 5, 0)),
                ),
            )
            .await
            .unwrap();
        // mid-ramp -> 0.5
        store
            .insert(TaskInput::new("mid").with_curve(ramp_config()))
            .await
            .unwrap();
        // not started -> 0.0
        store
            .insert(
                TaskInput::new("future").with_curve(
                    CurveConfig::linear().with_dates(at(2024, 2, 1, 0), at(2024, 2, 10, 0)),
                ),
            )
            .await
            .unwrap();

        let ranked = get_by_priority(&store, None, at(2024, 1, 15, 0)).await.unwrap();
        let titles: Vec<&str> = ranked.iter().map(|(t, _)| t.title.as_str()).collect();
        assert_eq!(titles, vec!["overdue", "mid", "future"]);
        assert!(ranked[0].1 > 1.0);
        assert_eq!(ranked[2].1, 0.0);

        let top = get_by_priority(&store, Some(1), at(2024, 1, 15, 0)).await.unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].0.title, "overdue");
    }

    #[tokio::test]
    async fn completed_tasks_are_not_ranked() {
        let store = MemoryStore::new();
        let id = store
            .insert(TaskInput::new("done").with_curve(ramp_config()))
            .await
            .unwrap();
        store
            .update(id, TaskPatch::status(TaskStatus::Completed))
            .await
            .unwrap();

        let ranked = get_by_priority(&store, None, at(2024, 1, 15, 0)).await.unwrap();
        assert!(ranked.is_empty());
    }
}
