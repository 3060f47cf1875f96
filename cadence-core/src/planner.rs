//! Daily planner: actionability filter + greedy first-fit time blocks.
//!
//! The planner samples priorities once per plan, filters to what is worth
//! doing today, then packs estimates into the work day front-to-back.
//! Windows and work hours intersect as half-open minute ranges.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::priority;
use crate::store::TaskStore;
use crate::task::Task;
use crate::time::{format_hhmm, parse_hhmm, range_intersect};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    pub work_hours_start: String,
    pub work_hours_end: String,
    pub default_estimate_minutes: u32,
    /// Priorities are sampled no earlier than this hour of the plan day, so
    /// a task whose window closes before the day gets going drops out of
    /// candidacy instead of claiming a morning slot it cannot use.
    pub priority_floor_hour: u32,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            work_hours_start: "08:00".to_string(),
            work_hours_end: "17:00".to_string(),
            default_estimate_minutes: 15,
            priority_floor_hour: 9,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PlanOptions {
    pub limit: usize,
    pub include_time_blocks: bool,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            limit: 8,
            include_time_blocks: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeBlock {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeBlock {
    /// `"HH:MM-HH:MM"` on the plan day.
    pub fn label(&self) -> String {
        format!(
            "{}-{}",
            format_hhmm(minutes_of(self.start)),
            format_hhmm(minutes_of(self.end))
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScheduledTask {
    pub task: Task,
    pub priority: f64,
    pub slot: TimeBlock,
    pub estimate_minutes: u32,
    pub is_default_estimate: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnscheduledTask {
    pub task: Task,
    pub priority: f64,
    pub reason: &'static str,
}

pub const REASON_WINDOW_OUTSIDE_WORK_HOURS: &str = "window outside work hours";
pub const REASON_DOES_NOT_FIT: &str = "does not fit";

#[derive(Debug, Clone, Serialize)]
pub struct DayPlan {
    pub date: NaiveDate,
    /// Instant priorities were sampled at.
    pub priority_time: DateTime<Utc>,
    pub scheduled: Vec<ScheduledTask>,
    pub unscheduled: Vec<UnscheduledTask>,
    pub total_scheduled_minutes: u32,
    pub remaining_minutes: i64,
}

/// Lay out one day as non-overlapping time blocks.
pub async fn plan_day(
    store: &dyn TaskStore,
    date: NaiveDate,
    config: &PlannerConfig,
    opts: PlanOptions,
) -> Result<DayPlan> {
    let work_start = parse_hhmm(&config.work_hours_start)?;
    let work_end = parse_hhmm(&config.work_hours_end)?;
    let work_span = work_end.saturating_sub(work_start) as i64;

    let priority_hour = (work_start / 60).max(config.priority_floor_hour);
    let priority_time = at_minutes(date, priority_hour * 60 + work_start % 60);

    let candidates =
        priority::get_by_priority(store, Some(opts.limit * 2), priority_time).await?;

    let end_of_day = at_minutes(date + Duration::days(1), 0);
    let actionable: Vec<(Task, f64)> = candidates
        .into_iter()
        .filter(|(task, p)| is_actionable(task, *p, end_of_day))
        .collect();

    debug!(%date, actionable = actionable.len(), "planning day");

    if !opts.include_time_blocks {
        let slot = TimeBlock {
            start: at_minutes(date, work_start),
            end: at_minutes(date, work_end),
        };
        let scheduled: Vec<ScheduledTask> = actionable
            .into_iter()
            .take(opts.limit)
            .map(|(task, priority)| {
                let (estimate_minutes, is_default_estimate) = estimate_of(&task, config);
                ScheduledTask {
                    task,
                    priority,
                    slot: slot.clone(),
                    estimate_minutes,
                    is_default_estimate,
                }
            })
            .collect();
        return Ok(summarize(date, priority_time, scheduled, vec![], work_span));
    }

    let mut used: Vec<(u32, u32)> = Vec::new();
    let mut scheduled: Vec<ScheduledTask> = Vec::new();
    let mut unscheduled: Vec<UnscheduledTask> = Vec::new();

    for (task, priority) in actionable.into_iter().take(opts.limit) {
        let (estimate_minutes, is_default_estimate) = estimate_of(&task, config);

        let allowed = match task_window_minutes(&task)? {
            Some(window) => range_intersect((work_start, work_end), window),
            None => Some((work_start, work_end)),
        };
        let Some(allowed) = allowed else {
            unscheduled.push(UnscheduledTask {
                task,
                priority,
                reason: REASON_WINDOW_OUTSIDE_WORK_HOURS,
            });
            continue;
        };

        match first_fit(&used, allowed, estimate_minutes) {
            Some(start) => {
                let end = start + estimate_minutes;
                let pos = used.partition_point(|&(s, _)| s < start);
                used.insert(pos, (start, end));
                scheduled.push(ScheduledTask {
                    slot: TimeBlock {
                        start: at_minutes(date, start),
                        end: at_minutes(date, end),
                    },
                    task,
                    priority,
                    estimate_minutes,
                    is_default_estimate,
                });
            }
            None => unscheduled.push(UnscheduledTask {
                task,
                priority,
                reason: REASON_DOES_NOT_FIT,
            }),
        }
    }

    Ok(summarize(date, priority_time, scheduled, unscheduled, work_span))
}

/// Worth considering today: a positive priority combined with a reason to
/// act (deadline or due instant landing today, or a daily window), or a
/// priority high enough on its own.
fn is_actionable(task: &Task, priority: f64, end_of_day: DateTime<Utc>) -> bool {
    if priority <= 0.0 {
        return false;
    }
    if task.deadline.map(|d| d < end_of_day).unwrap_or(false) {
        return true;
    }
    if task.next_due_at.map(|d| d < end_of_day).unwrap_or(false) {
        return true;
    }
    if task.window().is_some() {
        return true;
    }
    priority > 0.3
}

/// First gap of at least `estimate` minutes inside `allowed`, scanning
/// before, between, and after the used slots.
fn first_fit(used: &[(u32, u32)], allowed: (u32, u32), estimate: u32) -> Option<u32> {
    let (allow_start, allow_end) = allowed;
    let mut cursor = allow_start;

    for &(start, end) in used {
        if end <= cursor {
            continue;
        }
        if cursor + estimate <= start.min(allow_end) {
            return Some(cursor);
        }
        cursor = cursor.max(end);
    }

    if cursor + estimate <= allow_end {
        Some(cursor)
    } else {
        None
    }
}

fn estimate_of(task: &Task, config: &PlannerConfig) -> (u32, bool) {
    match task.estimated_minutes {
        Some(minutes) => (minutes, false),
        None => (config.default_estimate_minutes, true),
    }
}

fn task_window_minutes(task: &Task) -> Result<Option<(u32, u32)>> {
    match task.window() {
        Some((start, end)) => Ok(Some((parse_hhmm(start)?, parse_hhmm(end)?))),
        None => Ok(None),
    }
}

fn summarize(
    date: NaiveDate,
    priority_time: DateTime<Utc>,
    scheduled: Vec<ScheduledTask>,
    unscheduled: Vec<UnscheduledTask>,
    work_span: i64,
) -> DayPlan {
    let total_scheduled_minutes: u32 = scheduled.iter().map(|s| s.estimate_minutes).sum();
    DayPlan {
        date,
        priority_time,
        scheduled,
        unscheduled,
        total_scheduled_minutes,
        remaining_minutes: work_span - total_scheduled_minutes as i64,
    }
}

fn at_minutes(date: NaiveDate, minutes: u32) -> DateTime<Utc> {
    let time = NaiveTime::from_hms_opt(minutes / 60, minutes % 60, 0).unwrap_or(NaiveTime::MIN);
    Utc.from_utc_datetime(&date.and_time(time))
}

fn minutes_of(at: DateTime<Utc>) -> u32 {
    use chrono::Timelike;
    at.time().hour() * 60 + at.time().minute()
}
