//! Task data model: the central entity plus its recurrence and curve configs.
//!
//! Everything here is serde-ready for JSON transport and persistence. Enum
//! tags serialize as lowercase identifiers; absent optionals are omitted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type TaskId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Open,
    InProgress,
    Completed,
    Blocked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecurrenceMode {
    Calendar,
    Completion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecurrenceType {
    Daily,
    Weekly,
    Monthly,
    Interval,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntervalUnit {
    Days,
    Weeks,
    Months,
}

impl Default for IntervalUnit {
    fn default() -> Self {
        IntervalUnit::Days
    }
}

fn default_interval() -> u32 {
    1
}

/// How and when a task repeats.
///
/// `day_of_week` / `days_of_week` use Sunday=0 .. Saturday=6. `anchor` only
/// matters for `interval` recurrence in calendar mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrencePattern {
    pub mode: RecurrenceMode,
    #[serde(rename = "type")]
    pub kind: RecurrenceType,
    #[serde(default = "default_interval")]
    pub interval: u32,
    #[serde(default)]
    pub unit: IntervalUnit,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_of_week: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_of_week: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor: Option<DateTime<Utc>>,
}

impl RecurrencePattern {
    pub fn new(mode: RecurrenceMode, kind: RecurrenceType) -> Self {
        Self {
            mode,
            kind,
            interval: 1,
            unit: IntervalUnit::Days,
            day_of_week: None,
            days_of_week: None,
            anchor: None,
        }
    }

    pub fn daily(mode: RecurrenceMode) -> Self {
        Self::new(mode, RecurrenceType::Daily)
    }

    pub fn weekly(mode: RecurrenceMode) -> Self {
        Self::new(mode, RecurrenceType::Weekly)
    }

    pub fn weekly_on(mode: RecurrenceMode, day_of_week: u8) -> Self {
        let mut p = Self::new(mode, RecurrenceType::Weekly);
        p.day_of_week = Some(day_of_week);
        p
    }

    pub fn weekly_on_days(mode: RecurrenceMode, days: &[u8]) -> Self {
        let mut p = Self::new(mode, RecurrenceType::Weekly);
        p.days_of_week = Some(days.to_vec());
        p
    }

    pub fn monthly(mode: RecurrenceMode) -> Self {
        Self::new(mode, RecurrenceType::Monthly)
    }

    pub fn every(mode: RecurrenceMode, interval: u32, unit: IntervalUnit) -> Self {
        let mut p = Self::new(mode, RecurrenceType::Interval);
        p.interval = interval;
        p.unit = unit;
        p
    }

    pub fn with_anchor(mut self, anchor: DateTime<Utc>) -> Self {
        self.anchor = Some(anchor);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurveType {
    Linear,
    Exponential,
    HardWindow,
    Blocked,
    Accumulator,
}

/// Persisted priority-curve configuration.
///
/// Which optional fields matter depends on `type`; the curve factory applies
/// defaults and rejects configs missing required fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveConfig {
    #[serde(rename = "type")]
    pub kind: CurveType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exponent: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_start: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_end: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Vec<TaskId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub then_curve: Option<CurveType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence: Option<RecurrencePattern>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buildup_rate: Option<f64>,
}

impl Default for CurveConfig {
    fn default() -> Self {
        Self {
            kind: CurveType::Linear,
            start_date: None,
            deadline: None,
            exponent: None,
            window_start: None,
            window_end: None,
            priority: None,
            dependencies: None,
            then_curve: None,
            recurrence: None,
            buildup_rate: None,
        }
    }
}

impl CurveConfig {
    pub fn linear() -> Self {
        Self::default()
    }

    pub fn exponential(exponent: f64) -> Self {
        Self {
            kind: CurveType::Exponential,
            exponent: Some(exponent),
            ..Self::default()
        }
    }

    pub fn hard_window(start: DateTime<Utc>, end: DateTime<Utc>, priority: f64) -> Self {
        Self {
            kind: CurveType::HardWindow,
            window_start: Some(start),
            window_end: Some(end),
            priority: Some(priority),
            ..Self::default()
        }
    }

    pub fn blocked(dependencies: Vec<TaskId>) -> Self {
        Self {
            kind: CurveType::Blocked,
            dependencies: Some(dependencies),
            ..Self::default()
        }
    }

    pub fn accumulator() -> Self {
        Self {
            kind: CurveType::Accumulator,
            ..Self::default()
        }
    }

    pub fn with_dates(mut self, start: DateTime<Utc>, deadline: DateTime<Utc>) -> Self {
        self.start_date = Some(start);
        self.deadline = Some(deadline);
        self
    }

    pub fn with_then_curve(mut self, kind: CurveType) -> Self {
        self.then_curve = Some(kind);
        self
    }

    pub fn with_recurrence(mut self, pattern: RecurrencePattern) -> Self {
        self.recurrence = Some(pattern);
        self
    }
}

/// Core task type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub project: Option<String>,
    pub bucket_id: Option<i64>,
    pub tags: Vec<String>,

    pub deadline: Option<DateTime<Utc>>,
    /// Minutes.
    pub estimated_minutes: Option<u32>,
    /// Daily availability window, `HH:MM` wall clock. Only consulted when
    /// both ends are present.
    pub window_start: Option<String>,
    pub window_end: Option<String>,

    pub recurrence: Option<RecurrencePattern>,
    pub last_completed_at: Option<DateTime<Utc>>,
    pub next_due_at: Option<DateTime<Utc>>,

    /// Dependency task ids. Set-like: duplicates are tolerated but carry no
    /// extra meaning.
    pub dependencies: Vec<TaskId>,

    pub curve: CurveConfig,
    pub status: TaskStatus,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// The daily window as a pair, when both ends are set.
    pub fn window(&self) -> Option<(&str, &str)> {
        match (self.window_start.as_deref(), self.window_end.as_deref()) {
            (Some(s), Some(e)) => Some((s, e)),
            _ => None,
        }
    }
}

/// Fields accepted at task creation. Status and audit fields are owned by
/// the store; the lifecycle manager resolves a default curve when `curve`
/// is absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskInput {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket_id: Option<i64>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_minutes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_end: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence: Option<RecurrencePattern>,
    #[serde(default)]
    pub dependencies: Vec<TaskId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub curve: Option<CurveConfig>,
}

impl TaskInput {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = Some(project.into());
        self
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn with_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_estimate(mut self, minutes: u32) -> Self {
        self.estimated_minutes = Some(minutes);
        self
    }

    pub fn with_window(mut self, start: impl Into<String>, end: impl Into<String>) -> Self {
        self.window_start = Some(start.into());
        self.window_end = Some(end.into());
        self
    }

    pub fn with_recurrence(mut self, pattern: RecurrencePattern) -> Self {
        self.recurrence = Some(pattern);
        self
    }

    pub fn with_dependencies(mut self, deps: &[TaskId]) -> Self {
        self.dependencies = deps.to_vec();
        self
    }

    pub fn with_curve(mut self, curve: CurveConfig) -> Self {
        self.curve = Some(curve);
        self
    }
}

/// Partial update. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_minutes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_end: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence: Option<RecurrencePattern>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Vec<TaskId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub curve: Option<CurveConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
}

impl TaskPatch {
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn dependencies(deps: &[TaskId]) -> Self {
        Self {
            dependencies: Some(deps.to_vec()),
            ..Self::default()
        }
    }
}

/// One row per completion, recurring tasks included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRecord {
    pub task_id: TaskId,
    pub completed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn curve_config_tags_are_snake_case() {
        let json = serde_json::to_value(CurveConfig::accumulator()).unwrap();
        assert_eq!(json["type"], "accumulator");

        let json = serde_json::to_value(CurveConfig {
            kind: CurveType::HardWindow,
            ..CurveConfig::default()
        })
        .unwrap();
        assert_eq!(json["type"], "hard_window");
    }

    #[test]
    fn curve_config_omits_absent_fields() {
        let json = serde_json::to_string(&CurveConfig::linear()).unwrap();
        assert_eq!(json, r#"{"type":"linear"}"#);
    }

    #[test]
    fn curve_config_round_trips_dates_as_iso8601() {
        let start = Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap();
        let deadline = Utc.with_ymd_and_hms(2024, 1, 20, 0, 0, 0).unwrap();
        let config = CurveConfig::exponential(3.0).with_dates(start, deadline);

        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("2024-01-10T00:00:00Z"), "{json}");

        let back: CurveConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn unknown_curve_type_is_rejected() {
        let err = serde_json::from_str::<CurveConfig>(r#"{"type":"parabolic"}"#);
        assert!(err.is_err());
    }

    #[test]
    fn recurrence_pattern_wire_names() {
        let pattern = RecurrencePattern::every(RecurrenceMode::Calendar, 3, IntervalUnit::Weeks);
        let json = serde_json::to_value(&pattern).unwrap();
        assert_eq!(json["mode"], "calendar");
        assert_eq!(json["type"], "interval");
        assert_eq!(json["interval"], 3);
        assert_eq!(json["unit"], "weeks");

        let parsed: RecurrencePattern =
            serde_json::from_str(r#"{"mode":"completion","type":"weekly","day_of_week":1}"#)
                .unwrap();
        assert_eq!(parsed.mode, RecurrenceMode::Completion);
        assert_eq!(parsed.kind, RecurrenceType::Weekly);
        assert_eq!(parsed.interval, 1);
        assert_eq!(parsed.unit, IntervalUnit::Days);
        assert_eq!(parsed.day_of_week, Some(1));
    }

    #[test]
    fn task_status_wire_names() {
        assert_eq!(
            serde_json::to_string(&TaskStatus::InProgress).unwrap(),
            r#""in_progress""#
        );
    }
}
