//! cadence-core: priority curves, recurrence, and daily planning for the
//! cadence task engine.

pub mod curve;
pub mod error;
pub mod graph;
pub mod lifecycle;
pub mod planner;
pub mod priority;
pub mod recurrence;
pub mod store;
pub mod task;
pub mod time;

pub use curve::{
    build_curve, default_curve_config, AccumulatorCurve, BlockedCurve, Curve, CurveMetadata,
    ExponentialCurve, HardWindowCurve, LinearCurve,
};
pub use error::{EngineError, Result};
pub use lifecycle::TaskManager;
pub use planner::{
    plan_day, DayPlan, PlanOptions, PlannerConfig, ScheduledTask, TimeBlock, UnscheduledTask,
};
pub use priority::{evaluate_priority, get_by_priority};
pub use recurrence::{expected_interval_days, next_due};
pub use store::{MemoryStore, TaskFilter, TaskStore};
pub use task::{
    CompletionRecord, CurveConfig, CurveType, IntervalUnit, RecurrenceMode, RecurrencePattern,
    RecurrenceType, Task, TaskId, TaskInput, TaskPatch, TaskStatus,
};
