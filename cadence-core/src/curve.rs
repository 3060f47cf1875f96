//! Priority curves: five variants mapping an instant to a scalar priority.
//!
//! `Curve` is a sum type with a single possibly-suspending `evaluate` entry
//! point. Four variants are pure functions of time; only `Blocked` consults
//! the task store. Construction validates bounds; the factory at the bottom
//! builds a curve from a persisted `CurveConfig` plus optional task context.

use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Duration, Utc};

use crate::error::{EngineError, Result};
use crate::recurrence::expected_interval_days;
use crate::store::TaskStore;
use crate::task::{
    CurveConfig, CurveType, RecurrenceMode, RecurrencePattern, Task, TaskId, TaskInput, TaskStatus,
};

pub const DEFAULT_EXPONENT: f64 = 2.0;
pub const DEFAULT_WINDOW_PRIORITY: f64 = 1.0;
pub const DEFAULT_BUILDUP_RATE: f64 = 0.1;
/// Ramp span assumed when a config names no deadline.
pub const DEFAULT_HORIZON_DAYS: i64 = 7;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Descriptive view of a curve, for logs and API surfaces.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct CurveMetadata {
    pub curve_type: CurveType,
    pub description: String,
}

/// Ramps linearly from 0 at `start` to 1 at `deadline`, then keeps growing
/// at the same rate while overdue.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearCurve {
    start: DateTime<Utc>,
    deadline: DateTime<Utc>,
}

impl LinearCurve {
    pub fn new(start: DateTime<Utc>, deadline: DateTime<Utc>) -> Result<Self> {
        if deadline <= start {
            return Err(EngineError::InvalidCurveArgs(format!(
                "deadline {deadline} is not after start {start}"
            )));
        }
        Ok(Self { start, deadline })
    }

    pub fn calculate(&self, at: DateTime<Utc>) -> f64 {
        if at < self.start {
            return 0.0;
        }
        let span = (self.deadline - self.start).num_seconds() as f64;
        if at > self.deadline {
            let over = (at - self.deadline).num_seconds() as f64;
            1.0 + over / span
        } else {
            (at - self.start).num_seconds() as f64 / span
        }
    }
}

/// Like `LinearCurve` inside the ramp, but progress is raised to `exponent`
/// so urgency stays low until the deadline approaches. Overdue growth is the
/// plain linear formula.
#[derive(Debug, Clone, PartialEq)]
pub struct ExponentialCurve {
    start: DateTime<Utc>,
    deadline: DateTime<Utc>,
    exponent: f64,
}

impl ExponentialCurve {
    pub fn new(start: DateTime<Utc>, deadline: DateTime<Utc>, exponent: f64) -> Result<Self> {
        if deadline <= start {
            return Err(EngineError::InvalidCurveArgs(format!(
                "deadline {deadline} is not after start {start}"
            )));
        }
        if !(1.0..=5.0).contains(&exponent) {
            return Err(EngineError::InvalidCurveArgs(format!(
                "exponent {exponent} outside [1.0, 5.0]"
            )));
        }
        Ok(Self {
            start,
            deadline,
            exponent,
        })
    }

    pub fn calculate(&self, at: DateTime<Utc>) -> f64 {
        if at < self.start {
            return 0.0;
        }
        let span = (self.deadline - self.start).num_seconds() as f64;
        if at > self.deadline {
            let over = (at - self.deadline).num_seconds() as f64;
            1.0 + over / span
        } else {
            let progress = (at - self.start).num_seconds() as f64 / span;
            progress.powf(self.exponent)
        }
    }
}

/// Constant priority `p` inside `[window_start, window_end]` (both ends
/// inclusive), zero outside.
#[derive(Debug, Clone, PartialEq)]
pub struct HardWindowCurve {
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    priority: f64,
}

impl HardWindowCurve {
    pub fn new(
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        priority: f64,
    ) -> Result<Self> {
        if window_end <= window_start {
            return Err(EngineError::InvalidCurveArgs(format!(
                "window end {window_end} is not after window start {window_start}"
            )));
        }
        if !(0.0..=2.0).contains(&priority) {
            return Err(EngineError::InvalidCurveArgs(format!(
                "priority {priority} outside [0.0, 2.0]"
            )));
        }
        Ok(Self {
            window_start,
            window_end,
            priority,
        })
    }

    pub fn calculate(&self, at: DateTime<Utc>) -> f64 {
        if self.window_start <= at && at <= self.window_end {
            self.priority
        } else {
            0.0
        }
    }
}

/// Pressure that builds as a recurring task approaches (calendar mode) or
/// drifts past (completion mode) its expected interval.
#[derive(Debug, Clone, PartialEq)]
pub struct AccumulatorCurve {
    pattern: RecurrencePattern,
    last_completed: Option<DateTime<Utc>>,
    next_due: DateTime<Utc>,
    buildup_rate: f64,
}

impl AccumulatorCurve {
    pub fn new(
        pattern: RecurrencePattern,
        last_completed: Option<DateTime<Utc>>,
        next_due: DateTime<Utc>,
        buildup_rate: f64,
    ) -> Self {
        Self {
            pattern,
            last_completed,
            next_due,
            buildup_rate,
        }
    }

    pub fn calculate(&self, at: DateTime<Utc>) -> f64 {
        let interval_days = expected_interval_days(&self.pattern);
        match self.pattern.mode {
            RecurrenceMode::Calendar => {
                let until_due = (self.next_due - at).num_seconds() as f64 / SECONDS_PER_DAY;
                let half = interval_days / 2.0;
                if until_due > half {
                    // plenty of time: a small background hum
                    0.2
                } else if until_due < 0.0 {
                    (1.0 + (-until_due) * self.buildup_rate).min(1.5)
                } else {
                    // linear ramp from 0.2 to 1.0 over the back half
                    0.2 + (1.0 - until_due / half) * 0.8
                }
            }
            RecurrenceMode::Completion => {
                let last = self.last_completed.unwrap_or_else(|| {
                    at - Duration::seconds((interval_days * SECONDS_PER_DAY) as i64)
                });
                let since_days = (at - last).num_seconds() as f64 / SECONDS_PER_DAY;
                let ratio = since_days / interval_days;
                if ratio < 0.5 {
                    0.1
                } else if ratio < 0.8 {
                    0.3
                } else if ratio < 1.0 {
                    0.6
                } else if ratio < 1.2 {
                    0.9
                } else {
                    1.0
                }
            }
        }
    }
}

/// Gates an inner curve on dependency completion: while any dependency is
/// missing or not Completed, priority is pinned to zero.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockedCurve {
    dependencies: Vec<TaskId>,
    inner: Box<Curve>,
}

impl BlockedCurve {
    pub fn new(dependencies: Vec<TaskId>, inner: Curve) -> Result<Self> {
        if dependencies.is_empty() {
            return Err(EngineError::InvalidCurveArgs(
                "blocked curve needs at least one dependency".to_string(),
            ));
        }
        if matches!(inner, Curve::Blocked(_)) {
            return Err(EngineError::InvalidCurveArgs(
                "blocked curve cannot nest another blocked curve".to_string(),
            ));
        }
        Ok(Self {
            dependencies,
            inner: Box::new(inner),
        })
    }

    pub async fn calculate(&self, store: &dyn TaskStore, at: DateTime<Utc>) -> Result<f64> {
        for &id in &self.dependencies {
            match store.get(id).await? {
                Some(dep) if dep.status == TaskStatus::Completed => {}
                _ => return Ok(0.0),
            }
        }
        // boxed to break the async cycle; the constructor keeps nesting out
        let inner: Pin<Box<dyn Future<Output = Result<f64>> + '_>> =
            Box::pin(self.inner.evaluate(store, at));
        inner.await
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Curve {
    Linear(LinearCurve),
    Exponential(ExponentialCurve),
    HardWindow(HardWindowCurve),
    Accumulator(AccumulatorCurve),
    Blocked(BlockedCurve),
}

impl Curve {
    /// Priority at `at`. Every variant goes through here so callers never
    /// care which ones actually touch the store.
    pub async fn evaluate(&self, store: &dyn TaskStore, at: DateTime<Utc>) -> Result<f64> {
        match self {
            Curve::Linear(c) => Ok(c.calculate(at)),
            Curve::Exponential(c) => Ok(c.calculate(at)),
            Curve::HardWindow(c) => Ok(c.calculate(at)),
            Curve::Accumulator(c) => Ok(c.calculate(at)),
            Curve::Blocked(c) => c.calculate(store, at).await,
        }
    }

    pub fn curve_type(&self) -> CurveType {
        match self {
            Curve::Linear(_) => CurveType::Linear,
            Curve::Exponential(_) => CurveType::Exponential,
            Curve::HardWindow(_) => CurveType::HardWindow,
            Curve::Accumulator(_) => CurveType::Accumulator,
            Curve::Blocked(_) => CurveType::Blocked,
        }
    }

    pub fn metadata(&self) -> CurveMetadata {
        let description = match self {
            Curve::Linear(c) => format!("linear ramp {} .. {}", c.start, c.deadline),
            Curve::Exponential(c) => {
                format!("exponential ramp {} .. {} (k={})", c.start, c.deadline, c.exponent)
            }
            Curve::HardWindow(c) => format!(
                "constant {} inside {} ..= {}",
                c.priority, c.window_start, c.window_end
            ),
            Curve::Accumulator(c) => format!(
                "{:?} accumulator, next due {}",
                c.pattern.mode, c.next_due
            ),
            Curve::Blocked(c) => format!(
                "gated on {} dependencies, then {:?}",
                c.dependencies.len(),
                c.inner.curve_type()
            ),
        };
        CurveMetadata {
            curve_type: self.curve_type(),
            description,
        }
    }
}

fn ramp_bounds(config: &CurveConfig, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = config.start_date.unwrap_or(now);
    let deadline = config
        .deadline
        .unwrap_or(now + Duration::days(DEFAULT_HORIZON_DAYS));
    (start, deadline)
}

/// Build a curve from a persisted config.
///
/// `store` is the dependency-checker handle required by blocked curves;
/// `task` supplies recurrence state for accumulators. Missing required
/// fields surface as `MissingCurveField`, bad bounds as `InvalidCurveArgs`.
pub fn build_curve(
    config: &CurveConfig,
    store: Option<&dyn TaskStore>,
    task: Option<&Task>,
    now: DateTime<Utc>,
) -> Result<Curve> {
    match config.kind {
        CurveType::Linear => {
            let (start, deadline) = ramp_bounds(config, now);
            Ok(Curve::Linear(LinearCurve::new(start, deadline)?))
        }
        CurveType::Exponential => {
            let (start, deadline) = ramp_bounds(config, now);
            let exponent = config.exponent.unwrap_or(DEFAULT_EXPONENT);
            Ok(Curve::Exponential(ExponentialCurve::new(
                start, deadline, exponent,
            )?))
        }
        CurveType::HardWindow => {
            let window_start = config
                .window_start
                .ok_or(EngineError::MissingCurveField("window_start"))?;
            let window_end = config
                .window_end
                .ok_or(EngineError::MissingCurveField("window_end"))?;
            let priority = config.priority.unwrap_or(DEFAULT_WINDOW_PRIORITY);
            Ok(Curve::HardWindow(HardWindowCurve::new(
                window_start,
                window_end,
                priority,
            )?))
        }
        CurveType::Blocked => {
            if store.is_none() {
                return Err(EngineError::MissingCurveField("dependency checker"));
            }
            let dependencies = config
                .dependencies
                .clone()
                .ok_or(EngineError::MissingCurveField("dependencies"))?;

            let inner_kind = config.then_curve.unwrap_or(CurveType::Linear);
            if inner_kind == CurveType::Blocked {
                return Err(EngineError::InvalidCurveArgs(
                    "blocked curve cannot nest another blocked curve".to_string(),
                ));
            }
            let inner_config = CurveConfig {
                kind: inner_kind,
                dependencies: None,
                then_curve: None,
                ..config.clone()
            };
            let inner = build_curve(&inner_config, store, task, now)?;
            Ok(Curve::Blocked(BlockedCurve::new(dependencies, inner)?))
        }
        CurveType::Accumulator => {
            let pattern = config
                .recurrence
                .clone()
                .or_else(|| task.and_then(|t| t.recurrence.clone()))
                .ok_or(EngineError::MissingCurveField("recurrence"))?;
            let next_due = task.and_then(|t| t.next_due_at).unwrap_or(now);
            let last_completed = task.and_then(|t| t.last_completed_at);
            let buildup_rate = config.buildup_rate.unwrap_or(DEFAULT_BUILDUP_RATE);
            Ok(Curve::Accumulator(AccumulatorCurve::new(
                pattern,
                last_completed,
                next_due,
                buildup_rate,
            )))
        }
    }
}

/// Curve config assigned at creation when the caller didn't pick one:
/// recurring tasks get an accumulator, everything else a linear ramp.
pub fn default_curve_config(input: &TaskInput) -> CurveConfig {
    match &input.curve {
        Some(config) => config.clone(),
        None => match &input.recurrence {
            Some(pattern) => CurveConfig {
                kind: CurveType::Accumulator,
                recurrence: Some(pattern.clone()),
                ..CurveConfig::default()
            },
            None => CurveConfig::default(),
        },
    }
}
