//! Typed errors surfaced by the engine.

use thiserror::Error;

use crate::task::TaskId;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("task {0} not found")]
    NotFound(TaskId),

    #[error("dependency {0} does not resolve to a task")]
    DepMissing(TaskId),

    #[error("circular dependency through task {0}")]
    Circular(TaskId),

    #[error("task {0} is still a dependency of task {1}")]
    HasDependents(TaskId, TaskId),

    #[error("invalid curve arguments: {0}")]
    InvalidCurveArgs(String),

    #[error("missing curve field: {0}")]
    MissingCurveField(&'static str),

    #[error("invalid HH:MM time: {0:?}")]
    InvalidTime(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
