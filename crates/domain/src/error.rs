//! Common error types used across the workspace.
//!
//! Each failure family has its own typed error; [`ScheduleError`] wraps them
//! via `#[from]` so callers can propagate any of them with `?`.

use crate::time::TimeOfDay;

/// Top-level error for schedule computation and override commands.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    #[error("resolution error")]
    Resolution(#[from] ResolutionError),

    #[error("wraparound error")]
    Wrap(#[from] WrapError),

    #[error("validation error")]
    Validation(#[from] ValidationError),

    #[error("condition error")]
    Condition(#[from] ConditionUnknown),

    #[error("partition coverage error")]
    Coverage(#[from] CoverageError),
}

/// A start, end, offset or attribute value could not be turned into a usable value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolutionError {
    #[error("`{0}` is not a recognised time")]
    InvalidTime(String),

    #[error("`{0}` is not a recognised minute offset")]
    InvalidOffset(String),

    #[error("template for `{field}` failed to render")]
    TemplateFailed { field: String },
}

/// `start > end` for a window that is not allowed to cross midnight.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("start {start} is after end {end} and wraparound is not allowed")]
pub struct WrapError {
    pub start: TimeOfDay,
    pub end: TimeOfDay,
}

/// Invariant violations for configuration and override requests.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("name must not be empty")]
    EmptyName,

    #[error("state must not be empty")]
    EmptyState,

    #[error("override id must not be empty")]
    EmptyOverrideId,

    #[error("one of start, end or duration is required")]
    MissingTiming,

    #[error("start, end and duration cannot all be given")]
    OverdeterminedTiming,

    #[error("a start without end or duration has no extent")]
    UnboundedStart,

    #[error("duration must be between 1 and 1440 minutes, got {0}")]
    InvalidDuration(i64),

    #[error("refresh interval must be positive")]
    InvalidRefresh,
}

/// A condition evaluator could not determine the truth of an event's condition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("condition for state `{state}` could not be evaluated")]
pub struct ConditionUnknown {
    pub state: String,
}

/// An instant was not covered by any interval of a partition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no interval covers {instant}")]
pub struct CoverageError {
    pub instant: TimeOfDay,
}
