//! Query engine — what is active at an instant, and what comes next.
//!
//! The day is treated as a cycle: a run ending at 24:00 continues into the
//! run starting at 00:00 when both carry the same label.

use schedule_state_domain::attribute::AttributeValue;
use schedule_state_domain::error::CoverageError;
use schedule_state_domain::interval::Interval;
use schedule_state_domain::partition::{Partition, Segment};
use schedule_state_domain::time::TimeOfDay;

/// A maximal run of one label, merged across midnight.
///
/// `start > end` when the run crosses midnight.
#[derive(Debug, PartialEq, Eq)]
pub struct Run<'a, L> {
    pub label: &'a L,
    pub start: TimeOfDay,
    pub end: TimeOfDay,
}

impl<L> Clone for Run<'_, L> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<L> Copy for Run<'_, L> {}

/// The label and maximal interval covering `instant`.
///
/// # Errors
///
/// Returns [`CoverageError`] when no interval covers `instant`, which means
/// the partition was built incorrectly.
pub fn find_active<L: PartialEq + Clone>(
    partition: &Partition<L>,
    instant: TimeOfDay,
) -> Result<(&L, Interval), CoverageError> {
    partition.find(instant).ok_or_else(|| {
        tracing::error!(%instant, "partition does not cover instant");
        CoverageError { instant }
    })
}

/// The run covering `instant`, merged across midnight.
///
/// # Errors
///
/// Returns [`CoverageError`] when no interval covers `instant`.
pub fn active_run<L: PartialEq + Clone>(
    partition: &Partition<L>,
    instant: TimeOfDay,
) -> Result<Run<'_, L>, CoverageError> {
    let segments = partition.segments();
    let index = position(&segments, instant)?;
    Ok(run_of(&segments, index))
}

/// The run that follows the one covering `instant`, or `None` when one
/// label holds the whole day.
///
/// # Errors
///
/// Returns [`CoverageError`] when no interval covers `instant`.
pub fn next_run<L: PartialEq + Clone>(
    partition: &Partition<L>,
    instant: TimeOfDay,
) -> Result<Option<Run<'_, L>>, CoverageError> {
    let segments = partition.segments();
    let index = position(&segments, instant)?;
    if segments.len() < 2 {
        return Ok(None);
    }

    let active = segments[index];
    let mut next = if active.interval.upper().is_end_of_day() {
        0
    } else {
        index + 1
    };
    if segments[next].label == active.label {
        next += 1;
    }
    Ok(segments.get(next).map(|_| run_of(&segments, next)))
}

/// Value of attribute `key` at `instant`, or `fallback` when the attribute
/// has no partition or the partition does not cover `instant`.
#[must_use]
pub fn attribute_at<'a>(
    partition: Option<&'a Partition<AttributeValue>>,
    instant: TimeOfDay,
    fallback: &'a AttributeValue,
) -> &'a AttributeValue {
    partition
        .and_then(|partition| partition.find(instant))
        .map_or(fallback, |(value, _)| value)
}

fn position<L>(segments: &[Segment<'_, L>], instant: TimeOfDay) -> Result<usize, CoverageError> {
    segments
        .iter()
        .position(|segment| segment.interval.contains(instant))
        .ok_or_else(|| {
            tracing::error!(%instant, "partition does not cover instant");
            CoverageError { instant }
        })
}

fn run_of<'a, L: PartialEq>(segments: &[Segment<'a, L>], index: usize) -> Run<'a, L> {
    let segment = segments[index];
    let mut run = Run {
        label: segment.label,
        start: segment.interval.lower(),
        end: segment.interval.upper(),
    };
    let last_index = segments.len() - 1;
    if last_index == 0 {
        return run;
    }
    let (first, last) = (segments[0], segments[last_index]);
    if index == last_index && first.label == segment.label {
        run.end = first.interval.upper();
    }
    if index == 0 && last.label == segment.label {
        run.start = last.interval.lower();
    }
    run
}
