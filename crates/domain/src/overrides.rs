//! Override — a temporary, user-issued event that outranks every declared event.
//!
//! An [`OverrideRequest`] carries the caller's raw start/end/duration
//! combination. [`OverrideRequest::plan`] turns it into an absolute
//! [`OverrideWindow`] relative to "now", which then yields one or two
//! [`Override`] records (two when the window crosses midnight).

use std::collections::BTreeMap;

use chrono::{NaiveDate, TimeDelta};
use serde::{Deserialize, Serialize};

use crate::attribute::AttributeValue;
use crate::error::{ScheduleError, ValidationError, WrapError};
use crate::event::{EventOrigin, ResolvedEvent};
use crate::id::OverrideId;
use crate::interval::Interval;
use crate::time::{TimeOfDay, Timestamp};

/// Grace period after the logical end before an override is dropped.
pub const EXPIRY_GRACE: TimeDelta = TimeDelta::seconds(30);

/// Longest accepted override duration, in minutes.
pub const MAX_DURATION_MINUTES: i64 = 24 * 60;

/// A request to create or replace an override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OverrideRequest {
    pub id: Option<OverrideId>,
    pub state: String,
    pub start: Option<TimeOfDay>,
    pub end: Option<TimeOfDay>,
    /// Length in minutes.
    pub duration: Option<i64>,
    pub icon: Option<String>,
    /// Only consulted when both `start` and `end` are given.
    pub allow_wrap: Option<bool>,
    #[serde(default)]
    pub extra_attributes: BTreeMap<String, AttributeValue>,
}

impl OverrideRequest {
    /// Create a builder for constructing an [`OverrideRequest`].
    #[must_use]
    pub fn builder() -> OverrideRequestBuilder {
        OverrideRequestBuilder::default()
    }

    /// Check the state name and the start/end/duration combination.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] when:
    /// - `state` is blank ([`ValidationError::EmptyState`])
    /// - none of start, end, duration is given ([`ValidationError::MissingTiming`])
    /// - all three are given ([`ValidationError::OverdeterminedTiming`])
    /// - only `start` is given ([`ValidationError::UnboundedStart`])
    /// - `duration` is outside `1..=1440` ([`ValidationError::InvalidDuration`])
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.state.trim().is_empty() {
            return Err(ValidationError::EmptyState);
        }
        if let Some(minutes) = self.duration {
            if !(1..=MAX_DURATION_MINUTES).contains(&minutes) {
                return Err(ValidationError::InvalidDuration(minutes));
            }
        }
        match (self.start, self.end, self.duration) {
            (None, None, None) => Err(ValidationError::MissingTiming),
            (Some(_), Some(_), Some(_)) => Err(ValidationError::OverdeterminedTiming),
            (Some(_), None, None) => Err(ValidationError::UnboundedStart),
            _ => Ok(()),
        }
    }

    /// Derive the absolute window of this override relative to `now`.
    ///
    /// A missing start defaults to `now`; a missing end is `start + duration`
    /// (or the next occurrence of `end` after `now` when only `end` is known);
    /// `end + duration` counts backwards. Wraparound is always permitted
    /// unless both `start` and `end` were given explicitly, in which case
    /// `allow_wrap` (or `default_wrap`) decides.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::Validation`] when [`validate`](Self::validate) fails.
    pub fn plan(
        &self,
        now: Timestamp,
        default_wrap: bool,
    ) -> Result<OverrideWindow, ScheduleError> {
        self.validate()?;
        let today = now.date();
        let duration = self.duration.map(TimeDelta::minutes);

        let window = match (self.start, self.end, duration) {
            (Some(start), Some(end), None) => {
                let allow_wrap = self.allow_wrap.unwrap_or(default_wrap);
                let start = start.on(today);
                let mut end = end.on(today);
                if end < start && allow_wrap {
                    end += TimeDelta::days(1);
                }
                OverrideWindow {
                    start,
                    end,
                    allow_wrap,
                }
            }
            (Some(start), None, Some(duration)) => {
                let start = start.on(today);
                OverrideWindow::wrapping(start, start + duration)
            }
            (None, Some(end), Some(duration)) => {
                let end = next_occurrence(end, now);
                OverrideWindow::wrapping(end - duration, end)
            }
            (None, Some(end), None) => OverrideWindow::wrapping(now, next_occurrence(end, now)),
            (None, None, Some(duration)) => OverrideWindow::wrapping(now, now + duration),
            (None, None, None) => return Err(ValidationError::MissingTiming.into()),
            (Some(_), Some(_), Some(_)) => {
                return Err(ValidationError::OverdeterminedTiming.into());
            }
            (Some(_), None, None) => return Err(ValidationError::UnboundedStart.into()),
        };
        Ok(window)
    }
}

fn next_occurrence(time: TimeOfDay, now: Timestamp) -> Timestamp {
    let candidate = time.on(now.date());
    if candidate <= now {
        candidate + TimeDelta::days(1)
    } else {
        candidate
    }
}

/// Step-by-step builder for [`OverrideRequest`].
#[derive(Debug, Default)]
pub struct OverrideRequestBuilder {
    id: Option<String>,
    state: Option<String>,
    start: Option<TimeOfDay>,
    end: Option<TimeOfDay>,
    duration: Option<i64>,
    icon: Option<String>,
    allow_wrap: Option<bool>,
    extra_attributes: BTreeMap<String, AttributeValue>,
}

impl OverrideRequestBuilder {
    #[must_use]
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    #[must_use]
    pub fn start(mut self, start: TimeOfDay) -> Self {
        self.start = Some(start);
        self
    }

    #[must_use]
    pub fn end(mut self, end: TimeOfDay) -> Self {
        self.end = Some(end);
        self
    }

    #[must_use]
    pub fn duration_minutes(mut self, minutes: i64) -> Self {
        self.duration = Some(minutes);
        self
    }

    #[must_use]
    pub fn icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    #[must_use]
    pub fn allow_wrap(mut self, allow_wrap: bool) -> Self {
        self.allow_wrap = Some(allow_wrap);
        self
    }

    #[must_use]
    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.extra_attributes.insert(key.into(), value.into());
        self
    }

    /// Consume the builder, validate, and return an [`OverrideRequest`].
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if the id is blank or
    /// [`OverrideRequest::validate`] fails.
    pub fn build(self) -> Result<OverrideRequest, ValidationError> {
        let request = OverrideRequest {
            id: self.id.map(OverrideId::new).transpose()?,
            state: self.state.unwrap_or_default(),
            start: self.start,
            end: self.end,
            duration: self.duration,
            icon: self.icon,
            allow_wrap: self.allow_wrap,
            extra_attributes: self.extra_attributes,
        };
        request.validate()?;
        Ok(request)
    }
}

/// The absolute span of an override.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverrideWindow {
    pub start: Timestamp,
    pub end: Timestamp,
    pub allow_wrap: bool,
}

impl OverrideWindow {
    fn wrapping(start: Timestamp, end: Timestamp) -> Self {
        Self {
            start,
            end,
            allow_wrap: true,
        }
    }

    /// When records built from this window stop being active.
    #[must_use]
    pub fn expires_at(&self) -> Timestamp {
        self.end + EXPIRY_GRACE
    }

    /// Time-of-day intervals covered by the window.
    ///
    /// Empty for a zero-length window; two halves when it crosses midnight.
    ///
    /// # Errors
    ///
    /// Returns [`WrapError`] when the window crosses midnight without permission.
    pub fn intervals(&self) -> Result<Vec<Interval>, WrapError> {
        if self.end <= self.start {
            let (start, end) = (TimeOfDay::of(self.start), TimeOfDay::of(self.end));
            if start > end && !self.allow_wrap {
                return Err(WrapError { start, end });
            }
            return Ok(Vec::new());
        }

        let start = TimeOfDay::of(self.start);
        let end = if self.end - self.start >= TimeDelta::days(1) {
            start
        } else if self.end == TimeOfDay::END_OF_DAY.on(self.start.date()) {
            TimeOfDay::END_OF_DAY
        } else {
            TimeOfDay::of(self.end)
        };
        if start < end {
            return Ok(Interval::new(start, end).into_iter().collect());
        }
        if !self.allow_wrap {
            return Err(WrapError { start, end });
        }
        Ok([
            Interval::new(start, TimeOfDay::END_OF_DAY),
            Interval::new(TimeOfDay::START_OF_DAY, end),
        ]
        .into_iter()
        .flatten()
        .filter(|interval| !interval.is_empty())
        .collect())
    }

    /// [`intervals`](Self::intervals), each paired with the calendar day it
    /// falls on: the start's day, or the following one for the part after
    /// midnight.
    ///
    /// # Errors
    ///
    /// Returns [`WrapError`] when the window crosses midnight without permission.
    pub fn spans(&self) -> Result<Vec<(NaiveDate, Interval)>, WrapError> {
        let start = TimeOfDay::of(self.start);
        let first_day = self.start.date();
        let next_day = (self.start + TimeDelta::days(1)).date();
        Ok(self
            .intervals()?
            .into_iter()
            .map(|interval| {
                let day = if interval.lower() < start {
                    next_day
                } else {
                    first_day
                };
                (day, interval)
            })
            .collect())
    }
}

/// One stored override record. A wraparound override is two records sharing an id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Override {
    pub id: Option<OverrideId>,
    pub state: String,
    pub interval: Interval,
    /// Calendar day the interval falls on.
    pub day: NaiveDate,
    pub expires_at: Timestamp,
    pub icon: Option<String>,
    pub attributes: BTreeMap<String, AttributeValue>,
}

impl Override {
    #[must_use]
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now >= self.expires_at
    }

    /// Whether this record belongs on the day partition used at `now`.
    ///
    /// The partition is read cyclically: whatever lies before `now` on the
    /// clock stands for tomorrow. A record for today is always painted; a
    /// record for tomorrow only once its interval is behind `now`, so it is
    /// never active before it starts.
    #[must_use]
    pub fn is_visible(&self, now: Timestamp) -> bool {
        let today = now.date();
        self.day == today
            || (self.day.signed_duration_since(today) == TimeDelta::days(1)
                && TimeOfDay::of(now) >= self.interval.upper())
    }

    /// This record as an event to layer after the declared ones.
    #[must_use]
    pub fn to_resolved(&self) -> ResolvedEvent {
        ResolvedEvent {
            origin: EventOrigin::Override {
                id: self.id.clone(),
            },
            state: self.state.clone(),
            intervals: vec![self.interval],
            icon: self.icon.clone(),
            comment: None,
            attributes: self.attributes.clone(),
        }
    }
}
