//! Event — a declarative, time-windowed state.
//!
//! An [`EventConfig`] is what the user declares: a state name, optional start
//! and end (literal or template), optional minute offsets, an optional
//! condition and any custom attributes. Once templates, offsets and the
//! condition have been resolved for the current cycle it becomes a
//! [`ResolvedEvent`]: zero, one or two concrete intervals.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::attribute::AttributeValue;
use crate::error::{ValidationError, WrapError};
use crate::id::OverrideId;
use crate::interval::Interval;
use crate::time::TimeOfDay;

/// State used when an event does not name one.
pub const DEFAULT_STATE: &str = "default";

/// Whether `text` contains template markup rather than a literal.
#[must_use]
pub fn is_template(text: &str) -> bool {
    text.contains("{{") || text.contains("{%")
}

/// Minute offset applied to a start or end bound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OffsetSource {
    Minutes(i64),
    Template(String),
}

/// A declared event, as read from configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EventConfig {
    #[serde(default = "default_state")]
    pub state: String,
    pub start: Option<TimeOfDay>,
    pub start_template: Option<String>,
    pub end: Option<TimeOfDay>,
    pub end_template: Option<String>,
    pub start_offset: Option<OffsetSource>,
    pub end_offset: Option<OffsetSource>,
    /// Opaque condition definition, handed to the condition evaluator as-is.
    pub condition: Option<serde_json::Value>,
    pub icon: Option<String>,
    pub comment: Option<String>,
    /// Event-level wraparound permission; falls back to the schedule default.
    pub allow_wrap: Option<bool>,
    #[serde(default)]
    pub extra_attributes: BTreeMap<String, AttributeValue>,
}

fn default_state() -> String {
    DEFAULT_STATE.to_string()
}

impl EventConfig {
    /// Create a builder for constructing an [`EventConfig`].
    #[must_use]
    pub fn builder() -> EventConfigBuilder {
        EventConfigBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyState`] when `state` is blank.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.state.trim().is_empty() {
            return Err(ValidationError::EmptyState);
        }
        Ok(())
    }
}

/// Step-by-step builder for [`EventConfig`].
#[derive(Debug, Default)]
pub struct EventConfigBuilder {
    state: Option<String>,
    start: Option<TimeOfDay>,
    start_template: Option<String>,
    end: Option<TimeOfDay>,
    end_template: Option<String>,
    start_offset: Option<OffsetSource>,
    end_offset: Option<OffsetSource>,
    condition: Option<serde_json::Value>,
    icon: Option<String>,
    comment: Option<String>,
    allow_wrap: Option<bool>,
    extra_attributes: BTreeMap<String, AttributeValue>,
}

impl EventConfigBuilder {
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
    pub fn start_template(mut self, template: impl Into<String>) -> Self {
        self.start_template = Some(template.into());
        self
    }

    #[must_use]
    pub fn end(mut self, end: TimeOfDay) -> Self {
        self.end = Some(end);
        self
    }

    #[must_use]
    pub fn end_template(mut self, template: impl Into<String>) -> Self {
        self.end_template = Some(template.into());
        self
    }

    #[must_use]
    pub fn start_offset(mut self, offset: OffsetSource) -> Self {
        self.start_offset = Some(offset);
        self
    }

    #[must_use]
    pub fn end_offset(mut self, offset: OffsetSource) -> Self {
        self.end_offset = Some(offset);
        self
    }

    #[must_use]
    pub fn condition(mut self, condition: serde_json::Value) -> Self {
        self.condition = Some(condition);
        self
    }

    #[must_use]
    pub fn icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    #[must_use]
    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
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

    /// Consume the builder, validate, and return an [`EventConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyState`] if the state is blank.
    pub fn build(self) -> Result<EventConfig, ValidationError> {
        let event = EventConfig {
            state: self.state.unwrap_or_else(default_state),
            start: self.start,
            start_template: self.start_template,
            end: self.end,
            end_template: self.end_template,
            start_offset: self.start_offset,
            end_offset: self.end_offset,
            condition: self.condition,
            icon: self.icon,
            comment: self.comment,
            allow_wrap: self.allow_wrap,
            extra_attributes: self.extra_attributes,
        };
        event.validate()?;
        Ok(event)
    }
}

/// Turn resolved bounds into concrete intervals.
///
/// - `start < end`: `[start, end)`
/// - `start == end`: nothing (degenerate, not an error)
/// - `start > end`, wrap allowed: `[start, 24:00)` then `[00:00, end)`
///
/// # Errors
///
/// Returns [`WrapError`] when `start > end` and wrapping is not allowed.
pub fn split_window(
    start: TimeOfDay,
    end: TimeOfDay,
    allow_wrap: bool,
) -> Result<Vec<Interval>, WrapError> {
    match (Interval::new(start, end), allow_wrap) {
        (Some(interval), _) if interval.is_empty() => Ok(Vec::new()),
        (Some(interval), _) => Ok(vec![interval]),
        (None, true) => Ok([
            Interval::new(start, TimeOfDay::END_OF_DAY),
            Interval::new(TimeOfDay::START_OF_DAY, end),
        ]
        .into_iter()
        .flatten()
        .filter(|interval| !interval.is_empty())
        .collect()),
        (None, false) => Err(WrapError { start, end }),
    }
}

/// Where a resolved event came from; its position in the fold is its priority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOrigin {
    /// Declared event, by declaration index.
    Base { index: usize },
    /// Temporary override, by id when it has one.
    Override { id: Option<OverrideId> },
}

impl fmt::Display for EventOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Base { index } => write!(f, "event #{index}"),
            Self::Override { id: Some(id) } => write!(f, "override `{id}`"),
            Self::Override { id: None } => f.write_str("anonymous override"),
        }
    }
}

/// An event with concrete intervals for the current cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedEvent {
    pub origin: EventOrigin,
    pub state: String,
    /// Painted in order; wraparound halves are two separate entries.
    pub intervals: Vec<Interval>,
    pub icon: Option<String>,
    pub comment: Option<String>,
    pub attributes: BTreeMap<String, AttributeValue>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> TimeOfDay {
        TimeOfDay::from_hms(h, m, 0).unwrap()
    }

    #[test]
    fn should_produce_single_interval_when_start_before_end() {
        let intervals = split_window(t(8, 0), t(12, 0), false).unwrap();
        assert_eq!(intervals, vec![Interval::new(t(8, 0), t(12, 0)).unwrap()]);
    }

    #[test]
    fn should_produce_nothing_when_window_is_degenerate() {
        assert!(split_window(t(9, 0), t(9, 0), false).unwrap().is_empty());
    }

    #[test]
    fn should_split_into_two_halves_when_wrapping() {
        let intervals = split_window(t(23, 0), t(1, 0), true).unwrap();
        assert_eq!(
            intervals,
            vec![
                Interval::new(t(23, 0), TimeOfDay::END_OF_DAY).unwrap(),
                Interval::new(TimeOfDay::START_OF_DAY, t(1, 0)).unwrap(),
            ]
        );
    }

    #[test]
    fn should_drop_empty_morning_half_when_wrapping_to_midnight() {
        let intervals = split_window(t(22, 0), TimeOfDay::START_OF_DAY, true).unwrap();
        assert_eq!(
            intervals,
            vec![Interval::new(t(22, 0), TimeOfDay::END_OF_DAY).unwrap()]
        );
    }

    #[test]
    fn should_return_wrap_error_when_wrapping_not_allowed() {
        let err = split_window(t(23, 10), t(22, 50), false).unwrap_err();
        assert_eq!(err.start, t(23, 10));
        assert_eq!(err.end, t(22, 50));
    }

    #[test]
    fn should_detect_template_markup() {
        assert!(is_template("{{ states('sensor.x') }}"));
        assert!(is_template("{% if true %}on{% endif %}"));
        assert!(!is_template("low"));
    }

    #[test]
    fn should_default_state_when_built_without_one() {
        let event = EventConfig::builder().start(t(8, 0)).build().unwrap();
        assert_eq!(event.state, DEFAULT_STATE);
    }

    #[test]
    fn should_return_validation_error_when_state_is_blank() {
        let result = EventConfig::builder().state(" ").build();
        assert_eq!(result, Err(ValidationError::EmptyState));
    }

    #[test]
    fn should_deserialize_event_with_offsets_and_attributes() {
        let json = serde_json::json!({
            "state": "asleep",
            "start": "22:30",
            "end_template": "{{ states('sensor.alarm') }}",
            "start_offset": -15,
            "end_offset": "{{ 10 }}",
            "extra_attributes": {"fan_mode": "low", "target": 18.5}
        });
        let event: EventConfig = serde_json::from_value(json).unwrap();
        assert_eq!(event.start, Some(t(22, 30)));
        assert_eq!(event.start_offset, Some(OffsetSource::Minutes(-15)));
        assert!(matches!(event.end_offset, Some(OffsetSource::Template(_))));
        assert_eq!(
            event.extra_attributes.get("target"),
            Some(&AttributeValue::Float(18.5))
        );
    }

    #[test]
    fn should_reject_unknown_event_keys() {
        let json = serde_json::json!({"state": "on", "stat": "typo"});
        assert!(serde_json::from_value::<EventConfig>(json).is_err());
    }

    #[test]
    fn should_display_origin() {
        assert_eq!(EventOrigin::Base { index: 2 }.to_string(), "event #2");
        let id = OverrideId::new("lunch").unwrap();
        assert_eq!(
            EventOrigin::Override { id: Some(id) }.to_string(),
            "override `lunch`"
        );
    }
}
