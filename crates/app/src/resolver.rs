//! Event resolver — turns declared events into concrete intervals for one cycle.
//!
//! Every failure is contained to the event that caused it: the event is
//! dropped, its state lands in [`Resolution::error_states`], and the rest of
//! the schedule resolves normally.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{FixedOffset, TimeDelta};
use schedule_state_domain::attribute::AttributeValue;
use schedule_state_domain::condition::ConditionResult;
use schedule_state_domain::error::{ConditionUnknown, ResolutionError, ScheduleError};
use schedule_state_domain::event::{
    EventConfig, EventOrigin, OffsetSource, ResolvedEvent, is_template, split_window,
};
use schedule_state_domain::schedule::ScheduleConfig;
use schedule_state_domain::time::{TimeOfDay, Timestamp, parse_moment};

use crate::ports::{ConditionEvaluator, TemplateRenderer};

const MAX_OFFSET_SECONDS: i64 = 24 * 60 * 60;

/// Everything one resolution cycle produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resolution {
    /// Value of every declared attribute outside of any event.
    pub defaults: BTreeMap<String, AttributeValue>,
    /// Surviving events, in declaration order.
    pub events: Vec<ResolvedEvent>,
    /// States of events dropped because of an error.
    pub error_states: BTreeSet<String>,
    /// Attributes whose default could not be resolved.
    pub failed_attributes: BTreeSet<String>,
    /// Identifiers read by any template rendered during the cycle.
    pub referenced: BTreeSet<String>,
}

impl Resolution {
    /// Whether anything failed and the cycle should be retried early.
    #[must_use]
    pub fn needs_retry(&self) -> bool {
        !self.error_states.is_empty() || !self.failed_attributes.is_empty()
    }
}

/// Resolves a schedule's declared events against the template and condition ports.
pub struct EventResolver<'a, R, C> {
    renderer: &'a R,
    conditions: &'a C,
    utc_offset: FixedOffset,
}

impl<'a, R: TemplateRenderer, C: ConditionEvaluator> EventResolver<'a, R, C> {
    /// `utc_offset` is used to bring rendered datetimes into local wall-clock time.
    pub fn new(renderer: &'a R, conditions: &'a C, utc_offset: FixedOffset) -> Self {
        Self {
            renderer,
            conditions,
            utc_offset,
        }
    }

    /// Resolve attribute defaults and every declared event for the day of `now`.
    pub fn resolve_schedule(&self, config: &ScheduleConfig, now: Timestamp) -> Resolution {
        let mut resolution = Resolution::default();

        for (key, default) in &config.extra_attributes {
            let value = match self.value(key, default, &mut resolution.referenced) {
                Ok(value) => value,
                Err(err) => {
                    tracing::warn!(%err, attribute = %key, "attribute default failed to resolve");
                    resolution.failed_attributes.insert(key.clone());
                    AttributeValue::Json(serde_json::Value::Null)
                }
            };
            resolution.defaults.insert(key.clone(), value);
        }

        for (index, event) in config.events.iter().enumerate() {
            match self.resolve_event(index, event, config, now, &mut resolution.referenced) {
                Ok(Some(resolved)) => resolution.events.push(resolved),
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(
                        error = ?err,
                        index,
                        state = %event.state,
                        "event dropped for this cycle"
                    );
                    resolution.error_states.insert(event.state.clone());
                }
            }
        }

        resolution
    }

    /// Resolve one event. `Ok(None)` means its condition is false.
    ///
    /// # Errors
    ///
    /// - [`ScheduleError::Condition`] when the condition cannot be evaluated
    /// - [`ScheduleError::Resolution`] when a bound, offset or attribute fails to resolve
    /// - [`ScheduleError::Wrap`] when the window crosses midnight without permission
    pub fn resolve_event(
        &self,
        index: usize,
        event: &EventConfig,
        config: &ScheduleConfig,
        now: Timestamp,
        referenced: &mut BTreeSet<String>,
    ) -> Result<Option<ResolvedEvent>, ScheduleError> {
        if let Some(condition) = &event.condition {
            let variables = serde_json::json!({
                "state": event.state,
                "now": now.to_string(),
            });
            match self.conditions.evaluate(condition, &variables) {
                ConditionResult::True => {}
                ConditionResult::False => {
                    tracing::debug!(
                        index,
                        state = %event.state,
                        "condition is false, event skipped"
                    );
                    return Ok(None);
                }
                ConditionResult::Unknown => {
                    return Err(ConditionUnknown {
                        state: event.state.clone(),
                    }
                    .into());
                }
            }
        }

        let day = now.date();
        let start = self.bound(
            "start",
            event.start,
            event.start_template.as_deref(),
            TimeOfDay::START_OF_DAY,
            referenced,
        )?;
        let end = self.bound(
            "end",
            event.end,
            event.end_template.as_deref(),
            TimeOfDay::END_OF_DAY,
            referenced,
        )?;

        let start = match self.offset("start_offset", event.start_offset.as_ref(), referenced)? {
            Some(offset) => start.shifted(day, offset),
            None => start,
        };
        let end = match self.offset("end_offset", event.end_offset.as_ref(), referenced)? {
            Some(offset) => {
                let shifted = end.shifted(day, offset);
                if shifted == TimeOfDay::START_OF_DAY {
                    TimeOfDay::END_OF_DAY
                } else {
                    shifted
                }
            }
            None => end,
        };

        let allow_wrap = event.allow_wrap.unwrap_or(config.allow_wrap);
        let intervals = split_window(start, end, allow_wrap)?;
        if intervals.is_empty() {
            tracing::debug!(
                index,
                state = %event.state,
                %start,
                "zero-length window, nothing to paint"
            );
        }

        let mut attributes = BTreeMap::new();
        for (key, value) in &event.extra_attributes {
            if !config.extra_attributes.contains_key(key) {
                tracing::warn!(index, attribute = %key, "undeclared attribute ignored");
                continue;
            }
            attributes.insert(key.clone(), self.value(key, value, referenced)?);
        }

        tracing::debug!(
            index,
            state = %event.state,
            %start,
            %end,
            comment = event.comment.as_deref().unwrap_or_default(),
            "event resolved"
        );

        Ok(Some(ResolvedEvent {
            origin: EventOrigin::Base { index },
            state: event.state.clone(),
            intervals,
            icon: event.icon.clone(),
            comment: event.comment.clone(),
            attributes,
        }))
    }

    fn render(
        &self,
        field: &str,
        template: &str,
        referenced: &mut BTreeSet<String>,
    ) -> Result<String, ResolutionError> {
        let rendered = self.renderer.render(template);
        referenced.extend(rendered.referenced);
        if rendered.success {
            Ok(rendered.value)
        } else {
            Err(ResolutionError::TemplateFailed {
                field: field.to_string(),
            })
        }
    }

    /// Literal wins over template; neither means `fallback`.
    fn bound(
        &self,
        field: &str,
        literal: Option<TimeOfDay>,
        template: Option<&str>,
        fallback: TimeOfDay,
        referenced: &mut BTreeSet<String>,
    ) -> Result<TimeOfDay, ResolutionError> {
        if let Some(time) = literal {
            return Ok(time);
        }
        let Some(template) = template else {
            return Ok(fallback);
        };
        let text = if is_template(template) {
            self.render(field, template, referenced)?
        } else {
            template.to_string()
        };
        parse_moment(&text, self.utc_offset)
    }

    /// `None` for a missing or zero offset.
    fn offset(
        &self,
        field: &str,
        source: Option<&OffsetSource>,
        referenced: &mut BTreeSet<String>,
    ) -> Result<Option<TimeDelta>, ResolutionError> {
        let seconds = match source {
            None => return Ok(None),
            Some(OffsetSource::Minutes(minutes)) => minutes
                .checked_mul(60)
                .filter(|seconds| seconds.abs() <= MAX_OFFSET_SECONDS)
                .ok_or_else(|| ResolutionError::InvalidOffset(minutes.to_string()))?,
            Some(OffsetSource::Template(template)) => {
                let text = if is_template(template) {
                    self.render(field, template, referenced)?
                } else {
                    template.clone()
                };
                minutes_to_seconds(&text).ok_or(ResolutionError::InvalidOffset(text))?
            }
        };
        Ok((seconds != 0).then(|| TimeDelta::seconds(seconds)))
    }

    fn value(
        &self,
        key: &str,
        value: &AttributeValue,
        referenced: &mut BTreeSet<String>,
    ) -> Result<AttributeValue, ResolutionError> {
        match value {
            AttributeValue::String(text) if is_template(text) => Ok(AttributeValue::from_rendered(
                &self.render(key, text, referenced)?,
            )),
            other => Ok(other.clone()),
        }
    }
}

/// Float minutes as whole seconds.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn minutes_to_seconds(text: &str) -> Option<i64> {
    let minutes: f64 = text.trim().parse().ok()?;
    let seconds = (minutes * 60.0).round();
    (seconds.is_finite() && seconds.abs() <= MAX_OFFSET_SECONDS as f64).then_some(seconds as i64)
}
