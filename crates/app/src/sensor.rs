//! Schedule sensor — one schedule's partitions, overrides and command surface.
//!
//! Commands that change overrides never recompute by themselves. They force
//! the refresh deadline to "now", so the next [`ScheduleSensor::update`]
//! recomputes once no matter how many commands were batched before it.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{FixedOffset, Offset, Utc};
use serde::Serialize;

use schedule_state_domain::attribute::AttributeValue;
use schedule_state_domain::error::{CoverageError, ScheduleError, ValidationError};
use schedule_state_domain::event::is_template;
use schedule_state_domain::id::OverrideId;
use schedule_state_domain::overrides::OverrideRequest;
use schedule_state_domain::schedule::ScheduleConfig;
use schedule_state_domain::time::{TimeOfDay, Timestamp};

use crate::overlay::{Schedule, overlay};
use crate::overrides::OverrideStore;
use crate::ports::{ConditionEvaluator, TemplateRenderer};
use crate::query;
use crate::refresh::RefreshPolicy;
use crate::resolver::EventResolver;

/// Id of the override created by the on/off switch commands.
pub const SWITCH_OVERRIDE_ID: &str = "turn_on_off";

const ON: &str = "on";
const OFF: &str = "off";

/// What a schedule looks like at one instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateReport {
    pub name: String,
    pub active_state: String,
    /// Start of the active run, merged across midnight.
    pub start: TimeOfDay,
    pub end: TimeOfDay,
    pub friendly_start: String,
    pub friendly_end: String,
    pub next_state: Option<String>,
    pub next_start: Option<TimeOfDay>,
    pub next_end: Option<TimeOfDay>,
    pub icon: String,
    pub attributes: BTreeMap<String, AttributeValue>,
    pub error_states: BTreeSet<String>,
    pub known_states: BTreeSet<String>,
    pub tracked_identifiers: BTreeSet<String>,
    /// Stored override records; a wraparound override counts twice.
    pub override_count: usize,
}

#[derive(Debug, Clone)]
struct Computed {
    schedule: Schedule,
    defaults: BTreeMap<String, AttributeValue>,
    error_states: BTreeSet<String>,
    tracked: BTreeSet<String>,
}

impl Computed {
    /// Placeholder until the first recompute: the default state all day,
    /// with attribute defaults that still need rendering left out.
    fn initial(config: &ScheduleConfig) -> Self {
        let defaults: BTreeMap<String, AttributeValue> = config
            .extra_attributes
            .iter()
            .map(|(key, value)| {
                let value = match value {
                    AttributeValue::String(text) if is_template(text) => {
                        AttributeValue::Json(serde_json::Value::Null)
                    }
                    other => other.clone(),
                };
                (key.clone(), value)
            })
            .collect();
        Self {
            schedule: overlay(&config.default_state, &defaults, std::iter::empty()),
            defaults,
            error_states: BTreeSet::new(),
            tracked: BTreeSet::new(),
        }
    }
}

/// One schedule and everything needed to answer "what is active now".
pub struct ScheduleSensor<R, C> {
    config: ScheduleConfig,
    renderer: R,
    conditions: C,
    utc_offset: FixedOffset,
    overrides: OverrideStore,
    refresh: RefreshPolicy,
    computed: Computed,
}

impl<R: TemplateRenderer, C: ConditionEvaluator> ScheduleSensor<R, C> {
    /// Create a sensor, rendering datetimes in UTC until told otherwise.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if the configuration is invalid.
    pub fn new(
        config: ScheduleConfig,
        renderer: R,
        conditions: C,
    ) -> Result<Self, ValidationError> {
        config.validate()?;
        Ok(Self {
            refresh: RefreshPolicy::new(config.refresh_minutes, config.minutes_to_refresh_on_error),
            computed: Computed::initial(&config),
            config,
            renderer,
            conditions,
            utc_offset: Utc.fix(),
            overrides: OverrideStore::new(),
        })
    }

    /// Offset used to bring rendered datetimes into local wall-clock time.
    #[must_use]
    pub fn with_utc_offset(mut self, utc_offset: FixedOffset) -> Self {
        self.utc_offset = utc_offset;
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.config.name
    }

    #[must_use]
    pub fn overrides(&self) -> &OverrideStore {
        &self.overrides
    }

    #[must_use]
    pub fn refresh_policy(&self) -> &RefreshPolicy {
        &self.refresh
    }

    /// Declared states plus the states of current overrides.
    #[must_use]
    pub fn known_states(&self) -> BTreeSet<String> {
        let mut states = self.config.declared_states();
        states.extend(self.overrides.iter().map(|record| record.state.clone()));
        states
    }

    /// Recompute every partition now, regardless of the refresh policy.
    ///
    /// Returns `false` when some event or attribute failed to resolve; the
    /// partitions are still replaced and a retry is scheduled.
    #[tracing::instrument(skip(self), fields(schedule = %self.config.name))]
    pub fn recalculate(&mut self, now: Timestamp) -> bool {
        let resolver = EventResolver::new(&self.renderer, &self.conditions, self.utc_offset);
        let resolution = resolver.resolve_schedule(&self.config, now);
        let overrides = self.overrides.resolved(now);
        let schedule = overlay(
            &self.config.default_state,
            &resolution.defaults,
            resolution.events.iter().chain(&overrides),
        );

        self.refresh.mark_refreshed(now);
        let clean = !resolution.needs_retry();
        if !clean {
            let retry_at = self.refresh.schedule_retry(now);
            tracing::warn!(
                error_states = ?resolution.error_states,
                failed_attributes = ?resolution.failed_attributes,
                %retry_at,
                "recomputed with errors"
            );
        } else {
            tracing::info!(
                events = resolution.events.len(),
                overrides = overrides.len(),
                "recomputed"
            );
        }

        self.computed = Computed {
            schedule,
            defaults: resolution.defaults,
            error_states: resolution.error_states,
            tracked: resolution.referenced,
        };
        clean
    }

    /// Expire overrides, recompute when due, and report the state at `now`.
    ///
    /// An override expiring, or one of its records entering or leaving the
    /// day partition, forces the recompute.
    ///
    /// # Errors
    ///
    /// Returns [`CoverageError`] if the computed partition does not cover `now`.
    pub fn update(&mut self, now: Timestamp) -> Result<StateReport, CoverageError> {
        let expired = self.overrides.expire(now) > 0;
        let shifted = self
            .refresh
            .last_refresh()
            .is_some_and(|last| self.overrides.visibility_changed(last, now));
        if expired || shifted {
            self.refresh.request_immediate(now);
        }
        if self.refresh.is_due(now) {
            self.recalculate(now);
        }
        self.report(now)
    }

    /// Report the state at `now` as of the last recompute.
    ///
    /// # Errors
    ///
    /// Returns [`CoverageError`] if the computed partition does not cover `now`.
    pub fn report(&self, now: Timestamp) -> Result<StateReport, CoverageError> {
        let instant = TimeOfDay::of(now);
        let computed = &self.computed;
        let active = query::active_run(&computed.schedule.states, instant)?;
        let next = query::next_run(&computed.schedule.states, instant)?;

        let icon = match query::find_active(&computed.schedule.icons, instant)? {
            (Some(icon), _) => icon.clone(),
            (None, _) if !computed.error_states.is_empty() => self.config.error_icon.clone(),
            (None, _) => self.config.icon.clone(),
        };
        let attributes = computed
            .defaults
            .iter()
            .map(|(key, default)| {
                let value =
                    query::attribute_at(computed.schedule.attributes.get(key), instant, default);
                (key.clone(), value.clone())
            })
            .filter(|(_, value)| !value.is_null())
            .collect();

        Ok(StateReport {
            name: self.config.name.clone(),
            active_state: active.label.clone(),
            start: active.start,
            end: active.end,
            friendly_start: active.start.friendly(),
            friendly_end: active.end.friendly(),
            next_state: next.map(|run| run.label.clone()),
            next_start: next.map(|run| run.start),
            next_end: next.map(|run| run.end),
            icon,
            attributes,
            error_states: computed.error_states.clone(),
            known_states: self.known_states(),
            tracked_identifiers: computed.tracked.clone(),
            override_count: self.overrides.len(),
        })
    }

    /// Create or replace an override; the next update recomputes.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::Validation`] or [`ScheduleError::Wrap`] when the
    /// request is rejected. Nothing is stored in that case.
    #[tracing::instrument(skip(self, request), fields(schedule = %self.config.name))]
    pub fn set_override(
        &mut self,
        request: OverrideRequest,
        now: Timestamp,
    ) -> Result<usize, ScheduleError> {
        let stored = self.overrides.set(
            request,
            now,
            self.config.allow_wrap,
            &self.config.extra_attributes,
        )?;
        self.refresh.request_immediate(now);
        Ok(stored)
    }

    /// Remove an override by id; `false` if no record carries it.
    #[tracing::instrument(skip(self), fields(schedule = %self.config.name))]
    pub fn remove_override(&mut self, id: &OverrideId, now: Timestamp) -> bool {
        let removed = self.overrides.remove(id);
        if removed {
            self.refresh.request_immediate(now);
        }
        removed
    }

    /// Remove every override; `false` if there were none.
    #[tracing::instrument(skip(self), fields(schedule = %self.config.name))]
    pub fn clear_overrides(&mut self, now: Timestamp) -> bool {
        let cleared = self.overrides.clear();
        if cleared {
            self.refresh.request_immediate(now);
        }
        cleared
    }

    /// An outside identifier changed. Returns whether any template reads it.
    pub fn notify_state_change(&mut self, identifier: &str, now: Timestamp) -> bool {
        let tracked = self.computed.tracked.contains(identifier);
        if tracked {
            tracing::debug!(schedule = %self.config.name, identifier, "tracked identifier changed");
            self.refresh.request_immediate(now);
        }
        tracked
    }

    /// Force `on` until the end of the active run.
    ///
    /// Returns `false` when the schedule does not know both `on` and `off`.
    ///
    /// # Errors
    ///
    /// Propagates errors from querying the current run or storing the override.
    pub fn turn_on(&mut self, now: Timestamp) -> Result<bool, ScheduleError> {
        self.switch(ON, now)
    }

    /// Force `off` until the end of the active run.
    ///
    /// # Errors
    ///
    /// See [`turn_on`](Self::turn_on).
    pub fn turn_off(&mut self, now: Timestamp) -> Result<bool, ScheduleError> {
        self.switch(OFF, now)
    }

    /// `off` when currently `on`, `on` otherwise.
    ///
    /// # Errors
    ///
    /// See [`turn_on`](Self::turn_on).
    pub fn toggle(&mut self, now: Timestamp) -> Result<bool, ScheduleError> {
        let current = self.update(now)?.active_state;
        self.switch(if current == ON { OFF } else { ON }, now)
    }

    #[tracing::instrument(skip(self), fields(schedule = %self.config.name))]
    fn switch(&mut self, target: &str, now: Timestamp) -> Result<bool, ScheduleError> {
        let known = self.known_states();
        if !(known.contains(ON) && known.contains(OFF)) {
            tracing::info!("schedule has no on/off states, switch command ignored");
            return Ok(false);
        }

        let active = self.update(now)?;
        let request = OverrideRequest {
            id: Some(OverrideId::new(SWITCH_OVERRIDE_ID)?),
            state: target.to_string(),
            start: None,
            end: Some(active.end),
            duration: None,
            icon: None,
            allow_wrap: None,
            extra_attributes: BTreeMap::new(),
        };
        self.set_override(request, now)?;
        Ok(true)
    }
}
