//! Schedule — the declared configuration of one schedule sensor.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::attribute::AttributeValue;
use crate::error::ValidationError;
use crate::event::{DEFAULT_STATE, EventConfig};

pub const DEFAULT_ICON: &str = "mdi:calendar-check";
pub const DEFAULT_ERROR_ICON: &str = "mdi:calendar-alert";
pub const DEFAULT_REFRESH_MINUTES: u32 = 6 * 60;
pub const DEFAULT_ERROR_REFRESH_MINUTES: u32 = 5;

/// Everything needed to build one schedule sensor.
///
/// `extra_attributes` declares the attribute names the schedule exposes and
/// their default values (literal or template). Events and overrides may
/// only set attributes declared here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScheduleConfig {
    pub name: String,
    pub default_state: String,
    pub icon: String,
    pub error_icon: String,
    pub refresh_minutes: u32,
    pub minutes_to_refresh_on_error: u32,
    /// Wraparound default for events and explicit override windows.
    pub allow_wrap: bool,
    pub extra_attributes: BTreeMap<String, AttributeValue>,
    pub events: Vec<EventConfig>,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            default_state: DEFAULT_STATE.to_string(),
            icon: DEFAULT_ICON.to_string(),
            error_icon: DEFAULT_ERROR_ICON.to_string(),
            refresh_minutes: DEFAULT_REFRESH_MINUTES,
            minutes_to_refresh_on_error: DEFAULT_ERROR_REFRESH_MINUTES,
            allow_wrap: false,
            extra_attributes: BTreeMap::new(),
            events: Vec::new(),
        }
    }
}

impl ScheduleConfig {
    /// Create a builder for constructing a [`ScheduleConfig`].
    #[must_use]
    pub fn builder() -> ScheduleConfigBuilder {
        ScheduleConfigBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] when the name or default state is blank,
    /// a refresh interval is zero, or an event fails its own validation.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        if self.default_state.trim().is_empty() {
            return Err(ValidationError::EmptyState);
        }
        if self.refresh_minutes == 0 || self.minutes_to_refresh_on_error == 0 {
            return Err(ValidationError::InvalidRefresh);
        }
        self.events.iter().try_for_each(EventConfig::validate)
    }

    /// Declared attribute names.
    pub fn attribute_keys(&self) -> impl Iterator<Item = &str> {
        self.extra_attributes.keys().map(String::as_str)
    }

    /// The default state and every state a declared event can produce.
    #[must_use]
    pub fn declared_states(&self) -> BTreeSet<String> {
        std::iter::once(self.default_state.clone())
            .chain(self.events.iter().map(|event| event.state.clone()))
            .collect()
    }
}

/// Step-by-step builder for [`ScheduleConfig`].
#[derive(Debug, Default)]
pub struct ScheduleConfigBuilder {
    config: ScheduleConfig,
}

impl ScheduleConfigBuilder {
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    #[must_use]
    pub fn default_state(mut self, state: impl Into<String>) -> Self {
        self.config.default_state = state.into();
        self
    }

    #[must_use]
    pub fn icon(mut self, icon: impl Into<String>) -> Self {
        self.config.icon = icon.into();
        self
    }

    #[must_use]
    pub fn error_icon(mut self, icon: impl Into<String>) -> Self {
        self.config.error_icon = icon.into();
        self
    }

    #[must_use]
    pub fn refresh_minutes(mut self, minutes: u32) -> Self {
        self.config.refresh_minutes = minutes;
        self
    }

    #[must_use]
    pub fn minutes_to_refresh_on_error(mut self, minutes: u32) -> Self {
        self.config.minutes_to_refresh_on_error = minutes;
        self
    }

    #[must_use]
    pub fn allow_wrap(mut self, allow_wrap: bool) -> Self {
        self.config.allow_wrap = allow_wrap;
        self
    }

    /// Declare an attribute and its default value.
    #[must_use]
    pub fn attribute(mut self, key: impl Into<String>, default: impl Into<AttributeValue>) -> Self {
        self.config
            .extra_attributes
            .insert(key.into(), default.into());
        self
    }

    #[must_use]
    pub fn event(mut self, event: EventConfig) -> Self {
        self.config.events.push(event);
        self
    }

    /// Consume the builder, validate, and return a [`ScheduleConfig`].
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if [`ScheduleConfig::validate`] fails.
    pub fn build(self) -> Result<ScheduleConfig, ValidationError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
