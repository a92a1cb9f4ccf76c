//! Tick loop state: every configured sensor plus the last state each reported.

use std::collections::HashMap;

use schedule_state_app::ports::{ConditionEvaluator, TemplateRenderer};
use schedule_state_app::sensor::{ScheduleSensor, StateReport};
use schedule_state_domain::time::Timestamp;

use crate::command::{Command, CommandError, Outcome};

/// Drives a set of sensors and logs their transitions.
pub struct Daemon<R, C> {
    sensors: Vec<ScheduleSensor<R, C>>,
    last_states: HashMap<String, String>,
}

impl<R: TemplateRenderer, C: ConditionEvaluator> Daemon<R, C> {
    pub fn new(sensors: Vec<ScheduleSensor<R, C>>) -> Self {
        Self {
            sensors,
            last_states: HashMap::new(),
        }
    }

    #[must_use]
    pub fn sensor_count(&self) -> usize {
        self.sensors.len()
    }

    /// Update every sensor at `now` and return the reports that succeeded.
    ///
    /// A sensor that fails to report is logged and skipped; the others
    /// are unaffected.
    pub fn tick(&mut self, now: Timestamp) -> Vec<StateReport> {
        let mut reports = Vec::with_capacity(self.sensors.len());
        for sensor in &mut self.sensors {
            match sensor.update(now) {
                Ok(report) => {
                    let previous = self
                        .last_states
                        .insert(report.name.clone(), report.active_state.clone());
                    if previous.as_deref() != Some(report.active_state.as_str()) {
                        tracing::info!(
                            schedule = %report.name,
                            from = previous.as_deref().unwrap_or("-"),
                            to = %report.active_state,
                            until = %report.friendly_end,
                            "state changed"
                        );
                    }
                    reports.push(report);
                }
                Err(err) => {
                    tracing::error!(%err, schedule = %sensor.name(), "failed to report state");
                }
            }
        }
        reports
    }

    /// Run one command against the schedule it names.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::UnknownSchedule`] when no sensor carries the
    /// name, or the sensor's own error when it rejects the command.
    pub fn apply(&mut self, command: Command, now: Timestamp) -> Result<Outcome, CommandError> {
        let outcome = match command {
            Command::SetOverride { schedule, request } => {
                Outcome::Stored(self.sensor_mut(&schedule)?.set_override(request, now)?)
            }
            Command::RemoveOverride { schedule, id } => {
                Outcome::Changed(self.sensor_mut(&schedule)?.remove_override(&id, now))
            }
            Command::ClearOverrides { schedule } => {
                Outcome::Changed(self.sensor_mut(&schedule)?.clear_overrides(now))
            }
            Command::Recalculate { schedule } => {
                Outcome::Changed(self.sensor_mut(&schedule)?.recalculate(now))
            }
            Command::TurnOn { schedule } => {
                Outcome::Changed(self.sensor_mut(&schedule)?.turn_on(now)?)
            }
            Command::TurnOff { schedule } => {
                Outcome::Changed(self.sensor_mut(&schedule)?.turn_off(now)?)
            }
            Command::Toggle { schedule } => {
                Outcome::Changed(self.sensor_mut(&schedule)?.toggle(now)?)
            }
            Command::NotifyStateChange { identifier } => {
                let mut tracked = false;
                for sensor in &mut self.sensors {
                    tracked |= sensor.notify_state_change(&identifier, now);
                }
                Outcome::Changed(tracked)
            }
        };
        Ok(outcome)
    }

    /// Parse and apply one input line, logging the result. Blank lines are ignored.
    pub fn handle_line(&mut self, line: &str, now: Timestamp) -> Option<Outcome> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        match Command::parse(line).and_then(|command| self.apply(command, now)) {
            Ok(outcome) => {
                tracing::info!(%outcome, "command applied");
                Some(outcome)
            }
            Err(err) => {
                tracing::warn!(%err, "command rejected");
                None
            }
        }
    }

    fn sensor_mut(&mut self, name: &str) -> Result<&mut ScheduleSensor<R, C>, CommandError> {
        self.sensors
            .iter_mut()
            .find(|sensor| sensor.name() == name)
            .ok_or_else(|| CommandError::UnknownSchedule(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use schedule_state_app::builtin::{LiteralRenderer, StaticConditions};
    use schedule_state_domain::event::EventConfig;
    use schedule_state_domain::id::OverrideId;
    use schedule_state_domain::overrides::OverrideRequest;
    use schedule_state_domain::schedule::ScheduleConfig;
    use schedule_state_domain::time::TimeOfDay;

    use super::*;

    fn at(h: u32, m: u32) -> Timestamp {
        NaiveDate::from_ymd_opt(2021, 11, 20)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn sensor(name: &str) -> ScheduleSensor<LiteralRenderer, StaticConditions> {
        let config = ScheduleConfig::builder()
            .name(name)
            .default_state("off")
            .event(
                EventConfig::builder()
                    .state("on")
                    .start(TimeOfDay::from_hms(8, 0, 0).unwrap())
                    .end(TimeOfDay::from_hms(9, 0, 0).unwrap())
                    .build()
                    .unwrap(),
            )
            .build()
            .unwrap();
        ScheduleSensor::new(config, LiteralRenderer, StaticConditions).unwrap()
    }

    #[test]
    fn should_report_every_sensor_on_each_tick() {
        let mut daemon = Daemon::new(vec![sensor("a"), sensor("b")]);
        let reports = daemon.tick(at(8, 30));

        assert_eq!(daemon.sensor_count(), 2);
        let states: Vec<(&str, &str)> = reports
            .iter()
            .map(|r| (r.name.as_str(), r.active_state.as_str()))
            .collect();
        assert_eq!(states, vec![("a", "on"), ("b", "on")]);
    }

    #[test]
    fn should_remember_last_state_between_ticks() {
        let mut daemon = Daemon::new(vec![sensor("a")]);
        daemon.tick(at(7, 0));
        assert_eq!(daemon.last_states["a"], "off");
        daemon.tick(at(8, 0));
        assert_eq!(daemon.last_states["a"], "on");
    }

    #[test]
    fn should_route_commands_to_the_named_schedule() {
        let mut daemon = Daemon::new(vec![sensor("a"), sensor("b")]);
        let request = OverrideRequest::builder()
            .id("boost")
            .state("on")
            .duration_minutes(30)
            .build()
            .unwrap();
        let command = Command::SetOverride {
            schedule: "b".to_string(),
            request,
        };

        assert_eq!(
            daemon.apply(command, at(10, 0)).unwrap(),
            Outcome::Stored(1)
        );
        let states: Vec<String> = daemon
            .tick(at(10, 15))
            .into_iter()
            .map(|r| r.active_state)
            .collect();
        assert_eq!(states, vec!["off", "on"]);

        let command = Command::RemoveOverride {
            schedule: "b".to_string(),
            id: OverrideId::new("boost").unwrap(),
        };
        assert_eq!(
            daemon.apply(command, at(10, 20)).unwrap(),
            Outcome::Changed(true)
        );
        assert_eq!(daemon.tick(at(10, 20))[1].active_state, "off");
    }

    #[test]
    fn should_reject_command_for_unknown_schedule() {
        let mut daemon = Daemon::new(vec![sensor("a")]);
        let command = Command::Toggle {
            schedule: "missing".to_string(),
        };
        assert!(matches!(
            daemon.apply(command, at(10, 0)),
            Err(CommandError::UnknownSchedule(name)) if name == "missing"
        ));
    }

    #[test]
    fn should_toggle_through_command_line() {
        let mut daemon = Daemon::new(vec![sensor("a")]);
        let outcome = daemon.handle_line(r#"{"command":"toggle","schedule":"a"}"#, at(8, 30));

        assert_eq!(outcome, Some(Outcome::Changed(true)));
        assert_eq!(daemon.tick(at(8, 45))[0].active_state, "off");
        assert_eq!(daemon.tick(at(9, 0))[0].active_state, "off");
    }

    #[test]
    fn should_skip_blank_and_malformed_lines() {
        let mut daemon = Daemon::new(vec![sensor("a")]);
        assert_eq!(daemon.handle_line("   ", at(8, 0)), None);
        assert_eq!(daemon.handle_line("{not json", at(8, 0)), None);
        assert_eq!(daemon.tick(at(8, 30))[0].active_state, "on");
    }

    #[test]
    fn should_report_untracked_identifier() {
        let mut daemon = Daemon::new(vec![sensor("a")]);
        let command = Command::NotifyStateChange {
            identifier: "sensor.unused".to_string(),
        };
        assert_eq!(
            daemon.apply(command, at(8, 0)).unwrap(),
            Outcome::Changed(false)
        );
    }
}
