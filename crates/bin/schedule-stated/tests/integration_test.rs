//! End-to-end tests for whole schedules.
//!
//! Each test builds a sensor from configuration with the in-process template
//! and condition ports the daemon wires in, then drives it through `update`
//! with explicit timestamps. No clock is read.

use chrono::{NaiveDate, TimeDelta};
use schedule_state_app::builtin::{LiteralRenderer, StaticConditions};
use schedule_state_app::sensor::{ScheduleSensor, StateReport};
use schedule_state_domain::attribute::AttributeValue;
use schedule_state_domain::error::ScheduleError;
use schedule_state_domain::event::EventConfig;
use schedule_state_domain::id::OverrideId;
use schedule_state_domain::overrides::OverrideRequest;
use schedule_state_domain::schedule::ScheduleConfig;
use schedule_state_domain::time::{TimeOfDay, Timestamp};

type Sensor = ScheduleSensor<LiteralRenderer, StaticConditions>;

fn t(h: u32, m: u32) -> TimeOfDay {
    TimeOfDay::from_hms(h, m, 0).unwrap()
}

fn at_hms(h: u32, m: u32, s: u32) -> Timestamp {
    NaiveDate::from_ymd_opt(2021, 11, 20)
        .unwrap()
        .and_hms_opt(h, m, s)
        .unwrap()
}

fn at(h: u32, m: u32) -> Timestamp {
    at_hms(h, m, 0)
}

fn event(state: &str, start: TimeOfDay, end: TimeOfDay) -> EventConfig {
    EventConfig::builder()
        .state(state)
        .start(start)
        .end(end)
        .build()
        .unwrap()
}

fn sensor(config: ScheduleConfig) -> Sensor {
    ScheduleSensor::new(config, LiteralRenderer, StaticConditions).unwrap()
}

fn state_at(sensor: &mut Sensor, now: Timestamp) -> String {
    sensor.update(now).unwrap().active_state
}

fn run(report: &StateReport) -> (TimeOfDay, TimeOfDay) {
    (report.start, report.end)
}

// ---------------------------------------------------------------------------
// Declared events
// ---------------------------------------------------------------------------

#[test]
fn should_let_later_event_win_where_events_overlap() {
    let config = ScheduleConfig::builder()
        .name("priority")
        .default_state("idle")
        .event(event("first", t(8, 0), t(12, 0)))
        .event(event("second", t(10, 0), t(14, 0)))
        .build()
        .unwrap();
    let mut sensor = sensor(config);

    let report = sensor.update(at(9, 0)).unwrap();
    assert_eq!(report.active_state, "first");
    assert_eq!(run(&report), (t(8, 0), t(10, 0)));
    assert_eq!(report.next_state.as_deref(), Some("second"));

    assert_eq!(state_at(&mut sensor, at(11, 0)), "second");
    assert_eq!(state_at(&mut sensor, at(13, 59)), "second");
    assert_eq!(state_at(&mut sensor, at(14, 0)), "idle");
}

#[test]
fn should_merge_wraparound_run_and_skip_its_other_half() {
    let config = ScheduleConfig::builder()
        .name("night")
        .allow_wrap(true)
        .event(event("late", t(22, 0), t(2, 0)))
        .build()
        .unwrap();
    let mut sensor = sensor(config);

    let report = sensor.update(at(23, 30)).unwrap();
    assert_eq!(report.active_state, "late");
    assert_eq!(run(&report), (t(22, 0), t(2, 0)));
    assert_eq!(report.next_state.as_deref(), Some("default"));
    assert_eq!(report.next_start, Some(t(2, 0)));
    assert_eq!(report.next_end, Some(t(22, 0)));

    let report = sensor.update(at(1, 0)).unwrap();
    assert_eq!(report.active_state, "late");
    assert_eq!(run(&report), (t(22, 0), t(2, 0)));
}

#[test]
fn should_report_night_run_across_midnight() {
    let config = ScheduleConfig::builder()
        .name("sleep")
        .default_state("awake")
        .event(
            EventConfig::builder()
                .state("asleep")
                .start(t(22, 30))
                .end(t(5, 30))
                .allow_wrap(true)
                .build()
                .unwrap(),
        )
        .build()
        .unwrap();
    let mut sensor = sensor(config);

    let report = sensor.update(at(3, 0)).unwrap();
    assert_eq!(report.active_state, "asleep");
    assert_eq!(report.friendly_start, "22:30:00");
    assert_eq!(report.friendly_end, "05:30:00");
    assert_eq!(report.next_state.as_deref(), Some("awake"));
}

#[test]
fn should_contain_wrap_error_to_offending_event() {
    let config = ScheduleConfig::builder()
        .name("strict")
        .event(event("on", t(6, 0), t(9, 0)))
        .event(event("late", t(22, 0), t(2, 0)))
        .build()
        .unwrap();
    let mut sensor = sensor(config);

    let report = sensor.update(at(7, 0)).unwrap();
    assert_eq!(report.active_state, "on");
    assert!(report.error_states.contains("late"));
    assert_eq!(state_at(&mut sensor, at(23, 0)), "default");
}

#[test]
fn should_keep_layering_other_events_when_one_fails() {
    let config = ScheduleConfig::builder()
        .name("mixed")
        .default_state("off")
        .minutes_to_refresh_on_error(5)
        .event(event("morning", t(6, 0), t(9, 0)))
        .event(
            EventConfig::builder()
                .state("broken")
                .start(t(10, 0))
                .end_template("{{ states('input_datetime.end') }}")
                .build()
                .unwrap(),
        )
        .event(event("evening", t(18, 0), t(20, 0)))
        .build()
        .unwrap();
    let mut sensor = sensor(config);

    let report = sensor.update(at(7, 0)).unwrap();
    assert_eq!(report.active_state, "morning");
    assert_eq!(
        report
            .error_states
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>(),
        vec!["broken"]
    );
    assert_eq!(report.icon, "mdi:calendar-alert");
    assert_eq!(
        sensor.refresh_policy().forced_deadline(),
        Some(at(7, 0) + TimeDelta::minutes(5))
    );

    assert_eq!(state_at(&mut sensor, at(11, 0)), "off");
    assert_eq!(state_at(&mut sensor, at(19, 0)), "evening");
}

#[test]
fn should_paint_nothing_for_degenerate_event() {
    let config = ScheduleConfig::builder()
        .name("empty")
        .default_state("off")
        .event(event("on", t(10, 0), t(10, 0)))
        .build()
        .unwrap();
    let mut sensor = sensor(config);

    let report = sensor.update(at(10, 0)).unwrap();
    assert_eq!(report.active_state, "off");
    assert_eq!(
        run(&report),
        (TimeOfDay::START_OF_DAY, TimeOfDay::END_OF_DAY)
    );
    assert!(report.error_states.is_empty());
    assert_eq!(report.next_state, None);
}

#[test]
fn should_skip_event_whose_condition_is_false() {
    let config = ScheduleConfig::builder()
        .name("conditional")
        .event(
            EventConfig::builder()
                .state("on")
                .start(t(8, 0))
                .end(t(9, 0))
                .condition(serde_json::Value::Bool(false))
                .build()
                .unwrap(),
        )
        .build()
        .unwrap();
    let mut sensor = sensor(config);

    let report = sensor.update(at(8, 30)).unwrap();
    assert_eq!(report.active_state, "default");
    assert!(report.error_states.is_empty());
}

// ---------------------------------------------------------------------------
// Overrides
// ---------------------------------------------------------------------------

fn office() -> ScheduleConfig {
    ScheduleConfig::builder()
        .name("office")
        .default_state("away")
        .attribute("target", AttributeValue::Float(17.0))
        .event(event("work", t(9, 0), t(17, 0)))
        .build()
        .unwrap()
}

#[test]
fn should_replace_override_with_same_id() {
    let mut sensor = sensor(office());
    let first = OverrideRequest::builder()
        .id("meeting")
        .state("busy")
        .start(t(9, 0))
        .end(t(17, 0))
        .build()
        .unwrap();
    assert_eq!(sensor.set_override(first, at(8, 0)).unwrap(), 1);

    let second = OverrideRequest::builder()
        .id("meeting")
        .state("busy")
        .start(t(10, 0))
        .duration_minutes(480)
        .build()
        .unwrap();
    assert_eq!(sensor.set_override(second, at(8, 0)).unwrap(), 1);
    assert_eq!(sensor.overrides().len(), 1);

    assert_eq!(state_at(&mut sensor, at(9, 30)), "work");
    let report = sensor.update(at(12, 0)).unwrap();
    assert_eq!(report.active_state, "busy");
    assert_eq!(run(&report), (t(10, 0), t(18, 0)));
    assert_eq!(report.override_count, 1);
    assert!(report.known_states.contains("busy"));
}

#[test]
fn should_expire_override_after_grace_period() {
    let mut sensor = sensor(office());
    let request = OverrideRequest::builder()
        .state("break")
        .start(t(12, 0))
        .end(t(12, 30))
        .build()
        .unwrap();
    sensor.set_override(request, at(11, 0)).unwrap();

    assert_eq!(state_at(&mut sensor, at(12, 29)), "break");
    assert_eq!(state_at(&mut sensor, at(12, 30)), "work");
    assert_eq!(sensor.overrides().len(), 1);

    sensor.update(at_hms(12, 30, 29)).unwrap();
    assert_eq!(sensor.overrides().len(), 1);

    let report = sensor.update(at_hms(12, 30, 30)).unwrap();
    assert!(sensor.overrides().is_empty());
    assert_eq!(report.override_count, 0);
    assert!(!report.known_states.contains("break"));
}

#[test]
fn should_count_lunch_override_back_from_its_end() {
    let mut sensor = sensor(office());
    let request = OverrideRequest::builder()
        .state("lunch")
        .end(t(13, 0))
        .duration_minutes(60)
        .build()
        .unwrap();
    sensor.set_override(request, at(12, 10)).unwrap();

    let report = sensor.update(at(12, 10)).unwrap();
    assert_eq!(report.active_state, "lunch");
    assert_eq!(run(&report), (t(12, 0), t(13, 0)));
    assert_eq!(report.next_state.as_deref(), Some("work"));
    assert_eq!(report.next_end, Some(t(17, 0)));
}

#[test]
fn should_refuse_explicit_wrap_unless_allowed() {
    let mut sensor = sensor(office());
    let refused = OverrideRequest::builder()
        .id("late")
        .state("overtime")
        .start(t(22, 0))
        .end(t(2, 0))
        .build()
        .unwrap();
    assert!(matches!(
        sensor.set_override(refused, at(20, 0)),
        Err(ScheduleError::Wrap(_))
    ));
    assert!(sensor.overrides().is_empty());

    let allowed = OverrideRequest::builder()
        .id("late")
        .state("overtime")
        .start(t(22, 0))
        .end(t(2, 0))
        .allow_wrap(true)
        .build()
        .unwrap();
    assert_eq!(sensor.set_override(allowed, at(20, 0)).unwrap(), 2);

    let report = sensor.update(at(23, 0)).unwrap();
    assert_eq!(report.active_state, "overtime");
    assert_eq!(run(&report), (t(22, 0), t(2, 0)));
    assert_eq!(report.override_count, 2);
}

#[test]
fn should_run_override_until_midnight() {
    let mut sensor = sensor(office());
    let request = OverrideRequest::builder()
        .state("party")
        .start(t(22, 0))
        .end(TimeOfDay::END_OF_DAY)
        .build()
        .unwrap();
    assert_eq!(sensor.set_override(request, at(20, 0)).unwrap(), 1);

    let report = sensor.update(at(23, 0)).unwrap();
    assert_eq!(report.active_state, "party");
    assert_eq!(report.friendly_end, "midnight");
}

#[test]
fn should_wait_for_evening_override_set_in_the_small_hours() {
    let mut sensor = sensor(office());
    let request = OverrideRequest::builder()
        .state("party")
        .start(t(23, 0))
        .duration_minutes(180)
        .build()
        .unwrap();
    assert_eq!(sensor.set_override(request, at(1, 0)).unwrap(), 2);

    assert_eq!(state_at(&mut sensor, at(1, 30)), "away");
    assert_eq!(state_at(&mut sensor, at(12, 0)), "work");
    let report = sensor.update(at(23, 30)).unwrap();
    assert_eq!(report.active_state, "party");
    assert_eq!(run(&report), (t(23, 0), t(2, 0)));

    let tomorrow = TimeDelta::days(1);
    assert_eq!(state_at(&mut sensor, at(1, 59) + tomorrow), "party");
    assert_eq!(state_at(&mut sensor, at(2, 0) + tomorrow), "away");
}

#[test]
fn should_report_remove_and_clear_outcomes() {
    let mut sensor = sensor(office());
    let id = OverrideId::new("focus").unwrap();
    assert!(!sensor.remove_override(&id, at(8, 0)));
    assert!(!sensor.clear_overrides(at(8, 0)));

    let request = OverrideRequest::builder()
        .id("focus")
        .state("busy")
        .duration_minutes(90)
        .build()
        .unwrap();
    sensor.set_override(request, at(8, 0)).unwrap();
    assert_eq!(state_at(&mut sensor, at(8, 30)), "busy");

    assert!(sensor.remove_override(&id, at(8, 31)));
    assert_eq!(state_at(&mut sensor, at(8, 31)), "away");

    let request = OverrideRequest::builder()
        .state("busy")
        .duration_minutes(30)
        .build()
        .unwrap();
    sensor.set_override(request, at(8, 32)).unwrap();
    assert!(sensor.clear_overrides(at(8, 33)));
    assert!(sensor.overrides().is_empty());
    assert_eq!(state_at(&mut sensor, at(8, 33)), "away");
}

#[test]
fn should_carry_declared_override_attributes_only() {
    let mut sensor = sensor(office());
    let request = OverrideRequest::builder()
        .state("boost")
        .duration_minutes(60)
        .attribute("target", AttributeValue::Float(25.0))
        .attribute("colour", "red")
        .build()
        .unwrap();
    sensor.set_override(request, at(10, 0)).unwrap();

    let report = sensor.update(at(10, 30)).unwrap();
    assert_eq!(report.attributes["target"], AttributeValue::Float(25.0));
    assert!(!report.attributes.contains_key("colour"));

    let report = sensor.update(at(11, 30)).unwrap();
    assert_eq!(report.active_state, "work");
    assert_eq!(report.attributes["target"], AttributeValue::Float(17.0));
}

// ---------------------------------------------------------------------------
// Configuration to report
// ---------------------------------------------------------------------------

#[test]
fn should_run_schedule_loaded_from_toml() {
    let toml = "
        name = 'heating'
        default_state = 'off'
        allow_wrap = true

        [extra_attributes]
        target = 17.0

        [[events]]
        state = 'on'
        start = '06:00'
        end = '09:00'
        start_offset = -30
        icon = 'mdi:fire'

        [events.extra_attributes]
        target = 21.0

        [[events]]
        state = 'on'
        start = '21:00'
        end = '01:00'
    ";
    let config: ScheduleConfig = toml::from_str(toml).unwrap();
    let mut sensor = sensor(config);

    let report = sensor.update(at(5, 45)).unwrap();
    assert_eq!(report.active_state, "on");
    assert_eq!(run(&report), (t(5, 30), t(9, 0)));
    assert_eq!(report.icon, "mdi:fire");
    assert_eq!(report.attributes["target"], AttributeValue::Float(21.0));

    let report = sensor.update(at(0, 30)).unwrap();
    assert_eq!(report.active_state, "on");
    assert_eq!(run(&report), (t(21, 0), t(1, 0)));
    assert_eq!(report.icon, "mdi:calendar-check");
    assert_eq!(report.attributes["target"], AttributeValue::Float(17.0));

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["name"], "heating");
    assert_eq!(json["start"], "21:00:00");
    assert_eq!(json["next_state"], "off");
    assert_eq!(json["known_states"], serde_json::json!(["off", "on"]));
}
