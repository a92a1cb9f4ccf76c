//! # schedule-state-domain
//!
//! Pure domain model for the schedule-state engine.
//!
//! ## Responsibilities
//! - Foundational types: time of day, timestamps, override identifiers, error conventions
//! - Define **Intervals** (half-open time-of-day ranges) and their set algebra
//! - Define **Partitions** (a day-spanning, non-overlapping assignment of intervals to labels)
//! - Define **Events** (declarative, time-windowed states) and their wraparound splitting
//! - Define **Overrides** (temporary, user-issued events with an expiry)
//! - Define **Schedules** (the per-sensor configuration)
//! - Contain all invariant enforcement and pure domain logic
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It never reads a clock, renders a template or evaluates a condition:
//! those boundaries are expressed as traits in the `app` crate (ports),
//! and "now" is always passed in by the caller.

pub mod error;
pub mod id;
pub mod time;

pub mod attribute;
pub mod condition;
pub mod event;
pub mod interval;
pub mod overrides;
pub mod partition;
pub mod schedule;
