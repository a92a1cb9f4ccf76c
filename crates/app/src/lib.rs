//! # schedule-state-app
//!
//! Application layer — use-cases and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** the sensor consumes (driven/outbound ports):
//!   - `TemplateRenderer` — render a template, reporting success and referenced identifiers
//!   - `ConditionEvaluator` — decide whether an event's condition holds
//! - Provide **in-process implementations** of those ports that need no engine
//! - Resolve declared events into concrete intervals (`resolver`)
//! - Fold resolved events into state, attribute and icon partitions (`overlay`)
//! - Own the mutable list of overrides (`overrides`)
//! - Answer "what is active now, and what comes next" (`query`)
//! - Decide when a schedule must be recomputed (`refresh`)
//! - Expose the per-schedule command surface and state export (`sensor`)
//!
//! ## Dependency rule
//! Depends on `schedule-state-domain` only. Never reads a clock: every
//! operation takes "now" from the caller. Everything here is synchronous.

pub mod builtin;
pub mod overlay;
pub mod overrides;
pub mod ports;
pub mod query;
pub mod refresh;
pub mod resolver;
pub mod sensor;
