//! Port definitions — traits that adapters implement.
//!
//! Ports are the boundaries between the schedule core and whatever evaluates
//! templates and conditions. They are defined here (in `app`) so that both
//! the use-case layer and any adapter can depend on them without creating
//! circular dependencies.

pub mod condition;
pub mod template;

pub use condition::ConditionEvaluator;
pub use template::{Rendered, TemplateRenderer};
