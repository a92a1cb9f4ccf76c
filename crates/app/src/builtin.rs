//! In-process port implementations that need no template or condition engine.
//!
//! The daemon wires these in by default: schedules made only of literal
//! times and boolean conditions work out of the box, and anything that
//! needs a real engine fails the way an engine failure would.

use schedule_state_domain::condition::ConditionResult;
use schedule_state_domain::event::is_template;

use crate::ports::{ConditionEvaluator, Rendered, TemplateRenderer};

/// Passes literal text through and fails on template markup.
#[derive(Debug, Clone, Copy, Default)]
pub struct LiteralRenderer;

impl TemplateRenderer for LiteralRenderer {
    fn render(&self, template: &str) -> Rendered {
        if is_template(template) {
            Rendered::failed()
        } else {
            Rendered::ok(template)
        }
    }
}

/// Treats a JSON boolean as its own truth value; anything else is unknown.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticConditions;

impl ConditionEvaluator for StaticConditions {
    fn evaluate(
        &self,
        condition: &serde_json::Value,
        _variables: &serde_json::Value,
    ) -> ConditionResult {
        condition.as_bool().into()
    }
}
