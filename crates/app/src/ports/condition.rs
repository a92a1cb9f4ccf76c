//! Condition port — evaluation of an event's opaque condition definition.

use schedule_state_domain::condition::ConditionResult;

/// Evaluates a condition definition against a variable context.
///
/// [`ConditionResult::Unknown`] means the evaluator could not decide,
/// which is different from the condition being false.
pub trait ConditionEvaluator {
    fn evaluate(
        &self,
        condition: &serde_json::Value,
        variables: &serde_json::Value,
    ) -> ConditionResult;
}

impl<T: ConditionEvaluator + ?Sized> ConditionEvaluator for &T {
    fn evaluate(
        &self,
        condition: &serde_json::Value,
        variables: &serde_json::Value,
    ) -> ConditionResult {
        (**self).evaluate(condition, variables)
    }
}
