//! Outcome of evaluating an event's condition.

use serde::{Deserialize, Serialize};

/// Three-valued truth reported by a condition evaluator.
///
/// [`Unknown`](Self::Unknown) signals an evaluation problem, distinct from a
/// plain [`False`](Self::False).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionResult {
    True,
    False,
    Unknown,
}

impl From<Option<bool>> for ConditionResult {
    fn from(value: Option<bool>) -> Self {
        match value {
            Some(true) => Self::True,
            Some(false) => Self::False,
            None => Self::Unknown,
        }
    }
}

impl std::fmt::Display for ConditionResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::True => f.write_str("true"),
            Self::False => f.write_str("false"),
            Self::Unknown => f.write_str("unknown"),
        }
    }
}
