//! Commands read from standard input, one JSON object per line.
//!
//! ```text
//! {"command":"set_override","schedule":"heating","request":{"state":"on","duration":30}}
//! {"command":"remove_override","schedule":"heating","id":"boost"}
//! {"command":"toggle","schedule":"heating"}
//! {"command":"notify_state_change","identifier":"sensor.wake"}
//! ```

use std::fmt;

use serde::Deserialize;

use schedule_state_domain::error::ScheduleError;
use schedule_state_domain::id::OverrideId;
use schedule_state_domain::overrides::OverrideRequest;

/// One operator command, addressed to a schedule by name.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    SetOverride {
        schedule: String,
        request: OverrideRequest,
    },
    RemoveOverride {
        schedule: String,
        id: OverrideId,
    },
    ClearOverrides {
        schedule: String,
    },
    Recalculate {
        schedule: String,
    },
    TurnOn {
        schedule: String,
    },
    TurnOff {
        schedule: String,
    },
    Toggle {
        schedule: String,
    },
    /// Sent to every schedule; each decides whether it tracks the identifier.
    NotifyStateChange {
        identifier: String,
    },
}

impl Command {
    /// Parse one input line.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::Parse`] when the line is not a known command.
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        Ok(serde_json::from_str(line)?)
    }
}

/// What a command did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Records stored by `set_override`.
    Stored(usize),
    /// Whether anything changed, or for `recalculate`, whether it was clean.
    Changed(bool),
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stored(records) => write!(f, "{records} record(s) stored"),
            Self::Changed(true) => f.write_str("changed"),
            Self::Changed(false) => f.write_str("unchanged"),
        }
    }
}

/// Command failures.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("malformed command")]
    Parse(#[from] serde_json::Error),

    #[error("no schedule named `{0}`")]
    UnknownSchedule(String),

    #[error("command rejected")]
    Schedule(#[from] ScheduleError),
}
