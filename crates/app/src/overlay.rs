//! Overlay engine — folds resolved events into the day's partitions.

use std::collections::BTreeMap;

use schedule_state_domain::attribute::AttributeValue;
use schedule_state_domain::event::ResolvedEvent;
use schedule_state_domain::partition::{Partition, PartitionBuilder};

/// The partitions of one recompute.
#[derive(Debug, Clone, PartialEq)]
pub struct Schedule {
    pub states: Partition<String>,
    /// One partition per declared attribute, each starting from its default.
    pub attributes: BTreeMap<String, Partition<AttributeValue>>,
    /// `None` stands for the schedule's configured icon.
    pub icons: Partition<Option<String>>,
}

/// Paint `events` in order over the defaults. Later events win.
///
/// Each event paints its state and icon over all of its intervals. It paints
/// an attribute only when it carries a value for it; undeclared attributes
/// are ignored.
pub fn overlay<'a>(
    default_state: &str,
    defaults: &BTreeMap<String, AttributeValue>,
    events: impl IntoIterator<Item = &'a ResolvedEvent>,
) -> Schedule {
    let mut states = Partition::builder(default_state.to_string());
    let mut icons = Partition::builder(None);
    let mut attributes: BTreeMap<&str, PartitionBuilder<AttributeValue>> = defaults
        .iter()
        .map(|(key, value)| (key.as_str(), Partition::builder(value.clone())))
        .collect();

    for event in events {
        for interval in &event.intervals {
            tracing::debug!(origin = %event.origin, state = %event.state, %interval, "painting");
            states.paint(&event.state, *interval);
            icons.paint(&event.icon, *interval);
            for (key, value) in &event.attributes {
                if let Some(builder) = attributes.get_mut(key.as_str()) {
                    builder.paint(value, *interval);
                }
            }
        }
    }

    Schedule {
        states: states.build(),
        attributes: attributes
            .into_iter()
            .map(|(key, builder)| (key.to_string(), builder.build()))
            .collect(),
        icons: icons.build(),
    }
}
