//! Override manager — the mutable, id-addressable list of overrides.

use std::collections::BTreeMap;

use schedule_state_domain::attribute::AttributeValue;
use schedule_state_domain::error::ScheduleError;
use schedule_state_domain::event::ResolvedEvent;
use schedule_state_domain::id::OverrideId;
use schedule_state_domain::overrides::{Override, OverrideRequest};
use schedule_state_domain::time::Timestamp;

/// Stored overrides, in paint order.
///
/// A wraparound override is stored as two records sharing one id, and every
/// id-addressed operation acts on all records carrying it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverrideStore {
    records: Vec<Override>,
}

impl OverrideStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace an override, returning how many records were stored.
    ///
    /// Attributes missing from `declared` are dropped with a warning. A
    /// zero-length window stores nothing and leaves the store unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`ScheduleError::Validation`] for an invalid request and
    /// [`ScheduleError::Wrap`] when an explicit window crosses midnight
    /// without permission. Nothing is stored on error.
    #[tracing::instrument(skip(self, request, declared), fields(state = %request.state))]
    pub fn set(
        &mut self,
        request: OverrideRequest,
        now: Timestamp,
        default_wrap: bool,
        declared: &BTreeMap<String, AttributeValue>,
    ) -> Result<usize, ScheduleError> {
        let window = request.plan(now, default_wrap)?;
        let spans = window.spans()?;
        if spans.is_empty() {
            tracing::debug!(
                start = %window.start,
                end = %window.end,
                "zero-length override ignored"
            );
            return Ok(0);
        }

        let mut attributes = request.extra_attributes;
        attributes.retain(|key, _| {
            let known = declared.contains_key(key);
            if !known {
                tracing::warn!(attribute = %key, "undeclared override attribute dropped");
            }
            known
        });

        let expires_at = window.expires_at();
        let records: Vec<Override> = spans
            .into_iter()
            .map(|(day, interval)| Override {
                id: request.id.clone(),
                state: request.state.clone(),
                interval,
                day,
                expires_at,
                icon: request.icon.clone(),
                attributes: attributes.clone(),
            })
            .collect();
        let stored = records.len();

        let position = request
            .id
            .as_ref()
            .and_then(|id| self.position_of(id))
            .unwrap_or(self.records.len());
        if let Some(id) = &request.id {
            self.records.retain(|record| record.id.as_ref() != Some(id));
        }
        let position = position.min(self.records.len());
        self.records.splice(position..position, records);

        tracing::info!(stored, %expires_at, "override set");
        Ok(stored)
    }

    /// Remove every record carrying `id`; `false` if there were none.
    #[tracing::instrument(skip(self))]
    pub fn remove(&mut self, id: &OverrideId) -> bool {
        let before = self.records.len();
        self.records.retain(|record| record.id.as_ref() != Some(id));
        before != self.records.len()
    }

    /// Remove everything; `false` if the store was already empty.
    pub fn clear(&mut self) -> bool {
        let had_any = !self.records.is_empty();
        self.records.clear();
        had_any
    }

    /// Drop every record with `expires_at <= now`, returning how many went.
    pub fn expire(&mut self, now: Timestamp) -> usize {
        let before = self.records.len();
        self.records.retain(|record| !record.is_expired(now));
        let expired = before - self.records.len();
        if expired > 0 {
            tracing::debug!(expired, "overrides expired");
        }
        expired
    }

    pub fn iter(&self) -> impl Iterator<Item = &Override> {
        self.records.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records visible at `now`, as events to paint after the declared ones.
    #[must_use]
    pub fn resolved(&self, now: Timestamp) -> Vec<ResolvedEvent> {
        self.records
            .iter()
            .filter(|record| record.is_visible(now))
            .map(Override::to_resolved)
            .collect()
    }

    /// Whether any record was painted at `since` but not at `now`, or the
    /// other way round.
    #[must_use]
    pub fn visibility_changed(&self, since: Timestamp, now: Timestamp) -> bool {
        self.records
            .iter()
            .any(|record| record.is_visible(since) != record.is_visible(now))
    }

    fn position_of(&self, id: &OverrideId) -> Option<usize> {
        self.records
            .iter()
            .position(|record| record.id.as_ref() == Some(id))
    }
}
