//! Partition — a day-spanning, non-overlapping assignment of intervals to labels.
//!
//! A [`Partition`] is immutable once built. It is produced by a
//! [`PartitionBuilder`], which starts with one label over the whole day and
//! then paints labels over it in order: a later paint always erases whatever
//! earlier labels held in its extent.

use crate::interval::{Interval, IntervalSet};
use crate::time::TimeOfDay;

/// One maximal run of a single label, as seen on the day's timeline.
#[derive(Debug, PartialEq, Eq)]
pub struct Segment<'a, L> {
    pub label: &'a L,
    pub interval: Interval,
}

impl<L> Clone for Segment<'_, L> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<L> Copy for Segment<'_, L> {}

/// Labels (states or attribute values) with the interval set each one holds.
///
/// Invariant: the sets are pairwise disjoint and their union is the whole day.
#[derive(Debug, Clone, PartialEq)]
pub struct Partition<L> {
    layers: Vec<(L, IntervalSet)>,
}

impl<L: PartialEq + Clone> Partition<L> {
    /// Start a partition with `base` covering the whole day.
    #[must_use]
    pub fn builder(base: L) -> PartitionBuilder<L> {
        PartitionBuilder {
            layers: vec![(base, IntervalSet::whole_day())],
        }
    }

    /// A partition holding one label for the whole day.
    #[must_use]
    pub fn uniform(label: L) -> Self {
        Self::builder(label).build()
    }

    /// Interval set currently held by `label`.
    #[must_use]
    pub fn get(&self, label: &L) -> Option<&IntervalSet> {
        self.layers
            .iter()
            .find_map(|(held, set)| (held == label).then_some(set))
    }

    /// Labels in first-painted order.
    pub fn labels(&self) -> impl Iterator<Item = &L> {
        self.layers.iter().map(|(label, _)| label)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&L, &IntervalSet)> {
        self.layers.iter().map(|(label, set)| (label, set))
    }

    /// Label and maximal interval covering `instant`.
    #[must_use]
    pub fn find(&self, instant: TimeOfDay) -> Option<(&L, Interval)> {
        self.layers
            .iter()
            .find_map(|(label, set)| set.find(instant).map(|interval| (label, interval)))
    }

    /// Every run on the timeline, sorted by lower bound.
    ///
    /// Neighbouring segments always carry different labels, since each
    /// label's set is kept merged.
    #[must_use]
    pub fn segments(&self) -> Vec<Segment<'_, L>> {
        let mut segments: Vec<Segment<'_, L>> = self
            .layers
            .iter()
            .flat_map(|(label, set)| {
                set.intervals()
                    .map(move |interval| Segment { label, interval })
            })
            .collect();
        segments.sort_by_key(|segment| segment.interval.lower());
        segments
    }

    /// Whether every instant of the day is covered exactly once.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        let covered = self
            .layers
            .iter()
            .fold(IntervalSet::new(), |acc, (_, set)| acc.union(set));
        let total: u32 = self.layers.iter().map(|(_, set)| set.seconds()).sum();
        covered == IntervalSet::whole_day() && total == IntervalSet::whole_day().seconds()
    }
}

/// Painter's-algorithm builder for [`Partition`].
#[derive(Debug, Clone)]
pub struct PartitionBuilder<L> {
    layers: Vec<(L, IntervalSet)>,
}

impl<L: PartialEq + Clone> PartitionBuilder<L> {
    /// Paint `label` over `interval`, erasing it from every other label.
    ///
    /// Empty intervals are ignored.
    pub fn paint(&mut self, label: &L, interval: Interval) {
        if interval.is_empty() {
            return;
        }
        for (held, set) in &mut self.layers {
            if held != label {
                set.remove(interval);
            }
        }
        match self.layers.iter_mut().find(|(held, _)| held == label) {
            Some((_, set)) => set.insert(interval),
            None => self
                .layers
                .push((label.clone(), IntervalSet::from(interval))),
        }
        self.layers.retain(|(_, set)| !set.is_empty());
    }

    /// Chainable form of [`paint`](Self::paint).
    #[must_use]
    pub fn with(mut self, label: &L, interval: Interval) -> Self {
        self.paint(label, interval);
        self
    }

    #[must_use]
    pub fn build(self) -> Partition<L> {
        Partition {
            layers: self.layers,
        }
    }
}
