//! Half-open time-of-day intervals and sets of them.
//!
//! Every interval is `[lower, upper)` on `[00:00:00, 24:00:00)`, so a range
//! ending at midnight never overlaps one starting at midnight.

use std::fmt;

use serde::Serialize;

use crate::time::TimeOfDay;

/// A half-open range `[lower, upper)` within one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Interval {
    lower: TimeOfDay,
    upper: TimeOfDay,
}

impl Interval {
    /// Build `[lower, upper)`, or `None` when `lower > upper`.
    ///
    /// `lower == upper` is legal and yields an empty interval.
    #[must_use]
    pub fn new(lower: TimeOfDay, upper: TimeOfDay) -> Option<Self> {
        (lower <= upper).then_some(Self { lower, upper })
    }

    #[must_use]
    pub const fn whole_day() -> Self {
        Self {
            lower: TimeOfDay::START_OF_DAY,
            upper: TimeOfDay::END_OF_DAY,
        }
    }

    #[must_use]
    pub const fn lower(&self) -> TimeOfDay {
        self.lower
    }

    #[must_use]
    pub const fn upper(&self) -> TimeOfDay {
        self.upper
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lower == self.upper
    }

    #[must_use]
    pub fn contains(&self, instant: TimeOfDay) -> bool {
        self.lower <= instant && instant < self.upper
    }

    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.lower < other.upper
            && other.lower < self.upper
    }

    #[must_use]
    pub fn seconds(&self) -> u32 {
        self.upper.as_seconds() - self.lower.as_seconds()
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.lower, self.upper)
    }
}

/// A normalized set of intervals: sorted, non-empty, and with no two members
/// overlapping or touching.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IntervalSet {
    intervals: Vec<Interval>,
}

impl IntervalSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn whole_day() -> Self {
        Self::from(Interval::whole_day())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Maximal disjoint sub-intervals, sorted by lower bound.
    pub fn intervals(&self) -> impl Iterator<Item = Interval> + '_ {
        self.intervals.iter().copied()
    }

    #[must_use]
    pub fn contains(&self, instant: TimeOfDay) -> bool {
        self.find(instant).is_some()
    }

    /// The maximal sub-interval containing `instant`.
    #[must_use]
    pub fn find(&self, instant: TimeOfDay) -> Option<Interval> {
        self.intervals.iter().copied().find(|i| i.contains(instant))
    }

    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.intervals
            .iter()
            .any(|a| other.intervals.iter().any(|b| a.overlaps(b)))
    }

    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        self.intervals
            .iter()
            .chain(other.intervals.iter())
            .copied()
            .collect()
    }

    #[must_use]
    pub fn difference(&self, other: &Self) -> Self {
        let mut result = self.clone();
        for cut in &other.intervals {
            result.remove(*cut);
        }
        result
    }

    /// Add `interval`, merging with any member it overlaps or touches.
    pub fn insert(&mut self, interval: Interval) {
        if interval.is_empty() {
            return;
        }
        self.intervals.push(interval);
        self.normalize();
    }

    /// Erase the extent of `interval` from the set.
    pub fn remove(&mut self, cut: Interval) {
        if cut.is_empty() {
            return;
        }
        let mut kept = Vec::with_capacity(self.intervals.len() + 1);
        for interval in self.intervals.drain(..) {
            if !interval.overlaps(&cut) {
                kept.push(interval);
                continue;
            }
            if interval.lower < cut.lower {
                kept.push(Interval {
                    lower: interval.lower,
                    upper: cut.lower,
                });
            }
            if cut.upper < interval.upper {
                kept.push(Interval {
                    lower: cut.upper,
                    upper: interval.upper,
                });
            }
        }
        self.intervals = kept;
    }

    /// Total covered length in seconds.
    #[must_use]
    pub fn seconds(&self) -> u32 {
        self.intervals.iter().map(Interval::seconds).sum()
    }

    fn normalize(&mut self) {
        self.intervals.retain(|i| !i.is_empty());
        self.intervals.sort_by_key(|i| (i.lower, i.upper));

        let mut merged: Vec<Interval> = Vec::with_capacity(self.intervals.len());
        for interval in self.intervals.drain(..) {
            match merged.last_mut() {
                Some(last) if interval.lower <= last.upper => {
                    last.upper = last.upper.max(interval.upper);
                }
                _ => merged.push(interval),
            }
        }
        self.intervals = merged;
    }
}

impl From<Interval> for IntervalSet {
    fn from(interval: Interval) -> Self {
        let mut set = Self::new();
        set.insert(interval);
        set
    }
}

impl FromIterator<Interval> for IntervalSet {
    fn from_iter<I: IntoIterator<Item = Interval>>(iter: I) -> Self {
        let mut set = Self {
            intervals: iter.into_iter().collect(),
        };
        set.normalize();
        set
    }
}

impl fmt::Display for IntervalSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.intervals.is_empty() {
            return f.write_str("()");
        }
        let parts: Vec<String> = self.intervals.iter().map(ToString::to_string).collect();
        f.write_str(&parts.join(" | "))
    }
}
